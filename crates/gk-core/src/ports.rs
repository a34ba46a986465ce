//! Capability traits the triage core depends on.
//!
//! The chat platform and the generation service live behind these ports and are
//! implemented in adapter crates. Tests use in-memory fakes.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    domain::{ChannelId, GuildId, MessageId, MessageRef, UserId, Utterance},
    errors::{GenerationError, PlatformResult},
};

/// Outbound text.
#[async_trait]
pub trait Sendable: Send + Sync {
    async fn send_message(&self, channel: ChannelId, text: &str) -> PlatformResult<MessageRef>;
    async fn reply_to(&self, message: MessageRef, text: &str) -> PlatformResult<MessageRef>;
}

/// Minimal view of a message fetched back from the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedMessage {
    pub id: MessageRef,
    pub author: UserId,
}

/// Read access to earlier messages.
#[async_trait]
pub trait MessageLookup: Send + Sync {
    /// `Ok(None)` when the message does not exist (or is not retrievable).
    async fn fetch_message(
        &self,
        channel: ChannelId,
        message_id: MessageId,
    ) -> PlatformResult<Option<FetchedMessage>>;
}

/// A moderation action the platform should carry out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModerationAction {
    Timeout {
        guild: GuildId,
        user: UserId,
        duration: Duration,
        reason: String,
    },
    Kick {
        guild: GuildId,
        user: UserId,
        reason: String,
    },
    Ban {
        guild: GuildId,
        user: UserId,
        reason: String,
    },
    /// Delete the `count` messages sent in `channel` right before `before`,
    /// together with `before` itself (the command message).
    Purge {
        channel: ChannelId,
        before: MessageId,
        count: u32,
        reason: String,
    },
}

#[async_trait]
pub trait Moderatable: Send + Sync {
    async fn moderate(&self, action: ModerationAction) -> PlatformResult<()>;
}

/// Guild-level queries.
#[async_trait]
pub trait GuildDirectory: Send + Sync {
    async fn member_count(&self, guild: GuildId) -> PlatformResult<u64>;

    /// Whether the platform grants `user` administrator-equivalent rights in `guild`.
    async fn is_administrator(&self, guild: GuildId, user: UserId) -> PlatformResult<bool>;
}

/// Everything the orchestrator needs from the chat platform.
pub trait Platform: Sendable + MessageLookup + Moderatable + GuildDirectory {}

impl<T> Platform for T where T: Sendable + MessageLookup + Moderatable + GuildDirectory {}

/// One text-completion request: persona instructions, prior turns, and the new text.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub system: String,
    pub history: Vec<Utterance>,
    pub user_text: String,
}

/// Reply generation service (HTTP text completion in production).
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, req: &GenerationRequest) -> Result<String, GenerationError>;
}
