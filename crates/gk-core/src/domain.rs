use chrono::{DateTime, Utc};

/// Platform user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Platform channel id. A channel is one independent conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(pub i64);

/// Platform guild (server / group) id. Rate limits and personas are per guild.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GuildId(pub i64);

/// Platform message id, unique within a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a platform message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel: ChannelId,
    pub message_id: MessageId,
}

/// A user as seen in a message: id plus the name shown in chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRef {
    pub id: UserId,
    pub display_name: String,
}

impl UserRef {
    pub fn new(id: i64, display_name: impl Into<String>) -> Self {
        Self {
            id: UserId(id),
            display_name: display_name.into(),
        }
    }
}

/// The message a reply points at.
///
/// `author` is filled in when the platform delivered the referenced message together
/// with the reply; `None` means it has to be fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyRef {
    pub message_id: MessageId,
    pub author: Option<UserId>,
}

/// Platform-neutral inbound message handed to the triage orchestrator.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub id: MessageRef,
    pub guild: GuildId,
    pub guild_name: Option<String>,
    pub author: UserRef,
    pub text: String,
    /// Mentioned users in the order they appear in the text.
    pub mentions: Vec<UserRef>,
    pub reply_to: Option<ReplyRef>,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    pub fn channel(&self) -> ChannelId {
        self.id.channel
    }

    pub fn mentions_user(&self, user: UserId) -> bool {
        self.mentions.iter().any(|m| m.id == user)
    }
}

/// Who produced an utterance in the conversation log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Speaker {
    User(UserRef),
    Assistant,
}

/// One entry of a channel's conversation log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Utterance {
    pub fn user(author: UserRef, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            speaker: Speaker::User(author),
            text: text.into(),
            timestamp,
        }
    }

    pub fn assistant(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
            timestamp,
        }
    }

    pub fn is_from(&self, user: UserId) -> bool {
        matches!(&self.speaker, Speaker::User(u) if u.id == user)
    }
}
