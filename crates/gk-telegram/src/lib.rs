//! Telegram adapter (teloxide).
//!
//! This crate implements the `gk-core` platform ports over the Telegram Bot API.
//! A Telegram chat plays both roles the core distinguishes: it is the channel
//! (memory, mutes) and the guild (persona, rate limits, membership).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::{prelude::*, types::ChatPermissions, RequestError};
use tokio::time::sleep;
use tracing::{debug, warn};

pub mod inbound;
pub mod router;

use gk_core::{
    domain::{ChannelId, GuildId, MessageId, MessageRef, UserId},
    errors::{PlatformError, PlatformResult},
    ports::{FetchedMessage, GuildDirectory, MessageLookup, Moderatable, ModerationAction, Sendable},
};

#[derive(Clone)]
pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(id: i64) -> teloxide::types::ChatId {
        teloxide::types::ChatId(id)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn tg_user(user: UserId) -> PlatformResult<teloxide::types::UserId> {
        u64::try_from(user.0)
            .map(teloxide::types::UserId)
            .map_err(|_| PlatformError::Rejected(format!("invalid telegram user id {}", user.0)))
    }

    fn map_err(e: RequestError) -> PlatformError {
        match e {
            RequestError::Api(api) => classify_api_error(&api.to_string()),
            RequestError::Network(net) => PlatformError::Network(net.to_string()),
            RequestError::Io(io) => PlatformError::Network(io.to_string()),
            other => PlatformError::Rejected(other.to_string()),
        }
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> PlatformResult<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }

    async fn purge(&self, channel: ChannelId, before: MessageId, count: u32) -> PlatformResult<()> {
        let first = (i64::from(before.0) - i64::from(count)).max(1);
        let mut deleted = 0u32;
        let mut last_err = None;

        for id in first..=i64::from(before.0) {
            let Ok(id) = i32::try_from(id) else {
                continue;
            };
            let msg_id = Self::tg_msg_id(MessageId(id));
            match self
                .with_retry(|| self.bot.delete_message(Self::tg_chat(channel.0), msg_id))
                .await
            {
                Ok(_) => deleted += 1,
                // Gaps are normal: service messages, already-deleted messages.
                Err(PlatformError::NotFound) => {}
                Err(e) => last_err = Some(e),
            }
        }

        debug!(channel = channel.0, deleted, "purge finished");
        match (deleted, last_err) {
            (0, Some(e)) => Err(e),
            (_, Some(e)) => {
                warn!(channel = channel.0, deleted, "purge partially failed: {e}");
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Bot API errors only come with a description; sort them by what went wrong.
fn classify_api_error(description: &str) -> PlatformError {
    let lower = description.to_lowercase();
    if lower.contains("not found") {
        PlatformError::NotFound
    } else if lower.contains("rights")
        || lower.contains("forbidden")
        || lower.contains("not an administrator")
        || lower.contains("can't")
        || lower.contains("can not")
    {
        PlatformError::Forbidden(description.to_string())
    } else {
        PlatformError::Rejected(description.to_string())
    }
}

fn sent_ref(channel: ChannelId, msg: &Message) -> MessageRef {
    MessageRef {
        channel,
        message_id: MessageId(msg.id.0),
    }
}

#[async_trait]
impl Sendable for TelegramPlatform {
    async fn send_message(&self, channel: ChannelId, text: &str) -> PlatformResult<MessageRef> {
        let msg = self
            .with_retry(|| self.bot.send_message(Self::tg_chat(channel.0), text.to_string()))
            .await?;
        Ok(sent_ref(channel, &msg))
    }

    async fn reply_to(&self, message: MessageRef, text: &str) -> PlatformResult<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(message.channel.0), text.to_string())
                    .reply_to_message_id(Self::tg_msg_id(message.message_id))
                    .allow_sending_without_reply(true)
            })
            .await?;
        Ok(sent_ref(message.channel, &msg))
    }
}

#[async_trait]
impl MessageLookup for TelegramPlatform {
    /// The Bot API cannot fetch arbitrary messages; replies always arrive with
    /// their target attached, so there is nothing left to look up.
    async fn fetch_message(
        &self,
        _channel: ChannelId,
        _message_id: MessageId,
    ) -> PlatformResult<Option<FetchedMessage>> {
        Ok(None)
    }
}

#[async_trait]
impl Moderatable for TelegramPlatform {
    async fn moderate(&self, action: ModerationAction) -> PlatformResult<()> {
        match action {
            ModerationAction::Timeout {
                guild,
                user,
                duration,
                reason,
            } => {
                debug!(guild = guild.0, user = user.0, %reason, "restricting member");
                let tg_user = Self::tg_user(user)?;
                let until = restriction_until(Utc::now(), duration)?;
                self.with_retry(|| {
                    self.bot
                        .restrict_chat_member(
                            Self::tg_chat(guild.0),
                            tg_user,
                            ChatPermissions::empty(),
                        )
                        .until_date(until)
                })
                .await?;
                Ok(())
            }
            ModerationAction::Kick {
                guild,
                user,
                reason,
            } => {
                debug!(guild = guild.0, user = user.0, %reason, "kicking member");
                let tg_user = Self::tg_user(user)?;
                self.with_retry(|| self.bot.ban_chat_member(Self::tg_chat(guild.0), tg_user))
                    .await?;
                // Lift the ban right away so they can rejoin.
                self.with_retry(|| {
                    self.bot
                        .unban_chat_member(Self::tg_chat(guild.0), tg_user)
                        .only_if_banned(true)
                })
                .await?;
                Ok(())
            }
            ModerationAction::Ban {
                guild,
                user,
                reason,
            } => {
                debug!(guild = guild.0, user = user.0, %reason, "banning member");
                let tg_user = Self::tg_user(user)?;
                self.with_retry(|| self.bot.ban_chat_member(Self::tg_chat(guild.0), tg_user))
                    .await?;
                Ok(())
            }
            ModerationAction::Purge {
                channel,
                before,
                count,
                reason,
            } => {
                debug!(channel = channel.0, count, %reason, "purging messages");
                self.purge(channel, before, count).await
            }
        }
    }
}

#[async_trait]
impl GuildDirectory for TelegramPlatform {
    async fn member_count(&self, guild: GuildId) -> PlatformResult<u64> {
        let n = self
            .with_retry(|| self.bot.get_chat_member_count(Self::tg_chat(guild.0)))
            .await?;
        Ok(u64::from(n))
    }

    async fn is_administrator(&self, guild: GuildId, user: UserId) -> PlatformResult<bool> {
        let tg_user = Self::tg_user(user)?;
        let member = self
            .with_retry(|| self.bot.get_chat_member(Self::tg_chat(guild.0), tg_user))
            .await?;
        Ok(member.is_privileged())
    }
}

/// Telegram treats restrictions under 30s or over 366 days as permanent.
const MIN_RESTRICTION: Duration = Duration::from_secs(35);
const MAX_RESTRICTION: Duration = Duration::from_secs(366 * 86_400);

/// End of a timeout, kept inside the window Telegram honours as temporary.
fn restriction_until(now: DateTime<Utc>, duration: Duration) -> PlatformResult<DateTime<Utc>> {
    let span = chrono::Duration::from_std(duration.clamp(MIN_RESTRICTION, MAX_RESTRICTION))
        .map_err(|e| PlatformError::Rejected(format!("timeout out of range: {e}")))?;
    now.checked_add_signed(span)
        .ok_or_else(|| PlatformError::Rejected("timeout end is out of range".to_string()))
}
