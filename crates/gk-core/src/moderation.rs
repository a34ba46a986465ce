//! Keyword-driven moderation commands (`timeout`, `kick`, `ban`, `delete`).

use std::{future::Future, sync::OnceLock, time::Duration};

use regex::Regex;
use tracing::{info, warn};

use crate::{
    domain::{InboundMessage, UserId, UserRef},
    duration::{format_seconds, parse_seconds},
    errors::{PlatformError, PlatformResult},
    ports::{ModerationAction, Moderatable},
};

/// Reason attached to every platform action taken on behalf of a chat command.
pub const ACTION_REASON: &str = "gatekeeper moderation command";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModerationKind {
    Timeout,
    Kick,
    Ban,
    Delete,
}

impl ModerationKind {
    /// Fixed evaluation order; the first kind that acts consumes the message.
    pub const ALL: [ModerationKind; 4] = [
        ModerationKind::Timeout,
        ModerationKind::Kick,
        ModerationKind::Ban,
        ModerationKind::Delete,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            ModerationKind::Timeout => "timeout",
            ModerationKind::Kick => "kick",
            ModerationKind::Ban => "ban",
            ModerationKind::Delete => "delete",
        }
    }

    fn failure_phrase(self) -> &'static str {
        match self {
            ModerationKind::Timeout => "timeout user",
            ModerationKind::Kick => "kick user",
            ModerationKind::Ban => "ban user",
            ModerationKind::Delete => "delete messages",
        }
    }
}

/// Moderation keywords found in a message, in evaluation order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModerationIntent {
    pub kinds: Vec<ModerationKind>,
}

/// Literal, case-insensitive keyword scan.
pub fn classify(text: &str) -> Option<ModerationIntent> {
    let lower = text.to_lowercase();
    let kinds: Vec<ModerationKind> = ModerationKind::ALL
        .into_iter()
        .filter(|k| lower.contains(k.keyword()))
        .collect();
    if kinds.is_empty() {
        None
    } else {
        Some(ModerationIntent { kinds })
    }
}

/// Terminal result of a consumed moderation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModerationOutcome {
    Unauthorized,
    NoTarget(ModerationKind),
    NeedNumber,
    TimedOut { target: UserRef, seconds: u64 },
    Kicked(UserRef),
    Banned(UserRef),
    Purged { count: u32 },
    Failed {
        kind: ModerationKind,
        error: PlatformError,
    },
}

impl ModerationOutcome {
    pub fn user_message(&self) -> String {
        match self {
            ModerationOutcome::Unauthorized => {
                "❌ Only admins can use moderation commands.".to_string()
            }
            ModerationOutcome::NoTarget(kind) => {
                format!("⚠️ Mention the user you want me to {}.", kind.keyword())
            }
            ModerationOutcome::NeedNumber => {
                "⚠️ Tell me how many messages to delete, e.g. \"delete 10\".".to_string()
            }
            ModerationOutcome::TimedOut { target, seconds } => format!(
                "⏳ Timed out {} for {}.",
                target.display_name,
                format_seconds(*seconds)
            ),
            ModerationOutcome::Kicked(target) => format!("✅ Kicked {}.", target.display_name),
            ModerationOutcome::Banned(target) => format!("✅ Banned {}.", target.display_name),
            ModerationOutcome::Purged { count } => format!("🧹 Deleted {count} messages."),
            ModerationOutcome::Failed { kind, .. } => {
                format!("❌ Could not {}.", kind.failure_phrase())
            }
        }
    }
}

static COUNT_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// First standalone integer in the text (digits glued to a word, like `user42`, don't count).
fn first_count(text: &str) -> Option<u64> {
    let re = COUNT_RE
        .get_or_init(|| Regex::new(r"\b(\d+)\b").ok())
        .as_ref()?;
    re.captures(text)?.get(1)?.as_str().parse::<u64>().ok()
}

#[derive(Clone, Debug)]
pub struct ModerationDispatcher {
    bot: UserId,
    action_timeout: Duration,
    purge_limit: u32,
}

impl ModerationDispatcher {
    pub fn new(bot: UserId, action_timeout: Duration, purge_limit: u32) -> Self {
        Self {
            bot,
            action_timeout,
            purge_limit: purge_limit.max(1),
        }
    }

    /// Run the first applicable keyword of `intent`.
    ///
    /// `None` means every keyword fell through (a timeout without a duration) and
    /// the message should be handled as ordinary conversation.
    pub async fn dispatch<M>(
        &self,
        msg: &InboundMessage,
        intent: &ModerationIntent,
        privileged: bool,
        moderator: &M,
    ) -> Option<ModerationOutcome>
    where
        M: Moderatable + ?Sized,
    {
        if intent.kinds.is_empty() {
            return None;
        }
        if !privileged {
            info!(
                user = msg.author.id.0,
                "moderation request from unprivileged user rejected"
            );
            return Some(ModerationOutcome::Unauthorized);
        }

        for kind in &intent.kinds {
            if let Some(outcome) = self.run_kind(*kind, msg, moderator).await {
                return Some(outcome);
            }
        }
        None
    }

    async fn run_kind<M>(
        &self,
        kind: ModerationKind,
        msg: &InboundMessage,
        moderator: &M,
    ) -> Option<ModerationOutcome>
    where
        M: Moderatable + ?Sized,
    {
        if kind == ModerationKind::Delete {
            let count = match first_count(&msg.text) {
                Some(n) if n > 0 => n.min(u64::from(self.purge_limit)) as u32,
                _ => return Some(ModerationOutcome::NeedNumber),
            };
            let action = ModerationAction::Purge {
                channel: msg.channel(),
                before: msg.id.message_id,
                count,
                reason: ACTION_REASON.to_string(),
            };
            let done = ModerationOutcome::Purged { count };
            return Some(self.perform(kind, moderator.moderate(action), done).await);
        }

        let Some(target) = self.target_of(msg) else {
            return Some(ModerationOutcome::NoTarget(kind));
        };

        let (action, done) = match kind {
            ModerationKind::Timeout => {
                // No duration: let the next keyword (if any) have the message.
                let seconds = parse_seconds(&msg.text)?;
                (
                    ModerationAction::Timeout {
                        guild: msg.guild,
                        user: target.id,
                        duration: Duration::from_secs(seconds),
                        reason: ACTION_REASON.to_string(),
                    },
                    ModerationOutcome::TimedOut {
                        target: target.clone(),
                        seconds,
                    },
                )
            }
            ModerationKind::Kick => (
                ModerationAction::Kick {
                    guild: msg.guild,
                    user: target.id,
                    reason: ACTION_REASON.to_string(),
                },
                ModerationOutcome::Kicked(target.clone()),
            ),
            ModerationKind::Ban => (
                ModerationAction::Ban {
                    guild: msg.guild,
                    user: target.id,
                    reason: ACTION_REASON.to_string(),
                },
                ModerationOutcome::Banned(target.clone()),
            ),
            ModerationKind::Delete => return None,
        };

        Some(self.perform(kind, moderator.moderate(action), done).await)
    }

    /// First mentioned user other than the bot itself.
    fn target_of<'a>(&self, msg: &'a InboundMessage) -> Option<&'a UserRef> {
        msg.mentions.iter().find(|u| u.id != self.bot)
    }

    async fn perform(
        &self,
        kind: ModerationKind,
        call: impl Future<Output = PlatformResult<()>>,
        done: ModerationOutcome,
    ) -> ModerationOutcome {
        let result = match tokio::time::timeout(self.action_timeout, call).await {
            Ok(r) => r,
            Err(_) => Err(PlatformError::Timeout(self.action_timeout)),
        };
        match result {
            Ok(()) => {
                info!(action = kind.keyword(), "moderation action performed");
                done
            }
            Err(error) => {
                warn!(action = kind.keyword(), "moderation action failed: {error}");
                ModerationOutcome::Failed { kind, error }
            }
        }
    }
}
