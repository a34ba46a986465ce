//! Conversion of Telegram messages into core `InboundMessage`s.

use std::collections::HashMap;

use teloxide::types::{Message, MessageEntityKind, User};
use tokio::sync::Mutex;

use gk_core::domain::{
    ChannelId, GuildId, InboundMessage, MessageId, MessageRef, ReplyRef, UserId, UserRef,
};

/// Users seen in the chat, keyed by lower-cased username.
///
/// Plain `@username` mentions carry no user id, so they resolve against
/// everyone the bot has already seen speak.
#[derive(Debug, Default)]
pub struct SeenUsers {
    by_username: Mutex<HashMap<String, UserRef>>,
}

impl SeenUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn remember(&self, user: &User) {
        if let Some(username) = &user.username {
            self.insert(username, user_ref(user)).await;
        }
    }

    async fn insert(&self, username: &str, user: UserRef) {
        self.by_username
            .lock()
            .await
            .insert(username.to_lowercase(), user);
    }

    pub async fn resolve(&self, username: &str) -> Option<UserRef> {
        let key = username.trim_start_matches('@').to_lowercase();
        self.by_username.lock().await.get(&key).cloned()
    }
}

pub fn user_ref(user: &User) -> UserRef {
    UserRef::new(user.id.0 as i64, user.full_name())
}

/// A mention as Telegram reports it, before resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawMention {
    /// `@username` text.
    Username(String),
    /// Mention of a user without a username; the user is attached.
    User(UserRef),
}

fn raw_mentions(msg: &Message) -> Vec<RawMention> {
    let Some(entities) = msg.parse_entities().or_else(|| msg.parse_caption_entities()) else {
        return Vec::new();
    };
    entities
        .iter()
        .filter_map(|e| match e.kind() {
            MessageEntityKind::Mention => Some(RawMention::Username(e.text().to_string())),
            MessageEntityKind::TextMention { user } => Some(RawMention::User(user_ref(user))),
            _ => None,
        })
        .collect()
}

/// Resolve raw mentions in order, dropping unknown usernames and duplicates.
pub async fn resolve_mentions(
    raw: Vec<RawMention>,
    bot_username: &str,
    bot: &UserRef,
    seen: &SeenUsers,
) -> Vec<UserRef> {
    let mut out: Vec<UserRef> = Vec::with_capacity(raw.len());
    for mention in raw {
        let resolved = match mention {
            RawMention::User(u) => Some(u),
            RawMention::Username(name) => {
                if name.trim_start_matches('@').eq_ignore_ascii_case(bot_username) {
                    Some(bot.clone())
                } else {
                    seen.resolve(&name).await
                }
            }
        };
        if let Some(u) = resolved {
            if !out.iter().any(|o| o.id == u.id) {
                out.push(u);
            }
        }
    }
    out
}

/// `None` for updates the core never sees: no sender or no text.
pub async fn to_inbound(
    msg: &Message,
    bot_username: &str,
    bot: &UserRef,
    seen: &SeenUsers,
) -> Option<InboundMessage> {
    let author = msg.from()?;
    let text = msg.text().or_else(|| msg.caption())?.to_string();
    seen.remember(author).await;

    let chat = msg.chat.id.0;
    let mentions = resolve_mentions(raw_mentions(msg), bot_username, bot, seen).await;
    let reply_to = msg.reply_to_message().map(|r| ReplyRef {
        message_id: MessageId(r.id.0),
        author: r.from().map(|u| UserId(u.id.0 as i64)),
    });

    Some(InboundMessage {
        id: MessageRef {
            channel: ChannelId(chat),
            message_id: MessageId(msg.id.0),
        },
        guild: GuildId(chat),
        guild_name: msg.chat.title().map(str::to_string),
        author: user_ref(author),
        text,
        mentions,
        reply_to,
        timestamp: msg.date,
    })
}
