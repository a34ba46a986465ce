use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

use gk_core::{
    config::Config,
    domain::{UserId, UserRef},
    ports::{Platform, ReplyGenerator},
    BotIdentity, Gatekeeper,
};

use crate::{
    inbound::{to_inbound, SeenUsers},
    TelegramPlatform,
};

#[derive(Clone)]
pub struct AppState {
    pub gatekeeper: Arc<Gatekeeper>,
    pub bot_username: String,
    pub seen: Arc<SeenUsers>,
    pub chat_locks: Arc<ChatLocks>,
}

#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(
    cfg: Arc<Config>,
    generator: Arc<dyn ReplyGenerator>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let me = bot.get_me().await?;
    let bot_username = me.username().to_string();
    let identity = BotIdentity {
        id: UserId(me.user.id.0 as i64),
        name: cfg
            .bot_name
            .clone()
            .unwrap_or_else(|| me.user.first_name.clone()),
    };
    info!(
        username = %bot_username,
        name = %identity.name,
        owners = cfg.owner_ids.len(),
        always_on = cfg.always_on_channels.len(),
        "gatekeeper started"
    );

    let platform: Arc<dyn Platform> = Arc::new(TelegramPlatform::new(bot.clone()));
    let gatekeeper = Arc::new(Gatekeeper::new(cfg, identity, platform, generator));

    let state = Arc::new(AppState {
        gatekeeper,
        bot_username,
        seen: Arc::new(SeenUsers::new()),
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let bot = state.gatekeeper.bot();
    let bot_ref = UserRef {
        id: bot.id,
        display_name: bot.name.clone(),
    };

    let Some(inbound) = to_inbound(&msg, &state.bot_username, &bot_ref, &state.seen).await else {
        return Ok(());
    };

    // Memory and mute decisions assume one message per chat at a time.
    let _guard = state.chat_locks.lock_chat(msg.chat.id.0).await;
    state.gatekeeper.handle(&inbound).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chat_locks_are_per_chat() {
        let locks = ChatLocks::default();
        let first = locks.lock_chat(1).await;

        // Another chat is not blocked by the held lock.
        let other = tokio::time::timeout(std::time::Duration::from_millis(50), locks.lock_chat(2))
            .await;
        assert!(other.is_ok());

        // The same chat is.
        let same = tokio::time::timeout(std::time::Duration::from_millis(50), locks.lock_chat(1))
            .await;
        assert!(same.is_err());

        drop(first);
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), locks.lock_chat(1))
                .await
                .is_ok()
        );
    }
}
