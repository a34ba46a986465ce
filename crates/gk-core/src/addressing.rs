use std::{collections::HashSet, time::Duration};

use tracing::debug;

use crate::{
    domain::{ChannelId, InboundMessage, UserId},
    ports::MessageLookup,
};

/// Decides whether an inbound message is directed at the bot.
///
/// Any doubt resolves to "not addressed".
#[derive(Clone, Debug)]
pub struct AddressingResolver {
    bot: UserId,
    always_on: HashSet<ChannelId>,
    lookup_timeout: Duration,
}

impl AddressingResolver {
    pub fn new(bot: UserId, always_on: HashSet<ChannelId>, lookup_timeout: Duration) -> Self {
        Self {
            bot,
            always_on,
            lookup_timeout,
        }
    }

    pub fn is_always_on(&self, channel: ChannelId) -> bool {
        self.always_on.contains(&channel)
    }

    /// Checked in order, first hit wins: always-on channel, explicit mention,
    /// reply to a bot-authored message.
    pub async fn is_addressed<L>(&self, msg: &InboundMessage, lookup: &L) -> bool
    where
        L: MessageLookup + ?Sized,
    {
        if self.is_always_on(msg.channel()) {
            return true;
        }
        if msg.mentions_user(self.bot) {
            return true;
        }

        let Some(reply) = &msg.reply_to else {
            return false;
        };
        if let Some(author) = reply.author {
            return author == self.bot;
        }

        let fetch = lookup.fetch_message(msg.channel(), reply.message_id);
        match tokio::time::timeout(self.lookup_timeout, fetch).await {
            Ok(Ok(Some(found))) => found.author == self.bot,
            Ok(Ok(None)) => false,
            Ok(Err(e)) => {
                debug!(channel = msg.channel().0, "reply target lookup failed: {e}");
                false
            }
            Err(_) => {
                debug!(channel = msg.channel().0, "reply target lookup timed out");
                false
            }
        }
    }
}
