//! Per-message triage: decides whether, how, and with what the bot answers.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    addressing::AddressingResolver,
    commands::{self, CommandContext, CommandOutcome},
    config::Config,
    domain::{InboundMessage, UserId, UserRef, Utterance},
    duration::format_seconds,
    errors::GenerationError,
    moderation::{classify, ModerationDispatcher, ModerationOutcome},
    ports::{GenerationRequest, Platform, ReplyGenerator},
    state::ChatState,
    Result,
};

/// Who the bot is on the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: UserId,
    pub name: String,
}

/// Terminal state of one handled message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Triage {
    IgnoredSelf,
    Command(CommandOutcome),
    QuickMuted,
    Muted,
    NotAddressed,
    Moderated(ModerationOutcome),
    RateLimited,
    Replied,
    Fallback,
    /// Processing failed before admission; nothing was sent.
    Errored,
}

pub struct Gatekeeper {
    cfg: Arc<Config>,
    bot: BotIdentity,
    platform: Arc<dyn Platform>,
    generator: Arc<dyn ReplyGenerator>,
    state: ChatState,
    resolver: AddressingResolver,
    dispatcher: ModerationDispatcher,
}

impl Gatekeeper {
    pub fn new(
        cfg: Arc<Config>,
        bot: BotIdentity,
        platform: Arc<dyn Platform>,
        generator: Arc<dyn ReplyGenerator>,
    ) -> Self {
        let state = ChatState::new(cfg.memory_capacity, cfg.default_persona);
        let resolver = AddressingResolver::new(
            bot.id,
            cfg.always_on_channels.clone(),
            cfg.action_timeout,
        );
        let dispatcher = ModerationDispatcher::new(bot.id, cfg.action_timeout, cfg.purge_limit);
        Self {
            cfg,
            bot,
            platform,
            generator,
            state,
            resolver,
            dispatcher,
        }
    }

    pub fn bot(&self) -> &BotIdentity {
        &self.bot
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    /// Handle one inbound message end to end. Never fails: errors are logged and,
    /// once the message was admitted, answered with the fallback text.
    pub async fn handle(&self, msg: &InboundMessage) -> Triage {
        let mut admitted = false;
        let triage = match self.triage(msg, &mut admitted).await {
            Ok(t) => t,
            Err(e) if admitted => {
                warn!(channel = msg.channel().0, "reply failed after admission: {e}");
                self.send_fallback(msg).await;
                Triage::Fallback
            }
            Err(e) => {
                warn!(channel = msg.channel().0, "message processing failed: {e}");
                Triage::Errored
            }
        };

        info!(
            channel = msg.channel().0,
            user = msg.author.id.0,
            triage = ?triage,
            "message triaged"
        );
        triage
    }

    async fn triage(&self, msg: &InboundMessage, admitted: &mut bool) -> Result<Triage> {
        if msg.author.id == self.bot.id {
            return Ok(Triage::IgnoredSelf);
        }

        let now = Utc::now();
        let channel = msg.channel();

        if let Some(cmd) = commands::parse_command(&msg.text) {
            let privileged = cmd.requires_privilege() && self.is_privileged(msg).await;
            let ctx = CommandContext {
                state: &self.state,
                privileged,
                default_shush: self.cfg.default_shush,
                now,
            };
            let outcome = commands::execute(&cmd, msg, &*self.platform, ctx).await;
            if let Some(text) = outcome.user_message() {
                self.platform.reply_to(msg.id, &text).await?;
            }
            return Ok(Triage::Command(outcome));
        }

        if self.is_quick_mute(msg) {
            self.state.mutes.mute(channel, self.cfg.quick_mute, now).await;
            let text = format!(
                "🤐 Okay, going quiet for {}.",
                format_seconds(self.cfg.quick_mute.as_secs())
            );
            self.platform.reply_to(msg.id, &text).await?;
            return Ok(Triage::QuickMuted);
        }

        if self.state.mutes.is_muted(channel, now).await {
            return Ok(Triage::Muted);
        }

        self.state
            .memory
            .append(
                channel,
                Utterance::user(msg.author.clone(), msg.text.clone(), msg.timestamp),
            )
            .await;

        if let Some(intent) = classify(&msg.text) {
            let privileged = self.is_privileged(msg).await;
            if let Some(outcome) = self
                .dispatcher
                .dispatch(msg, &intent, privileged, &*self.platform)
                .await
            {
                self.platform
                    .reply_to(msg.id, &outcome.user_message())
                    .await?;
                return Ok(Triage::Moderated(outcome));
            }
        }

        let addressed = self.resolver.is_addressed(msg, &*self.platform).await;
        debug!(channel = channel.0, addressed, "addressing resolved");
        if !addressed {
            return Ok(Triage::NotAddressed);
        }

        let mode = self.state.personas.get_mode(msg.guild).await;
        if !self
            .state
            .rate
            .try_admit(msg.guild, self.cfg.rate_params(mode))
            .await
        {
            return Ok(Triage::RateLimited);
        }
        *admitted = true;

        let req = self.build_request(msg).await;
        let Some(reply) = self.generate_with_retry(&req).await else {
            self.send_fallback(msg).await;
            return Ok(Triage::Fallback);
        };

        self.platform.send_message(channel, &reply).await?;
        self.state
            .memory
            .append(channel, Utterance::assistant(reply, Utc::now()))
            .await;
        Ok(Triage::Replied)
    }

    /// Bot mentioned together with a stop phrase.
    fn is_quick_mute(&self, msg: &InboundMessage) -> bool {
        if !msg.mentions_user(self.bot.id) {
            return false;
        }
        let lower = msg.text.to_lowercase();
        self.cfg
            .stop_phrases
            .iter()
            .any(|p| lower.contains(p.as_str()))
    }

    /// Owners always; otherwise whatever the platform says, with failures counting as "no".
    async fn is_privileged(&self, msg: &InboundMessage) -> bool {
        if self.cfg.is_owner(msg.author.id) {
            return true;
        }
        let query = self.platform.is_administrator(msg.guild, msg.author.id);
        match tokio::time::timeout(self.cfg.action_timeout, query).await {
            Ok(Ok(admin)) => admin,
            Ok(Err(e)) => {
                debug!(user = msg.author.id.0, "administrator check failed: {e}");
                false
            }
            Err(_) => {
                debug!(user = msg.author.id.0, "administrator check timed out");
                false
            }
        }
    }

    async fn build_request(&self, msg: &InboundMessage) -> GenerationRequest {
        let mut history = self.state.memory.snapshot(msg.channel()).await;
        // The current message was just recorded; it goes in `user_text` instead.
        if history
            .last()
            .is_some_and(|u| u.is_from(msg.author.id) && u.text == msg.text)
        {
            history.pop();
        }

        let mode = self.state.personas.get_mode(msg.guild).await;
        let others: Vec<UserRef> = msg
            .mentions
            .iter()
            .filter(|u| u.id != self.bot.id && u.id != msg.author.id)
            .cloned()
            .collect();

        let mut system = format!(
            "You are {}, a member of the {} chat. You are talking with {}.\n\n{}",
            self.bot.name,
            msg.guild_name.as_deref().unwrap_or("group"),
            msg.author.display_name,
            mode.instructions()
        );
        if let Some(directive) = mode.mention_directive(&others) {
            system.push_str("\n\n");
            system.push_str(&directive);
        }

        GenerationRequest {
            system,
            history,
            user_text: msg.text.clone(),
        }
    }

    async fn generate_with_retry(&self, req: &GenerationRequest) -> Option<String> {
        let policy = &self.cfg.retry;
        for attempt in 1..=policy.attempts {
            let call = self.generator.generate(req);
            let result = match tokio::time::timeout(policy.attempt_timeout, call).await {
                Ok(r) => r,
                Err(_) => Err(GenerationError::Timeout(policy.attempt_timeout)),
            };

            match result.map(|text| strip_mentions(&text)) {
                Ok(text) if !text.is_empty() => return Some(text),
                Ok(_) => warn!(attempt, "generation returned an empty reply"),
                Err(e) => warn!(attempt, "generation attempt failed: {e}"),
            }

            if attempt < policy.attempts {
                tokio::time::sleep(policy.backoff_after(attempt)).await;
            }
        }
        None
    }

    async fn send_fallback(&self, msg: &InboundMessage) {
        let text = self.cfg.fallback_message.clone();
        self.state
            .memory
            .append(msg.channel(), Utterance::assistant(text.clone(), Utc::now()))
            .await;
        if let Err(e) = self.platform.send_message(msg.channel(), &text).await {
            warn!(channel = msg.channel().0, "fallback send failed: {e}");
        }
    }
}

/// Generated text must never ping anyone.
fn strip_mentions(text: &str) -> String {
    text.replace('@', "").trim().to_string()
}
