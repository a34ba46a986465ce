//! Slash-style chat commands: persona switch, shush/unshush, member count.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
    domain::InboundMessage,
    duration::{format_seconds, parse_seconds},
    persona::PersonaMode,
    ports::GuildDirectory,
    state::ChatState,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    SetMode(PersonaMode),
    /// Raw duration argument, if any.
    Shush(Option<String>),
    Unshush,
    Members,
    /// Bad `/mode` argument.
    UnknownMode(String),
    Unknown(String),
}

impl Command {
    pub fn requires_privilege(&self) -> bool {
        matches!(
            self,
            Command::SetMode(_) | Command::Shush(_) | Command::UnknownMode(_)
        )
    }
}

fn split_command(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }

    // Platforms may send `/cmd@botname arg1 ...`
    let mut parts = text.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    Some((cmd, rest))
}

/// `None` for ordinary text; any `/`-prefixed text is a command (possibly unknown).
pub fn parse_command(text: &str) -> Option<Command> {
    let (cmd, rest) = split_command(text)?;
    let arg = rest.split_whitespace().next().map(str::to_string);

    let parsed = match cmd.as_str() {
        "mode" => match rest.parse::<PersonaMode>() {
            Ok(mode) => Command::SetMode(mode),
            Err(_) => Command::UnknownMode(rest),
        },
        "fi" => Command::SetMode(PersonaMode::Funny),
        "si" => Command::SetMode(PersonaMode::Serious),
        "shush" => Command::Shush(arg),
        "rshush" | "unshush" => Command::Unshush,
        "members" => Command::Members,
        _ => Command::Unknown(cmd),
    };
    Some(parsed)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    ModeChanged(PersonaMode),
    Muted {
        resume_at: DateTime<Utc>,
        seconds: u64,
    },
    InvalidDuration,
    Unmuted,
    WasNotMuted,
    MemberCount(u64),
    MemberCountUnavailable,
    UnknownMode,
    Denied,
    Ignored,
}

impl CommandOutcome {
    /// Text to post back, or `None` when the command is silently ignored.
    pub fn user_message(&self) -> Option<String> {
        let text = match self {
            CommandOutcome::ModeChanged(PersonaMode::Serious) => {
                "Bot mode: serious. I'll keep things professional.".to_string()
            }
            CommandOutcome::ModeChanged(PersonaMode::Funny) => {
                "Bot mode: funny. Let's have some fun 😎".to_string()
            }
            CommandOutcome::Muted { resume_at, seconds } => format!(
                "🔇 Muted until {} ({}).",
                resume_at.format("%H:%M:%S UTC"),
                format_seconds(*seconds)
            ),
            CommandOutcome::InvalidDuration => {
                "⚠️ Invalid time format. Try something like 30m or 2h.".to_string()
            }
            CommandOutcome::Unmuted => "🔊 Mute lifted!".to_string(),
            CommandOutcome::WasNotMuted => "🤔 I wasn't muted.".to_string(),
            CommandOutcome::MemberCount(n) => format!("👥 We got {n} members!"),
            CommandOutcome::MemberCountUnavailable => {
                "⚠️ Couldn't fetch the member count right now.".to_string()
            }
            CommandOutcome::UnknownMode => "⚠️ Usage: /mode funny or /mode serious.".to_string(),
            CommandOutcome::Denied => "🚫 Only admins can do that.".to_string(),
            CommandOutcome::Ignored => return None,
        };
        Some(text)
    }
}

/// Inputs a command needs besides the message itself.
pub struct CommandContext<'a> {
    pub state: &'a ChatState,
    pub privileged: bool,
    pub default_shush: Duration,
    pub now: DateTime<Utc>,
}

pub async fn execute<D>(
    cmd: &Command,
    msg: &InboundMessage,
    directory: &D,
    ctx: CommandContext<'_>,
) -> CommandOutcome
where
    D: GuildDirectory + ?Sized,
{
    if cmd.requires_privilege() && !ctx.privileged {
        info!(user = msg.author.id.0, ?cmd, "privileged command denied");
        return CommandOutcome::Denied;
    }

    match cmd {
        Command::SetMode(mode) => {
            ctx.state.personas.set_mode(msg.guild, *mode).await;
            info!(guild = msg.guild.0, mode = %mode, "persona changed");
            CommandOutcome::ModeChanged(*mode)
        }
        Command::UnknownMode(_) => CommandOutcome::UnknownMode,
        Command::Shush(arg) => {
            let seconds = match arg {
                Some(raw) => match parse_seconds(raw) {
                    Some(s) => s,
                    None => return CommandOutcome::InvalidDuration,
                },
                None => ctx.default_shush.as_secs(),
            };
            let resume_at = ctx
                .state
                .mutes
                .mute(msg.channel(), Duration::from_secs(seconds), ctx.now)
                .await;
            info!(channel = msg.channel().0, seconds, "channel shushed");
            CommandOutcome::Muted { resume_at, seconds }
        }
        Command::Unshush => {
            if ctx.state.mutes.unmute(msg.channel()).await {
                info!(channel = msg.channel().0, "shush lifted");
                CommandOutcome::Unmuted
            } else {
                CommandOutcome::WasNotMuted
            }
        }
        Command::Members => match directory.member_count(msg.guild).await {
            Ok(n) => CommandOutcome::MemberCount(n),
            Err(e) => {
                warn!(guild = msg.guild.0, "member count failed: {e}");
                CommandOutcome::MemberCountUnavailable
            }
        },
        Command::Unknown(_) => CommandOutcome::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{ChannelId, GuildId, MessageId, MessageRef, UserId, UserRef},
        errors::{PlatformError, PlatformResult},
    };
    use async_trait::async_trait;

    struct Directory(PlatformResult<u64>);

    #[async_trait]
    impl GuildDirectory for Directory {
        async fn member_count(&self, _guild: GuildId) -> PlatformResult<u64> {
            self.0.clone()
        }

        async fn is_administrator(&self, _guild: GuildId, _user: UserId) -> PlatformResult<bool> {
            Ok(false)
        }
    }

    fn message(text: &str) -> InboundMessage {
        InboundMessage {
            id: MessageRef {
                channel: ChannelId(1),
                message_id: MessageId(1),
            },
            guild: GuildId(2),
            guild_name: None,
            author: UserRef::new(7, "ana"),
            text: text.to_string(),
            mentions: vec![],
            reply_to: None,
            timestamp: Utc::now(),
        }
    }

    async fn run(text: &str, state: &ChatState, privileged: bool, dir: &Directory) -> CommandOutcome {
        let msg = message(text);
        let cmd = parse_command(text).expect("command");
        execute(
            &cmd,
            &msg,
            dir,
            CommandContext {
                state,
                privileged,
                default_shush: Duration::from_secs(600),
                now: Utc::now(),
            },
        )
        .await
    }

    #[test]
    fn parses_commands_with_bot_suffix_and_args() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(
            parse_command("/mode@gk_bot Funny"),
            Some(Command::SetMode(PersonaMode::Funny))
        );
        assert_eq!(parse_command("/si"), Some(Command::SetMode(PersonaMode::Serious)));
        assert_eq!(
            parse_command("/shush 30m extra"),
            Some(Command::Shush(Some("30m".into())))
        );
        assert_eq!(parse_command("/shush"), Some(Command::Shush(None)));
        assert_eq!(parse_command("/RSHUSH"), Some(Command::Unshush));
        assert_eq!(parse_command("/start"), Some(Command::Unknown("start".into())));
    }

    #[tokio::test]
    async fn mode_change_requires_privilege() {
        let state = ChatState::new(Some(30), PersonaMode::Serious);
        let dir = Directory(Ok(3));

        assert_eq!(run("/fi", &state, false, &dir).await, CommandOutcome::Denied);
        assert_eq!(state.personas.get_mode(GuildId(2)).await, PersonaMode::Serious);

        assert_eq!(
            run("/fi", &state, true, &dir).await,
            CommandOutcome::ModeChanged(PersonaMode::Funny)
        );
        assert_eq!(state.personas.get_mode(GuildId(2)).await, PersonaMode::Funny);
    }

    #[tokio::test]
    async fn shush_uses_default_or_given_duration() {
        let state = ChatState::new(Some(30), PersonaMode::Serious);
        let dir = Directory(Ok(3));

        match run("/shush", &state, true, &dir).await {
            CommandOutcome::Muted { seconds, .. } => assert_eq!(seconds, 600),
            other => panic!("unexpected: {other:?}"),
        }
        match run("/shush 2h", &state, true, &dir).await {
            CommandOutcome::Muted { seconds, .. } => assert_eq!(seconds, 7200),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(state.mutes.is_muted(ChannelId(1), Utc::now()).await);

        assert_eq!(
            run("/shush soon", &state, true, &dir).await,
            CommandOutcome::InvalidDuration
        );
    }

    #[tokio::test]
    async fn unshush_is_open_to_everyone() {
        let state = ChatState::new(Some(30), PersonaMode::Serious);
        let dir = Directory(Ok(3));

        assert_eq!(run("/rshush", &state, false, &dir).await, CommandOutcome::WasNotMuted);
        run("/shush 5m", &state, true, &dir).await;
        assert_eq!(run("/rshush", &state, false, &dir).await, CommandOutcome::Unmuted);
        assert!(!state.mutes.is_muted(ChannelId(1), Utc::now()).await);
    }

    #[tokio::test]
    async fn member_count_reports_failures_softly() {
        let state = ChatState::new(Some(30), PersonaMode::Serious);

        let ok = run("/members", &state, false, &Directory(Ok(128))).await;
        assert_eq!(ok.user_message().as_deref(), Some("👥 We got 128 members!"));

        let failed = run(
            "/members",
            &state,
            false,
            &Directory(Err(PlatformError::Network("down".into()))),
        )
        .await;
        assert_eq!(failed, CommandOutcome::MemberCountUnavailable);
    }

    #[tokio::test]
    async fn unknown_commands_are_ignored() {
        let state = ChatState::new(Some(30), PersonaMode::Serious);
        let out = run("/start", &state, false, &Directory(Ok(1))).await;
        assert_eq!(out, CommandOutcome::Ignored);
        assert_eq!(out.user_message(), None);
    }
}
