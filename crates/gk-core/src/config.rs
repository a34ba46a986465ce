use std::{collections::HashSet, env, fs, io, path::Path, time::Duration};

use crate::{
    domain::{ChannelId, UserId},
    errors::Error,
    persona::PersonaMode,
    rate_limit::RateParams,
    Result,
};

pub const DEFAULT_GENERATION_URL: &str = "https://router.huggingface.co/v1/chat/completions";
pub const DEFAULT_GENERATION_MODEL: &str = "meta-llama/Llama-3.2-3B-Instruct";
pub const DEFAULT_FALLBACK_MESSAGE: &str = "⚠️ I'm having trouble responding right now.";

/// Retry schedule for reply generation: per-attempt timeout, capped exponential backoff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
            attempt_timeout: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Typed configuration, read from the environment (plus an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Platform
    pub telegram_bot_token: String,
    /// Overrides the platform display name in the system prompt.
    pub bot_name: Option<String>,
    pub owner_ids: HashSet<UserId>,
    pub always_on_channels: HashSet<ChannelId>,

    // Generation
    pub generation_api_key: String,
    pub generation_url: String,
    pub generation_model: String,
    pub generation_max_tokens: u32,
    pub generation_temperature: f32,
    pub retry: RetryPolicy,

    // State
    /// `None` means unbounded.
    pub memory_capacity: Option<usize>,
    pub default_persona: PersonaMode,

    // Rate limiting
    pub rate_window: Duration,
    pub rate_limit_funny: u32,
    pub rate_limit_serious: u32,

    // Mutes
    pub quick_mute: Duration,
    pub default_shush: Duration,
    pub stop_phrases: Vec<String>,

    // Platform actions
    pub action_timeout: Duration,
    pub purge_limit: u32,
    pub fallback_message: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"))?;
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `load` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(non_empty);
        let num = |key: &str| -> Result<Option<u64>> {
            match get(key) {
                None => Ok(None),
                Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| {
                    Error::Config(format!("{key} must be a non-negative integer, got {raw:?}"))
                }),
            }
        };
        let num_u32 = |key: &str| -> Result<Option<u32>> {
            num(key)?
                .map(|n| {
                    u32::try_from(n).map_err(|_| {
                        Error::Config(format!("{key} must be at most {}, got {n}", u32::MAX))
                    })
                })
                .transpose()
        };

        // Required
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        let generation_api_key = get("GENERATION_API_KEY")
            .or_else(|| get("OPENROUTER_API_KEY"))
            .ok_or_else(|| {
                Error::Config("GENERATION_API_KEY environment variable is required".to_string())
            })?;

        // Generation
        let generation_url = get("GENERATION_URL").unwrap_or(DEFAULT_GENERATION_URL.to_string());
        let generation_model =
            get("GENERATION_MODEL").unwrap_or(DEFAULT_GENERATION_MODEL.to_string());
        let generation_max_tokens = num_u32("GENERATION_MAX_TOKENS")?.unwrap_or(220);
        let generation_temperature = match get("GENERATION_TEMPERATURE") {
            None => 0.6,
            Some(raw) => raw.trim().parse::<f32>().map_err(|_| {
                Error::Config(format!("GENERATION_TEMPERATURE must be a number, got {raw:?}"))
            })?,
        };

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            attempts: num_u32("GENERATION_ATTEMPTS")?.unwrap_or(defaults.attempts),
            initial_backoff: num("GENERATION_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_backoff),
            max_backoff: num("GENERATION_MAX_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_backoff),
            attempt_timeout: num("GENERATION_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.attempt_timeout),
        };
        if retry.attempts == 0 {
            return Err(Error::Config(
                "GENERATION_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        // Identity and privileges
        let bot_name = get("BOT_NAME");
        let owner_ids = parse_csv_i64("OWNER_IDS", get("OWNER_IDS"))?
            .into_iter()
            .map(UserId)
            .collect();
        let always_on_channels = parse_csv_i64("ALWAYS_ON_CHANNELS", get("ALWAYS_ON_CHANNELS"))?
            .into_iter()
            .map(ChannelId)
            .collect();

        // State
        let memory_capacity = match num("MEMORY_CAPACITY")?.unwrap_or(30) {
            0 => None,
            n => Some(usize::try_from(n).map_err(|_| {
                Error::Config(format!("MEMORY_CAPACITY is too large, got {n}"))
            })?),
        };
        let default_persona = match get("DEFAULT_PERSONA") {
            None => PersonaMode::Serious,
            Some(raw) => raw.parse::<PersonaMode>().map_err(|_| {
                Error::Config(format!(
                    "DEFAULT_PERSONA must be \"funny\" or \"serious\", got {raw:?}"
                ))
            })?,
        };

        // Rate limiting
        let rate_window = Duration::from_secs(num("RATE_WINDOW_SECONDS")?.unwrap_or(60));
        if rate_window.is_zero() {
            return Err(Error::Config(
                "RATE_WINDOW_SECONDS must be at least 1".to_string(),
            ));
        }
        let rate_limit_funny = num_u32("RATE_LIMIT_FUNNY")?.unwrap_or(6);
        let rate_limit_serious = num_u32("RATE_LIMIT_SERIOUS")?.unwrap_or(6);

        // Mutes
        let quick_mute = Duration::from_secs(num("QUICK_MUTE_SECONDS")?.unwrap_or(180));
        let default_shush = Duration::from_secs(num("DEFAULT_SHUSH_SECONDS")?.unwrap_or(600));
        let stop_phrases = parse_csv_lower(get("STOP_PHRASES").or_else(|| Some("stop".to_string())));

        // Platform actions
        let action_timeout = Duration::from_millis(num("ACTION_TIMEOUT_MS")?.unwrap_or(10_000));
        let purge_limit = num_u32("PURGE_LIMIT")?.unwrap_or(100).max(1);
        let fallback_message =
            get("FALLBACK_MESSAGE").unwrap_or(DEFAULT_FALLBACK_MESSAGE.to_string());

        Ok(Self {
            telegram_bot_token,
            bot_name,
            owner_ids,
            always_on_channels,
            generation_api_key,
            generation_url,
            generation_model,
            generation_max_tokens,
            generation_temperature,
            retry,
            memory_capacity,
            default_persona,
            rate_window,
            rate_limit_funny,
            rate_limit_serious,
            quick_mute,
            default_shush,
            stop_phrases,
            action_timeout,
            purge_limit,
            fallback_message,
        })
    }

    pub fn rate_params(&self, mode: PersonaMode) -> RateParams {
        let limit = match mode {
            PersonaMode::Funny => self.rate_limit_funny,
            PersonaMode::Serious => self.rate_limit_serious,
        };
        RateParams {
            limit,
            window: self.rate_window,
        }
    }

    pub fn is_owner(&self, user: UserId) -> bool {
        self.owner_ids.contains(&user)
    }
}

fn load_dotenv_if_present(path: &Path) -> Result<()> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
    Ok(())
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn parse_csv_i64(key: &str, v: Option<String>) -> Result<Vec<i64>> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("{key} contains a non-numeric id: {s:?}")))
        })
        .collect()
}

fn parse_csv_lower(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
