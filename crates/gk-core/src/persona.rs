use std::{collections::HashMap, fmt, str::FromStr};

use tokio::sync::Mutex;

use crate::domain::{GuildId, UserRef};

/// Behavioral profile for replies in a guild.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PersonaMode {
    Funny,
    Serious,
}

const FUNNY_INSTRUCTIONS: &str = "You are in funny mode. Talk like a relaxed teenager with a sense of humor, \
not like a meme bot. Keep humor light and natural, use an emoji now and then but never spam them, \
and casual short forms (lol, btw, u) are fine once in a while. \
Keep replies short: one or two sentences, well under 200 characters. \
Do not ping anyone.";

const SERIOUS_INSTRUCTIONS: &str = "You are in serious mode. Be friendly, professional and concise, \
with proper grammar and complete words. Do not use emojis, slang, short forms or humor, and do not roast anyone. \
Carry yourself like a calm moderator of this community and help thoroughly with technical questions. \
Put any code inside ``` fenced blocks.";

impl PersonaMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PersonaMode::Funny => "funny",
            PersonaMode::Serious => "serious",
        }
    }

    /// Instruction block inserted into the generation system prompt.
    pub fn instructions(self) -> &'static str {
        match self {
            PersonaMode::Funny => FUNNY_INSTRUCTIONS,
            PersonaMode::Serious => SERIOUS_INSTRUCTIONS,
        }
    }

    /// Extra directive when the speaker pulls other users into the conversation.
    ///
    /// Only the funny persona plays along; serious mode ignores mentions.
    pub fn mention_directive(self, others: &[UserRef]) -> Option<String> {
        if self != PersonaMode::Funny || others.is_empty() {
            return None;
        }
        let names = others
            .iter()
            .map(|u| u.display_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "The speaker is pointing at: {names}. Tease only them, playfully. \
Keep it friendly and non-hateful, never target protected traits, and never tease yourself."
        ))
    }
}

impl fmt::Display for PersonaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonaMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "funny" | "fun" => Ok(PersonaMode::Funny),
            "serious" => Ok(PersonaMode::Serious),
            other => Err(format!("unknown persona mode: {other}")),
        }
    }
}

/// Per-guild persona selection with a process-wide default.
#[derive(Debug)]
pub struct PersonaStore {
    default_mode: PersonaMode,
    modes: Mutex<HashMap<GuildId, PersonaMode>>,
}

impl PersonaStore {
    pub fn new(default_mode: PersonaMode) -> Self {
        Self {
            default_mode,
            modes: Mutex::new(HashMap::new()),
        }
    }

    pub async fn set_mode(&self, guild: GuildId, mode: PersonaMode) {
        self.modes.lock().await.insert(guild, mode);
    }

    pub async fn get_mode(&self, guild: GuildId) -> PersonaMode {
        self.modes
            .lock()
            .await
            .get(&guild)
            .copied()
            .unwrap_or(self.default_mode)
    }
}
