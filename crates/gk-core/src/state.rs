use crate::{
    memory::ConversationMemory,
    mute::MuteClock,
    persona::{PersonaMode, PersonaStore},
    rate_limit::RateLimiter,
};

/// Process-wide triage state: one concurrency-safe map per entity kind.
#[derive(Debug)]
pub struct ChatState {
    pub memory: ConversationMemory,
    pub mutes: MuteClock,
    pub rate: RateLimiter,
    pub personas: PersonaStore,
}

impl ChatState {
    pub fn new(memory_capacity: Option<usize>, default_persona: PersonaMode) -> Self {
        Self {
            memory: ConversationMemory::new(memory_capacity),
            mutes: MuteClock::new(),
            rate: RateLimiter::new(),
            personas: PersonaStore::new(default_persona),
        }
    }
}
