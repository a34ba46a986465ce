//! Core triage logic for the gatekeeper chat bot.
//!
//! This crate is framework-agnostic. The chat platform and the reply generator
//! live behind ports (traits) implemented in adapter crates.

pub mod addressing;
pub mod commands;
pub mod config;
pub mod domain;
pub mod duration;
pub mod errors;
pub mod logging;
pub mod memory;
pub mod moderation;
pub mod mute;
pub mod persona;
pub mod ports;
pub mod rate_limit;
pub mod state;
pub mod triage;

pub use errors::{Error, Result};
pub use triage::{BotIdentity, Gatekeeper, Triage};
