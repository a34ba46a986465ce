use std::time::Duration;

/// Failure reported by a chat-platform capability.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("not found")]
    NotFound,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("rejected by platform: {0}")]
    Rejected(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure reported by the reply-generation service.
///
/// The orchestrator treats every variant the same way (retry, then fallback).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed generation response: {0}")]
    Malformed(String),

    #[error("generation request failed: {0}")]
    Network(String),
}

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the triage core
/// can handle failures consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;
