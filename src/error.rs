//! Unified error handling for the bot core.

use thiserror::Error;

/// Errors surfaced by the bot's public API.
#[derive(Debug, Error)]
pub enum BotError {
    /// Configuration could not be loaded or was invalid.
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Dialing a remote host failed.
    #[error("connect error: {0}")]
    Connect(#[source] std::io::Error),

    /// The connection has been torn down; no further writes are possible.
    #[error("connection closed")]
    ConnectionClosed,

    /// A raw line handed to the writer was not a protocol message.
    #[error("not a protocol line: {0:?}")]
    InvalidLine(String),
}

/// Result type for bot operations.
pub type Result<T> = std::result::Result<T, BotError>;
