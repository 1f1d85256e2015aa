//! Error types for the protocol library.
//!
//! Only transport-level failures are errors here. A line that does not parse
//! as a message is not an error: [`Message::parse`](crate::Message::parse)
//! returns `None` and callers skip the line.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Transport-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A received line was not valid UTF-8.
    #[error("decode error: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// A line exceeded the transport's buffering limit.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    LineTooLong {
        /// Actual line length.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },
}
