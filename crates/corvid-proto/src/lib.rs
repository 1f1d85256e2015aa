//! # corvid-proto
//!
//! A Rust library for parsing and serializing IRC protocol lines from the
//! client side, built for long-running bots.
//!
//! ## Features
//!
//! - Line parsing into prefix, command, and arguments
//! - Byte-faithful re-serialization (trailing-argument form applied exactly
//!   when required)
//! - Sender identity derivation from message prefixes
//! - CTCP low-level quoting and dequoting
//! - Optional Tokio codecs for framed async transports
//!
//! ## Quick Start
//!
//! ```rust
//! use corvid_proto::Message;
//!
//! let msg = Message::parse(":server.example.net NOTICE user :*** This is a test\n")
//!     .expect("valid line");
//! assert_eq!(msg.command, "NOTICE");
//! assert_eq!(msg.args, vec!["user", "*** This is a test"]);
//!
//! // Re-encoding reproduces the wire form.
//! assert_eq!(
//!     msg.to_string(),
//!     ":server.example.net NOTICE user :*** This is a test\n"
//! );
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod command;
pub mod ctcp;
pub mod error;
pub mod format;
pub mod identity;
pub mod message;

#[cfg(feature = "tokio")]
pub mod codec;
#[cfg(feature = "tokio")]
pub mod line;

pub use self::error::{ProtocolError, Result};
pub use self::identity::{Identity, IdentityRef};
pub use self::message::Message;

#[cfg(feature = "tokio")]
pub use self::codec::MessageCodec;
#[cfg(feature = "tokio")]
pub use self::line::{LineCodec, DEFAULT_MAX_LINE_LEN};
