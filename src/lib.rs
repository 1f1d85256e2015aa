//! Corvid - a long-running IRC bot core.
//!
//! The crate is organized bottom-up: the wire codec lives in
//! [`corvid_proto`]; [`network`] runs one lifecycle state machine per
//! remote host; [`events`] fans protocol events out to registered
//! handlers; [`commander`] routes recognized command text in addressed
//! messages to registered hooks with per-invocation reply plumbing; and
//! [`Bot`] owns the connection registry tying it all together.

pub mod bot;
pub mod commander;
pub mod config;
pub mod error;
pub mod events;
pub mod network;

pub use bot::{Backoff, Bot, BotBuilder};
pub use error::{BotError, Result};
