//! Network module.
//!
//! Contains the per-host Connection lifecycle machine and joined-channel
//! bookkeeping.

mod channel;
mod connection;

pub use channel::Channel;
pub use connection::{Connection, LifecycleState};
