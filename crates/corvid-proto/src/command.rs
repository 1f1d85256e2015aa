//! Protocol command tokens and numeric replies.
//!
//! Commands travel on the wire as uppercase tokens; numerics as
//! three-digit strings. Only the subset a client-side bot acts on or
//! sends is named here.

/// Server password, sent before registration.
pub const PASS: &str = "PASS";
/// Nickname selection and changes.
pub const NICK: &str = "NICK";
/// User registration (username and realname).
pub const USER: &str = "USER";
/// Connection termination announcement.
pub const QUIT: &str = "QUIT";
/// Fatal error line from the remote; always followed by a close.
pub const ERROR: &str = "ERROR";

/// Liveness probe.
pub const PING: &str = "PING";
/// Liveness probe reply.
pub const PONG: &str = "PONG";

/// Channel join.
pub const JOIN: &str = "JOIN";
/// Channel part.
pub const PART: &str = "PART";
/// Channel or user mode change.
pub const MODE: &str = "MODE";
/// Channel topic query or change.
pub const TOPIC: &str = "TOPIC";

/// Addressed message to channels or users.
pub const PRIVMSG: &str = "PRIVMSG";
/// Addressed notice; must never trigger automatic replies.
pub const NOTICE: &str = "NOTICE";

/// Registration complete; first argument is the effective nick.
pub const RPL_WELCOME: &str = "001";
/// Requested nickname is taken; retry with another.
pub const ERR_NICKNAMEINUSE: &str = "433";
