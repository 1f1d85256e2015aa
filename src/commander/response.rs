//! Per-invocation reply plumbing.
//!
//! Every recognized command occurrence gets a fresh [`Response`] backed by
//! its own bounded reply channel, and a forwarder task that drains that
//! channel into the owning connection. Dropping the `Response` (when the
//! hook returns, or unwinds) closes the channel and stops the forwarder.

use std::sync::Arc;

use corvid_proto::{command, ctcp, Message};
use tokio::sync::mpsc;
use tracing::warn;

use crate::network::Connection;

/// The reply side of one command invocation.
///
/// Replies are dropped until a target is selected with
/// [`set_public`](Response::set_public) or
/// [`set_private`](Response::set_private). Public replies travel as
/// PRIVMSG to the originating venue; private replies as NOTICE to the
/// sender. Invocations born from notices have no targets at all and stay
/// mute.
pub struct Response {
    out: mpsc::Sender<Message>,
    public: Option<String>,
    private: Option<String>,
    target: Option<String>,
    kind: &'static str,
}

impl Response {
    pub(crate) fn new(
        out: mpsc::Sender<Message>,
        public: Option<String>,
        private: Option<String>,
    ) -> Response {
        Response {
            out,
            public,
            private,
            target: None,
            kind: command::PRIVMSG,
        }
    }

    /// Direct further replies to the public target.
    pub fn set_public(&mut self) {
        self.target = self.public.clone();
        self.kind = command::PRIVMSG;
    }

    /// Direct further replies to the sender privately.
    pub fn set_private(&mut self) {
        self.target = self.private.clone();
        self.kind = command::NOTICE;
    }

    /// Enqueue one reply line. Silently dropped while no target is set.
    pub async fn write(&self, text: impl Into<String>) {
        let Some(target) = self.target.clone() else {
            return;
        };
        let _ = self
            .out
            .send(Message::new(None, self.kind, [target, text.into()]))
            .await;
    }
}

/// Drain one invocation's replies into the connection, re-wrapping bodies
/// in control-string form when the trigger was CTCP.
pub(crate) fn spawn_forwarder(
    conn: Arc<Connection>,
    mut replies: mpsc::Receiver<Message>,
    ctcp_wrapped: bool,
) {
    tokio::spawn(async move {
        while let Some(mut msg) = replies.recv().await {
            if ctcp_wrapped
                && (msg.command == command::PRIVMSG || msg.command == command::NOTICE)
                && msg.args.len() > 1
            {
                let wrapped = ctcp::encode(&msg.args[1]);
                msg.args[1] = wrapped;
            }
            if let Err(e) = conn.write_message(msg).await {
                warn!(server = %conn.name(), error = %e, "lingering command reply dropped");
            }
        }
    });
}
