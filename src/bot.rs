//! The bot: identity template, event bus, and the connection registry.
//!
//! The registry is the single owner of live [`Connection`]s; entries are
//! inserted when a stream is attached and removed by the connection's own
//! teardown, both through [`Core`] methods. Everything else only reads
//! snapshots.

use std::sync::Arc;
use std::time::Duration;

use corvid_proto::{Identity, Message};
use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::info;

use crate::error::{BotError, Result};
use crate::events::{Bus, EventHandler, EventKind};
use crate::network::Connection;

/// Keepalive timing applied to every connection.
#[derive(Clone, Copy, Debug)]
pub struct Keepalive {
    /// Interval between liveness probes.
    pub ping: Duration,
    /// How long to wait for the probe reply.
    pub timeout: Duration,
}

/// Shared state behind a [`Bot`] handle.
pub(crate) struct Core {
    pub(crate) identity: Identity,
    pub(crate) realname: String,
    pub(crate) keepalive: Keepalive,
    pub(crate) bus: Bus,
    connections: DashMap<String, Arc<Connection>>,
}

impl Core {
    pub(crate) fn insert_connection(&self, conn: &Arc<Connection>) {
        self.connections
            .insert(conn.name().to_string(), Arc::clone(conn));
    }

    pub(crate) fn remove_connection(&self, name: &str) {
        self.connections.remove(name);
    }
}

/// A cheaply clonable handle to the bot.
#[derive(Clone)]
pub struct Bot {
    core: Arc<Core>,
}

impl Bot {
    /// Start building a bot with the given nick and username.
    pub fn builder(nick: impl Into<String>, user: impl Into<String>) -> BotBuilder {
        BotBuilder {
            nick: nick.into(),
            user: user.into(),
            realname: concat!("corvid-", env!("CARGO_PKG_VERSION")).to_string(),
            keepalive: Keepalive {
                ping: Duration::from_secs(60),
                timeout: Duration::from_secs(10),
            },
        }
    }

    /// The identity template new connections start from.
    pub fn identity(&self) -> Identity {
        self.core.identity.clone()
    }

    /// Register an event handler. Registration is append-only.
    pub fn on(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        self.core.bus.register(kind, handler);
    }

    /// Register an async closure as an event handler.
    pub fn on_fn<F, Fut>(&self, kind: EventKind, f: F)
    where
        F: Fn(
                crate::events::Event,
                Arc<Connection>,
                Option<Message>,
            ) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.core.bus.register_fn(kind, f);
    }

    /// Dial a remote host and attach a connection.
    pub async fn connect(&self, addr: &str) -> Result<Arc<Connection>> {
        self.connect_with_pass(addr, None).await
    }

    /// Dial a remote host, registering with a server password.
    pub async fn connect_with_pass(
        &self,
        addr: &str,
        pass: Option<&str>,
    ) -> Result<Arc<Connection>> {
        let stream = TcpStream::connect(addr).await.map_err(BotError::Connect)?;
        info!(server = %addr, "connected");
        Ok(self.attach(addr, pass, stream))
    }

    /// Attach an already-established duplex stream as a connection.
    ///
    /// This is how tests drive the lifecycle machine over in-memory
    /// streams; `connect` uses it with a fresh TCP stream.
    pub fn attach<S>(&self, name: &str, pass: Option<&str>, stream: S) -> Arc<Connection>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Connection::spawn(
            Arc::clone(&self.core),
            name.to_string(),
            pass.map(str::to_owned),
            stream,
        )
    }

    /// Snapshot of all live connections.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.core
            .connections
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect()
    }

    /// Look up a live connection by host identifier.
    pub fn connection(&self, name: &str) -> Option<Arc<Connection>> {
        self.core.connections.get(name).map(|e| Arc::clone(e.value()))
    }
}

/// Builder for [`Bot`].
pub struct BotBuilder {
    nick: String,
    user: String,
    realname: String,
    keepalive: Keepalive,
}

impl BotBuilder {
    /// Set the realname sent during registration.
    pub fn realname(mut self, realname: impl Into<String>) -> Self {
        self.realname = realname.into();
        self
    }

    /// Set the keepalive probe interval and reply timeout.
    pub fn keepalive(mut self, ping: Duration, timeout: Duration) -> Self {
        self.keepalive = Keepalive { ping, timeout };
        self
    }

    /// Build the bot.
    pub fn finish(self) -> Bot {
        Bot {
            core: Arc::new(Core {
                identity: Identity::new(self.nick, self.user),
                realname: self.realname,
                keepalive: self.keepalive,
                bus: Bus::new(),
                connections: DashMap::new(),
            }),
        }
    }
}

/// Reconnect delay schedule: exponential doubling capped at `max`.
///
/// One instance per remote host, reset on successful registration.
#[derive(Clone, Copy, Debug)]
pub struct Backoff {
    delay: Duration,
    max: Duration,
}

impl Backoff {
    /// Schedule starting at `initial`, capped at `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            delay: initial,
            max,
        }
    }

    /// The delay to wait now; doubles the next one up to the cap.
    pub fn next(&mut self) -> Duration {
        let delay = self.delay;
        self.delay = (delay * 2).min(self.max);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_to_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(60));
        let delays: Vec<u64> = (0..6).map(|_| backoff.next().as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 60, 60]);
    }

    #[test]
    fn test_backoff_fixed_when_initial_is_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(7), Duration::from_secs(7));
        assert_eq!(backoff.next(), Duration::from_secs(7));
        assert_eq!(backoff.next(), Duration::from_secs(7));
    }

    #[test]
    fn test_builder_defaults() {
        let bot = Bot::builder("n", "u").finish();
        assert_eq!(bot.identity().nick(), Some("n"));
        assert!(bot.connections().is_empty());
    }
}
