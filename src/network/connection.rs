//! Connection - the lifecycle state machine for one remote host.
//!
//! Each Connection runs three Tokio tasks for its whole lifetime:
//!
//! ```text
//!   ┌────────────┐  bounded queue   ┌─────────────────────────────┐
//!   │ reader task├─────────────────►│        manager task         │
//!   └────────────┘                  │  (handshake, state machine, │
//!                                   │   sole writer of the stream)│
//!   ┌──────────────┐  outgoing /    └─────────────────────────────┘
//!   │keepalive task├──── fatal ────────────────►│
//!   └──────────────┘                            ▼
//!                                        events fired to Bus
//! ```
//!
//! The reader decodes lines and pushes messages in strict receipt order;
//! the bounded queue stalls it when the manager falls behind, never
//! dropping messages. The manager interprets protocol commands, owns the
//! write half, and is the only mutator of the bound identity and the
//! channel set. The keepalive task probes on an interval and signals a
//! fatal teardown when the probe reply does not arrive in time.
//!
//! All three terminate together; teardown fires exactly one
//! `Disconnected` event and the Connection is never reused.

use std::sync::Arc;
use std::time::Duration;

use corvid_proto::{command, Identity, Message, MessageCodec};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, trace, warn};

use crate::bot::{Core, Keepalive};
use crate::error::BotError;
use crate::events::Event;

use super::channel::Channel;

/// Reader-to-manager queue depth; a slow manager stalls the reader here.
const INBOUND_BUFFER: usize = 32;
/// Outgoing write queue depth.
const OUTGOING_BUFFER: usize = 32;
/// How long teardown keeps absorbing replies from still-running handlers.
const TEARDOWN_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle states of a connection.
///
/// `Closed` is terminal; reconnection constructs a new Connection. The
/// reconnect wait itself lives in the driver, outside this machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Stream establishment in progress.
    Connecting,
    /// Registration sent, waiting for the welcome reply.
    Handshaking,
    /// Registered; events flow.
    Active,
    /// Teardown in progress.
    Disconnecting,
    /// Terminal.
    Closed,
}

/// Why the manager left its loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Teardown {
    ReadClosed,
    WriteFailed,
    PingTimeout,
}

impl Teardown {
    fn quit_text(self) -> &'static str {
        match self {
            Teardown::ReadClosed => "read closed",
            Teardown::WriteFailed => "write failed",
            Teardown::PingTimeout => "ping time exceeded",
        }
    }
}

/// A live connection to one remote host.
///
/// Owned by the bot's connection registry; handed to event handlers as an
/// `Arc`. The bound identity and channel set are mutated only by the
/// manager task and may be read from any task.
pub struct Connection {
    name: String,
    identity: RwLock<Identity>,
    channels: DashMap<String, Channel>,
    state: RwLock<LifecycleState>,
    outgoing: mpsc::Sender<Message>,
}

impl Connection {
    /// Build a connection over an established stream and start its tasks.
    pub(crate) fn spawn<S>(
        core: Arc<Core>,
        name: String,
        pass: Option<String>,
        stream: S,
    ) -> Arc<Connection>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_BUFFER);

        let conn = Arc::new(Connection {
            name,
            identity: RwLock::new(core.identity.clone()),
            channels: DashMap::new(),
            state: RwLock::new(LifecycleState::Connecting),
            outgoing: outgoing_tx,
        });
        core.insert_connection(&conn);

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        // Single-slot liveness signal between manager and keepalive.
        let (pong_tx, pong_rx) = mpsc::channel(1);
        let (fatal_tx, fatal_rx) = mpsc::channel(1);
        let (closed_tx, closed_rx) = watch::channel(false);

        let reader = tokio::spawn(read_loop(
            FramedRead::new(read_half, MessageCodec::new()),
            inbound_tx,
            Arc::clone(&conn),
        ));
        tokio::spawn(keepalive_loop(
            Arc::clone(&conn),
            core.keepalive,
            fatal_tx,
            pong_rx,
            closed_rx,
        ));
        tokio::spawn(manage(
            core,
            Arc::clone(&conn),
            pass,
            FramedWrite::new(write_half, MessageCodec::new()),
            ManagerChannels {
                inbound_rx,
                outgoing_rx,
                pong_tx,
                fatal_rx,
                closed_tx,
            },
            reader,
        ));

        conn
    }

    /// The host identifier this connection was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the currently bound identity.
    pub fn identity(&self) -> Identity {
        self.identity.read().clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.write() = state;
    }

    /// Names of channels with a confirmed join.
    pub fn channels(&self) -> Vec<String> {
        self.channels.iter().map(|e| e.key().clone()).collect()
    }

    /// Look up one joined channel.
    pub fn channel(&self, name: &str) -> Option<Channel> {
        self.channels.get(name).map(|e| e.value().clone())
    }

    /// Queue a message for writing.
    ///
    /// Fails once the connection is torn down.
    pub async fn write_message(&self, msg: Message) -> Result<(), BotError> {
        self.outgoing
            .send(msg)
            .await
            .map_err(|_| BotError::ConnectionClosed)
    }

    /// Queue a preformatted line for writing.
    pub async fn write_line(&self, line: &str) -> Result<(), BotError> {
        let msg =
            Message::parse(line).ok_or_else(|| BotError::InvalidLine(line.to_string()))?;
        self.write_message(msg).await
    }

    /// Whether a message's acting nick is the bot's own bound nick.
    fn is_me(&self, nick: Option<&str>) -> bool {
        match nick {
            Some(nick) => self.identity.read().nick() == Some(nick),
            None => false,
        }
    }

    /// Classify a comma-separated target list into (channel, direct).
    fn classify_targets(&self, targets: &str) -> (bool, bool) {
        let identity = self.identity.read();
        let nick = identity.nick().unwrap_or("");

        let mut channel = false;
        let mut direct = false;
        for target in targets.split(',') {
            if target.starts_with('#') {
                channel = true;
            }
            if !nick.is_empty() && target == nick {
                direct = true;
            }
        }
        (channel, direct)
    }
}

struct ManagerChannels {
    inbound_rx: mpsc::Receiver<Message>,
    outgoing_rx: mpsc::Receiver<Message>,
    pong_tx: mpsc::Sender<()>,
    fatal_rx: mpsc::Receiver<()>,
    closed_tx: watch::Sender<bool>,
}

/// Reader task: framed decode, strict receipt order into the bounded
/// queue. Ends on stream close, read error, or a remote ERROR line.
async fn read_loop<R>(
    mut framed: FramedRead<R, MessageCodec>,
    inbound_tx: mpsc::Sender<Message>,
    conn: Arc<Connection>,
) where
    R: AsyncRead + Unpin + Send,
{
    while let Some(result) = framed.next().await {
        match result {
            Ok(msg) => {
                if msg.command == command::ERROR {
                    warn!(server = %conn.name, args = ?msg.args, "remote error line");
                    return;
                }
                trace!(server = %conn.name, command = %msg.command, "received");
                if inbound_tx.send(msg).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(server = %conn.name, error = %e, "read error");
                return;
            }
        }
    }
    debug!(server = %conn.name, "stream closed");
}

/// Keepalive task: probe on an interval, wait for the liveness signal,
/// escalate to a fatal teardown when it does not arrive in time.
async fn keepalive_loop(
    conn: Arc<Connection>,
    keepalive: Keepalive,
    fatal_tx: mpsc::Sender<()>,
    mut pong_rx: mpsc::Receiver<()>,
    mut closed_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = sleep(keepalive.ping) => {}
            _ = closed_rx.changed() => return,
        }

        // Stale signals from unsolicited pongs do not satisfy this probe.
        while pong_rx.try_recv().is_ok() {}

        let nick = conn.identity.read().nick().unwrap_or("corvid").to_string();
        if conn.outgoing.send(Message::ping(nick)).await.is_err() {
            return;
        }

        match timeout(keepalive.timeout, pong_rx.recv()).await {
            Ok(Some(())) => {}
            Ok(None) => return,
            Err(_) => {
                warn!(server = %conn.name, "ping timeout");
                let _ = fatal_tx.try_send(());
                return;
            }
        }
    }
}

/// Manager task: registration, the select loop, and teardown.
async fn manage<W>(
    core: Arc<Core>,
    conn: Arc<Connection>,
    pass: Option<String>,
    mut writer: FramedWrite<W, MessageCodec>,
    channels: ManagerChannels,
    reader: JoinHandle<()>,
) where
    W: AsyncWrite + Unpin + Send,
{
    let ManagerChannels {
        mut inbound_rx,
        mut outgoing_rx,
        pong_tx,
        mut fatal_rx,
        closed_tx,
    } = channels;

    conn.set_state(LifecycleState::Handshaking);

    let (nick, user) = {
        let identity = conn.identity.read();
        (
            identity.nick().unwrap_or_default().to_string(),
            identity.user.clone().unwrap_or_default(),
        )
    };

    let mut registration = Vec::new();
    if let Some(pass) = &pass {
        registration.push(Message::new(None, command::PASS, [pass.as_str()]));
    }
    registration.push(Message::nick(&nick));
    registration.push(
        Message::new(
            None,
            command::USER,
            [user.as_str(), ".", ".", core.realname.as_str()],
        )
        .with_force_long(),
    );

    let mut failed = None;
    for msg in registration {
        if let Err(e) = writer.send(msg).await {
            warn!(server = %conn.name, error = %e, "handshake write error");
            failed = Some(Teardown::WriteFailed);
            break;
        }
    }

    let mut keepalive_alive = true;
    let reason = match failed {
        Some(reason) => reason,
        None => loop {
            tokio::select! {
                inbound = inbound_rx.recv() => match inbound {
                    Some(msg) => {
                        if handle_message(&core, &conn, &mut writer, &pong_tx, msg).await.is_err() {
                            break Teardown::WriteFailed;
                        }
                    }
                    None => break Teardown::ReadClosed,
                },
                outgoing = outgoing_rx.recv() => {
                    // The connection handle keeps this sender open, so the
                    // queue never yields None here.
                    if let Some(msg) = outgoing {
                        trace!(server = %conn.name, command = %msg.command, "sending");
                        if let Err(e) = writer.send(msg).await {
                            warn!(server = %conn.name, error = %e, "write error");
                            break Teardown::WriteFailed;
                        }
                    }
                },
                fatal = fatal_rx.recv(), if keepalive_alive => match fatal {
                    Some(()) => break Teardown::PingTimeout,
                    None => keepalive_alive = false,
                },
            }
        },
    };

    conn.set_state(LifecycleState::Disconnecting);
    info!(server = %conn.name, reason = ?reason, "disconnecting");

    let _ = writer.send(Message::quit(reason.quit_text())).await;
    let _ = closed_tx.send(true);
    reader.abort();

    // Absorb replies still in flight from handler tasks, then drop the
    // queue; later arrivals fail at the sender and are logged there as
    // lingering commands.
    let _ = timeout(TEARDOWN_GRACE, async {
        while outgoing_rx.recv().await.is_some() {}
    })
    .await;
    drop(outgoing_rx);

    core.remove_connection(&conn.name);
    conn.set_state(LifecycleState::Closed);
    core.bus.fire(Event::Disconnected, &conn, None);
}

/// Interpret one inbound message. Errors are write failures on the
/// stream; everything else is handled in place.
async fn handle_message<W>(
    core: &Arc<Core>,
    conn: &Arc<Connection>,
    writer: &mut FramedWrite<W, MessageCodec>,
    pong_tx: &mpsc::Sender<()>,
    msg: Message,
) -> corvid_proto::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match msg.command.as_str() {
        command::RPL_WELCOME => {
            if let Some(nick) = msg.args.first() {
                conn.identity.write().nick = Some(nick.clone());
            }
            conn.set_state(LifecycleState::Active);
            info!(server = %conn.name, nick = %conn.identity.read().nick().unwrap_or(""), "registered");
            core.bus.fire(Event::Connected, conn, Some(msg));
        }
        command::ERR_NICKNAMEINUSE => {
            if conn.state() == LifecycleState::Handshaking {
                // The colliding nick is echoed when the reply carries more
                // than the reason text.
                let mut nick = if msg.args.len() > 1 {
                    msg.args[0].clone()
                } else {
                    conn.identity.read().nick().unwrap_or_default().to_string()
                };
                nick.push('_');
                debug!(server = %conn.name, nick = %nick, "nick collision, retrying");
                writer.send(Message::nick(nick)).await?;
            }
        }
        command::JOIN => {
            let Some(channel) = msg.args.first().cloned() else {
                return Ok(());
            };
            if conn.is_me(msg.identity().nick()) {
                conn.channels.insert(channel.clone(), Channel::new(&channel));
                core.bus.fire(Event::Joined { channel }, conn, Some(msg));
            }
        }
        command::PART => {
            let Some(channel) = msg.args.first().cloned() else {
                return Ok(());
            };
            if conn.is_me(msg.identity().nick()) {
                conn.channels.remove(&channel);
                core.bus.fire(Event::Parted { channel }, conn, Some(msg));
            }
        }
        command::PING => {
            writer.send(Message::pong(msg.args.clone())).await?;
        }
        command::PONG => {
            let _ = pong_tx.try_send(());
        }
        command::PRIVMSG => {
            if msg.args.len() < 2 {
                return Ok(());
            }
            let (channel, direct) = conn.classify_targets(&msg.args[0]);
            if channel {
                core.bus.fire(Event::ChannelMessage, conn, Some(msg.clone()));
            }
            if direct {
                core.bus.fire(Event::DirectMessage, conn, Some(msg));
            }
        }
        command::NOTICE => {
            if msg.args.len() < 2 {
                return Ok(());
            }
            let (channel, direct) = conn.classify_targets(&msg.args[0]);
            // Channel notices are dropped outright, even on lines that
            // also target the bot directly.
            if !channel && direct {
                core.bus.fire(Event::Notice, conn, Some(msg));
            }
        }
        _ => {}
    }
    Ok(())
}
