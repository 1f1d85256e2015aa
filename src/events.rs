//! The event bus.
//!
//! Protocol events are a closed set: handlers register against an
//! [`EventKind`] and receive the full [`Event`] (with its payload), the
//! originating connection, and the triggering message when there is one.
//!
//! Registration is append-only for the process lifetime. Firing spawns one
//! task per handler: delivery never blocks the connection's manager loop,
//! handler panics are contained at the task boundary, and no ordering is
//! guaranteed across handlers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use corvid_proto::Message;
use parking_lot::RwLock;
use tracing::debug;

use crate::network::Connection;

/// A protocol event with its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Registration completed on a connection.
    Connected,
    /// A connection was torn down. Always fired exactly once, with no
    /// message attached.
    Disconnected,
    /// The bot's own join was confirmed.
    Joined {
        /// The channel joined.
        channel: String,
    },
    /// The bot's own part was confirmed.
    Parted {
        /// The channel left.
        channel: String,
    },
    /// An addressed message with at least one channel target.
    ChannelMessage,
    /// An addressed message targeting the bot's nick.
    DirectMessage,
    /// A notice targeting the bot's nick. Channel notices never fire.
    Notice,
}

impl Event {
    /// The registration key for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connected => EventKind::Connected,
            Event::Disconnected => EventKind::Disconnected,
            Event::Joined { .. } => EventKind::Joined,
            Event::Parted { .. } => EventKind::Parted,
            Event::ChannelMessage => EventKind::ChannelMessage,
            Event::DirectMessage => EventKind::DirectMessage,
            Event::Notice => EventKind::Notice,
        }
    }
}

/// Discriminant of [`Event`], used as the registration key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`Event::Connected`].
    Connected,
    /// See [`Event::Disconnected`].
    Disconnected,
    /// See [`Event::Joined`].
    Joined,
    /// See [`Event::Parted`].
    Parted,
    /// See [`Event::ChannelMessage`].
    ChannelMessage,
    /// See [`Event::DirectMessage`].
    DirectMessage,
    /// See [`Event::Notice`].
    Notice,
}

/// A registered event handler.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one event occurrence.
    async fn handle(&self, event: Event, conn: Arc<Connection>, msg: Option<Message>);
}

/// Adapter implementing [`EventHandler`] for plain async closures.
struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event, Arc<Connection>, Option<Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, event: Event, conn: Arc<Connection>, msg: Option<Message>) {
        (self.0)(event, conn, msg).await;
    }
}

/// The process-wide handler table.
#[derive(Default)]
pub struct Bus {
    handlers: RwLock<HashMap<EventKind, Vec<Arc<dyn EventHandler>>>>,
}

impl Bus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for an event kind. Handlers cannot be removed.
    pub fn register(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        self.handlers.write().entry(kind).or_default().push(handler);
    }

    /// Append a closure handler for an event kind.
    pub fn register_fn<F, Fut>(&self, kind: EventKind, f: F)
    where
        F: Fn(Event, Arc<Connection>, Option<Message>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(kind, Arc::new(FnHandler(f)));
    }

    /// Fire an event to every handler registered for its kind.
    ///
    /// Each handler runs as its own task; this returns without waiting for
    /// any of them.
    pub fn fire(&self, event: Event, conn: &Arc<Connection>, msg: Option<Message>) {
        let handlers = match self.handlers.read().get(&event.kind()) {
            Some(list) => list.clone(),
            None => return,
        };

        debug!(event = ?event.kind(), server = %conn.name(), handlers = handlers.len(), "firing event");

        for handler in handlers {
            let event = event.clone();
            let conn = Arc::clone(conn);
            let msg = msg.clone();
            tokio::spawn(async move {
                handler.handle(event, conn, msg).await;
            });
        }
    }
}
