use tokio::sync::mpsc;

use crate::error::{LavaError, Result};
use crate::protocol::{TrackEndReason, TrackException};
use crate::track::Track;

/// Typed event decoded from a node's socket.
///
/// Every variant carries the identifier of the node it came from.
#[derive(Debug, Clone)]
pub enum Event {
    /// The event socket (re)connected
    WebsocketOpen { node: String },

    TrackStart {
        node: String,
        guild_id: u64,
        track: Track,
    },

    TrackEnd {
        node: String,
        guild_id: u64,
        track: Track,
        reason: TrackEndReason,
    },

    TrackException {
        node: String,
        guild_id: u64,
        track: Track,
        exception: TrackException,
    },

    TrackStuck {
        node: String,
        guild_id: u64,
        track: Track,
        threshold_ms: u64,
    },

    /// The server's voice connection for a guild was closed
    WebsocketClosed {
        node: String,
        guild_id: u64,
        code: u16,
        reason: String,
        by_remote: bool,
    },
}

impl Event {
    /// Stable event name
    pub fn name(&self) -> &'static str {
        match self {
            Event::WebsocketOpen { .. } => "websocket_open",
            Event::TrackStart { .. } => "track_start",
            Event::TrackEnd { .. } => "track_end",
            Event::TrackException { .. } => "track_exception",
            Event::TrackStuck { .. } => "track_stuck",
            Event::WebsocketClosed { .. } => "websocket_closed",
        }
    }

    pub fn node(&self) -> &str {
        match self {
            Event::WebsocketOpen { node }
            | Event::TrackStart { node, .. }
            | Event::TrackEnd { node, .. }
            | Event::TrackException { node, .. }
            | Event::TrackStuck { node, .. }
            | Event::WebsocketClosed { node, .. } => node,
        }
    }

    pub fn guild_id(&self) -> Option<u64> {
        match self {
            Event::WebsocketOpen { .. } => None,
            Event::TrackStart { guild_id, .. }
            | Event::TrackEnd { guild_id, .. }
            | Event::TrackException { guild_id, .. }
            | Event::TrackStuck { guild_id, .. }
            | Event::WebsocketClosed { guild_id, .. } => Some(*guild_id),
        }
    }
}

/// Destination for decoded events. Called once per event.
pub trait EventSink: Send + Sync + 'static {
    fn dispatch(&self, event: Event);
}

impl EventSink for mpsc::UnboundedSender<Event> {
    fn dispatch(&self, event: Event) {
        if self.send(event).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}

/// Receiving half of the pool's default event channel
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventReceiver {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Event>) -> Self {
        Self { rx }
    }

    /// Receive the next event
    ///
    /// Returns `ConnectionClosed` once the pool and all its nodes are gone.
    pub async fn recv(&mut self) -> Result<Event> {
        self.rx.recv().await.ok_or(LavaError::ConnectionClosed)
    }

    /// Try to receive an event without blocking
    ///
    /// Returns `None` if no event is available.
    pub fn try_recv(&mut self) -> Result<Option<Event>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(LavaError::ConnectionClosed),
        }
    }
}
