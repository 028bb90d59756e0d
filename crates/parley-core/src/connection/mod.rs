//! Per-connection pumps.
//!
//! Each client link runs two tasks. The inbound pump ([`read_pump`]) decodes
//! frames into hub commands and unregisters the connection when the link
//! ends. The outbound pump ([`write_pump`]) drains the connection's queue
//! onto the link and keeps it alive with pings.
//!
//! Pumps work on transport-neutral [`Frame`]s so they can be driven by any
//! `Stream`/`Sink` pair; the API layer adapts WebSocket messages to frames.

mod inbound;
mod outbound;

pub use inbound::{ReadOutcome, read_pump};
pub use outbound::write_pump;

use chrono::{DateTime, Utc};
use parley_types::message::ChatMessage;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::hub::Member;

/// Transport-neutral unit exchanged by the pumps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// Receives messages accepted by the inbound pump for durable storage.
///
/// Called inline by the pump, so implementations must hand work off rather
/// than wait on storage.
pub trait MessageArchive: Send + Sync {
    fn archive(&self, user_id: &str, message: &ChatMessage);
}

/// Archive that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardArchive;

impl MessageArchive for DiscardArchive {
    fn archive(&self, _user_id: &str, _message: &ChatMessage) {}
}

/// One client's identity and local state, owned by its inbound pump.
///
/// Holds a sender for its own outbound queue, so the queue stays open for
/// as long as the inbound pump runs even if the hub never registered it.
#[derive(Debug)]
pub struct Connection {
    pub id: String,
    /// Nonce distinguishing this connection from others reusing `id`.
    pub session: Uuid,
    pub room_id: String,
    pub username: String,
    pub is_typing: bool,
    pub joined_at: DateTime<Utc>,
    outbound: mpsc::Sender<ChatMessage>,
}

impl Connection {
    /// Create a connection and the receiving end of its outbound queue.
    pub fn new(
        id: impl Into<String>,
        room_id: impl Into<String>,
        username: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ChatMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let conn = Self {
            id: id.into(),
            session: Uuid::now_v7(),
            room_id: room_id.into(),
            username: username.into(),
            is_typing: false,
            joined_at: Utc::now(),
            outbound: tx,
        };
        (conn, rx)
    }

    /// Membership record for registering this connection with the hub.
    pub fn member(&self) -> Member {
        Member {
            id: self.id.clone(),
            session: self.session,
            room_id: self.room_id.clone(),
            username: self.username.clone(),
            is_typing: self.is_typing,
            joined_at: self.joined_at,
            last_active_at: self.joined_at,
            outbound: self.outbound.clone(),
        }
    }
}
