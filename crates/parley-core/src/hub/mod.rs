//! Connection hub: the single owner of room and membership state.
//!
//! One worker task ([`Hub`]) consumes [`HubCommand`]s from one bounded
//! queue and fully processes each before the next. Every room mutation and
//! every fan-out passes through that queue, so delivery order within a room
//! equals the order commands were enqueued. Nothing else holds room state,
//! so no locks are needed.
//!
//! Callers interact through the cloneable [`HubHandle`]. Hub operations
//! never fail: commands for unknown rooms or members are dropped.

mod coordinator;

pub use coordinator::Hub;

use chrono::{DateTime, Utc};
use parley_types::message::ChatMessage;
use parley_types::room::{MemberSummary, RoomSummary};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

/// A connection's membership record, owned by the hub once registered.
#[derive(Debug)]
pub struct Member {
    /// Connection ID. Unique within a room.
    pub id: String,
    /// Per-connection nonce. Unregister and status updates must match it,
    /// so a rejected duplicate connection cannot act for the original.
    pub session: Uuid,
    pub room_id: String,
    pub username: String,
    pub is_typing: bool,
    pub joined_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    /// Hub's end of the member's outbound queue.
    pub outbound: mpsc::Sender<ChatMessage>,
}

/// Commands consumed by the hub worker.
#[derive(Debug)]
pub enum HubCommand {
    Register(Member),
    Unregister {
        room_id: String,
        id: String,
        session: Uuid,
    },
    Broadcast(ChatMessage),
    StatusUpdate {
        room_id: String,
        id: String,
        session: Uuid,
        is_typing: bool,
    },
    PrivateMessage(ChatMessage),
    Touch {
        room_id: String,
        id: String,
        session: Uuid,
    },
    CreateRoom {
        id: String,
        name: String,
        owner_id: String,
        reply: oneshot::Sender<bool>,
    },
    ListRooms {
        reply: oneshot::Sender<Vec<RoomSummary>>,
    },
    ListMembers {
        room_id: String,
        reply: oneshot::Sender<Vec<MemberSummary>>,
    },
}

/// Cloneable handle for sending commands to the hub.
///
/// Sends wait for queue space. If the hub worker has stopped, commands are
/// dropped and queries return empty results.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    async fn send(&self, command: HubCommand) {
        if self.tx.send(command).await.is_err() {
            debug!("hub stopped, command dropped");
        }
    }

    /// Add a member to its room. No effect if the room does not exist or
    /// the connection ID is already a member.
    pub async fn register(&self, member: Member) {
        self.send(HubCommand::Register(member)).await;
    }

    /// Remove a member, notifying the rest of the room.
    pub async fn unregister(&self, room_id: &str, id: &str, session: Uuid) {
        self.send(HubCommand::Unregister {
            room_id: room_id.to_string(),
            id: id.to_string(),
            session,
        })
        .await;
    }

    /// Deliver a message to every member of `message.room_id`.
    pub async fn broadcast(&self, message: ChatMessage) {
        self.send(HubCommand::Broadcast(message)).await;
    }

    /// Record a member's typing state and notify the other members.
    pub async fn update_status(&self, room_id: &str, id: &str, session: Uuid, is_typing: bool) {
        self.send(HubCommand::StatusUpdate {
            room_id: room_id.to_string(),
            id: id.to_string(),
            session,
            is_typing,
        })
        .await;
    }

    /// Deliver to the recipient, then echo to the sender.
    pub async fn private_message(&self, message: ChatMessage) {
        self.send(HubCommand::PrivateMessage(message)).await;
    }

    /// Refresh a member's `last_active_at` without notifying anyone.
    pub async fn touch(&self, room_id: &str, id: &str, session: Uuid) {
        self.send(HubCommand::Touch {
            room_id: room_id.to_string(),
            id: id.to_string(),
            session,
        })
        .await;
    }

    /// Register a room. Returns `false` if the ID was already taken.
    pub async fn create_room(&self, id: &str, name: &str, owner_id: &str) -> bool {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::CreateRoom {
            id: id.to_string(),
            name: name.to_string(),
            owner_id: owner_id.to_string(),
            reply,
        })
        .await;
        rx.await.unwrap_or(false)
    }

    /// Rooms currently registered in the hub.
    pub async fn rooms(&self) -> Vec<RoomSummary> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::ListRooms { reply }).await;
        rx.await.unwrap_or_default()
    }

    /// Members of a room; empty if the room does not exist.
    pub async fn members(&self, room_id: &str) -> Vec<MemberSummary> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::ListMembers {
            room_id: room_id.to_string(),
            reply,
        })
        .await;
        rx.await.unwrap_or_default()
    }
}
