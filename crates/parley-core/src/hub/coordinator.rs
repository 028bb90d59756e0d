//! The hub worker.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parley_types::config::{DeliveryPolicy, HubConfig};
use parley_types::message::{ChatMessage, MessageType};
use parley_types::room::{MemberSummary, RoomSummary};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{HubCommand, HubHandle, Member};

const LEAVE_NOTICE: &str = "user left the chat";

/// Live projection of a room: its metadata plus current members.
#[derive(Debug)]
struct HubRoom {
    name: String,
    last_activity_at: DateTime<Utc>,
    members: HashMap<String, Member>,
}

/// Room and membership coordinator. Runs as a single task.
pub struct Hub {
    rooms: HashMap<String, HubRoom>,
    delivery: DeliveryPolicy,
    dropped: u64,
    commands: mpsc::Receiver<HubCommand>,
}

impl Hub {
    /// Create the worker and its handle without starting it.
    pub fn new(config: &HubConfig) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
        let hub = Self {
            rooms: HashMap::new(),
            delivery: config.delivery,
            dropped: 0,
            commands: rx,
        };
        (hub, HubHandle { tx })
    }

    /// Start the worker on the current runtime.
    pub fn spawn(config: &HubConfig) -> HubHandle {
        let (hub, handle) = Self::new(config);
        tokio::spawn(hub.run());
        handle
    }

    /// Process commands until every handle is dropped.
    pub async fn run(mut self) {
        info!(delivery = ?self.delivery, "hub started");
        while let Some(command) = self.commands.recv().await {
            self.handle(command).await;
        }
        info!(rooms = self.rooms.len(), dropped = self.dropped, "hub stopped");
    }

    async fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(member) => self.register(member),
            HubCommand::Unregister { room_id, id, session } => {
                self.unregister(&room_id, &id, session).await;
            }
            HubCommand::Broadcast(message) => self.broadcast(message).await,
            HubCommand::StatusUpdate {
                room_id,
                id,
                session,
                is_typing,
            } => self.update_status(&room_id, &id, session, is_typing).await,
            HubCommand::PrivateMessage(message) => self.private_message(message).await,
            HubCommand::Touch { room_id, id, session } => self.touch(&room_id, &id, session),
            HubCommand::CreateRoom {
                id,
                name,
                owner_id,
                reply,
            } => {
                let created = self.create_room(id, name, owner_id);
                let _ = reply.send(created);
            }
            HubCommand::ListRooms { reply } => {
                let _ = reply.send(self.list_rooms());
            }
            HubCommand::ListMembers { room_id, reply } => {
                let _ = reply.send(self.list_members(&room_id));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    fn register(&mut self, member: Member) {
        let Some(room) = self.rooms.get_mut(&member.room_id) else {
            debug!(room_id = %member.room_id, conn_id = %member.id, "register for unknown room ignored");
            return;
        };
        if room.members.contains_key(&member.id) {
            debug!(room_id = %member.room_id, conn_id = %member.id, "duplicate connection id ignored");
            return;
        }

        debug!(room_id = %member.room_id, conn_id = %member.id, username = %member.username, "member registered");
        room.members.insert(member.id.clone(), member);
    }

    async fn unregister(&mut self, room_id: &str, id: &str, session: Uuid) {
        let delivery = self.delivery;
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        let Some(member) = room.members.get(id).filter(|m| m.session == session) else {
            debug!(%room_id, conn_id = %id, "unregister for non-member ignored");
            return;
        };

        if room.members.len() > 1 {
            room.last_activity_at = Utc::now();
            let notice = ChatMessage::new(MessageType::Leave, room_id, &member.username, LEAVE_NOTICE);
            for other in room.members.values().filter(|m| m.id != id) {
                deliver(delivery, &mut self.dropped, other, notice.clone()).await;
            }
        }

        // Dropping the member drops the hub's end of its outbound queue.
        room.members.remove(id);
        debug!(%room_id, conn_id = %id, remaining = room.members.len(), "member unregistered");
    }

    fn touch(&mut self, room_id: &str, id: &str, session: Uuid) {
        let member = self
            .rooms
            .get_mut(room_id)
            .and_then(|room| room.members.get_mut(id))
            .filter(|m| m.session == session);
        if let Some(member) = member {
            member.last_active_at = Utc::now();
        }
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    async fn broadcast(&mut self, message: ChatMessage) {
        let delivery = self.delivery;
        let Some(room) = self.rooms.get_mut(&message.room_id) else {
            debug!(room_id = %message.room_id, "broadcast to unknown room dropped");
            return;
        };

        room.last_activity_at = Utc::now();
        for member in room.members.values() {
            deliver(delivery, &mut self.dropped, member, message.clone()).await;
        }
    }

    async fn update_status(&mut self, room_id: &str, id: &str, session: Uuid, is_typing: bool) {
        let delivery = self.delivery;
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        let Some(member) = room.members.get_mut(id).filter(|m| m.session == session) else {
            debug!(%room_id, conn_id = %id, "status update for non-member ignored");
            return;
        };

        member.is_typing = is_typing;
        member.last_active_at = Utc::now();

        let notice = ChatMessage::new(
            MessageType::Typing,
            room_id,
            &member.username,
            if is_typing { "true" } else { "false" },
        );
        for other in room.members.values().filter(|m| m.id != id) {
            deliver(delivery, &mut self.dropped, other, notice.clone()).await;
        }
    }

    async fn private_message(&mut self, message: ChatMessage) {
        let delivery = self.delivery;
        let Some(room) = self.rooms.get(&message.room_id) else {
            return;
        };
        let Some(recipient) = message.private_recipient() else {
            return;
        };
        let Some(target) = room.members.values().find(|m| m.username == recipient) else {
            debug!(room_id = %message.room_id, %recipient, "private message recipient not in room");
            return;
        };

        deliver(delivery, &mut self.dropped, target, message.clone()).await;

        if let Some(sender) = room.members.values().find(|m| m.username == message.username) {
            deliver(delivery, &mut self.dropped, sender, message).await;
        }
    }

    // -----------------------------------------------------------------------
    // Room registry
    // -----------------------------------------------------------------------

    fn create_room(&mut self, id: String, name: String, owner_id: String) -> bool {
        if self.rooms.contains_key(&id) {
            return false;
        }
        info!(room_id = %id, %name, %owner_id, "room registered in hub");
        self.rooms.insert(
            id,
            HubRoom {
                name,
                last_activity_at: Utc::now(),
                members: HashMap::new(),
            },
        );
        true
    }

    fn list_rooms(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .iter()
            .map(|(id, room)| RoomSummary {
                id: id.clone(),
                name: room.name.clone(),
                members: room.members.len(),
                last_activity_at: room.last_activity_at,
            })
            .collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }

    fn list_members(&self, room_id: &str) -> Vec<MemberSummary> {
        let Some(room) = self.rooms.get(room_id) else {
            return Vec::new();
        };
        let mut members: Vec<MemberSummary> = room
            .members
            .values()
            .map(|m| MemberSummary {
                id: m.id.clone(),
                username: m.username.clone(),
                last_active_at: m.last_active_at,
            })
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        members
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("rooms", &self.rooms.len())
            .field("delivery", &self.delivery)
            .field("dropped", &self.dropped)
            .finish()
    }
}

/// Put one message on a member's outbound queue according to `policy`.
///
/// A closed queue fails immediately under either policy, so a member whose
/// connection is gone never stalls the hub.
async fn deliver(policy: DeliveryPolicy, dropped: &mut u64, member: &Member, message: ChatMessage) {
    match policy {
        DeliveryPolicy::Block => {
            if member.outbound.send(message).await.is_err() {
                debug!(conn_id = %member.id, "outbound queue closed");
            }
        }
        DeliveryPolicy::DropWhenFull => match member.outbound.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                *dropped += 1;
                warn!(conn_id = %member.id, room_id = %member.room_id, dropped_total = *dropped, "outbound queue full, message dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(conn_id = %member.id, "outbound queue closed");
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn member(
        room: &str,
        id: &str,
        username: &str,
        capacity: usize,
    ) -> (Member, mpsc::Receiver<ChatMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let now = Utc::now();
        let member = Member {
            id: id.to_string(),
            session: Uuid::now_v7(),
            room_id: room.to_string(),
            username: username.to_string(),
            is_typing: false,
            joined_at: now,
            last_active_at: now,
            outbound: tx,
        };
        (member, rx)
    }

    async fn hub_with_room(room: &str) -> HubHandle {
        let hub = Hub::spawn(&HubConfig::default());
        assert!(hub.create_room(room, "Test Room", "system").await);
        hub
    }

    fn ids(members: &[MemberSummary]) -> Vec<&str> {
        members.iter().map(|m| m.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_room_rejects_duplicate_id() {
        let hub = hub_with_room("lobby").await;
        assert!(!hub.create_room("lobby", "Other", "system").await);

        let rooms = hub.rooms().await;
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].name, "Test Room");
    }

    #[tokio::test]
    async fn test_membership_after_register_and_unregister() {
        let hub = hub_with_room("lobby").await;
        let (a, _rx_a) = member("lobby", "a", "alice", 8);
        let (b, _rx_b) = member("lobby", "b", "bob", 8);
        let (c, _rx_c) = member("lobby", "c", "carol", 8);
        let b_session = b.session;

        hub.register(a).await;
        hub.register(b).await;
        hub.register(c).await;
        assert_eq!(ids(&hub.members("lobby").await), vec!["a", "b", "c"]);

        hub.unregister("lobby", "b", b_session).await;
        assert_eq!(ids(&hub.members("lobby").await), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_join_unknown_room_is_noop() {
        let hub = hub_with_room("lobby").await;
        let (ghost, _rx) = member("nowhere", "g", "ghost", 8);
        hub.register(ghost).await;

        assert!(hub.members("nowhere").await.is_empty());
        assert_eq!(hub.rooms().await.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected_and_cannot_evict_original() {
        let hub = hub_with_room("lobby").await;
        let (original, _rx1) = member("lobby", "a", "alice", 8);
        let (duplicate, _rx2) = member("lobby", "a", "impostor", 8);
        let dup_session = duplicate.session;

        hub.register(original).await;
        hub.register(duplicate).await;
        hub.unregister("lobby", "a", dup_session).await;

        let members = hub.members("lobby").await;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].username, "alice");
    }

    #[tokio::test]
    async fn test_broadcast_delivers_one_copy_to_each_member() {
        let hub = hub_with_room("lobby").await;
        let mut receivers = Vec::new();
        for (id, name) in [("a", "alice"), ("b", "bob"), ("c", "carol")] {
            let (m, rx) = member("lobby", id, name, 8);
            hub.register(m).await;
            receivers.push(rx);
        }

        hub.broadcast(ChatMessage::chat("lobby", "alice", "hello")).await;
        hub.members("lobby").await; // barrier: broadcast processed

        for rx in receivers.iter_mut() {
            let msg = rx.try_recv().unwrap();
            assert_eq!(msg.content, "hello");
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_broadcast_isolated_to_room() {
        let hub = hub_with_room("lobby").await;
        assert!(hub.create_room("den", "Den", "system").await);
        let (a, mut rx_a) = member("lobby", "a", "alice", 8);
        let (b, mut rx_b) = member("den", "b", "bob", 8);
        hub.register(a).await;
        hub.register(b).await;

        hub.broadcast(ChatMessage::chat("den", "bob", "den only")).await;
        hub.members("den").await;

        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap().content, "den only");
    }

    #[tokio::test]
    async fn test_fan_out_preserves_order() {
        let hub = hub_with_room("lobby").await;
        let (a, mut rx) = member("lobby", "a", "alice", 16);
        hub.register(a).await;

        for i in 0..10 {
            hub.broadcast(ChatMessage::chat("lobby", "alice", i.to_string())).await;
        }
        hub.members("lobby").await;

        for i in 0..10 {
            assert_eq!(rx.try_recv().unwrap().content, i.to_string());
        }
    }

    #[tokio::test]
    async fn test_unregister_notifies_remaining_members() {
        let hub = hub_with_room("lobby").await;
        let (a, mut rx_a) = member("lobby", "a", "alice", 8);
        let (b, mut rx_b) = member("lobby", "b", "bob", 8);
        let b_session = b.session;
        hub.register(a).await;
        hub.register(b).await;

        hub.unregister("lobby", "b", b_session).await;
        hub.members("lobby").await;

        let notice = rx_a.try_recv().unwrap();
        assert_eq!(notice.message_type, MessageType::Leave);
        assert_eq!(notice.username, "bob");
        assert_eq!(notice.content, "user left the chat");

        // The hub dropped its end of bob's queue.
        assert!(rx_b.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_leave_notice_refreshes_room_activity() {
        let hub = hub_with_room("lobby").await;
        let (a, _rx_a) = member("lobby", "a", "alice", 8);
        let (b, _rx_b) = member("lobby", "b", "bob", 8);
        let b_session = b.session;
        hub.register(a).await;
        hub.register(b).await;
        let before = hub.rooms().await[0].last_activity_at;

        tokio::time::sleep(Duration::from_millis(5)).await;
        hub.unregister("lobby", "b", b_session).await;

        assert!(hub.rooms().await[0].last_activity_at > before);
    }

    #[tokio::test]
    async fn test_touch_refreshes_member_without_notice() {
        let hub = hub_with_room("lobby").await;
        let (mut a, _rx_a) = member("lobby", "a", "alice", 8);
        let (b, mut rx_b) = member("lobby", "b", "bob", 8);
        let stale = Utc::now() - chrono::Duration::hours(1);
        a.last_active_at = stale;
        let a_session = a.session;
        hub.register(a).await;
        hub.register(b).await;

        hub.touch("lobby", "a", Uuid::now_v7()).await;
        let members = hub.members("lobby").await;
        assert_eq!(members[0].last_active_at, stale);

        hub.touch("lobby", "a", a_session).await;
        let members = hub.members("lobby").await;
        assert_eq!(members[0].id, "a");
        assert!(members[0].last_active_at > stale);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_typing_not_echoed_to_sender() {
        let hub = hub_with_room("lobby").await;
        let (a, mut rx_a) = member("lobby", "a", "alice", 8);
        let (b, mut rx_b) = member("lobby", "b", "bob", 8);
        let a_session = a.session;
        hub.register(a).await;
        hub.register(b).await;

        hub.update_status("lobby", "a", a_session, true).await;
        hub.update_status("lobby", "a", a_session, false).await;
        hub.members("lobby").await;

        assert!(rx_a.try_recv().is_err());
        let first = rx_b.try_recv().unwrap();
        assert_eq!(first.message_type, MessageType::Typing);
        assert_eq!(first.username, "alice");
        assert_eq!(first.content, "true");
        assert_eq!(rx_b.try_recv().unwrap().content, "false");
    }

    #[tokio::test]
    async fn test_private_message_to_recipient_then_sender() {
        let hub = hub_with_room("lobby").await;
        let (a, mut rx_a) = member("lobby", "a", "alice", 8);
        let (b, mut rx_b) = member("lobby", "b", "bob", 8);
        let (c, mut rx_c) = member("lobby", "c", "carol", 8);
        hub.register(a).await;
        hub.register(b).await;
        hub.register(c).await;

        hub.private_message(ChatMessage::private("lobby", "alice", "bob", "psst")).await;
        hub.members("lobby").await;

        assert_eq!(rx_b.try_recv().unwrap().content, "psst");
        assert_eq!(rx_a.try_recv().unwrap().content, "psst");
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_private_message_unknown_recipient_dropped_without_echo() {
        let hub = hub_with_room("lobby").await;
        let (a, mut rx_a) = member("lobby", "a", "alice", 8);
        hub.register(a).await;

        hub.private_message(ChatMessage::private("lobby", "alice", "nobody", "psst")).await;
        hub.members("lobby").await;

        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_drop_when_full_skips_slow_member() {
        let config = HubConfig {
            delivery: DeliveryPolicy::DropWhenFull,
            ..HubConfig::default()
        };
        let hub = Hub::spawn(&config);
        hub.create_room("lobby", "Lobby", "system").await;
        let (slow, mut rx_slow) = member("lobby", "s", "slow", 1);
        let (fast, mut rx_fast) = member("lobby", "f", "fast", 8);
        hub.register(slow).await;
        hub.register(fast).await;

        hub.broadcast(ChatMessage::chat("lobby", "fast", "one")).await;
        hub.broadcast(ChatMessage::chat("lobby", "fast", "two")).await;
        hub.members("lobby").await;

        assert_eq!(rx_slow.try_recv().unwrap().content, "one");
        assert!(rx_slow.try_recv().is_err());
        assert_eq!(rx_fast.try_recv().unwrap().content, "one");
        assert_eq!(rx_fast.try_recv().unwrap().content, "two");
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_policy_waits_for_queue_space() {
        let hub = hub_with_room("lobby").await;
        let (slow, mut rx_slow) = member("lobby", "s", "slow", 1);
        hub.register(slow).await;

        hub.broadcast(ChatMessage::chat("lobby", "x", "one")).await;
        hub.broadcast(ChatMessage::chat("lobby", "x", "two")).await;

        // The hub is stalled on the second delivery until the member reads.
        let stalled = tokio::time::timeout(Duration::from_millis(50), hub.members("lobby")).await;
        assert!(stalled.is_err());

        assert_eq!(rx_slow.recv().await.unwrap().content, "one");
        assert_eq!(rx_slow.recv().await.unwrap().content, "two");
        assert_eq!(hub.members("lobby").await.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_queue_does_not_stall_hub() {
        let hub = hub_with_room("lobby").await;
        let (gone, rx_gone) = member("lobby", "g", "gone", 1);
        let (live, mut rx_live) = member("lobby", "l", "live", 8);
        hub.register(gone).await;
        hub.register(live).await;
        drop(rx_gone);

        hub.broadcast(ChatMessage::chat("lobby", "live", "one")).await;
        hub.broadcast(ChatMessage::chat("lobby", "live", "two")).await;
        hub.members("lobby").await;

        assert_eq!(rx_live.try_recv().unwrap().content, "one");
        assert_eq!(rx_live.try_recv().unwrap().content, "two");
    }

    #[tokio::test]
    async fn test_hub_stops_when_handles_dropped() {
        let (hub, handle) = Hub::new(&HubConfig::default());
        let worker = tokio::spawn(hub.run());
        drop(handle);
        worker.await.unwrap();
    }
}
