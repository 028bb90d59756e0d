//! WebSocket handler for joining a room.
//!
//! `GET /ws/joinRoom/{room_id}?userId=&username=` upgrades the connection,
//! registers it with the hub, announces the join to the room, and then runs
//! the connection's two pumps:
//!
//! - the outbound pump in its own task, draining the connection's queue onto
//!   the socket and sending keepalive pings;
//! - the inbound pump on the upgrade task, decoding client frames into hub
//!   commands until the socket closes or goes idle.
//!
//! Accepted messages are archived through the resilient message service in
//! background tasks, so a slow or failing store never stalls a socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt, future};
use parley_core::connection::{Connection, Frame, MessageArchive, read_pump, write_pump};
use parley_core::service::MessageService;
use parley_types::message::{ChatMessage, MessageType, StoredMessage};
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;

/// Content of the message broadcast when a connection joins.
pub const JOIN_NOTICE: &str = "A new user has joined the room";

/// Identity supplied by the client. Accepted as-is.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinQuery {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
}

/// GET /ws/joinRoom/{room_id} - Upgrade and join a room.
pub async fn join_room(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<JoinQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, room_id, query))
}

async fn handle_connection(socket: WebSocket, state: AppState, room_id: String, query: JoinQuery) {
    let id = if query.user_id.is_empty() {
        Uuid::now_v7().to_string()
    } else {
        query.user_id
    };
    let settings = &state.config.connection;

    let (conn, queue) = Connection::new(id, room_id, query.username, settings.outbound_capacity);
    tracing::info!(conn_id = %conn.id, room_id = %conn.room_id, username = %conn.username, "connection joined");

    state.hub.register(conn.member()).await;

    let join = ChatMessage::new(
        MessageType::Join,
        conn.room_id.as_str(),
        conn.username.as_str(),
        JOIN_NOTICE,
    );
    state.hub.broadcast(join.clone()).await;

    let archive = ServiceArchive::new(Arc::clone(&state.messages));
    archive.record_join(&conn.id, &join);

    let (sink, stream) = socket.split();
    let sink = sink.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(frame_to_message(frame))));
    let frames = stream.map(|msg| msg.map(message_to_frame));

    let writer = tokio::spawn(write_pump(queue, sink, settings.ping_interval()));

    let conn_id = conn.id.clone();
    let outcome = read_pump(conn, state.hub.clone(), frames, &archive, settings.idle_timeout()).await;
    tracing::info!(%conn_id, ?outcome, "connection left");

    if let Err(e) = writer.await {
        tracing::warn!(%conn_id, error = %e, "outbound pump task failed");
    }
}

// ---------------------------------------------------------------------------
// Frame adapters
// ---------------------------------------------------------------------------

fn frame_to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Ping(payload) => Message::Ping(payload.into()),
        Frame::Pong(payload) => Message::Pong(payload.into()),
        Frame::Close => Message::Close(None),
    }
}

/// Binary payloads are read as (lossy) UTF-8 text.
fn message_to_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_string()),
        Message::Binary(bytes) => Frame::Text(String::from_utf8_lossy(&bytes).into_owned()),
        Message::Ping(payload) => Frame::Ping(payload.to_vec()),
        Message::Pong(payload) => Frame::Pong(payload.to_vec()),
        Message::Close(_) => Frame::Close,
    }
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// Archives messages through a message service.
///
/// Each save runs in its own task so the inbound pump never waits on
/// breakers or retry backoff.
struct ServiceArchive<S> {
    service: Arc<S>,
}

impl<S: MessageService + 'static> ServiceArchive<S> {
    fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    /// Refresh the room's activity time, then store the join notice.
    fn record_join(&self, user_id: &str, join: &ChatMessage) {
        let service = Arc::clone(&self.service);
        let stored = StoredMessage::from_chat(join, user_id);
        tokio::spawn(async move {
            if let Err(e) = service.update_room_activity(&stored.room_id).await {
                tracing::warn!(room_id = %stored.room_id, error = %e, "failed to update room activity");
            }
            if let Err(e) = service.save_message(stored).await {
                tracing::warn!(error = %e, "failed to save join message");
            }
        });
    }
}

impl<S: MessageService + 'static> MessageArchive for ServiceArchive<S> {
    fn archive(&self, user_id: &str, message: &ChatMessage) {
        let service = Arc::clone(&self.service);
        let stored = StoredMessage::from_chat(message, user_id);
        tokio::spawn(async move {
            let room_id = stored.room_id.clone();
            if let Err(e) = service.save_message(stored).await {
                tracing::warn!(%room_id, error = %e, "failed to save message");
            }
        });
    }
}
