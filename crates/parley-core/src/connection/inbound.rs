//! Inbound pump: link -> hub.

use std::fmt::Display;
use std::time::Duration;

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use parley_types::message::{ChatMessage, MessageType, WireMessage};
use tracing::debug;

use super::{Connection, Frame, MessageArchive};
use crate::hub::HubHandle;

/// Why the inbound pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The client sent a close frame.
    Closed,
    /// The frame stream ended.
    Ended,
    /// No frame arrived within the idle timeout.
    IdleTimeout,
    /// The transport reported an error.
    Error(String),
}

/// Read frames until the link ends, dispatching each to the hub.
///
/// Every frame restarts the idle timer. On exit the connection is
/// unregistered and its own queue sender dropped, which lets the outbound
/// pump finish once the hub has let go as well.
pub async fn read_pump<S, E, A>(
    mut conn: Connection,
    hub: HubHandle,
    frames: S,
    archive: &A,
    idle_timeout: Duration,
) -> ReadOutcome
where
    S: Stream<Item = Result<Frame, E>>,
    E: Display,
    A: MessageArchive + ?Sized,
{
    let mut frames = std::pin::pin!(frames);

    let outcome = loop {
        let frame = match tokio::time::timeout(idle_timeout, frames.next()).await {
            Err(_) => break ReadOutcome::IdleTimeout,
            Ok(None) => break ReadOutcome::Ended,
            Ok(Some(Err(e))) => break ReadOutcome::Error(e.to_string()),
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Frame::Text(text) => dispatch_text(&mut conn, &hub, archive, text).await,
            Frame::Pong(_) => hub.touch(&conn.room_id, &conn.id, conn.session).await,
            Frame::Ping(_) => {}
            Frame::Close => break ReadOutcome::Closed,
        }
    };

    debug!(conn_id = %conn.id, room_id = %conn.room_id, ?outcome, "inbound pump finished");
    hub.unregister(&conn.room_id, &conn.id, conn.session).await;
    outcome
}

async fn dispatch_text<A>(conn: &mut Connection, hub: &HubHandle, archive: &A, text: String)
where
    A: MessageArchive + ?Sized,
{
    let message = match serde_json::from_str::<WireMessage>(&text) {
        Ok(wire) => wire.normalize(&conn.room_id, &conn.username, Utc::now()),
        Err(e) => {
            debug!(conn_id = %conn.id, error = %e, "non-JSON frame sent as chat text");
            ChatMessage::chat(conn.room_id.as_str(), conn.username.as_str(), text)
        }
    };

    match message.message_type {
        MessageType::Typing => {
            conn.is_typing = message.content == "true";
            hub.update_status(&conn.room_id, &conn.id, conn.session, conn.is_typing)
                .await;
        }
        MessageType::Private if message.private_recipient().is_some() => {
            archive.archive(&conn.id, &message);
            hub.private_message(message).await;
        }
        _ => {
            archive.archive(&conn.id, &message);
            hub.broadcast(message).await;
        }
    }
}
