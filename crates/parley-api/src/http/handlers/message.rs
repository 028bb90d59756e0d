//! Message history HTTP handlers.
//!
//! Endpoints:
//! - GET /api/messages/room/{room_id}?limit=&offset= - Page of a room's history
//! - GET /api/messages/{message_id}                  - Single message

use axum::Json;
use axum::extract::{Path, Query, State};
use parley_core::service::MessageService;
use parley_types::message::StoredMessage;
use serde::Deserialize;

use crate::http::error::AppError;
use crate::http::response::{Envelope, RequestStamp};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

/// Raw pagination parameters. Values that do not parse fall back to the
/// defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl PageQuery {
    /// `(limit, offset)` clamped to `1..=200` and `0..`.
    fn resolve(&self) -> (i64, i64) {
        let limit = self
            .limit
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map_or(DEFAULT_PAGE_SIZE, |n| n.min(MAX_PAGE_SIZE));
        let offset = self
            .offset
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map_or(0, |n| n.max(0));
        (limit, offset)
    }
}

/// GET /api/messages/room/{room_id} - Page of a room's history, newest first.
pub async fn get_room_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Envelope<Vec<StoredMessage>>>, AppError> {
    let stamp = RequestStamp::new();

    if room_id.trim().is_empty() {
        return Err(AppError::Validation("room ID is required".to_string()));
    }
    let (limit, offset) = query.resolve();

    let messages = state
        .messages
        .get_messages_by_room(&room_id, limit, offset)
        .await?;

    let page_link =
        |offset: i64| format!("/api/messages/room/{room_id}?limit={limit}&offset={offset}");
    let full_page = messages.len() as i64 == limit;

    let mut body = stamp.ok(messages).link("self", page_link(offset));
    if full_page {
        body = body.link("next", page_link(offset + limit));
    }
    Ok(Json(body))
}

/// GET /api/messages/{message_id} - Single message.
pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<Json<Envelope<StoredMessage>>, AppError> {
    let stamp = RequestStamp::new();

    let message = state.messages.get_message_by_id(&message_id).await?;
    let room_link = format!("/api/rooms/{}", message.room_id);
    Ok(Json(stamp.ok(message).link("room", room_link)))
}
