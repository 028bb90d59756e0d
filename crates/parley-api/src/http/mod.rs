//! HTTP and WebSocket layer for Parley.
//!
//! Axum router with the room/membership endpoints under `/ws/`, history and
//! room CRUD under `/api/`, envelope responses, and permissive CORS.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
