//! HTTP request handlers.

pub mod message;
pub mod room;
pub mod ws;
