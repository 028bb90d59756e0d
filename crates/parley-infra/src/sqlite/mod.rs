//! SQLite storage: pooled connections and the chat repository.

pub mod chat;
pub mod pool;
