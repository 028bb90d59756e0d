//! Infrastructure layer for Parley.
//!
//! Implementations of the ports defined in `parley-core`: SQLite message and
//! room storage, the in-process expiring cache, and the config file loader.

pub mod cache;
pub mod config;
pub mod sqlite;
