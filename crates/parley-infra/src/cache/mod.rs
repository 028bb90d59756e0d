//! Cache adapters implementing `MessageCache`.

pub mod memory;

pub use memory::InMemoryCache;
