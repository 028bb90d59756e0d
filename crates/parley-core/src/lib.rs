//! Connection hub, ports, and message services for Parley.
//!
//! This crate defines the "ports" (repository and cache traits) that the
//! infrastructure layer implements, plus the runtime pieces built on them:
//! the hub, the connection pumps, and the resilient message service. It
//! depends only on `parley-types` -- never on `parley-infra` or any
//! database/IO crate.

pub mod cache;
pub mod connection;
pub mod hub;
pub mod repository;
pub mod resilience;
pub mod service;

#[cfg(test)]
mod testing;
