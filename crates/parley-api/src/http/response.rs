//! JSON envelope for REST responses.
//!
//! Success bodies carry `data`, `meta` and optional `_links`; failures carry
//! `meta` and a one-entry `errors` list. `meta` is filled from the
//! [`RequestStamp`] taken when the handler started.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorEntry>,
    #[serde(rename = "_links", skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub request_id: String,
    pub timestamp: String,
    pub response_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorEntry {
    /// Machine-readable, e.g. `NOT_FOUND`.
    pub code: String,
    pub message: String,
}

impl<T: Serialize> Envelope<T> {
    pub fn link(mut self, rel: &'static str, href: String) -> Self {
        self.links.insert(rel, href);
        self
    }
}

/// Request ID and start time for one REST call.
#[derive(Debug)]
pub struct RequestStamp {
    request_id: String,
    started: Instant,
}

impl RequestStamp {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::now_v7().to_string(),
            started: Instant::now(),
        }
    }

    fn meta(&self) -> Meta {
        Meta {
            request_id: self.request_id.clone(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            response_time_ms: self.started.elapsed().as_millis() as u64,
        }
    }

    pub fn ok<T: Serialize>(&self, data: T) -> Envelope<T> {
        Envelope {
            data: Some(data),
            meta: self.meta(),
            errors: Vec::new(),
            links: BTreeMap::new(),
        }
    }

    pub fn fail(&self, code: &str, message: impl Into<String>) -> Envelope<()> {
        Envelope {
            data: None,
            meta: self.meta(),
            errors: vec![ErrorEntry {
                code: code.to_string(),
                message: message.into(),
            }],
            links: BTreeMap::new(),
        }
    }
}

impl Default for RequestStamp {
    fn default() -> Self {
        Self::new()
    }
}
