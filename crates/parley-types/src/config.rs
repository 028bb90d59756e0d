//! Server configuration types for Parley.
//!
//! `ServerConfig` represents the top-level `config.toml`. Every section and
//! field has a default, so an empty or partial file is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for the Parley server.
///
/// Loaded from `~/.parley/config.toml` (or `$PARLEY_DATA_DIR/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ListenConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub log_format: LogFormat,
}

// ---------------------------------------------------------------------------
// [server]
// ---------------------------------------------------------------------------

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// [hub]
// ---------------------------------------------------------------------------

/// What the hub does when a member's outbound queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// Wait for queue space. A slow consumer stalls the hub.
    #[default]
    Block,
    /// Drop the message for that member and log a warning.
    DropWhenFull,
}

/// Hub coordinator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Capacity of the hub's command channel.
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,
    #[serde(default)]
    pub delivery: DeliveryPolicy,
}

fn default_command_capacity() -> usize {
    64
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_capacity: default_command_capacity(),
            delivery: DeliveryPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// [connection]
// ---------------------------------------------------------------------------

/// Per-connection pump settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Inbound idle timeout; refreshed by any inbound frame.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Keepalive ping period for the outbound pump.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Capacity of each member's outbound queue.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_outbound_capacity() -> usize {
    10
}

impl ConnectionConfig {
    /// Never below one second.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.max(1))
    }

    /// Never below one second.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            ping_interval_secs: default_ping_interval_secs(),
            outbound_capacity: default_outbound_capacity(),
        }
    }
}

// ---------------------------------------------------------------------------
// [breaker]
// ---------------------------------------------------------------------------

/// Circuit breaker settings shared by the message and room breakers.
///
/// The two breakers are named `{name}-messages` and `{name}-rooms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "default_breaker_name")]
    pub name: String,
    /// Trial calls admitted while half-open.
    #[serde(default = "default_half_open_max_requests")]
    pub half_open_max_requests: u32,
    /// Period after which closed-state counts reset. Zero never resets.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Time spent open before admitting trial calls.
    #[serde(default = "default_open_timeout_secs")]
    pub open_timeout_secs: u64,
    /// Minimum calls in the current window before the breaker may trip.
    #[serde(default = "default_min_requests")]
    pub min_requests: u32,
    /// Failure ratio at or above which the breaker trips.
    #[serde(default = "default_failure_ratio")]
    pub failure_ratio: f64,
}

fn default_breaker_name() -> String {
    "chat-service".to_string()
}

fn default_half_open_max_requests() -> u32 {
    3
}

fn default_interval_secs() -> u64 {
    10
}

fn default_open_timeout_secs() -> u64 {
    30
}

fn default_min_requests() -> u32 {
    3
}

fn default_failure_ratio() -> f64 {
    0.6
}

impl BreakerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: default_breaker_name(),
            half_open_max_requests: default_half_open_max_requests(),
            interval_secs: default_interval_secs(),
            open_timeout_secs: default_open_timeout_secs(),
            min_requests: default_min_requests(),
            failure_ratio: default_failure_ratio(),
        }
    }
}

// ---------------------------------------------------------------------------
// [retry]
// ---------------------------------------------------------------------------

/// Exponential backoff settings for retried service calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// Total time budget for one retried call.
    #[serde(default = "default_max_elapsed_ms")]
    pub max_elapsed_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_initial_interval_ms() -> u64 {
    100
}

fn default_max_interval_ms() -> u64 {
    5_000
}

fn default_max_elapsed_ms() -> u64 {
    60_000
}

fn default_multiplier() -> f64 {
    1.5
}

impl RetryConfig {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn max_elapsed(&self) -> Duration {
        Duration::from_millis(self.max_elapsed_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            max_elapsed_ms: default_max_elapsed_ms(),
            multiplier: default_multiplier(),
        }
    }
}

// ---------------------------------------------------------------------------
// log_format
// ---------------------------------------------------------------------------

/// Output format for the server's tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
