//! CLI command definitions for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod history;
pub mod rooms;

use clap::{Parser, Subcommand};

/// Real-time chat server.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP and WebSocket server.
    Serve {
        /// Port to listen on (overrides config.toml).
        #[arg(short, long, env = "PARLEY_PORT")]
        port: Option<u16>,

        /// Host to bind to (overrides config.toml).
        #[arg(long, env = "PARLEY_HOST")]
        host: Option<String>,
    },

    /// Manage persisted rooms.
    Rooms {
        #[command(subcommand)]
        action: RoomsCommand,
    },

    /// Show a room's message history, newest first.
    History {
        /// Room ID.
        room: String,

        /// Maximum number of messages.
        #[arg(long, default_value = "50")]
        limit: i64,

        /// Number of newest messages to skip.
        #[arg(long, default_value = "0")]
        offset: i64,
    },
}

#[derive(Subcommand)]
pub enum RoomsCommand {
    /// List rooms, most recently active first.
    #[command(alias = "ls")]
    List,

    /// Create a room.
    Create {
        /// Room ID.
        id: String,

        /// Display name.
        name: String,

        /// Owner user ID.
        #[arg(long, default_value = parley_types::room::SYSTEM_OWNER)]
        owner: String,
    },
}

/// Format a timestamp as a human-readable relative time string.
pub fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let secs = chrono::Utc::now().signed_duration_since(*dt).num_seconds();

    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}
