//! Message history CLI command.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use parley_core::service::MessageService;
use parley_types::message::{MessageType, StoredMessage};

use crate::state::AppState;

const PREVIEW_CHARS: usize = 60;

/// Print one page of a room's history, newest first.
pub async fn show_history(
    state: &AppState,
    room_id: &str,
    limit: i64,
    offset: i64,
    json: bool,
) -> Result<()> {
    if limit <= 0 {
        anyhow::bail!("--limit must be positive");
    }
    let messages = state
        .messages
        .get_messages_by_room(room_id, limit, offset.max(0))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!();
        println!(
            "  {} No messages in '{}'",
            style("i").blue().bold(),
            style(room_id).cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Time").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("From").fg(Color::White),
        Cell::new("Content").fg(Color::White),
    ]);

    for msg in &messages {
        table.add_row(vec![
            Cell::new(msg.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()).fg(Color::DarkGrey),
            type_cell(msg.message_type),
            Cell::new(sender_label(msg)).fg(Color::Cyan),
            Cell::new(preview(&msg.content)),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

fn type_cell(message_type: MessageType) -> Cell {
    let cell = Cell::new(message_type.to_string());
    match message_type {
        MessageType::Chat => cell,
        MessageType::Private => cell.fg(Color::Magenta),
        MessageType::Join | MessageType::Leave => cell.fg(Color::Green),
        MessageType::Error => cell.fg(Color::Red),
        MessageType::System | MessageType::Typing => cell.fg(Color::DarkGrey),
    }
}

fn sender_label(msg: &StoredMessage) -> String {
    match &msg.recipient {
        Some(to) if !to.is_empty() => format!("{} → {}", msg.username, to),
        _ => msg.username.clone(),
    }
}

/// Truncate on a character boundary.
fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let cut: String = content.chars().take(PREVIEW_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        content.to_string()
    }
}
