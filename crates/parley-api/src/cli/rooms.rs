//! Room CLI commands: list, create.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use parley_core::service::MessageService;

use super::format_relative_time;
use crate::state::AppState;

/// List persisted rooms, most recently active first.
pub async fn list_rooms(state: &AppState, json: bool) -> Result<()> {
    let rooms = state.messages.get_rooms().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rooms)?);
        return Ok(());
    }

    if rooms.is_empty() {
        println!();
        println!(
            "  {} No rooms yet. Create one with: {}",
            style("i").blue().bold(),
            style("parley rooms create <id> <name>").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Owner").fg(Color::White),
        Cell::new("Created").fg(Color::White),
        Cell::new("Last Active").fg(Color::White),
    ]);

    for room in &rooms {
        table.add_row(vec![
            Cell::new(&room.id).fg(Color::Cyan),
            Cell::new(&room.name),
            Cell::new(&room.owner_id),
            Cell::new(room.created_at.format("%Y-%m-%d").to_string()).fg(Color::DarkGrey),
            Cell::new(format_relative_time(&room.last_activity_at)).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} room{}",
        style(rooms.len()).bold(),
        if rooms.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Create and persist a room.
pub async fn create_room(
    state: &AppState,
    id: &str,
    name: &str,
    owner: &str,
    json: bool,
) -> Result<()> {
    let room = state.messages.create_room(id, name, owner).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&room)?);
    } else {
        println!(
            "  {} Room '{}' created ({})",
            style("✓").green().bold(),
            style(&room.name).bold(),
            style(&room.id).cyan()
        );
    }

    Ok(())
}
