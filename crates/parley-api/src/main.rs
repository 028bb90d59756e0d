//! Parley chat server and CLI entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, loads configuration, wires the hub and message
//! services, then dispatches to a command handler or starts the server.

mod cli;
mod http;
mod state;

use clap::Parser;
use parley_infra::config::{load_config, resolve_data_dir};
use parley_types::config::LogFormat;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, RoomsCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = resolve_data_dir();
    let config = load_config(&data_dir).await;

    init_tracing(&cli, config.log_format);

    let state = AppState::init(&data_dir, config).await?;

    match cli.command {
        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);

            let restored = state.restore_rooms().await;

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            if !cli.quiet {
                println!(
                    "  {} Parley listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                if restored > 0 {
                    println!(
                        "  {} {} room{} restored",
                        console::style("i").blue().bold(),
                        restored,
                        if restored == 1 { "" } else { "s" }
                    );
                }
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }
            tracing::info!(%addr, rooms = restored, "server started");

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Rooms { action } => match action {
            RoomsCommand::List => {
                cli::rooms::list_rooms(&state, cli.json).await?;
            }
            RoomsCommand::Create { id, name, owner } => {
                cli::rooms::create_room(&state, &id, &name, &owner, cli.json).await?;
            }
        },

        Commands::History {
            room,
            limit,
            offset,
        } => {
            cli::history::show_history(&state, &room, limit, offset, cli.json).await?;
        }
    }

    Ok(())
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the verbosity flags. JSON output is used when either
/// `--log-json` is passed or the config sets `log_format = "json"`.
fn init_tracing(cli: &Cli, format: LogFormat) {
    let level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,parley_api=debug,parley_core=debug,parley_infra=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if cli.log_json || format == LogFormat::Json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
