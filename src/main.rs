#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use session_fabric::config::{self, is_production_mode, validate_config};
use session_fabric::{logging, server};

/// The session fabric core: connection pooling, the event bus, room
/// lifecycle, and matchmaking for a real-time multiplayer backend.
#[derive(Parser, Debug)]
#[command(name = "session-fabric")]
#[command(about = "Core session fabric for a real-time multiplayer mini-game backend")]
#[command(version)]
struct Cli {
    /// Validate the resolved configuration and exit without starting the
    /// server. Exits non-zero if any boundary check fails.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the resolved configuration as pretty JSON and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&config)?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = validate_config(&config);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!(
                    "  Environment: {}",
                    if is_production_mode() { "production" } else { "development" }
                );
                println!("  Port: {}", config.port);
                println!(
                    "  Room players: {}-{}",
                    config.room.min_players_per_room, config.room.max_players_per_room
                );
                println!(
                    "  Matchmaking skill window: {}-{} (expansion rate {})",
                    config.matchmaking.skill_base_window,
                    config.matchmaking.skill_max_window,
                    config.matchmaking.skill_expansion_rate
                );
                println!("  Max connections: {}", config.connection.max_connections);
                return Ok(());
            }
            Err(err) => {
                eprintln!("Configuration validation failed:\n{err}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    logging::init_with_config(&config.logging);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting session fabric");

    server::serve(config).await
}
