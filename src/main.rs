//! Service entry point.

use anyhow::Result;
use clap::Parser;
use tictactoe_rooms::cli::{Cli, Command};
use tictactoe_rooms::config::Settings;
use tictactoe_rooms::server::{self, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file, if present.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { host, port } => {
            let mut settings = Settings::from_env()?;
            if let Some(port) = port {
                settings = settings.with_port(port);
            }
            info!(?settings, "starting room service");
            let state = AppState::new(settings);
            server::run(state, &host).await
        }
    }
}
