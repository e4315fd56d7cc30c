//! Command-line interface.

use clap::{Parser, Subcommand};

/// Real-time tic-tac-toe room service.
#[derive(Parser, Debug)]
#[command(name = "tictactoe_rooms")]
#[command(about = "WebSocket room server for two-player tic-tac-toe", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the WebSocket room server.
    Serve {
        /// Host to bind to.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to bind to (overrides the PORT environment variable).
        #[arg(short, long)]
        port: Option<u16>,
    },
}
