//! Fabula CLI entry point.

use clap::Parser;
use fabula::cli::{Cli, Commands, handle_play_command, handle_validate_command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate {
            path,
            format,
            strict,
        } => handle_validate_command(path, format, strict),
        Commands::Play { path, user } => handle_play_command(path, user).await,
    }
}
