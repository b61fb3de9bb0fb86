//! CLI argument definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Fabula: run branching-narrative scripts for chat communities.
#[derive(Debug, Parser)]
#[command(name = "fabula", version, about)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate a story script without starting a session
    Validate {
        /// Path to the story TOML file
        path: PathBuf,
        /// Output format (human or json)
        #[arg(long, value_enum, default_value_t = ValidationOutputFormat::Human)]
        format: ValidationOutputFormat,
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
    /// Play a story in the terminal against in-memory stores
    Play {
        /// Path to the story TOML file
        path: PathBuf,
        /// Numeric user id to play as
        #[arg(long, default_value_t = 1)]
        user: i64,
    },
}

/// Output format for validation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValidationOutputFormat {
    /// Human-readable report
    Human,
    /// Machine-readable JSON
    Json,
}
