//! Command-line interface module.
//!
//! This module provides the CLI functionality for:
//! - Facts generation over a source tree
//! - Compiler version checks

pub mod commands;
pub mod handlers;

use std::path::PathBuf;

use clap::Parser;

pub use commands::Commands;
pub use handlers::{handle_compiler_version, handle_generate};

/// Generate deterministic facts.v1 documents from Bicep sources.
#[derive(Debug, Parser)]
#[command(name = "bicep-facts", author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
