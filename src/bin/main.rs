//! bicep-facts binary.
//!
//! Generates facts.v1 documents for the Bicep sources under a directory.

use std::process::ExitCode;

use anyhow::Context;
use bicep_facts_core::{
    cli::{commands::Commands, handle_compiler_version, handle_generate, Cli},
    config::Settings,
};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Get logging config from command
    let logging = cli.command.logging();
    let default_level = LevelFilter::from_level(logging.get_effective_level());
    let builder = EnvFilter::builder().with_default_directive(default_level.into());
    let filter = match logging.log_filter.as_deref() {
        Some(filter) => builder.parse_lossy(filter),
        None => builder.from_env_lossy(),
    };

    // Logs go to stderr; stdout is reserved for results
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = match &cli.command {
        Commands::Generate(cmd) => cmd.overrides(),
        Commands::CompilerVersion(cmd) => cmd.overrides(),
    };
    let settings = Settings::load(cli.config.as_deref(), &overrides)
        .context("Failed to load configuration")?;
    debug!(?settings, "Configuration loaded");

    match &cli.command {
        Commands::Generate(cmd) => {
            let summary = handle_generate(&settings, cmd).await?;
            debug!(written = summary.written.len(), "Generation finished");
        }
        Commands::CompilerVersion(_) => {
            handle_compiler_version(&settings).await?;
        }
    }
    Ok(())
}
