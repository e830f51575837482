use clap::Args;
use tracing::Level;

/// Logging flags shared by every subcommand
#[derive(Debug, Clone, Default, Args)]
pub struct LoggingConfig {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log filter directives, e.g. `bicep_facts_core::rpc=trace`
    #[arg(long = "log-filter", env = "BICEP_FACTS_LOG_FILTER")]
    pub log_filter: Option<String>,
}

impl LoggingConfig {
    pub fn get_effective_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}
