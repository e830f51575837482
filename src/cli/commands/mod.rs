pub mod compiler_version;
pub mod config;
pub mod generate;

pub use compiler_version::CompilerVersionCommand;
pub use config::LoggingConfig;
pub use generate::GenerateCommand;

use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate facts.v1 documents for every .bicep file under a directory
    Generate(GenerateCommand),
    /// Start the compiler's JSON-RPC server and print its version
    CompilerVersion(CompilerVersionCommand),
}

impl Commands {
    pub fn logging(&self) -> &LoggingConfig {
        match self {
            Commands::Generate(cmd) => &cmd.logging,
            Commands::CompilerVersion(cmd) => &cmd.logging,
        }
    }
}
