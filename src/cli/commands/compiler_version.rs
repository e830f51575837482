use std::path::PathBuf;

use clap::Args;

use super::config::LoggingConfig;
use crate::config::SettingsOverrides;

#[derive(Debug, Clone, Args)]
pub struct CompilerVersionCommand {
    /// Bicep CLI executable
    #[arg(long, value_name = "PATH")]
    pub bicep_path: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl CompilerVersionCommand {
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            compiler_path: self.bicep_path.clone(),
            ..SettingsOverrides::default()
        }
    }
}
