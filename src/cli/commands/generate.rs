use std::path::PathBuf;

use clap::Args;

use super::config::LoggingConfig;
use crate::config::{parse_generated_at, SettingsOverrides};
use crate::facts::ComponentIdSource;

#[derive(Debug, Clone, Args)]
pub struct GenerateCommand {
    /// Directory to scan for .bicep files
    #[arg(long = "in", value_name = "DIR", default_value = ".")]
    pub input: PathBuf,

    /// Directory to write facts into, mirroring the input layout
    /// (default: next to each source)
    #[arg(long = "out", value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Derive the component id from the main resource type or the file name
    #[arg(long, value_enum, value_name = "SOURCE")]
    pub component_id_from: Option<ComponentIdSource>,

    /// Fixed meta.generatedAt (RFC 3339); defaults to each file's mtime
    #[arg(long, value_name = "ISO", value_parser = parse_generated_at)]
    pub generated_at: Option<String>,

    /// Bicep CLI executable
    #[arg(long, value_name = "PATH")]
    pub bicep_path: Option<PathBuf>,

    /// Facts contract to validate against instead of the bundled one
    #[arg(long = "schema", value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// Keep going after a file fails and report failures at the end
    #[arg(long)]
    pub continue_on_error: bool,

    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl GenerateCommand {
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            compiler_path: self.bicep_path.clone(),
            component_id_from: self.component_id_from,
            schema_path: self.schema.clone(),
            continue_on_error: self.continue_on_error.then_some(true),
        }
    }
}
