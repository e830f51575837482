//! Configuration management for bicep-facts.
//!
//! Settings are layered, later sources overriding earlier ones:
//! 1. Default configuration (embedded in binary)
//! 2. User-specified configuration file (`--config`)
//! 3. Environment variables (prefixed with `BICEP_FACTS_`, `__` between
//!    section and key, e.g. `BICEP_FACTS_COMPILER__PATH`)
//! 4. Command-line arguments

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::{FactsError, Result};
use crate::facts::ComponentIdSource;
use crate::rpc::{CompilerCommand, SessionOptions};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "BICEP_FACTS";

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub compiler: CompilerSettings,
    pub generate: GenerateSettings,
}

/// How to launch the Bicep compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerSettings {
    /// Compiler executable
    pub path: PathBuf,
    /// Extra arguments placed before `jsonrpc`
    #[serde(default)]
    pub args: Vec<String>,
    /// Seconds to wait for the compiler to connect
    pub connect_timeout_secs: u64,
}

/// Facts generation behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateSettings {
    #[serde(default)]
    pub component_id_from: ComponentIdSource,
    /// Contract to validate against instead of the bundled one
    #[serde(default)]
    pub schema_path: Option<PathBuf>,
    /// Report per-file failures at the end instead of stopping at the first
    #[serde(default)]
    pub continue_on_error: bool,
}

/// Values given on the command line. `None` leaves the configured value.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub compiler_path: Option<PathBuf>,
    pub component_id_from: Option<ComponentIdSource>,
    pub schema_path: Option<PathBuf>,
    pub continue_on_error: Option<bool>,
}

impl Settings {
    /// Load configuration from all sources, reading the process environment.
    pub fn load(config_file: Option<&Path>, overrides: &SettingsOverrides) -> Result<Self> {
        Self::load_with_env(config_file, overrides, None)
    }

    /// Like [`load`](Self::load), with an explicit environment map in place of
    /// the process environment when `env` is given.
    pub fn load_with_env(
        config_file: Option<&Path>,
        overrides: &SettingsOverrides,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder().add_source(config::File::from_str(
            DEFAULT_CONFIG,
            config::FileFormat::Toml,
        ));

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(" ")
                .with_list_parse_key("compiler.args")
                .source(env),
        );

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.apply(overrides);
        settings.validate()?;
        Ok(settings)
    }

    fn apply(&mut self, overrides: &SettingsOverrides) {
        if let Some(path) = &overrides.compiler_path {
            self.compiler.path = path.clone();
        }
        if let Some(source) = overrides.component_id_from {
            self.generate.component_id_from = source;
        }
        if let Some(path) = &overrides.schema_path {
            self.generate.schema_path = Some(path.clone());
        }
        if let Some(flag) = overrides.continue_on_error {
            self.generate.continue_on_error = flag;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.compiler.path.as_os_str().is_empty() {
            return Err(FactsError::InvalidArgument(
                "compiler.path must not be empty".to_string(),
            ));
        }
        if self.compiler.connect_timeout_secs == 0 {
            return Err(FactsError::InvalidArgument(
                "compiler.connect_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn compiler_command(&self) -> CompilerCommand {
        CompilerCommand::new(&self.compiler.path).with_args(self.compiler.args.iter().cloned())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            command: self.compiler_command(),
            connect_timeout: Duration::from_secs(self.compiler.connect_timeout_secs),
        }
    }
}

/// Accept an RFC 3339 date-time for `meta.generatedAt`, returned verbatim.
pub fn parse_generated_at(value: &str) -> Result<String> {
    DateTime::parse_from_rfc3339(value)
        .map(|_| value.to_string())
        .map_err(|_| {
            FactsError::InvalidArgument(
                "--generated-at must be a valid ISO date-time string".to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load_with_env(None, &SettingsOverrides::default(), env(&[])).unwrap();
        assert_eq!(settings.compiler.path, PathBuf::from("bicep"));
        assert!(settings.compiler.args.is_empty());
        assert_eq!(settings.compiler.connect_timeout_secs, 10);
        assert_eq!(settings.generate.component_id_from, ComponentIdSource::Resource);
        assert_eq!(settings.generate.schema_path, None);
        assert!(!settings.generate.continue_on_error);

        let options = settings.session_options();
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_file_then_env_then_cli() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[compiler]\npath = \"/opt/bicep/bicep\"\nconnect_timeout_secs = 30\n\n[generate]\ncomponent_id_from = \"file\""
        )
        .unwrap();

        let settings = Settings::load_with_env(
            Some(file.path()),
            &SettingsOverrides::default(),
            env(&[("BICEP_FACTS_COMPILER__CONNECT_TIMEOUT_SECS", "5")]),
        )
        .unwrap();
        assert_eq!(settings.compiler.path, PathBuf::from("/opt/bicep/bicep"));
        assert_eq!(settings.compiler.connect_timeout_secs, 5);
        assert_eq!(settings.generate.component_id_from, ComponentIdSource::File);

        let overrides = SettingsOverrides {
            compiler_path: Some(PathBuf::from("./bicep")),
            component_id_from: Some(ComponentIdSource::Resource),
            schema_path: Some(PathBuf::from("custom.schema.json")),
            continue_on_error: Some(true),
        };
        let settings = Settings::load_with_env(Some(file.path()), &overrides, env(&[])).unwrap();
        assert_eq!(settings.compiler.path, PathBuf::from("./bicep"));
        assert_eq!(settings.generate.component_id_from, ComponentIdSource::Resource);
        assert_eq!(settings.generate.schema_path, Some(PathBuf::from("custom.schema.json")));
        assert!(settings.generate.continue_on_error);
    }

    #[test]
    fn test_launcher_args_from_env() {
        let settings = Settings::load_with_env(
            None,
            &SettingsOverrides::default(),
            env(&[
                ("BICEP_FACTS_COMPILER__PATH", "dotnet"),
                ("BICEP_FACTS_COMPILER__ARGS", "/opt/bicep/bicep.dll"),
            ]),
        )
        .unwrap();
        let command = settings.compiler_command();
        assert_eq!(command.executable, PathBuf::from("dotnet"));
        assert_eq!(command.args, ["/opt/bicep/bicep.dll"]);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let err = Settings::load_with_env(
            None,
            &SettingsOverrides::default(),
            env(&[("BICEP_FACTS_COMPILER__CONNECT_TIMEOUT_SECS", "0")]),
        )
        .unwrap_err();
        assert!(matches!(err, FactsError::InvalidArgument(_)));
    }

    #[test]
    fn test_missing_config_file() {
        let err = Settings::load_with_env(
            Some(Path::new("/nonexistent/bicep-facts.toml")),
            &SettingsOverrides::default(),
            env(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, FactsError::Config(_)));
    }

    #[test]
    fn test_generated_at_validation() {
        assert_eq!(
            parse_generated_at("2024-05-01T12:00:00.000Z").unwrap(),
            "2024-05-01T12:00:00.000Z"
        );
        assert!(parse_generated_at("2024-05-01T12:00:00+02:00").is_ok());
        assert!(parse_generated_at("yesterday").is_err());
    }
}
