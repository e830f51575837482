//! Error types for facts generation.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A specialized Result type for facts operations.
pub type Result<T> = std::result::Result<T, FactsError>;

/// The error type for facts operations.
#[derive(Debug, Error)]
pub enum FactsError {
    /// The compiler never connected to the session endpoint.
    #[error("Timed out waiting for Bicep JSON-RPC connection after {}ms.{}", .timeout.as_millis(), stderr_suffix(.stderr))]
    ConnectionTimeout { timeout: Duration, stderr: String },

    /// The compiler executable is missing or cannot be run.
    #[error("Bicep CLI not found or failed to run ({executable}): {reason}")]
    SubprocessUnavailable { executable: String, reason: String },

    /// The compiler reported failure or returned no template.
    #[error("{message}")]
    CompilationFailed { path: PathBuf, message: String },

    /// The assembled record violates the facts contract.
    #[error("{}", join_violations(.violations))]
    SchemaValidationFailed { violations: Vec<String> },

    /// The compiler answered a request with a JSON-RPC error object.
    #[error("{method} failed: {message} (code {code}).{}", stderr_suffix(.stderr))]
    Remote {
        method: String,
        code: i64,
        message: String,
        stderr: String,
    },

    /// The connection ended while requests were outstanding.
    #[error("Bicep JSON-RPC connection closed.{}", stderr_suffix(.stderr))]
    ConnectionClosed { stderr: String },

    /// A frame or message did not follow the JSON-RPC wire format.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The compiled template could not be parsed.
    #[error("invalid compiled template for {}: {reason}", .path.display())]
    InvalidTemplate { path: PathBuf, reason: String },

    /// A user-supplied option was rejected.
    #[error("{0}")]
    InvalidArgument(String),

    /// The facts contract could not be loaded or compiled.
    #[error("schema error: {0}")]
    Schema(String),

    /// Some files failed while running with continue-on-error.
    #[error("{failed} of {total} file(s) failed")]
    FilesFailed { failed: usize, total: usize },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FactsError {
    /// Build a compilation failure from `code: message` diagnostics.
    pub fn compilation_failed<'a, I>(path: impl Into<PathBuf>, diagnostics: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let path = path.into();
        let summary = diagnostics
            .into_iter()
            .map(|(code, message)| format!("{}: {}", code, message))
            .collect::<Vec<_>>()
            .join(" | ");
        let message = format!("Bicep compilation failed for {}. {}", path.display(), summary)
            .trim()
            .to_string();
        FactsError::CompilationFailed { path, message }
    }

    /// Whether the failure only concerns the file being processed.
    ///
    /// Transport, process and configuration failures affect the whole run.
    pub fn is_file_scoped(&self) -> bool {
        matches!(
            self,
            FactsError::CompilationFailed { .. }
                | FactsError::SchemaValidationFailed { .. }
                | FactsError::InvalidTemplate { .. }
        )
    }
}

fn join_violations(violations: &[String]) -> String {
    if violations.is_empty() {
        "Schema validation failed".to_string()
    } else {
        violations.join("; ")
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(" Compiler stderr: {}", trimmed)
    }
}
