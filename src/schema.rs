//! The `facts.v1` contract.

use std::path::Path;

use jsonschema::{Draft, Validator};
use serde_json::Value;
use tracing::debug;

use crate::error::{FactsError, Result};

/// Contract bundled with the binary.
pub const EMBEDDED_SCHEMA: &str = include_str!("../schemas/facts.v1.schema.json");

/// A compiled JSON Schema (draft 2020-12, formats asserted).
pub struct FactsSchema {
    validator: Validator,
}

impl FactsSchema {
    /// Compile the bundled contract.
    pub fn embedded() -> Result<Self> {
        Self::parse(EMBEDDED_SCHEMA)
    }

    /// Compile a contract from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading facts schema");
        let text = std::fs::read_to_string(path)
            .map_err(|e| FactsError::Schema(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Compile a contract from its JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| FactsError::Schema(format!("schema is not valid JSON: {}", e)))?;
        Self::from_value(&document)
    }

    pub fn from_value(document: &Value) -> Result<Self> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .should_validate_formats(true)
            .build(document)
            .map_err(|e| FactsError::Schema(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Check `instance`, reporting every violation rather than the first.
    pub fn validate(&self, instance: &Value) -> Result<()> {
        let violations: Vec<String> = self
            .validator
            .iter_errors(instance)
            .map(|error| format!("{} {}", error.instance_path, error))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(FactsError::SchemaValidationFailed { violations })
        }
    }
}

impl std::fmt::Debug for FactsSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactsSchema").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "schemaVersion": "facts.v1",
            "componentId": "virtualnetworks",
            "source": {
                "path": "main.bicep",
                "hash": "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
                "compilerVersion": "0.30.23"
            },
            "scopes": {"allowed": ["resourceGroup"], "default": "resourceGroup"},
            "parameters": [],
            "outputs": [],
            "capabilities": {"category": "unknown"},
            "meta": {"generatedAt": "2024-05-01T12:00:00.000Z", "generator": "bicep-facts@0.1.0"}
        })
    }

    #[test]
    fn test_embedded_schema_accepts_minimal_record() {
        let schema = FactsSchema::embedded().unwrap();
        schema.validate(&minimal()).unwrap();
    }

    #[test]
    fn test_all_violations_are_reported() {
        let schema = FactsSchema::embedded().unwrap();
        let mut record = minimal();
        record["componentId"] = json!("");
        record["source"]["hash"] = json!("not-a-hash");
        record["meta"]["generatedAt"] = json!("yesterday");

        match schema.validate(&record).unwrap_err() {
            FactsError::SchemaValidationFailed { violations } => {
                assert_eq!(violations.len(), 3, "{violations:?}");
                assert!(violations.iter().any(|v| v.starts_with("/componentId ")));
                assert!(violations.iter().any(|v| v.starts_with("/source/hash ")));
                assert!(violations.iter().any(|v| v.starts_with("/meta/generatedAt ")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let schema = FactsSchema::embedded().unwrap();
        let mut record = minimal();
        record["extra"] = json!(true);
        assert!(schema.validate(&record).is_err());
    }

    #[test]
    fn test_invalid_schema_document() {
        assert!(matches!(FactsSchema::parse("{"), Err(FactsError::Schema(_))));
        assert!(matches!(
            FactsSchema::from_value(&json!({"type": 12})),
            Err(FactsError::Schema(_))
        ));
        assert!(matches!(
            FactsSchema::from_path(Path::new("/nonexistent/facts.v1.schema.json")),
            Err(FactsError::Schema(_))
        ));
    }
}
