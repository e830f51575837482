//! Reading the compiled template document.
//!
//! Compiled templates are loosely structured JSON, so most fields are kept as
//! [`Value`] and probed with the helpers here.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{FactsError, Result};
use crate::facts::model::ParamType;

/// Resource type of a nested deployment.
pub const DEPLOYMENT_RESOURCE_TYPE: &str = "microsoft.resources/deployments";

/// The parts of a compiled template facts generation reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Template {
    #[serde(rename = "$schema", default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
    #[serde(default)]
    pub outputs: Option<Map<String, Value>>,
    #[serde(default)]
    pub resources: Value,
}

impl Template {
    /// Parse the compiler's `contents` string.
    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|e| FactsError::InvalidTemplate {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn schema_url(&self) -> Option<&str> {
        self.schema.as_ref().and_then(Value::as_str)
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.parameters.iter().flatten()
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.outputs.iter().flatten()
    }

    /// Every resource, including those nested under a `resources` array,
    /// in document order.
    pub fn all_resources(&self) -> Vec<&Value> {
        let mut collected = Vec::new();
        walk_resources(&self.resources, &mut collected);
        collected
    }
}

fn walk_resources<'a>(resources: &'a Value, collected: &mut Vec<&'a Value>) {
    let Some(resources) = resources.as_array() else {
        return;
    };
    for resource in resources {
        collected.push(resource);
        if let Some(children) = resource.get("resources") {
            walk_resources(children, collected);
        }
    }
}

/// Whether `resource` is a nested deployment.
pub fn is_deployment_resource(resource: &Value) -> bool {
    resource
        .get("type")
        .and_then(Value::as_str)
        .map_or(false, |t| t.eq_ignore_ascii_case(DEPLOYMENT_RESOURCE_TYPE))
}

/// A string whose trimmed form is wrapped in square brackets.
pub fn is_expression(value: &Value) -> bool {
    value.as_str().map_or(false, |s| {
        let trimmed = s.trim();
        trimmed.starts_with('[') && trimmed.ends_with(']')
    })
}

/// Loose truthiness used for optional template flags: absent, `null`,
/// `false`, `0` and `""` all count as unset.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Map a declared type onto the five facts types. Secure types map onto
/// their plain counterparts; anything unrecognised becomes `object`.
pub fn normalize_type(declared: Option<&Value>) -> ParamType {
    let Some(declared) = declared.and_then(Value::as_str) else {
        return ParamType::Object;
    };
    match declared.to_ascii_lowercase().as_str() {
        "string" | "securestring" => ParamType::String,
        "int" => ParamType::Int,
        "bool" => ParamType::Bool,
        "array" => ParamType::Array,
        _ => ParamType::Object,
    }
}

/// Declared type starts with `secure`.
pub fn is_secure_type(declared: Option<&Value>) -> bool {
    declared
        .and_then(Value::as_str)
        .map_or(false, |t| t.to_ascii_lowercase().starts_with("secure"))
}

/// `metadata.description` of a declaration, when it is a string.
pub fn metadata_description(definition: &Value) -> Option<&str> {
    definition
        .get("metadata")
        .and_then(|m| m.get("description"))
        .and_then(Value::as_str)
}
