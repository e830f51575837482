//! The `facts.v1` record.
//!
//! These types only serialize. Optional fields that are `None` are left out of
//! the output entirely; a `Some(Value::Null)` is written as `null`.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Value of [`Facts::schema_version`].
pub const SCHEMA_VERSION: &str = "facts.v1";

/// Deployment target level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    Subscription,
    ResourceGroup,
    ManagementGroup,
    Tenant,
}

/// Normalized parameter or output type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Int,
    Bool,
    Array,
    Object,
}

/// How a parameter's default is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultKind {
    None,
    Literal,
    Expression,
}

/// Coarse purpose of a deployment, derived from its resource providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Networking,
    Compute,
    Data,
    Security,
    Messaging,
    Integration,
    Ai,
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Networking => "networking",
            Category::Compute => "compute",
            Category::Data => "data",
            Category::Security => "security",
            Category::Messaging => "messaging",
            Category::Integration => "integration",
            Category::Ai => "ai",
            Category::Unknown => "unknown",
        }
    }
}

/// Where the component id comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ComponentIdSource {
    /// Last segment of the first resource type, falling back to the file name.
    #[default]
    Resource,
    /// The source file name without `.bicep`.
    File,
}

/// Root record, one per source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Facts {
    pub schema_version: String,
    pub component_id: String,
    pub source: Source,
    pub scopes: Scopes,
    pub parameters: Vec<Parameter>,
    pub outputs: Vec<Output>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<Module>>,
    pub capabilities: Capabilities,
    pub meta: Meta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Path relative to the scanned root, `/`-separated.
    pub path: String,
    /// Lowercase hex SHA-256 of the file bytes.
    pub hash: String,
    pub compiler_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scopes {
    pub allowed: Vec<Scope>,
    pub default: Scope,
}

impl Scopes {
    /// A single allowed scope that is also the default.
    pub fn only(scope: Scope) -> Self {
        Self {
            allowed: vec![scope],
            default: scope,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    pub default_kind: DefaultKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive: Option<bool>,
}

/// Validation constraints copied from the parameter declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Value>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self == &Constraints::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    pub name: String,
    #[serde(rename = "type")]
    pub output_type: ParamType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Module {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    pub condition: ModuleCondition,
}

/// When a module is deployed. The expression is kept for callers but only
/// the kind is written out.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleCondition {
    Always,
    Conditional(Value),
    ForEach(Value),
}

impl ModuleCondition {
    pub fn kind(&self) -> &'static str {
        match self {
            ModuleCondition::Always => "always",
            ModuleCondition::Conditional(_) => "conditional",
            ModuleCondition::ForEach(_) => "foreach",
        }
    }
}

impl Serialize for ModuleCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Repr {
            kind: &'static str,
        }
        Repr { kind: self.kind() }.serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub generated_at: String,
    pub generator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<String>>,
}
