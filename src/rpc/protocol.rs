//! JSON-RPC envelopes and the compiler's request/response payloads.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `bicep/version`
pub const METHOD_VERSION: &str = "bicep/version";
/// `bicep/compile`
pub const METHOD_COMPILE: &str = "bicep/compile";
/// `bicep/getMetadata`
pub const METHOD_GET_METADATA: &str = "bicep/getMetadata";
/// `bicep/getDeploymentGraph`
pub const METHOD_GET_DEPLOYMENT_GRAPH: &str = "bicep/getDeploymentGraph";

/// Graph node type the compiler uses for nested deployments.
pub const MODULE_NODE_TYPE: &str = "<module>";

/// JSON-RPC method-not-found error code.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Outbound request.
#[derive(Debug, Serialize)]
pub(crate) struct RequestMessage<'a, P> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

/// Outbound response, only used to refuse server-initiated requests.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponseMessage {
    pub jsonrpc: &'static str,
    pub id: Value,
    pub error: ErrorObject,
}

/// Any inbound message: a response, a notification or a request.
#[derive(Debug, Deserialize)]
pub(crate) struct IncomingMessage {
    /// `Some(Value::Null)` when the peer sent `"id": null`.
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Parameters of `bicep/version`.
#[derive(Debug, Default, Serialize)]
pub struct VersionParams {}

/// Parameters of the per-file methods.
#[derive(Debug, Serialize)]
pub struct PathParams<'a> {
    pub path: &'a str,
}

/// Result of `bicep/version`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}

/// One compiler diagnostic; other fields the compiler sends are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileDiagnostic {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Result of `bicep/compile`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompileResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub contents: Option<String>,
    #[serde(default)]
    pub diagnostics: Vec<CompileDiagnostic>,
}

/// Name and description of a declared parameter or output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMetadata {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Result of `bicep/getMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub parameters: Vec<SymbolMetadata>,
    #[serde(default)]
    pub outputs: Vec<SymbolMetadata>,
}

/// One node of the deployment graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub name: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub relative_path: Option<String>,
}

impl GraphNode {
    /// Whether this node stands for a nested deployment.
    pub fn is_module(&self) -> bool {
        self.node_type == MODULE_NODE_TYPE
    }
}

/// Result of `bicep/getDeploymentGraph`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeploymentGraph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
}
