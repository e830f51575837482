//! The operations facts assembly needs from a compiler.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::rpc::protocol::{CompileResult, DeploymentGraph, Metadata};

/// Typed access to the compiler's four JSON-RPC methods.
///
/// [`RpcSession`](crate::rpc::RpcSession) is the production implementation.
/// Calls may be issued concurrently.
#[async_trait]
pub trait CompilerClient: Send + Sync {
    /// Compiler version string.
    async fn version(&self) -> Result<String>;

    /// Compile one source file to its template document.
    async fn compile(&self, path: &Path) -> Result<CompileResult>;

    /// Declared parameter and output descriptions.
    async fn get_metadata(&self, path: &Path) -> Result<Metadata>;

    /// Resource and module nodes of the file's deployment graph.
    async fn get_deployment_graph(&self, path: &Path) -> Result<DeploymentGraph>;
}
