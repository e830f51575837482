//! Common test utilities: an in-memory compiler and a scripted JSON-RPC peer

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bicep_facts_core::{
    rpc::{CompileDiagnostic, CompileResult, CompilerClient, DeploymentGraph, GraphNode, Metadata},
    FactsError, Result,
};
use serde_json::Value;
use tokio::sync::Barrier;

pub const COMPILER_VERSION: &str = "0.30.23";

/// Compiler output for one source file.
#[derive(Debug, Clone, Default)]
pub struct CannedOutput {
    pub compile: CompileResult,
    pub metadata: Metadata,
    pub graph: DeploymentGraph,
}

impl CannedOutput {
    pub fn compiled(template: Value) -> Self {
        Self {
            compile: CompileResult {
                success: true,
                contents: Some(template.to_string()),
                diagnostics: vec![],
            },
            ..Self::default()
        }
    }

    pub fn failed(code: &str, message: &str) -> Self {
        Self {
            compile: CompileResult {
                success: false,
                contents: None,
                diagnostics: vec![CompileDiagnostic {
                    code: code.to_string(),
                    message: message.to_string(),
                }],
            },
            ..Self::default()
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<GraphNode>) -> Self {
        self.graph = DeploymentGraph { nodes };
        self
    }
}

pub fn node(name: &str, node_type: &str, relative_path: Option<&str>) -> GraphNode {
    GraphNode {
        name: name.to_string(),
        node_type: node_type.to_string(),
        relative_path: relative_path.map(str::to_string),
    }
}

/// `CompilerClient` answering from canned per-file outputs.
///
/// With a barrier installed, each per-file call waits at it before answering,
/// so a file only completes when all three calls are in flight together.
#[derive(Default)]
pub struct MockCompiler {
    outputs: HashMap<PathBuf, CannedOutput>,
    barrier: Option<Arc<Barrier>>,
    pub version_calls: AtomicUsize,
    pub file_calls: AtomicUsize,
}

impl MockCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>, output: CannedOutput) -> Self {
        self.outputs.insert(path.into(), output);
        self
    }

    pub fn with_barrier(mut self) -> Self {
        self.barrier = Some(Arc::new(Barrier::new(3)));
        self
    }

    async fn lookup(&self, path: &Path) -> Result<&CannedOutput> {
        self.file_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        self.outputs.get(path).ok_or_else(|| FactsError::Remote {
            method: "bicep/compile".to_string(),
            code: -32000,
            message: format!("unknown file {}", path.display()),
            stderr: String::new(),
        })
    }
}

#[async_trait]
impl CompilerClient for MockCompiler {
    async fn version(&self) -> Result<String> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        Ok(COMPILER_VERSION.to_string())
    }

    async fn compile(&self, path: &Path) -> Result<CompileResult> {
        Ok(self.lookup(path).await?.compile.clone())
    }

    async fn get_metadata(&self, path: &Path) -> Result<Metadata> {
        Ok(self.lookup(path).await?.metadata.clone())
    }

    async fn get_deployment_graph(&self, path: &Path) -> Result<DeploymentGraph> {
        Ok(self.lookup(path).await?.graph.clone())
    }
}

#[cfg(unix)]
#[allow(unused_imports)]
pub use peer::*;

#[cfg(unix)]
mod peer {
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use bicep_facts_core::rpc::{
        framing::{read_message, write_message},
        CompilerCommand,
    };
    use serde_json::{json, Value};
    use tokio::io::BufReader;
    use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::UnixStream;

    /// A `/bin/sh` stand-in for the compiler.
    ///
    /// `--version` prints a banner. In JSON-RPC mode the endpoint it was given
    /// is written to `endpoint_file` and the process sleeps, leaving the
    /// connection to the test.
    pub fn fake_compiler(endpoint_file: &Path) -> CompilerCommand {
        let script = format!(
            r#"if [ "$1" = "--version" ]; then echo "Bicep CLI version 0.30.23"; exit 0; fi; echo "workspace loaded" >&2; echo "$3" > '{}'; exec sleep 30"#,
            endpoint_file.display()
        );
        CompilerCommand::new("/bin/sh").with_args(["-c".to_string(), script, "fake-bicep".to_string()])
    }

    /// A compiler that starts but never connects.
    pub fn silent_compiler(stderr_line: &str) -> CompilerCommand {
        let script = format!("echo '{}' >&2; exec sleep 30", stderr_line);
        CompilerCommand::new("/bin/sh").with_args(["-c".to_string(), script, "fake-bicep".to_string()])
    }

    /// Test side of the connection, playing the compiler.
    pub struct Peer {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl Peer {
        /// Wait for the fake compiler to report its endpoint and connect to it.
        pub async fn connect(endpoint_file: &Path) -> Peer {
            let endpoint = wait_for_endpoint(endpoint_file).await;
            let stream = UnixStream::connect(&endpoint).await.unwrap();
            let (reader, writer) = stream.into_split();
            Peer {
                reader: BufReader::new(reader),
                writer,
            }
        }

        /// Next inbound message, or `None` once the session hung up.
        pub async fn recv(&mut self) -> Option<Value> {
            let payload = read_message(&mut self.reader).await.ok()??;
            Some(serde_json::from_slice(&payload).unwrap())
        }

        pub async fn send(&mut self, message: Value) {
            let payload = serde_json::to_vec(&message).unwrap();
            write_message(&mut self.writer, &payload).await.unwrap();
        }

        pub async fn respond(&mut self, id: &Value, result: Value) {
            self.send(json!({"jsonrpc": "2.0", "id": id, "result": result})).await;
        }

        pub async fn respond_error(&mut self, id: &Value, code: i64, message: &str) {
            self.send(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": code, "message": message}
            }))
            .await;
        }

        /// Answer requests with `handler` until the session hangs up.
        pub async fn serve<F>(mut self, handler: F)
        where
            F: Fn(&str, &Value) -> Value,
        {
            while let Some(request) = self.recv().await {
                let method = request["method"].as_str().unwrap_or_default().to_string();
                let result = handler(&method, &request["params"]);
                self.respond(&request["id"], result).await;
            }
        }
    }

    async fn wait_for_endpoint(endpoint_file: &Path) -> PathBuf {
        for _ in 0..500 {
            if let Ok(text) = tokio::fs::read_to_string(endpoint_file).await {
                if text.ends_with('\n') {
                    return PathBuf::from(text.trim_end());
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("fake compiler never reported its endpoint");
    }
}
