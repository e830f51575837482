//! JSON-RPC transport to the Bicep compiler.
//!
//! The compiler is launched as `bicep jsonrpc --pipe <endpoint>` and connects
//! back to a local endpoint we listen on: a Unix domain socket, or a named pipe
//! on Windows. A [`RpcSession`] owns the process and the connection together.

pub mod client;
pub mod connection;
pub mod framing;
pub mod pipe;
pub mod process;
pub mod protocol;
pub mod session;

pub use client::CompilerClient;
pub use connection::RpcConnection;
pub use pipe::{PipeEndpoint, PipeListener};
pub use process::{CompilerCommand, CompilerProcess};
pub use protocol::{CompileDiagnostic, CompileResult, DeploymentGraph, GraphNode, Metadata, SymbolMetadata};
pub use session::{RpcSession, SessionOptions, SessionPhase, DEFAULT_CONNECT_TIMEOUT};
