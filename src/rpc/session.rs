//! One compiler process and its connection, started lazily and torn down
//! as a unit.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{FactsError, Result};
use crate::rpc::client::CompilerClient;
use crate::rpc::connection::RpcConnection;
use crate::rpc::pipe::{PipeEndpoint, PipeListener};
use crate::rpc::process::{CompilerCommand, CompilerProcess};
use crate::rpc::protocol::{
    CompileResult, DeploymentGraph, Metadata, PathParams, VersionParams, VersionResponse,
    METHOD_COMPILE, METHOD_GET_DEPLOYMENT_GRAPH, METHOD_GET_METADATA, METHOD_VERSION,
};

/// How long the compiler gets to connect back to our endpoint.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub command: CompilerCommand,
    pub connect_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            command: CompilerCommand::new("bicep"),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Observable lifecycle phase of a [`RpcSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unstarted,
    Starting,
    Connected,
    Stopped,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Unstarted => "unstarted",
            SessionPhase::Starting => "starting",
            SessionPhase::Connected => "connected",
            SessionPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

enum SessionState {
    Unstarted,
    /// Spawned but never connected; only reachable after a failed connect.
    Starting(CompilerProcess),
    Connected {
        process: CompilerProcess,
        connection: Arc<RpcConnection>,
    },
    Stopped,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Unstarted => SessionPhase::Unstarted,
            SessionState::Starting(_) => SessionPhase::Starting,
            SessionState::Connected { .. } => SessionPhase::Connected,
            SessionState::Stopped => SessionPhase::Stopped,
        }
    }

    fn process(&self) -> Option<&CompilerProcess> {
        match self {
            SessionState::Starting(process) | SessionState::Connected { process, .. } => {
                Some(process)
            }
            SessionState::Unstarted | SessionState::Stopped => None,
        }
    }
}

/// Owns at most one compiler process and one connection to it.
///
/// Every typed operation starts the session on first use. [`stop`](Self::stop)
/// must be called on every exit path; dropping the session also kills the
/// process but skips the graceful close.
pub struct RpcSession {
    options: SessionOptions,
    state: Mutex<SessionState>,
}

impl RpcSession {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            state: Mutex::new(SessionState::Unstarted),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase()
    }

    /// Everything the compiler has written to stderr, empty without a process.
    pub async fn diagnostics(&self) -> String {
        self.state
            .lock()
            .await
            .process()
            .map(CompilerProcess::stderr)
            .unwrap_or_default()
    }

    /// Spawn the compiler and wait for it to connect.
    ///
    /// A no-op when already connected. On timeout the process is left running
    /// in the starting phase so that [`stop`](Self::stop) can reap it.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.start_locked(&mut state).await.map(|_| ())
    }

    async fn start_locked(&self, state: &mut SessionState) -> Result<Arc<RpcConnection>> {
        if let SessionState::Connected { connection, .. } = state {
            return Ok(connection.clone());
        }

        if let SessionState::Starting(process) = state {
            debug!(pid = ?process.pid(), "Discarding compiler that never connected");
            process.kill();
        }
        *state = SessionState::Unstarted;

        let endpoint = PipeEndpoint::generate();
        let mut listener = PipeListener::bind(&endpoint)?;
        let process = CompilerProcess::spawn(&self.options.command, &endpoint)?;
        debug!(endpoint = %endpoint.name, pid = ?process.pid(), "Waiting for compiler to connect");

        let accepted = tokio::time::timeout(self.options.connect_timeout, listener.accept()).await;
        let (reader, writer) = match accepted {
            Ok(Ok(halves)) => halves,
            Ok(Err(e)) => {
                *state = SessionState::Starting(process);
                return Err(e.into());
            }
            Err(_) => {
                let stderr = process.stderr();
                *state = SessionState::Starting(process);
                return Err(FactsError::ConnectionTimeout {
                    timeout: self.options.connect_timeout,
                    stderr,
                });
            }
        };
        drop(listener);

        let connection = Arc::new(RpcConnection::open(reader, writer));
        info!(pid = ?process.pid(), "Connected to Bicep compiler");
        *state = SessionState::Connected {
            process,
            connection: connection.clone(),
        };
        Ok(connection)
    }

    /// Close the connection, kill the process and release both.
    ///
    /// Never fails: a close error is logged and the kill happens regardless.
    /// Calling it before `start` or more than once does nothing.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, SessionState::Stopped) {
            SessionState::Unstarted => *state = SessionState::Unstarted,
            SessionState::Stopped => {}
            SessionState::Starting(mut process) => {
                debug!(pid = ?process.pid(), "Killing compiler that never connected");
                process.kill();
            }
            SessionState::Connected {
                mut process,
                connection,
            } => {
                if let Err(e) = connection.close().await {
                    warn!(error = %e, "Failed to close compiler connection");
                }
                process.kill();
                debug!(pid = ?process.pid(), "Compiler session stopped");
            }
        }
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let connection = {
            let mut state = self.state.lock().await;
            self.start_locked(&mut state).await?
        };

        match connection.request(method, params).await {
            Err(FactsError::ConnectionClosed { .. }) => Err(FactsError::ConnectionClosed {
                stderr: self.diagnostics().await,
            }),
            Err(FactsError::Remote {
                method,
                code,
                message,
                ..
            }) => Err(FactsError::Remote {
                method,
                code,
                message,
                stderr: self.diagnostics().await,
            }),
            other => other,
        }
    }
}

impl fmt::Debug for RpcSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcSession")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CompilerClient for RpcSession {
    async fn version(&self) -> Result<String> {
        let response: VersionResponse = self.call(METHOD_VERSION, VersionParams::default()).await?;
        Ok(response.version)
    }

    async fn compile(&self, path: &Path) -> Result<CompileResult> {
        let path = path.to_string_lossy();
        self.call(METHOD_COMPILE, PathParams { path: &path }).await
    }

    async fn get_metadata(&self, path: &Path) -> Result<Metadata> {
        let path = path.to_string_lossy();
        self.call(METHOD_GET_METADATA, PathParams { path: &path }).await
    }

    async fn get_deployment_graph(&self, path: &Path) -> Result<DeploymentGraph> {
        let path = path.to_string_lossy();
        self.call(METHOD_GET_DEPLOYMENT_GRAPH, PathParams { path: &path })
            .await
    }
}
