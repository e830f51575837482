//! Compiler subprocess supervision.
//!
//! The compiler runs as `<executable> [launcher args] jsonrpc --pipe <endpoint>`
//! with stdin and stdout discarded. Its stderr is accumulated into a buffer
//! owned by [`CompilerProcess`] so failures can be reported with whatever the
//! compiler printed. A watcher task owns the child, records its exit status
//! and performs the kill when asked.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{FactsError, Result};
use crate::rpc::pipe::PipeEndpoint;

/// How to launch the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerCommand {
    /// Executable to run.
    pub executable: PathBuf,
    /// Arguments placed before the `jsonrpc` subcommand.
    pub args: Vec<String>,
}

impl CompilerCommand {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args(&self.args);
        cmd
    }

    fn display_name(&self) -> String {
        self.executable.display().to_string()
    }

    /// Run `<executable> [args] --version` to confirm the compiler is usable.
    ///
    /// Returns the trimmed version banner.
    pub async fn probe(&self) -> Result<String> {
        let output = self
            .command()
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| FactsError::SubprocessUnavailable {
                executable: self.display_name(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(FactsError::SubprocessUnavailable {
                executable: self.display_name(),
                reason: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// A running compiler bound to one session endpoint.
#[derive(Debug)]
pub struct CompilerProcess {
    pid: Option<u32>,
    stderr: Arc<Mutex<String>>,
    exit_status: Arc<Mutex<Option<ExitStatus>>>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl CompilerProcess {
    /// Spawn the compiler in JSON-RPC mode against `endpoint`.
    pub fn spawn(command: &CompilerCommand, endpoint: &PipeEndpoint) -> Result<Self> {
        let mut cmd = command.command();
        cmd.args(["jsonrpc", "--pipe", endpoint.name.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| FactsError::SubprocessUnavailable {
            executable: command.display_name(),
            reason: e.to_string(),
        })?;

        let pid = child.id();
        debug!(
            executable = %command.executable.display(),
            pid = ?pid,
            endpoint = %endpoint.name,
            "Spawned compiler"
        );

        let stderr = Arc::new(Mutex::new(String::new()));
        if let Some(pipe) = child.stderr.take() {
            tokio::spawn(capture_stderr(pipe, stderr.clone()));
        }

        let exit_status = Arc::new(Mutex::new(None));
        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(watch(child, kill_rx, exit_status.clone()));

        Ok(Self {
            pid,
            stderr,
            exit_status,
            kill_tx: Some(kill_tx),
        })
    }

    /// OS process id, if the process had not already exited when spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Everything the compiler has written to stderr so far.
    pub fn stderr(&self) -> String {
        self.stderr.lock().clone()
    }

    /// Exit status once the process has terminated.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        *self.exit_status.lock()
    }

    /// Request forceful termination without waiting for it.
    ///
    /// Safe to call repeatedly and after the process has exited.
    pub fn kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            // The watcher is gone once the process has exited.
            let _ = tx.send(());
        }
    }
}

impl Drop for CompilerProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

async fn capture_stderr(mut pipe: ChildStderr, buffer: Arc<Mutex<String>>) {
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let text = String::from_utf8_lossy(&chunk[..n]);
                debug!(target: "bicep_facts_core::compiler", "{}", text.trim_end());
                buffer.lock().push_str(&text);
            }
            Err(e) => {
                debug!(error = %e, "Stopped reading compiler stderr");
                break;
            }
        }
    }
}

async fn watch(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    exit_status: Arc<Mutex<Option<ExitStatus>>>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        // A dropped sender also lands here.
        _ = kill_rx => {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "Failed to send kill signal to compiler");
            }
            child.wait().await
        }
    };

    match status {
        Ok(status) => {
            debug!(status = %status, "Compiler exited");
            *exit_status.lock() = Some(status);
        }
        Err(e) => warn!(error = %e, "Error waiting for compiler"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn shell(script: &str) -> CompilerCommand {
        CompilerCommand::new("/bin/sh").with_args(["-c", script, "fake-bicep"])
    }

    async fn wait_for_exit(process: &CompilerProcess) -> ExitStatus {
        for _ in 0..200 {
            if let Some(status) = process.exit_status() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("process did not exit");
    }

    #[tokio::test]
    async fn test_stderr_is_captured() {
        let endpoint = PipeEndpoint::generate();
        let process = CompilerProcess::spawn(&shell("echo \"listening on $3\" >&2"), &endpoint).unwrap();

        let status = wait_for_exit(&process).await;
        assert!(status.success());

        // stderr EOF may trail the exit notification slightly
        for _ in 0..100 {
            if !process.stderr().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(process.stderr().trim(), format!("listening on {}", endpoint.name));
    }

    #[tokio::test]
    async fn test_kill_terminates_and_is_repeatable() {
        let endpoint = PipeEndpoint::generate();
        let mut process = CompilerProcess::spawn(&shell("exec sleep 30"), &endpoint).unwrap();
        assert!(process.pid().is_some());

        process.kill();
        process.kill();

        let status = wait_for_exit(&process).await;
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_spawn_missing_executable() {
        let endpoint = PipeEndpoint::generate();
        let err = CompilerProcess::spawn(&CompilerCommand::new("/nonexistent/bicep"), &endpoint)
            .unwrap_err();
        assert!(matches!(err, FactsError::SubprocessUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_probe_reports_failure() {
        let ok = shell("echo 'Bicep CLI version 0.30.23'").probe().await.unwrap();
        assert_eq!(ok, "Bicep CLI version 0.30.23");

        let err = shell("echo boom >&2; exit 3").probe().await.unwrap_err();
        match err {
            FactsError::SubprocessUnavailable { reason, .. } => assert!(reason.contains("boom")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
