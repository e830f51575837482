//! Local endpoint naming and listening for the compiler connection.
//!
//! Every session gets a fresh endpoint:
//! - Unix: `<tmpdir>/bicep-<hex>.sock`, used both as the name handed to the
//!   compiler and as the socket path we listen on
//! - Windows: `bicep-<hex>-sock` as the name, `\\.\pipe\bicep-<hex>-sock` as
//!   the path
//!
//! The compiler connects to the endpoint as a client, so our side listens.

use std::io;
use std::path::PathBuf;

use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite};

/// Random bytes in the endpoint suffix (168 bits).
const SUFFIX_BYTES: usize = 21;

/// Fixed endpoint prefix expected by the compiler tooling.
const ENDPOINT_PREFIX: &str = "bicep";

/// Read half of an established endpoint connection.
pub type PipeReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of an established endpoint connection.
pub type PipeWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Two views of one session endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeEndpoint {
    /// Platform identifier passed to the compiler's `--pipe` argument.
    pub name: String,
    /// Location our listener binds to.
    pub path: PathBuf,
}

impl PipeEndpoint {
    /// Generate a new endpoint with a cryptographically random suffix.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SUFFIX_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_suffix(&hex::encode(bytes))
    }

    #[cfg(windows)]
    fn from_suffix(suffix: &str) -> Self {
        let name = format!("{}-{}-sock", ENDPOINT_PREFIX, suffix);
        let path = PathBuf::from(format!(r"\\.\pipe\{}", name));
        Self { name, path }
    }

    #[cfg(not(windows))]
    fn from_suffix(suffix: &str) -> Self {
        let path = std::env::temp_dir().join(format!("{}-{}.sock", ENDPOINT_PREFIX, suffix));
        Self {
            name: path.to_string_lossy().into_owned(),
            path,
        }
    }
}

/// Server side of a session endpoint, bound before the compiler starts.
#[derive(Debug)]
pub struct PipeListener {
    path: PathBuf,
    #[cfg(unix)]
    listener: tokio::net::UnixListener,
    #[cfg(windows)]
    server: Option<tokio::net::windows::named_pipe::NamedPipeServer>,
}

impl PipeListener {
    /// Bind the endpoint. Must be called from within a Tokio runtime.
    #[cfg(unix)]
    pub fn bind(endpoint: &PipeEndpoint) -> io::Result<Self> {
        let listener = tokio::net::UnixListener::bind(&endpoint.path)?;
        Ok(Self {
            path: endpoint.path.clone(),
            listener,
        })
    }

    /// Bind the endpoint. Must be called from within a Tokio runtime.
    #[cfg(windows)]
    pub fn bind(endpoint: &PipeEndpoint) -> io::Result<Self> {
        use tokio::net::windows::named_pipe::ServerOptions;

        let server = ServerOptions::new()
            .first_pipe_instance(true)
            .create(&endpoint.path)?;
        Ok(Self {
            path: endpoint.path.clone(),
            server: Some(server),
        })
    }

    /// Wait for the compiler to connect and split the stream.
    #[cfg(unix)]
    pub async fn accept(&mut self) -> io::Result<(PipeReader, PipeWriter)> {
        let (stream, _) = self.listener.accept().await?;
        let (reader, writer) = stream.into_split();
        Ok((Box::new(reader), Box::new(writer)))
    }

    /// Wait for the compiler to connect and split the stream.
    #[cfg(windows)]
    pub async fn accept(&mut self) -> io::Result<(PipeReader, PipeWriter)> {
        let server = self
            .server
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "pipe already accepted"))?;
        server.connect().await?;
        let (reader, writer) = tokio::io::split(server);
        Ok((Box::new(reader), Box::new(writer)))
    }

    /// Path this listener is bound to.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[cfg(unix)]
impl Drop for PipeListener {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::debug!(path = %self.path.display(), error = %e, "Failed to remove socket file");
            }
        }
    }
}
