//! Multiplexed JSON-RPC connection.
//!
//! Requests may be issued concurrently from any number of tasks. Each gets a
//! fresh numeric id and a pending slot; a single reader task routes responses
//! back to their slot by id, so responses may arrive in any order.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{FactsError, Result};
use crate::rpc::framing::{read_message, write_message};
use crate::rpc::pipe::{PipeReader, PipeWriter};
use crate::rpc::protocol::{
    ErrorObject, ErrorResponseMessage, IncomingMessage, RequestMessage, METHOD_NOT_FOUND,
};

/// Upper bound on the graceful part of [`RpcConnection::close`].
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

enum Reply {
    Result(Value),
    Error(ErrorObject),
    /// The stream broke the protocol in a way that cannot be tied to one request.
    Fault(String),
}

/// In-flight requests keyed by id.
#[derive(Default)]
struct PendingTable {
    closed: bool,
    waiters: HashMap<u64, oneshot::Sender<Reply>>,
}

impl PendingTable {
    /// Mark the connection closed and release every waiter.
    fn close(&mut self) {
        self.closed = true;
        // Dropping the senders wakes each waiter with a receive error.
        self.waiters.clear();
    }

    /// Fail every current waiter with a protocol error.
    fn fault(&mut self, reason: &str) {
        for (_, tx) in self.waiters.drain() {
            let _ = tx.send(Reply::Fault(reason.to_string()));
        }
    }
}

/// One live connection to the compiler.
pub struct RpcConnection {
    writer: Arc<AsyncMutex<PipeWriter>>,
    pending: Arc<Mutex<PendingTable>>,
    next_id: AtomicU64,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl RpcConnection {
    /// Start listening for inbound frames on `reader`.
    pub fn open(reader: PipeReader, writer: PipeWriter) -> Self {
        let writer = Arc::new(AsyncMutex::new(writer));
        let pending = Arc::new(Mutex::new(PendingTable::default()));
        let reader_task = tokio::spawn(pump(reader, writer.clone(), pending.clone()));

        Self {
            writer,
            pending,
            next_id: AtomicU64::new(0),
            reader_task: Mutex::new(Some(reader_task)),
        }
    }

    /// Send a request and wait for its correlated response.
    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::to_vec(&RequestMessage {
            jsonrpc: "2.0",
            id,
            method,
            params,
        })?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if pending.closed {
                return Err(FactsError::ConnectionClosed {
                    stderr: String::new(),
                });
            }
            pending.waiters.insert(id, tx);
        }

        debug!(id, method, "Sending request");
        let sent = {
            let mut writer = self.writer.lock().await;
            write_message(&mut *writer, &payload).await
        };
        if let Err(e) = sent {
            self.pending.lock().waiters.remove(&id);
            return Err(e.into());
        }

        match rx.await {
            Ok(Reply::Result(result)) => {
                trace!(id, method, "Received response");
                Ok(serde_json::from_value(result)?)
            }
            Ok(Reply::Error(error)) => Err(FactsError::Remote {
                method: method.to_string(),
                code: error.code,
                message: error.message,
                stderr: String::new(),
            }),
            Ok(Reply::Fault(reason)) => Err(FactsError::Protocol(reason)),
            Err(_) => Err(FactsError::ConnectionClosed {
                stderr: String::new(),
            }),
        }
    }

    /// Whether the read side has ended or [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.pending.lock().closed
    }

    /// Stop reading, fail anything still pending, then close the write side.
    ///
    /// The reader is stopped first since it may hold the writer while
    /// answering the peer. Closing the write side is bounded by
    /// [`CLOSE_TIMEOUT`] so a peer that stopped reading cannot stall it.
    pub async fn close(&self) -> Result<()> {
        if let Some(task) = self.reader_task.lock().take() {
            task.abort();
        }
        self.pending.lock().close();

        let shutdown = tokio::time::timeout(CLOSE_TIMEOUT, async {
            let mut writer = self.writer.lock().await;
            writer.shutdown().await
        })
        .await;

        match shutdown {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(FactsError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("compiler connection did not close within {}ms", CLOSE_TIMEOUT.as_millis()),
            ))),
        }
    }
}

impl Drop for RpcConnection {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.get_mut().take() {
            task.abort();
        }
    }
}

async fn pump(
    reader: PipeReader,
    writer: Arc<AsyncMutex<PipeWriter>>,
    pending: Arc<Mutex<PendingTable>>,
) {
    let mut reader = BufReader::new(reader);
    loop {
        let frame = match read_message(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Compiler closed the connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read from compiler connection");
                if e.kind() == io::ErrorKind::InvalidData {
                    pending.lock().fault(&format!("malformed frame from compiler: {}", e));
                }
                break;
            }
        };

        let message: IncomingMessage = match serde_json::from_slice(&frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Discarding malformed message from compiler");
                continue;
            }
        };

        match (message.id, message.method) {
            (Some(Value::Null), None) => {
                // A reply to a request the peer could not parse; it names no id.
                let reason = match message.error {
                    Some(error) => format!(
                        "compiler rejected a request: {} (code {})",
                        error.message, error.code
                    ),
                    None => "compiler sent a response without a request id".to_string(),
                };
                warn!(reason = %reason, "Failing pending requests");
                pending.lock().fault(&reason);
            }
            (Some(id), None) => {
                let Some(id) = id.as_u64() else {
                    warn!(id = %id, "Discarding response with non-numeric id");
                    continue;
                };
                let reply = match message.error {
                    Some(error) => Reply::Error(error),
                    None => Reply::Result(message.result),
                };
                let waiter = pending.lock().waiters.remove(&id);
                match waiter {
                    // The caller may have given up on this request.
                    Some(tx) => {
                        let _ = tx.send(reply);
                    }
                    None => debug!(id, "Response for unknown request"),
                }
            }
            (Some(id), Some(method)) => {
                debug!(method = %method, "Refusing server-initiated request");
                if let Err(e) = refuse(&writer, id, &method).await {
                    warn!(error = %e, "Failed to answer server-initiated request");
                }
            }
            (None, Some(method)) => trace!(method = %method, "Ignoring notification"),
            (None, None) => debug!("Discarding message without id or method"),
        }
    }

    pending.lock().close();
}

async fn refuse(writer: &AsyncMutex<PipeWriter>, id: Value, method: &str) -> Result<()> {
    let payload = serde_json::to_vec(&ErrorResponseMessage {
        jsonrpc: "2.0",
        id,
        error: ErrorObject {
            code: METHOD_NOT_FOUND,
            message: format!("Unhandled method {}", method),
            data: None,
        },
    })?;
    let mut writer = writer.lock().await;
    write_message(&mut *writer, &payload).await?;
    Ok(())
}
