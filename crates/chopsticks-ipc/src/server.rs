//! Server side of the IPC transport: accepts connections from workload
//! processes and streams parsed records to the aggregator.
//!
//! Framing and accept-loop semantics ported from
//! `examples/original_source/src/chopsticks/metrics/ipc.py`'s
//! `MetricsIPCServer`, with one deliberate divergence required by
//! `spec.md` §4.1 ("a connection handler must not block the accept loop"):
//! the Python original serves one connection to completion before accepting
//! the next; this server spawns a task per connection instead.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::IpcError;
use crate::frame::IpcFrame;

/// A line longer than this is a parse failure, not an unbounded read.
const MAX_LINE_BYTES: usize = 1024 * 1024;

pub struct MetricsIpcServer {
    socket_path: PathBuf,
    listener: UnixListener,
    shutdown_tx: watch::Sender<bool>,
}

impl MetricsIpcServer {
    /// Bind the server socket, removing a stale one at the same path first
    /// (`spec.md` §4.3 startup step 3).
    pub fn bind(socket_path: impl AsRef<Path>) -> Result<Self, IpcError> {
        let socket_path = socket_path.as_ref().to_path_buf();
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }
        let listener =
            UnixListener::bind(&socket_path).map_err(|e| IpcError::BindFailed {
                path: socket_path.display().to_string(),
                source: e,
            })?;
        info!(path = %socket_path.display(), "ipc server listening");

        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            socket_path,
            listener,
            shutdown_tx,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// A handle that stops the accept loop when dropped or told to shut down.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Accept connections until told to shut down, forwarding every
    /// successfully-parsed record to `records_tx`. Each connection is handled
    /// on its own task so a slow or stalled producer never blocks new
    /// connections from being accepted.
    pub async fn run(self, records_tx: mpsc::Sender<IpcFrame>) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let tx = records_tx.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, tx).await;
                            });
                        }
                        Err(e) => warn!(error = %e, "ipc accept failed"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        debug!("ipc accept loop stopping on shutdown signal");
                        break;
                    }
                }
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, records_tx: mpsc::Sender<IpcFrame>) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line).await;
        match read {
            Ok(0) => break, // EOF; a partial trailing frame (no newline) is discarded.
            Ok(_) => {
                if !line.ends_with('\n') {
                    // EOF hit mid-line: discard the partial frame and stop.
                    break;
                }
                let trimmed = line.trim_end();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed.len() > MAX_LINE_BYTES {
                    warn!(len = trimmed.len(), "dropping oversized ipc line");
                    continue;
                }
                match serde_json::from_str::<IpcFrame>(trimmed) {
                    Ok(frame) => {
                        if records_tx.send(frame).await.is_err() {
                            warn!("ipc record channel closed, dropping connection");
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to parse metric record, skipping line"),
                }
            }
            Err(e) => {
                warn!(error = %e, "ipc connection read error");
                break;
            }
        }
    }
}
