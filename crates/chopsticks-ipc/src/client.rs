//! Client side of the IPC transport: a transient connection held by a
//! workload process.
//!
//! Semantics ported from
//! `examples/original_source/src/chopsticks/metrics/ipc.py`'s
//! `MetricsIPCClient`: connect lazily, best-effort reconnect on write
//! failure, no acknowledgement, no delivery guarantee.

use std::path::{Path, PathBuf};

use chopsticks_core::MetricRecord;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tracing::warn;

use crate::frame::IpcFrame;

pub struct MetricsIpcClient {
    socket_path: PathBuf,
    stream: Option<UnixStream>,
}

impl MetricsIpcClient {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            stream: None,
        }
    }

    /// Connect to the server socket. Returns `false` (not an error) if the
    /// socket does not exist or the connection is refused — the daemon may
    /// simply not be running yet, which is not fatal to the workload.
    pub async fn connect(&mut self) -> bool {
        if !self.socket_path.exists() {
            return false;
        }
        match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => {
                self.stream = Some(stream);
                true
            }
            Err(e) => {
                warn!(path = %self.socket_path.display(), error = %e, "metrics ipc connect failed");
                self.stream = None;
                false
            }
        }
    }

    /// Send one record tagged with the test run it belongs to. Best-effort: a
    /// write failure drops the connection and the next call attempts to
    /// reconnect.
    pub async fn send_record(&mut self, test_run_id: &str, record: &MetricRecord) -> bool {
        if self.stream.is_none() && !self.connect().await {
            return false;
        }

        let frame = IpcFrame::new(test_run_id, record.clone());
        let Ok(mut line) = serde_json::to_string(&frame) else {
            warn!("failed to serialize metric record");
            return false;
        };
        line.push('\n');

        let stream = self.stream.as_mut().expect("checked above");
        match stream.write_all(line.as_bytes()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "metrics ipc write failed, will reconnect on next send");
                self.stream = None;
                false
            }
        }
    }

    pub fn close(&mut self) {
        self.stream = None;
    }
}
