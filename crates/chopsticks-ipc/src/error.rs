//! Error type for the IPC transport, grounded on
//! `queue-runtime::error::QueueError` (one variant per failure kind, a
//! `thiserror` derive).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("failed to bind ipc socket at {path}: {source}")]
    BindFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
