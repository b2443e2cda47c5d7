//! Error type for the daemon binary and lifecycle, grounded on the
//! `ServiceError`/`ConfigError` split in `queue-keeper-service`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to bind http endpoint at {address}: {source}")]
    HttpBindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http server failed: {0}")]
    HttpServerFailed(std::io::Error),

    #[error("ipc transport error: {0}")]
    Ipc(#[from] chopsticks_ipc::IpcError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaemonError {
    /// Maps onto a process exit code the way `queue-keeper-service`'s binary
    /// maps `ServiceError` variants.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::HttpBindFailed { .. } => 1,
            Self::HttpServerFailed(_) => 2,
            Self::Ipc(_) => 3,
            Self::Config(_) => 4,
            Self::Io(_) => 5,
        }
    }
}
