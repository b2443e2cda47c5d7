//! The daemon's control files: PID, JSON state, and the IPC socket path
//! (`spec.md` §3's "Daemon control state").
//!
//! Grounded on `server_daemon.py`'s PID-file write/cleanup and on the
//! `oddjobs` lifecycle module's "write on startup, remove on clean shutdown,
//! never rely on `Drop` alone" discipline.

use std::path::{Path, PathBuf};

use chopsticks_core::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStateRecord {
    pub pid: u32,
    pub host: String,
    pub port: u16,
    pub start_time: Timestamp,
}

#[derive(Debug, Clone)]
pub struct DaemonControlPaths {
    pub pid_file: PathBuf,
    pub state_file: PathBuf,
    pub socket_path: PathBuf,
}

impl DaemonControlPaths {
    pub fn new(pid_file: impl Into<PathBuf>, state_file: impl Into<PathBuf>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            pid_file: pid_file.into(),
            state_file: state_file.into(),
            socket_path: socket_path.into(),
        }
    }

    pub fn write_pid_file(&self) -> std::io::Result<()> {
        std::fs::write(&self.pid_file, std::process::id().to_string())
    }

    pub fn write_state_file(&self, host: &str, port: u16) -> std::io::Result<()> {
        let record = DaemonStateRecord {
            pid: std::process::id(),
            host: host.to_string(),
            port,
            start_time: Timestamp::now(),
        };
        let json = serde_json::to_string_pretty(&record)
            .expect("DaemonStateRecord serialization cannot fail");
        std::fs::write(&self.state_file, json)
    }

    /// Remove a stale socket file left behind by a crashed prior instance,
    /// ahead of binding (`spec.md` §4.3 step 3).
    pub fn remove_stale_socket(&self) -> std::io::Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        Ok(())
    }

    /// Remove PID, state, and socket files on clean shutdown. Individual
    /// removal failures are logged, not propagated: a half-cleaned-up daemon
    /// must still be able to exit 0 (`spec.md` §4.3 step 3).
    pub fn cleanup(&self) {
        remove_if_exists(&self.pid_file, "pid file");
        remove_if_exists(&self.state_file, "state file");
        remove_if_exists(&self.socket_path, "socket file");
    }
}

fn remove_if_exists(path: &Path, what: &str) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove {what} on shutdown");
        }
    }
}
