//! The Daemon Supervisor (`spec.md` §4.4): `start`/`stop`/`status` for the
//! metrics daemon process, plus the `cleanup_stale_files` correctness
//! boundary that keeps the supervisor from ever becoming a generic process
//! killer.
//!
//! Grounded on `examples/original_source/src/chopsticks/metrics/daemon.py`'s
//! `MetricsServerSupervisor` for the guard ordering, and structurally on
//! `examples/other_examples/28ded16a_ananis25-materialize__src-orchestrator-process-src-lib.rs.rs`'s
//! process-supervision idiom: `sysinfo` to read a pid's start time/cmdline
//! (protects against PID reuse and foreign-process signaling) and `nix` to
//! send the actual signal.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use sysinfo::{Pid as SysPid, ProcessRefreshKind, System};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("persistence is disabled in the daemon configuration; refusing to start")]
    PersistenceDisabled,

    #[error("failed to spawn daemon: {0}")]
    Spawn(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),
}

#[derive(Debug, Clone)]
pub struct DaemonSupervisorConfig {
    pub host: String,
    pub port: u16,
    pub pid_file: PathBuf,
    pub state_file: PathBuf,
    pub socket_path: PathBuf,
    pub daemon_binary: PathBuf,
    pub data_dir: PathBuf,
    pub persistence_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning { pid: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

pub struct DaemonSupervisor {
    config: DaemonSupervisorConfig,
}

impl DaemonSupervisor {
    pub fn new(config: DaemonSupervisorConfig) -> Self {
        Self { config }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// `is_running`: PID file exists AND the pid it contains corresponds to a
    /// live process. A stale PID file is removed here and the answer is
    /// `false` (`spec.md` §4.4).
    pub fn is_running(&self) -> bool {
        let Some(pid) = self.read_pid() else {
            return false;
        };
        if process_is_alive(pid) {
            true
        } else {
            let _ = std::fs::remove_file(&self.config.pid_file);
            false
        }
    }

    /// `start` (`spec.md` §4.4).
    pub async fn start(&self, force: bool) -> Result<StartOutcome, SupervisorError> {
        if !self.config.persistence_enabled {
            return Err(SupervisorError::PersistenceDisabled);
        }

        if self.is_running() {
            let pid = self.read_pid().expect("is_running just confirmed a pid file");
            if !force {
                warn!(endpoint = %self.endpoint(), pid, "daemon already running, not starting a second instance");
                return Ok(StartOutcome::AlreadyRunning { pid });
            }
            self.stop().await?;
        }

        self.cleanup_stale_files()?;

        let mut command = tokio::process::Command::new(&self.config.daemon_binary);
        command
            .arg("--host")
            .arg(&self.config.host)
            .arg("--port")
            .arg(self.config.port.to_string())
            .arg("--pid-file")
            .arg(&self.config.pid_file)
            .arg("--state-file")
            .arg(&self.config.state_file)
            .arg("--socket-path")
            .arg(&self.config.socket_path)
            .arg("--data-dir")
            .arg(&self.config.data_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // New session: detach from the supervisor's controlling terminal
            // and process group so a supervisor exit does not signal the
            // daemon.
            command.process_group(0);
        }

        let child = command
            .spawn()
            .map_err(|e| SupervisorError::Spawn(e.to_string()))?;
        // Deliberately not awaited: `start` manages the daemon via its PID
        // file from here on, not via this `Child` handle (`spec.md` §9:
        // "process supervision ... not in-process orchestration").
        std::mem::drop(child);

        wait_until(Duration::from_secs(10), Duration::from_millis(200), || {
            self.config.pid_file.is_file()
        })
        .await
        .map_err(|_| SupervisorError::Timeout("daemon pid file to appear".to_string()))?;

        tokio::time::sleep(Duration::from_secs(1)).await;
        if !self.is_running() {
            return Err(SupervisorError::Timeout(
                "daemon to report as running after spawn".to_string(),
            ));
        }

        info!(endpoint = %self.endpoint(), "daemon started");
        Ok(StartOutcome::Started)
    }

    /// `stop` (`spec.md` §4.4).
    pub async fn stop(&self) -> Result<StopOutcome, SupervisorError> {
        let Some(pid) = self.read_pid() else {
            return Ok(StopOutcome::NotRunning);
        };
        if !process_is_alive(pid) {
            let _ = std::fs::remove_file(&self.config.pid_file);
            return Ok(StopOutcome::NotRunning);
        }

        let _ = signal::kill(NixPid::from_raw(pid as i32), Signal::SIGTERM);

        let disappeared = wait_until(Duration::from_secs(10), Duration::from_millis(200), || {
            !process_is_alive(pid)
        })
        .await
        .is_ok();
        if !disappeared {
            warn!(pid, "daemon did not exit within 10s of SIGTERM");
        }

        let cleaned_up = wait_until(Duration::from_secs(3), Duration::from_millis(200), || {
            !self.config.pid_file.exists() && !self.config.state_file.exists()
        })
        .await
        .is_ok();
        if !cleaned_up {
            warn!("daemon did not remove its own control files in time, cleaning up");
            let _ = std::fs::remove_file(&self.config.pid_file);
            let _ = std::fs::remove_file(&self.config.state_file);
        }

        info!(pid, "daemon stopped");
        Ok(StopOutcome::Stopped)
    }

    /// `cleanup_stale_files` (`spec.md` §4.4): the correctness boundary that
    /// keeps the supervisor from ever becoming a generic process killer.
    ///
    /// **Simplification vs. `spec.md`'s "if the configured TCP port is held
    /// by another process" clause**: the pack carries no socket-introspection
    /// crate (no `netstat2`/`procfs` equivalent among the reference
    /// dependencies available), so port ownership is approximated via
    /// the PID file's recorded pid rather than an independent port scan. See
    /// `DESIGN.md`.
    pub fn cleanup_stale_files(&self) -> Result<(), SupervisorError> {
        if let Some(pid) = self.read_pid() {
            if process_is_alive(pid) {
                if self.matches_daemon_signature(pid) {
                    return Ok(()); // ours, alive: nothing to clean up
                }
                warn!(pid, "pid file names a live foreign process, removing pid file only");
                std::fs::remove_file(&self.config.pid_file)?;
                return Ok(());
            }
        }

        remove_if_exists(&self.config.pid_file);
        remove_if_exists(&self.config.state_file);
        remove_if_exists(&self.config.socket_path);
        Ok(())
    }

    fn read_pid(&self) -> Option<u32> {
        let contents = std::fs::read_to_string(&self.config.pid_file).ok()?;
        contents.trim().parse().ok()
    }

    /// Whether `pid` looks like one of our daemon processes rather than a
    /// process that happens to have reused the pid. Checked by reading the
    /// command line and looking for our own `--pid-file` argument, which
    /// uniquely names this daemon instance.
    fn matches_daemon_signature(&self, pid: u32) -> bool {
        let mut system = System::new();
        system.refresh_process_specifics(SysPid::from_u32(pid), ProcessRefreshKind::new());
        let Some(process) = system.process(SysPid::from_u32(pid)) else {
            return false;
        };
        let pid_file_arg = self.config.pid_file.display().to_string();
        process.cmd().iter().any(|arg| arg == &pid_file_arg)
    }
}

fn process_is_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_process_specifics(SysPid::from_u32(pid), ProcessRefreshKind::new());
    system.process(SysPid::from_u32(pid)).is_some()
}

fn remove_if_exists(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove control file during cleanup");
        }
    }
}

async fn wait_until(
    timeout: Duration,
    poll_interval: Duration,
    mut predicate: impl FnMut() -> bool,
) -> Result<(), ()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(());
        }
        tokio::time::sleep(poll_interval).await;
    }
}
