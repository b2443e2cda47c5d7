//! The `ServiceManager` abstraction the Workload Runner and Coordinator use
//! to start/stop/query workload child processes (`SPEC_FULL.md` §4.5).
//!
//! Grounded structurally on `chopsticks-membership`'s trait-plus-in-process-fake
//! split: a real deployment renders systemd unit files and shells out, while
//! tests and environments without systemd get a process-tracking fake that
//! implements the same trait.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One workload service definition: a fully-rendered command line plus
/// restart policy, as produced by the Workload Runner (`SPEC_FULL.md` §4.5).
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Whether a crashed service should be restarted automatically
    /// (`spec.md` §4.5: leader services are not; worker services are, after
    /// a 5 s back-off).
    pub restart_on_failure: bool,
}

#[async_trait]
pub trait ServiceManager: Send + Sync {
    /// Render (and, for a real init system, register) the service
    /// definition without starting it (`install`/`config-changed` handlers
    /// call this; `spec.md` §4.6.2 requires it be idempotent).
    async fn render_and_register(&self, definition: &ServiceDefinition) -> Result<(), String>;

    /// Start a previously-registered service. Idempotent: starting an
    /// already-running service is not an error.
    async fn start(&self, name: &str) -> Result<(), String>;

    /// Stop a service. Stopping an already-stopped service is not an error
    /// (`spec.md` §4.7 `stop-test`: "ignoring 'already stopped'").
    async fn stop(&self, name: &str) -> Result<(), String>;

    /// Whether the named service is currently active.
    async fn is_active(&self, name: &str) -> bool;
}

/// Renders a systemd unit file from a template and shells out to
/// `systemctl`. The template is intentionally minimal; a real deployment is
/// expected to supply its own unit template matching its environment.
pub struct SystemdServiceManager {
    unit_dir: std::path::PathBuf,
}

impl SystemdServiceManager {
    pub fn new(unit_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            unit_dir: unit_dir.into(),
        }
    }

    fn unit_path(&self, name: &str) -> std::path::PathBuf {
        self.unit_dir.join(format!("{name}.service"))
    }

    fn render_unit(definition: &ServiceDefinition) -> String {
        let exec_start = std::iter::once(definition.program.clone())
            .chain(definition.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        let env_lines = definition
            .env
            .iter()
            .map(|(k, v)| format!("Environment=\"{k}={v}\"\n"))
            .collect::<String>();
        let restart = if definition.restart_on_failure {
            "Restart=on-failure\nRestartSec=5"
        } else {
            "Restart=no"
        };
        format!(
            "[Unit]\nDescription=chopsticks workload: {}\n\n[Service]\n{env_lines}ExecStart={exec_start}\n{restart}\n\n[Install]\nWantedBy=multi-user.target\n",
            definition.name
        )
    }
}

#[async_trait]
impl ServiceManager for SystemdServiceManager {
    async fn render_and_register(&self, definition: &ServiceDefinition) -> Result<(), String> {
        std::fs::create_dir_all(&self.unit_dir).map_err(|e| e.to_string())?;
        std::fs::write(self.unit_path(&definition.name), Self::render_unit(definition))
            .map_err(|e| e.to_string())?;
        run_systemctl(&["daemon-reload"]).await
    }

    async fn start(&self, name: &str) -> Result<(), String> {
        run_systemctl(&["start", name]).await
    }

    async fn stop(&self, name: &str) -> Result<(), String> {
        run_systemctl(&["stop", name]).await
    }

    async fn is_active(&self, name: &str) -> bool {
        Command::new("systemctl")
            .args(["is-active", "--quiet", name])
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

async fn run_systemctl(args: &[&str]) -> Result<(), String> {
    let status = Command::new("systemctl")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|e| format!("failed to invoke systemctl {args:?}: {e}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("systemctl {args:?} exited with {status}"))
    }
}

/// Spawns and tracks workload child processes directly, for tests and for
/// environments without systemd. Crash restarts are not implemented here —
/// callers that need the worker back-off behavior drive `start`/`is_active`
/// from their own loop (see `coordinator::maybe_start_worker`).
#[derive(Default)]
pub struct InProcessServiceManager {
    services: Mutex<HashMap<String, ServiceEntry>>,
}

struct ServiceEntry {
    definition: ServiceDefinition,
    child: Option<Child>,
}

impl InProcessServiceManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceManager for InProcessServiceManager {
    async fn render_and_register(&self, definition: &ServiceDefinition) -> Result<(), String> {
        let mut services = self.services.lock().await;
        services
            .entry(definition.name.clone())
            .and_modify(|entry| entry.definition = definition.clone())
            .or_insert_with(|| ServiceEntry {
                definition: definition.clone(),
                child: None,
            });
        debug!(service = %definition.name, "registered in-process service definition");
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<(), String> {
        let mut services = self.services.lock().await;
        let entry = services
            .get_mut(name)
            .ok_or_else(|| format!("service {name} was never registered"))?;

        if let Some(child) = entry.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                return Ok(()); // already running
            }
        }

        let mut command = Command::new(&entry.definition.program);
        command
            .args(&entry.definition.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        for (k, v) in &entry.definition.env {
            command.env(k, v);
        }

        let child = command
            .spawn()
            .map_err(|e| format!("failed to spawn {name}: {e}"))?;
        info!(service = %name, pid = ?child.id(), "started in-process workload service");
        entry.child = Some(child);
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<(), String> {
        let mut services = self.services.lock().await;
        let Some(entry) = services.get_mut(name) else {
            return Ok(()); // never registered: nothing to stop
        };
        if let Some(mut child) = entry.child.take() {
            if let Err(e) = child.kill().await {
                if e.kind() != std::io::ErrorKind::InvalidInput {
                    warn!(service = %name, error = %e, "failed to stop in-process service");
                }
            }
        }
        Ok(())
    }

    async fn is_active(&self, name: &str) -> bool {
        let mut services = self.services.lock().await;
        let Some(entry) = services.get_mut(name) else {
            return false;
        };
        match entry.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

pub type SharedServiceManager = Arc<dyn ServiceManager>;
