//! The Coordinator's own configuration (`SPEC_FULL.md` §6), loaded from a
//! YAML file the way `spec.md` §6 describes the credentials/endpoint YAML —
//! through the `config` crate, matching `chopsticks-daemon`'s
//! `DaemonConfig::load` layering pattern.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoordinatorError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonEndpointConfig {
    #[serde(default = "default_daemon_host")]
    pub host: String,
    #[serde(default = "default_daemon_port")]
    pub port: u16,
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
}

impl Default for DaemonEndpointConfig {
    fn default() -> Self {
        Self {
            host: default_daemon_host(),
            port: default_daemon_port(),
            socket_path: default_socket_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    pub binary: PathBuf,
    pub default_scenario: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_autostart_workers")]
    pub autostart_workers: bool,
    pub install_root: PathBuf,
    pub data_dir: PathBuf,
    pub credentials_path: PathBuf,
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub daemon: DaemonEndpointConfig,
}

fn default_autostart_workers() -> bool {
    true
}

fn default_daemon_host() -> String {
    "0.0.0.0".to_string()
}

fn default_daemon_port() -> u16 {
    8090
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/run/chopsticks/metrics.sock")
}

impl CoordinatorConfig {
    pub fn load(config_file: &Path) -> Result<Self, CoordinatorError> {
        let built = config::Config::builder()
            .add_source(config::File::from(config_file))
            .build()?;
        Ok(built.try_deserialize()?)
    }

    /// Whether `scenario` resolves to an existing regular file under
    /// `install_root` (`spec.md` §4.7 `start-test` guard 5).
    pub fn resolve_scenario(&self, scenario: &str) -> Option<PathBuf> {
        let candidate = self.install_root.join(scenario);
        if candidate.is_file() {
            Some(candidate)
        } else {
            None
        }
    }

    pub fn run_data_dir(&self, test_run_id: &chopsticks_core::TestRunId) -> PathBuf {
        self.data_dir.join(test_run_id.to_string())
    }
}
