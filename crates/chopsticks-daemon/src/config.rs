//! Layered daemon configuration, grounded on `queue-keeper-service`'s
//! `ServiceConfig`
//! defaults-struct pattern but loaded through the `config` crate instead of
//! `Default` alone, per `SPEC_FULL.md` §4.3.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub host: String,
    pub port: u16,
    pub pid_file: PathBuf,
    pub state_file: PathBuf,
    pub socket_path: PathBuf,
    pub json_logs: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            pid_file: PathBuf::from("/tmp/chopsticks_metrics.pid"),
            state_file: PathBuf::from("/tmp/chopsticks_metrics.state"),
            socket_path: PathBuf::from("/tmp/chopsticks_metrics.sock"),
            json_logs: false,
        }
    }
}

/// CLI-provided overrides; every field optional so only flags the caller
/// actually passed take precedence over file/environment layers.
#[derive(Debug, Clone, Default)]
pub struct DaemonConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub pid_file: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub socket_path: Option<PathBuf>,
    pub json_logs: bool,
}

impl DaemonConfig {
    /// Layers defaults, an optional config file, `CHOPSTICKS_DAEMON_`-prefixed
    /// environment variables, and finally CLI flags, in that ascending
    /// precedence order.
    pub fn load(
        config_file: Option<&std::path::Path>,
        overrides: DaemonConfigOverrides,
    ) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port as i64)?
            .set_default("pid_file", defaults.pid_file.to_string_lossy().to_string())?
            .set_default(
                "state_file",
                defaults.state_file.to_string_lossy().to_string(),
            )?
            .set_default(
                "socket_path",
                defaults.socket_path.to_string_lossy().to_string(),
            )?
            .set_default("json_logs", defaults.json_logs)?;

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CHOPSTICKS_DAEMON")
                .separator("_")
                .try_parsing(true),
        );

        let mut config: Self = builder.build()?.try_deserialize()?;

        if let Some(host) = overrides.host {
            config.host = host;
        }
        if let Some(port) = overrides.port {
            config.port = port;
        }
        if let Some(pid_file) = overrides.pid_file {
            config.pid_file = pid_file;
        }
        if let Some(state_file) = overrides.state_file {
            config.state_file = state_file;
        }
        if let Some(socket_path) = overrides.socket_path {
            config.socket_path = socket_path;
        }
        if overrides.json_logs {
            config.json_logs = true;
        }

        Ok(config)
    }
}
