//! Command-line surface for chopsticks: the daemon supervisor commands
//! (`spec.md` §4.4) and a local action-invocation harness for the
//! Coordinator's action handlers (`spec.md` §4.7), useful for exercising the
//! state machine without a real cluster substrate.
//!
//! Structurally grounded on `queue-keeper-cli`: a `clap`
//! derive `Cli`/`Commands` tree, a `CliError` with one variant per failure
//! class mapped to a distinct process exit code in `main.rs`, and a
//! `run_cli` entry point that does the actual dispatch so `main` stays thin.

use std::path::PathBuf;
use std::sync::Arc;

use chopsticks_core::UnitId;
use chopsticks_coordinator::service_manager::InProcessServiceManager;
use chopsticks_coordinator::{
    ActionError, Coordinator, CoordinatorConfig, CoordinatorError, FetchMetricsRequest,
    StartTestRequest,
};
use chopsticks_membership::SharedCluster;
use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::supervisor::{DaemonSupervisor, DaemonSupervisorConfig, StartOutcome, StopOutcome, SupervisorError};

pub mod supervisor;

#[derive(Debug, Parser)]
#[command(name = "chopsticks", about = "Chopsticks daemon supervisor and action CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start, stop, or query the metrics daemon process.
    Daemon {
        #[command(subcommand)]
        action: DaemonCommand,
    },
    /// Invoke a Coordinator action handler against a single-unit, in-process
    /// cluster, for local testing of the action surface (`spec.md` §4.7).
    /// Each invocation is a fresh process: state does not persist across
    /// separate `chopsticks action` calls.
    Action {
        /// Path to the Coordinator's deployment config YAML.
        #[arg(long)]
        config: PathBuf,
        #[command(subcommand)]
        action: ActionCommand,
    },
}

/// Output rendering for the daemon supervisor subcommands, modeled on
/// `queue-keeper-cli`'s `OutputFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default).
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum DaemonCommand {
    Start {
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: u16,
        #[arg(long)]
        pid_file: PathBuf,
        #[arg(long)]
        state_file: PathBuf,
        #[arg(long)]
        socket_path: PathBuf,
        #[arg(long)]
        daemon_binary: PathBuf,
        #[arg(long)]
        data_dir: PathBuf,
        /// Stop and restart an already-running daemon instead of leaving it
        /// in place.
        #[arg(long)]
        force: bool,
        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    Stop {
        #[arg(long)]
        pid_file: PathBuf,
        #[arg(long)]
        state_file: PathBuf,
        #[arg(long)]
        socket_path: PathBuf,
        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    Status {
        #[arg(long)]
        pid_file: PathBuf,
        #[arg(long)]
        state_file: PathBuf,
        #[arg(long)]
        socket_path: PathBuf,
        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Subcommand)]
pub enum ActionCommand {
    StartTest {
        #[arg(long)]
        users: String,
        #[arg(long)]
        spawn_rate: String,
        #[arg(long)]
        duration: String,
        #[arg(long)]
        scenario_file: String,
        #[arg(long)]
        headless: bool,
    },
    StopTest,
    TestStatus,
    FetchMetrics {
        #[arg(long)]
        format: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Configuration(#[from] CoordinatorError),

    #[error("supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("action failed: {0}")]
    Action(#[from] ActionError),

    #[error("invalid argument --{arg}: {message}")]
    InvalidArgument { arg: &'static str, message: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CliError {
    /// Distinct process exit codes per failure class, ported from
    /// `queue-keeper-cli`'s `main.rs` `CliError` handling.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Configuration(_) => 1,
            CliError::Supervisor(_) => 2,
            CliError::Action(_) => 3,
            CliError::InvalidArgument { .. } => 4,
            CliError::Io(_) => 5,
            CliError::Serialize(_) => 6,
        }
    }
}

pub async fn run_cli(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Daemon { action } => run_daemon_command(action).await,
        Commands::Action { config, action } => run_action_command(&config, action).await,
    }
}

async fn run_daemon_command(command: DaemonCommand) -> Result<(), CliError> {
    match command {
        DaemonCommand::Start {
            host,
            port,
            pid_file,
            state_file,
            socket_path,
            daemon_binary,
            data_dir,
            force,
            format,
        } => {
            let supervisor = DaemonSupervisor::new(DaemonSupervisorConfig {
                host,
                port,
                pid_file,
                state_file,
                socket_path,
                daemon_binary,
                data_dir,
                persistence_enabled: true,
            });
            let outcome = supervisor.start(force).await?;
            match format {
                OutputFormat::Text => match &outcome {
                    StartOutcome::Started => println!("daemon started at {}", supervisor.endpoint()),
                    StartOutcome::AlreadyRunning { pid } => {
                        println!("daemon already running (pid {pid}); use --force to restart it")
                    }
                },
                OutputFormat::Json => {
                    let value = match outcome {
                        StartOutcome::Started => {
                            serde_json::json!({"outcome": "started", "endpoint": supervisor.endpoint()})
                        }
                        StartOutcome::AlreadyRunning { pid } => {
                            serde_json::json!({"outcome": "already_running", "pid": pid})
                        }
                    };
                    print_json(&value)?;
                }
            }
            Ok(())
        }
        DaemonCommand::Stop { pid_file, state_file, socket_path, format } => {
            let supervisor = DaemonSupervisor::new(DaemonSupervisorConfig {
                host: String::new(),
                port: 0,
                pid_file,
                state_file,
                socket_path,
                daemon_binary: PathBuf::new(),
                data_dir: PathBuf::new(),
                persistence_enabled: true,
            });
            let outcome = supervisor.stop().await?;
            match format {
                OutputFormat::Text => match outcome {
                    StopOutcome::Stopped => println!("daemon stopped"),
                    StopOutcome::NotRunning => println!("daemon was not running"),
                },
                OutputFormat::Json => {
                    let value = match outcome {
                        StopOutcome::Stopped => serde_json::json!({"outcome": "stopped"}),
                        StopOutcome::NotRunning => serde_json::json!({"outcome": "not_running"}),
                    };
                    print_json(&value)?;
                }
            }
            Ok(())
        }
        DaemonCommand::Status { pid_file, state_file, socket_path, format } => {
            let supervisor = DaemonSupervisor::new(DaemonSupervisorConfig {
                host: String::new(),
                port: 0,
                pid_file,
                state_file,
                socket_path,
                daemon_binary: PathBuf::new(),
                data_dir: PathBuf::new(),
                persistence_enabled: true,
            });
            let running = supervisor.is_running();
            match format {
                OutputFormat::Text => println!("{}", if running { "running" } else { "stopped" }),
                OutputFormat::Json => print_json(&serde_json::json!({"running": running}))?,
            }
            Ok(())
        }
    }
}

async fn run_action_command(config_path: &PathBuf, action: ActionCommand) -> Result<(), CliError> {
    let config = CoordinatorConfig::load(config_path)?;
    let unit_id = UnitId::new("chopsticks/0").map_err(|e| CliError::InvalidArgument {
        arg: "config",
        message: e.to_string(),
    })?;
    let cluster = SharedCluster::new();
    let membership = Arc::new(cluster.join(unit_id, "127.0.0.1"));
    let service_manager = Arc::new(InProcessServiceManager::new());
    let coordinator = Coordinator::new(membership, service_manager, config);

    match action {
        ActionCommand::StartTest { users, spawn_rate, duration, scenario_file, headless } => {
            let response = coordinator
                .start_test(StartTestRequest { users, spawn_rate, duration, scenario_file, headless })
                .await?;
            print_json(&response)
        }
        ActionCommand::StopTest => {
            let response = coordinator.stop_test().await?;
            print_json(&response)
        }
        ActionCommand::TestStatus => {
            let response = coordinator.test_status().await;
            print_json(&response)
        }
        ActionCommand::FetchMetrics { format } => {
            let response = coordinator.fetch_metrics(FetchMetricsRequest { format }).await?;
            print_json(&response)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
