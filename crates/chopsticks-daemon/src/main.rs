//! Binary entry point: parse CLI flags, load layered configuration, install
//! the tracing subscriber, and hand off to the lifecycle runner.
//!
//! Exit-code-per-error-variant mapping ported from `queue-keeper-service`'s
//! binary `ServiceError` handling in `main.rs`.

use std::path::PathBuf;

use chopsticks_daemon::config::DaemonConfigOverrides;
use chopsticks_daemon::DaemonConfig;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

#[derive(Debug, Parser)]
#[command(name = "chopsticks-metrics-daemon", about = "Chopsticks metrics aggregation daemon")]
struct Args {
    /// Optional path to a config file layered beneath environment and CLI overrides.
    #[arg(long)]
    config_file: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    pid_file: Option<PathBuf>,

    #[arg(long)]
    state_file: Option<PathBuf>,

    #[arg(long)]
    socket_path: Option<PathBuf>,

    /// Directory under which per-test-run JSONL sidecars are written.
    #[arg(long, default_value = "/tmp/chopsticks_metrics_data")]
    data_dir: PathBuf,

    #[arg(long)]
    json_logs: bool,
}

fn main() {
    let args = Args::parse();

    let overrides = DaemonConfigOverrides {
        host: args.host,
        port: args.port,
        pid_file: args.pid_file,
        state_file: args.state_file,
        socket_path: args.socket_path,
        json_logs: args.json_logs,
    };

    let config = match DaemonConfig::load(args.config_file.as_deref(), overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(4);
        }
    };

    init_tracing(config.json_logs);

    let runtime = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");
    let result = runtime.block_on(chopsticks_daemon::lifecycle::run(config, args.data_dir));

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!(error = %e, "daemon exited with error");
            std::process::exit(e.exit_code());
        }
    }
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("chopsticks_daemon=info,chopsticks_aggregator=info,chopsticks_ipc=info")
    });

    if json_logs {
        Registry::default()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        Registry::default()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
