//! Ties configuration, control files, IPC ingestion, and the HTTP endpoint
//! into the daemon's full startup/run/shutdown sequence (`spec.md` §4.3).
//!
//! Startup and shutdown ordering follow the `oddjobs` lifecycle module's
//! `startup`/`startup_inner`/`cleanup_on_failure` split: write the PID file
//! first, remove a stale socket immediately before binding it (never
//! earlier), and on any startup failure clean up whatever was already
//! created before returning the error. Shutdown mirrors `server_daemon.py`'s
//! SIGTERM/SIGINT handling, but through `tokio::signal` instead of
//! `pthread_sigmask`.

use std::sync::Arc;

use chopsticks_aggregator::Aggregator;
use chopsticks_ipc::{IpcFrame, MetricsIpcServer};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::DaemonConfig;
use crate::control::DaemonControlPaths;
use crate::error::DaemonError;
use crate::sidecar::JsonlSidecar;

/// Run the daemon until a SIGTERM/SIGINT is received, then shut down
/// cleanly. Returns once every subsystem has stopped and control files have
/// been removed.
pub async fn run(config: DaemonConfig, data_dir: impl Into<std::path::PathBuf>) -> Result<(), DaemonError> {
    let control = DaemonControlPaths::new(
        config.pid_file.clone(),
        config.state_file.clone(),
        config.socket_path.clone(),
    );

    if let Err(e) = startup_inner(&config, &control, data_dir).await {
        cleanup_on_failure(&control);
        return Err(e);
    }

    Ok(())
}

async fn startup_inner(
    config: &DaemonConfig,
    control: &DaemonControlPaths,
    data_dir: impl Into<std::path::PathBuf>,
) -> Result<(), DaemonError> {
    control.write_pid_file()?;
    control.write_state_file(&config.host, config.port)?;

    control.remove_stale_socket()?;
    let ipc_server = MetricsIpcServer::bind(&control.socket_path)?;
    let ipc_shutdown = ipc_server.shutdown_handle();

    let aggregator = Arc::new(Aggregator::new());
    let sidecar = Arc::new(JsonlSidecar::new(data_dir.into()));

    let (records_tx, records_rx) = mpsc::channel::<IpcFrame>(1024);
    let ipc_task = tokio::spawn(ipc_server.run(records_tx));
    let forward_task = tokio::spawn(forward_records(records_rx, aggregator.clone(), sidecar));

    let http_aggregator = aggregator.clone();
    let host = config.host.clone();
    let port = config.port;
    let http_task = tokio::spawn(async move {
        crate::http::serve(&host, port, http_aggregator, shutdown_signal()).await
    });

    info!("chopsticks metrics daemon started");
    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping");

    let _ = ipc_shutdown.send(true);
    let _ = ipc_task.await; // drops records_tx, which unblocks forward_task's recv loop
    let _ = forward_task.await;

    // `crate::http::serve` itself bounds how long it waits for in-flight
    // connections to drain after the shutdown signal, so this await cannot
    // hang indefinitely on a stalled connection.
    match http_task.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "http server task panicked"),
    }

    control.cleanup();
    info!("chopsticks metrics daemon stopped cleanly");
    Ok(())
}

fn cleanup_on_failure(control: &DaemonControlPaths) {
    warn!("daemon startup failed, cleaning up partially-created control files");
    control.cleanup();
}

async fn forward_records(
    mut records_rx: mpsc::Receiver<IpcFrame>,
    aggregator: Arc<Aggregator>,
    sidecar: Arc<JsonlSidecar>,
) {
    while let Some(frame) = records_rx.recv().await {
        aggregator.record(&frame.record);
        if let Err(e) = sidecar.append(&frame.test_run_id, &frame.record) {
            warn!(test_run_id = %frame.test_run_id, error = %e, "failed to append metric record to jsonl sidecar");
        }
    }
}

/// Resolves once either SIGTERM or SIGINT arrives.
async fn wait_for_shutdown_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

/// A cloneable future form of [`wait_for_shutdown_signal`] for
/// `axum::serve`'s graceful-shutdown hook.
async fn shutdown_signal() {
    wait_for_shutdown_signal().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn forward_records_updates_aggregator_and_sidecar() {
        let dir = tempdir().unwrap();
        let aggregator = Arc::new(Aggregator::new());
        let sidecar = Arc::new(JsonlSidecar::new(dir.path()));
        let (tx, rx) = mpsc::channel(8);

        let t = chopsticks_core::Timestamp::now();
        let record = chopsticks_core::MetricRecord::new(
            t,
            t.add_seconds(1),
            chopsticks_core::OperationType::Upload,
            chopsticks_core::WorkloadType::S3,
            "key",
            1024,
            true,
            "driver",
            "user",
        );
        tx.send(IpcFrame::new("run-1", record)).await.unwrap();
        drop(tx);

        forward_records(rx, aggregator.clone(), sidecar.clone()).await;

        let rendered = aggregator.render();
        assert!(rendered.contains("chopsticks_operation_total"));
        let jsonl_path = dir.path().join("run-1").join("metrics.jsonl");
        assert!(jsonl_path.exists());
    }
}
