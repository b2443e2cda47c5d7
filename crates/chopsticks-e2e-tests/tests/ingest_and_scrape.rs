//! Half of scenario 1 from `spec.md` §8 that exercises the real daemon
//! process rather than the coordinator: a workload-shaped client pushes a
//! record over the IPC socket and the value shows up on the daemon's own
//! `/metrics` HTTP endpoint.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use chopsticks_core::{MetricRecord, OperationType, Timestamp, WorkloadType};
use chopsticks_ipc::MetricsIpcClient;

fn daemon_binary() -> PathBuf {
    assert_cmd::cargo::cargo_bin("chopsticks-daemon")
}

async fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    predicate()
}

#[tokio::test]
async fn a_record_sent_over_ipc_is_visible_on_the_metrics_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("daemon.pid");
    let socket_path = dir.path().join("daemon.sock");
    let port = 19192u16;

    let mut child = std::process::Command::new(daemon_binary())
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--pid-file")
        .arg(&pid_file)
        .arg("--state-file")
        .arg(dir.path().join("daemon.state"))
        .arg("--socket-path")
        .arg(&socket_path)
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn chopsticks-daemon");

    assert!(
        wait_until(Duration::from_secs(5), || pid_file.is_file()).await,
        "daemon did not start in time"
    );
    assert!(
        wait_until(Duration::from_secs(5), || socket_path.exists()).await,
        "daemon did not bind its ipc socket in time"
    );

    let mut client = MetricsIpcClient::new(&socket_path);
    let start = Timestamp::now();
    let record = MetricRecord::new(
        start,
        start.add_seconds(1),
        OperationType::Upload,
        WorkloadType::S3,
        "objects/example.bin",
        4096,
        true,
        "s5cmd",
        "user-1",
    );
    assert!(client.send_record("e2e-run", &record).await, "failed to send metric record over ipc");

    let http_client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{port}/metrics");
    let deadline = Instant::now() + Duration::from_secs(5);
    let body = loop {
        if let Ok(response) = http_client.get(&url).send().await {
            if let Ok(text) = response.text().await {
                if text.contains("chopsticks_operation_total") {
                    break text;
                }
            }
        }
        assert!(Instant::now() < deadline, "metrics endpoint never reported the ingested record");
        tokio::time::sleep(Duration::from_millis(100)).await;
    };
    assert!(body.contains("driver=\"s5cmd\""));
    assert!(body.contains("chopsticks_operation_total{"));

    let _ = child.kill();
    let _ = child.wait();
}
