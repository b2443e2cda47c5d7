//! Response bodies returned by the four action handlers (`spec.md` §4.7,
//! §6 "Action surface"). Grounded on `queue-keeper-api/src/responses.rs`'s
//! serialize-struct-per-endpoint pattern.

use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct StartTestResponse {
    #[serde(rename = "test-run-id")]
    pub test_run_id: String,
    pub status: String,
    pub users: u32,
    #[serde(rename = "spawn-rate")]
    pub spawn_rate: f64,
    pub duration: String,
    #[serde(rename = "scenario-file")]
    pub scenario_file: String,
    #[serde(rename = "metrics-dir")]
    pub metrics_dir: PathBuf,
    #[serde(rename = "web-ui-url", skip_serializing_if = "Option::is_none")]
    pub web_ui_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopTestResponse {
    pub status: String,
    #[serde(rename = "test-run-id")]
    pub test_run_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestStatusResponse {
    pub test_state: String,
    #[serde(rename = "test-run-id")]
    pub test_run_id: Option<String>,
    pub leader_address: Option<String>,
    pub is_leader: bool,
    pub leader_running: bool,
    pub worker_running: bool,
    pub peer_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchMetricsResponse {
    #[serde(rename = "archive-path")]
    pub archive_path: PathBuf,
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
