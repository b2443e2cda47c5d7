//! Action Handlers (`spec.md` §4.7): RPC-like entry points invoked via the
//! membership service. State-mutating actions are leader-only and fail with
//! a single-line message on any precondition violation — see
//! `error::ActionError`'s doc comment for why that type is a plain string
//! rather than a structured enum.

use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chopsticks_core::TestRunId;
use chopsticks_membership::{ClusterMembership, RelationKey, TestState};
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{info, warn};

use crate::coordinator::Coordinator;
use crate::error::ActionError;
use crate::responses::{FetchMetricsResponse, StartTestResponse, StopTestResponse, TestStatusResponse};
use crate::workload_runner::{LeaderMode, LeaderParams, Role as RunnerRole, RoleParams, WorkloadRequest};

/// Default Locust-style ports; the source has no per-run port negotiation,
/// so every leader binds the same pair (`spec.md` §6 argv contract).
const DEFAULT_MASTER_BIND_PORT: u16 = 5557;
const DEFAULT_WEB_PORT: u16 = 8089;

/// Bounded readiness wait after starting the leader service (`spec.md` §9,
/// second open question): poll `is_active` briefly instead of returning
/// `started` before the process has actually come up.
const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(250);
const STARTUP_POLL_ATTEMPTS: u32 = 8;

#[derive(Debug, Clone)]
pub struct StartTestRequest {
    pub users: String,
    pub spawn_rate: String,
    pub duration: String,
    pub scenario_file: String,
    pub headless: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FetchMetricsRequest {
    /// Only `"tar.gz"`/`"tgz"` is supported; `None` defaults to it.
    pub format: Option<String>,
}

impl Coordinator {
    /// `spec.md` §4.7 `start-test`.
    pub async fn start_test(&self, request: StartTestRequest) -> Result<StartTestResponse, ActionError> {
        if !self.membership().is_leader().await {
            return Err(ActionError::new("start-test requires the leader; this unit is not the leader"));
        }

        let (config_valid, missing_field) = self.current_config_validity();
        if !config_valid {
            return Err(ActionError::new(format!(
                "missing required configuration: {}",
                missing_field.unwrap_or("credentials")
            )));
        }

        if self.current_test_state().await == TestState::Running {
            return Err(ActionError::new("a test is already running"));
        }

        let users: u32 = request
            .users
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ActionError::new(format!("invalid numeric value for users: {}", request.users)))?;
        let spawn_rate: f64 = request
            .spawn_rate
            .parse()
            .ok()
            .filter(|r| *r > 0.0)
            .ok_or_else(|| ActionError::new(format!("invalid numeric value for spawn-rate: {}", request.spawn_rate)))?;

        let resolved_scenario = self
            .config()
            .resolve_scenario(&request.scenario_file)
            .ok_or_else(|| ActionError::new(format!("scenario file not found: {}", request.scenario_file)))?;

        let test_run_id = TestRunId::new();
        let run_dir = self.config().run_data_dir(&test_run_id);
        std::fs::create_dir_all(&run_dir)
            .map_err(|e| ActionError::new(format!("failed to create run directory: {e}")))?;

        if let Err(e) = self.stop_leader_services().await {
            self.mark_failed().await;
            return Err(e);
        }

        let mode = if request.headless { LeaderMode::Headless } else { LeaderMode::WebUi };
        let workload_request = WorkloadRequest {
            scenario_path: resolved_scenario,
            loglevel: "INFO".to_string(),
            role: RoleParams::Leader(LeaderParams {
                mode,
                master_bind_port: DEFAULT_MASTER_BIND_PORT,
                web_port: DEFAULT_WEB_PORT,
                users,
                spawn_rate,
                run_time: request.duration.clone(),
                test_run_id,
                data_dir: self.config().data_dir.clone(),
            }),
        };
        let definition = self.runner().render(&workload_request);

        if let Err(e) = self.start_leader_service(&definition.name, &definition).await {
            self.mark_failed().await;
            return Err(e);
        }

        let batch = [
            (RelationKey::TestState, TestState::Running.as_str().to_string()),
            (RelationKey::TestRunId, test_run_id.to_string()),
            (RelationKey::ScenarioFile, request.scenario_file.clone()),
        ];
        if let Err(e) = self.membership().set_relation_batch(&batch).await {
            self.mark_failed().await;
            return Err(ActionError::new(format!("failed to publish test state: {e}")));
        }

        self.wait_for_leader_readiness(&definition.name).await;

        let web_ui_url = (!request.headless)
            .then(|| format!("http://{}:{}", self.membership().private_address(), DEFAULT_WEB_PORT));

        info!(test_run_id = %test_run_id, "start-test: test started");
        Ok(StartTestResponse {
            test_run_id: test_run_id.to_string(),
            status: "started".to_string(),
            users,
            spawn_rate,
            duration: request.duration,
            scenario_file: request.scenario_file,
            metrics_dir: run_dir,
            web_ui_url,
        })
    }

    /// `spec.md` §4.7 `stop-test`.
    pub async fn stop_test(&self) -> Result<StopTestResponse, ActionError> {
        if !self.membership().is_leader().await {
            return Err(ActionError::new("stop-test requires the leader; this unit is not the leader"));
        }

        self.stop_leader_services()
            .await
            .map_err(|e| ActionError::new(format!("failed to stop workload: {e}")))?;

        self.membership()
            .set_relation(RelationKey::TestState, TestState::Stopped.as_str().to_string())
            .await
            .map_err(|e| ActionError::new(format!("failed to publish test state: {e}")))?;

        let test_run_id = self
            .membership()
            .get_relation(RelationKey::TestRunId)
            .await
            .unwrap_or_default();

        Ok(StopTestResponse {
            status: "stopped".to_string(),
            test_run_id,
        })
    }

    /// `spec.md` §4.7 `test-status`. Allowed on any unit.
    pub async fn test_status(&self) -> TestStatusResponse {
        let test_run_id = self.membership().get_relation(RelationKey::TestRunId).await;
        let leader_address = self.membership().get_relation(RelationKey::LeaderAddress).await;
        let test_state = self.current_test_state().await;

        TestStatusResponse {
            test_state: test_state.as_str().to_string(),
            test_run_id,
            leader_address,
            is_leader: self.membership().is_leader().await,
            leader_running: self.leader_is_running().await,
            worker_running: self.worker_is_running().await,
            peer_count: self.membership().peer_count().await,
        }
    }

    /// `spec.md` §4.7 `fetch-metrics`.
    pub async fn fetch_metrics(&self, request: FetchMetricsRequest) -> Result<FetchMetricsResponse, ActionError> {
        if !self.membership().is_leader().await {
            return Err(ActionError::new("fetch-metrics requires the leader; this unit is not the leader"));
        }
        if let Some(format) = &request.format {
            if format != "tar.gz" && format != "tgz" {
                return Err(ActionError::new(format!("unsupported format: {format}")));
            }
        }

        let test_run_id = self
            .membership()
            .get_relation(RelationKey::TestRunId)
            .await
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ActionError::new("no test-run-id is set; nothing to fetch"))?;

        let run_dir = self.config().run_data_dir(
            &test_run_id
                .parse::<TestRunId>()
                .map_err(|e| ActionError::new(format!("stored test-run-id is malformed: {e}")))?,
        );
        if !run_dir.is_dir() {
            return Err(ActionError::new(format!("run directory not found: {}", run_dir.display())));
        }

        let scratch_dir = self.config().data_dir.join(".archives");
        let archive_path = build_archive(&run_dir, &scratch_dir, &test_run_id)
            .map_err(|e| ActionError::new(format!("failed to build archive: {e}")))?;

        let files = list_files(&run_dir).map_err(|e| ActionError::new(format!("failed to list run directory: {e}")))?;
        let preview = read_preview(&run_dir.join("metrics_stats.csv"));

        let warning = (self.current_test_state().await == TestState::Running)
            .then(|| "metrics may be incomplete: the test is still running".to_string());

        Ok(FetchMetricsResponse {
            archive_path,
            files,
            preview,
            warning,
        })
    }

    async fn stop_leader_services(&self) -> Result<(), ActionError> {
        self.service_manager()
            .stop(&self.leader_headless_service_name())
            .await
            .map_err(|e| ActionError::new(format!("failed to stop leader workload: {e}")))?;
        self.service_manager()
            .stop(&self.leader_webui_service_name())
            .await
            .map_err(|e| ActionError::new(format!("failed to stop leader workload: {e}")))?;
        Ok(())
    }

    async fn start_leader_service(
        &self,
        name: &str,
        definition: &crate::service_manager::ServiceDefinition,
    ) -> Result<(), ActionError> {
        self.service_manager()
            .render_and_register(definition)
            .await
            .map_err(|e| ActionError::new(format!("failed to render leader workload: {e}")))?;
        self.service_manager()
            .start(name)
            .await
            .map_err(|e| ActionError::new(format!("failed to start leader workload: {e}")))?;
        Ok(())
    }

    async fn wait_for_leader_readiness(&self, service_name: &str) {
        for _ in 0..STARTUP_POLL_ATTEMPTS {
            if self.service_manager().is_active(service_name).await {
                return;
            }
            tokio::time::sleep(STARTUP_POLL_INTERVAL).await;
        }
        warn!(service = %service_name, "start-test: leader workload did not report active within the readiness window");
    }

    async fn mark_failed(&self) {
        if let Err(e) = self
            .membership()
            .set_relation(RelationKey::TestState, TestState::Failed.as_str().to_string())
            .await
        {
            warn!(error = %e, "failed to publish test_state=failed after a start-test failure");
        }
    }
}

fn build_archive(run_dir: &Path, scratch_dir: &Path, test_run_id: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(scratch_dir)?;
    let archive_path = scratch_dir.join(format!("{test_run_id}.tar.gz"));
    let file = std::fs::File::create(&archive_path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut tar = tar::Builder::new(encoder);
    tar.append_dir_all(".", run_dir)?;
    tar.into_inner()?.finish()?;
    Ok(archive_path)
}

fn list_files(run_dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(run_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// First ~2 KB of the CSV stats file, if present (`spec.md` §4.7).
fn read_preview(path: &Path) -> Option<String> {
    let mut file = std::fs::File::open(path).ok()?;
    let mut buf = vec![0u8; 2048];
    let n = file.read(&mut buf).ok()?;
    buf.truncate(n);
    Some(String::from_utf8_lossy(&buf).into_owned())
}
