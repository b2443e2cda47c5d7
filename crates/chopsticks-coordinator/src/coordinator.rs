//! The Coordinator State Machine (`spec.md` §4.6): an event-driven
//! controller running on every unit, reacting to lifecycle, config-changed,
//! leader-elected, peer-changed, and action events.
//!
//! Structurally grounded on `queue-keeper-core`'s event-dispatch-by-kind
//! pattern (one method per event kind, each ending by recomputing derived
//! state) but ported handler-for-handler from `spec.md` §4.6, cross-checked
//! against `examples/original_source/charm/src/charm.py`'s `_on_*` methods
//! for guard ordering and exact status wording.

use std::sync::Arc;

use chopsticks_membership::{ClusterMembership, RelationKey, TestState, UnitStatus};
use tracing::{info, warn};

use crate::config::CoordinatorConfig;
use crate::credentials::Credentials;
use crate::error::CoordinatorError;
use crate::service_manager::{ServiceDefinition, ServiceManager};
use crate::status::{self, PresentationStatus};
use crate::workload_runner::{LeaderMode, Role as RunnerRole, WorkloadRunner};

pub struct Coordinator {
    membership: Arc<dyn ClusterMembership>,
    service_manager: Arc<dyn ServiceManager>,
    config: CoordinatorConfig,
    runner: WorkloadRunner,
}

impl Coordinator {
    pub fn new(
        membership: Arc<dyn ClusterMembership>,
        service_manager: Arc<dyn ServiceManager>,
        config: CoordinatorConfig,
    ) -> Self {
        let runner = WorkloadRunner::new(
            config.workload.binary.clone(),
            config.credentials_path.clone(),
        );
        Self {
            membership,
            service_manager,
            config,
            runner,
        }
    }

    fn leader_headless_name(&self) -> String {
        WorkloadRunner::service_name(RunnerRole::Leader, Some(LeaderMode::Headless))
    }

    fn leader_webui_name(&self) -> String {
        WorkloadRunner::service_name(RunnerRole::Leader, Some(LeaderMode::WebUi))
    }

    fn worker_name(&self) -> String {
        WorkloadRunner::service_name(RunnerRole::Worker, None)
    }

    fn load_credentials(&self) -> Option<Credentials> {
        Credentials::load(&self.config.credentials_path).ok()
    }

    fn config_validity(&self) -> (bool, Option<&'static str>) {
        match self.load_credentials() {
            Some(c) if c.is_valid() => (true, None),
            Some(c) => (false, c.first_missing_field()),
            None => (false, Some("credentials_path")),
        }
    }

    async fn worker_running(&self) -> bool {
        self.service_manager.is_active(&self.worker_name()).await
    }

    async fn leader_running(&self) -> bool {
        self.service_manager.is_active(&self.leader_headless_name()).await
            || self.service_manager.is_active(&self.leader_webui_name()).await
    }

    async fn test_state(&self) -> TestState {
        self.membership
            .get_relation(RelationKey::TestState)
            .await
            .and_then(|raw| TestState::parse(&raw))
            .unwrap_or(TestState::Idle)
    }

    /// Recompute and publish this unit's presentation status
    /// (`spec.md` §4.6.2: every handler ends this way).
    async fn recompute_status(&self) -> PresentationStatus {
        let (config_valid, missing_field) = self.config_validity();
        let is_leader = self.membership.is_leader().await;
        let role = if is_leader { status::Role::Leader } else { status::Role::Worker };
        let test_state = self.test_state().await;
        let peer_count = self.membership.peer_count().await;
        let worker_running = self.worker_running().await;
        let leader_address = self.membership.get_relation(RelationKey::LeaderAddress).await;

        let projected = status::project_status(
            role,
            config_valid,
            missing_field,
            test_state,
            peer_count,
            worker_running,
            leader_address.as_deref(),
        );

        let unit_status = match &projected {
            PresentationStatus::Blocked { message } => UnitStatus::Blocked(message.clone()),
            PresentationStatus::Active { message } => UnitStatus::Active(message.clone()),
            PresentationStatus::Waiting { message } => UnitStatus::Waiting(message.clone()),
        };
        self.membership.set_status(unit_status).await;
        projected
    }

    /// Stop every local workload service regardless of role (`spec.md` §4.6:
    /// "Stop all local workload services"), grounded on `charm.py`'s
    /// `_stop_all_services`. Safe to call unconditionally; stopping an
    /// already-stopped service is a no-op.
    async fn stop_all_services(&self) -> Result<(), CoordinatorError> {
        self.service_manager
            .stop(&self.leader_headless_name())
            .await
            .map_err(CoordinatorError::ServiceManager)?;
        self.service_manager
            .stop(&self.leader_webui_name())
            .await
            .map_err(CoordinatorError::ServiceManager)?;
        self.service_manager
            .stop(&self.worker_name())
            .await
            .map_err(CoordinatorError::ServiceManager)?;
        Ok(())
    }

    fn default_service_definitions(&self) -> Vec<ServiceDefinition> {
        vec![
            ServiceDefinition {
                name: self.leader_headless_name(),
                program: self.config.workload.binary.to_string_lossy().to_string(),
                args: vec![],
                env: vec![],
                restart_on_failure: false,
            },
            ServiceDefinition {
                name: self.leader_webui_name(),
                program: self.config.workload.binary.to_string_lossy().to_string(),
                args: vec![],
                env: vec![],
                restart_on_failure: false,
            },
            ServiceDefinition {
                name: self.worker_name(),
                program: self.config.workload.binary.to_string_lossy().to_string(),
                args: vec![],
                env: vec![],
                restart_on_failure: true,
            },
        ]
    }

    // ---- 4.6.2 Event handlers ----

    /// **install:** install prerequisites, prepare directories, and register
    /// (but do not start) the service definitions. Idempotent.
    pub async fn handle_install(&self) -> Result<(), CoordinatorError> {
        std::fs::create_dir_all(&self.config.install_root)?;
        std::fs::create_dir_all(&self.config.data_dir)?;
        for definition in self.default_service_definitions() {
            self.service_manager
                .render_and_register(&definition)
                .await
                .map_err(CoordinatorError::ServiceManager)?;
        }
        info!("install: prerequisites prepared, service definitions registered");
        Ok(())
    }

    /// **config-changed:** refresh derived configuration; on missing
    /// required fields, enter blocked and return without starting any
    /// workload; otherwise regenerate service definitions, publish the
    /// leader address if leader, and maybe-start the worker. Always ends by
    /// recomputing status.
    pub async fn handle_config_changed(&self) -> Result<PresentationStatus, CoordinatorError> {
        let (config_valid, _) = self.config_validity();
        if !config_valid {
            warn!("config-changed: configuration invalid, entering blocked state");
            return Ok(self.recompute_status().await);
        }

        for definition in self.default_service_definitions() {
            self.service_manager
                .render_and_register(&definition)
                .await
                .map_err(CoordinatorError::ServiceManager)?;
        }

        let is_leader = self.membership.is_leader().await;
        if is_leader {
            self.publish_leader_address().await?;
        } else if self.config.autostart_workers {
            self.maybe_start_worker().await?;
        }

        Ok(self.recompute_status().await)
    }

    /// **start:** alias for "recompute and publish status".
    pub async fn handle_start(&self) -> PresentationStatus {
        self.recompute_status().await
    }

    /// **update-status (periodic):** if leader and `test_state == running`
    /// but the leader workload is not running, transition to `failed`.
    /// Always recomputes status.
    pub async fn handle_update_status(&self) -> Result<PresentationStatus, CoordinatorError> {
        if self.membership.is_leader().await {
            let test_state = self.test_state().await;
            if test_state == TestState::Running && !self.leader_running().await {
                warn!("update-status: leader workload not running while test_state=running, marking failed");
                self.membership
                    .set_relation(RelationKey::TestState, TestState::Failed.as_str().to_string())
                    .await?;
            }
        }
        Ok(self.recompute_status().await)
    }

    /// **stop:** stop all workload services.
    pub async fn handle_stop(&self) -> Result<PresentationStatus, CoordinatorError> {
        self.stop_all_services().await?;
        Ok(self.recompute_status().await)
    }

    /// **remove:** stop services, then delete install artifacts, config, and
    /// service definitions.
    pub async fn handle_remove(&self) -> Result<(), CoordinatorError> {
        self.handle_stop().await?;
        if self.config.install_root.exists() {
            std::fs::remove_dir_all(&self.config.install_root)?;
        }
        if self.config.credentials_path.exists() {
            std::fs::remove_file(&self.config.credentials_path)?;
        }
        info!("remove: install artifacts, config, and service definitions deleted");
        Ok(())
    }

    /// **leader-elected:** this unit just became leader.
    pub async fn handle_leader_elected(&self) -> Result<PresentationStatus, CoordinatorError> {
        self.stop_all_services().await?;

        self.publish_leader_address().await?;

        let previous_state = self.test_state().await;
        let next_state = if previous_state == TestState::Running {
            TestState::Failed
        } else {
            TestState::Idle
        };
        self.membership
            .set_relation(RelationKey::TestState, next_state.as_str().to_string())
            .await?;

        Ok(self.recompute_status().await)
    }

    /// **cluster-relation-changed:** peer set or leader address changed.
    pub async fn handle_cluster_relation_changed(&self) -> Result<PresentationStatus, CoordinatorError> {
        let is_leader = self.membership.is_leader().await;
        if is_leader {
            self.publish_leader_address().await?;
        } else {
            if self.worker_running().await {
                self.service_manager
                    .stop(&self.worker_name())
                    .await
                    .map_err(CoordinatorError::ServiceManager)?;
            }
            let leader_address = self.membership.get_relation(RelationKey::LeaderAddress).await;
            if self.config.autostart_workers && leader_address.is_some() {
                self.maybe_start_worker().await?;
            }
        }
        Ok(self.recompute_status().await)
    }

    async fn publish_leader_address(&self) -> Result<(), CoordinatorError> {
        let address = self.membership.private_address();
        let unit_id = self.membership.unit_id().to_string();
        self.membership
            .set_relation_batch(&[
                (RelationKey::LeaderAddress, address),
                (RelationKey::LeaderUnit, unit_id),
            ])
            .await?;
        Ok(())
    }

    /// **4.6.3 `maybe_start_worker`** (worker only): start iff not leader,
    /// not already running, config valid, and `leader_address` populated.
    pub async fn maybe_start_worker(&self) -> Result<(), CoordinatorError> {
        if self.membership.is_leader().await {
            return Ok(());
        }
        if self.worker_running().await {
            return Ok(());
        }
        let (config_valid, _) = self.config_validity();
        if !config_valid {
            return Ok(());
        }
        let Some(leader_address) = self.membership.get_relation(RelationKey::LeaderAddress).await else {
            return Ok(());
        };
        let Some((host, port)) = split_host_port(&leader_address) else {
            warn!(leader_address = %leader_address, "maybe_start_worker: malformed leader address, skipping");
            return Ok(());
        };

        let scenario = self
            .membership
            .get_relation(RelationKey::ScenarioFile)
            .await
            .unwrap_or_else(|| self.config.workload.default_scenario.clone());

        let request = crate::workload_runner::WorkloadRequest {
            scenario_path: std::path::PathBuf::from(scenario),
            loglevel: "INFO".to_string(),
            role: crate::workload_runner::RoleParams::Worker(crate::workload_runner::WorkerParams {
                leader_host: host,
                leader_port: port,
            }),
        };
        let definition = self.runner.render(&request);
        self.service_manager
            .render_and_register(&definition)
            .await
            .map_err(CoordinatorError::ServiceManager)?;
        self.service_manager
            .start(&definition.name)
            .await
            .map_err(CoordinatorError::ServiceManager)?;
        info!("maybe_start_worker: started worker workload");
        Ok(())
    }

    pub fn membership(&self) -> &Arc<dyn ClusterMembership> {
        &self.membership
    }

    pub fn service_manager(&self) -> &Arc<dyn ServiceManager> {
        &self.service_manager
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn runner(&self) -> &WorkloadRunner {
        &self.runner
    }

    pub(crate) fn leader_headless_service_name(&self) -> String {
        self.leader_headless_name()
    }

    pub(crate) fn leader_webui_service_name(&self) -> String {
        self.leader_webui_name()
    }

    pub(crate) fn worker_service_name(&self) -> String {
        self.worker_name()
    }

    pub(crate) async fn leader_is_running(&self) -> bool {
        self.leader_running().await
    }

    pub(crate) async fn worker_is_running(&self) -> bool {
        self.worker_running().await
    }

    pub(crate) async fn current_test_state(&self) -> TestState {
        self.test_state().await
    }

    pub(crate) fn current_config_validity(&self) -> (bool, Option<&'static str>) {
        self.config_validity()
    }
}

fn split_host_port(address: &str) -> Option<(String, u16)> {
    let (host, port) = address.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    Some((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkloadConfig;
    use crate::service_manager::InProcessServiceManager;
    use chopsticks_core::UnitId;
    use chopsticks_membership::{InProcessMembership, SharedCluster};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::{tempdir, NamedTempFile};

    fn valid_credentials_file() -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(
            br#"
endpoint: http://h:80
access_key: AK
secret_key: SK
bucket: b
region: us-east-1
driver: s5cmd
"#,
        )
        .unwrap();
        file
    }

    fn coordinator_with(
        membership: Arc<dyn ClusterMembership>,
        credentials_path: PathBuf,
        install_root: PathBuf,
        data_dir: PathBuf,
    ) -> Coordinator {
        coordinator_with_binary(membership, credentials_path, install_root, data_dir, "/usr/bin/true")
    }

    /// `binary` matters only for tests that actually start a workload and
    /// then check `is_active`: a binary that exits immediately (e.g. `true`)
    /// makes that check racy, so those tests pass `yes` instead, which keeps
    /// running regardless of the argv it is handed.
    fn coordinator_with_binary(
        membership: Arc<dyn ClusterMembership>,
        credentials_path: PathBuf,
        install_root: PathBuf,
        data_dir: PathBuf,
        binary: &str,
    ) -> Coordinator {
        let config = CoordinatorConfig {
            autostart_workers: true,
            install_root,
            data_dir,
            credentials_path,
            workload: WorkloadConfig {
                binary: PathBuf::from(binary),
                default_scenario: "scenarios/default.py".to_string(),
            },
            daemon: crate::config::DaemonEndpointConfig::default(),
        };
        Coordinator::new(membership, Arc::new(InProcessServiceManager::new()), config)
    }

    #[tokio::test]
    async fn handle_install_creates_directories_and_registers_services() {
        let dir = tempdir().unwrap();
        let cluster = SharedCluster::new();
        let leader: Arc<dyn ClusterMembership> =
            Arc::new(cluster.join(UnitId::new("chopsticks/0").unwrap(), "10.0.0.1"));
        let credentials = valid_credentials_file();
        let coordinator = coordinator_with(
            leader,
            credentials.path().to_path_buf(),
            dir.path().join("install"),
            dir.path().join("data"),
        );
        coordinator.handle_install().await.unwrap();
        assert!(dir.path().join("install").is_dir());
        assert!(dir.path().join("data").is_dir());
    }

    #[tokio::test]
    async fn config_changed_with_invalid_credentials_is_blocked_and_starts_nothing() {
        let dir = tempdir().unwrap();
        let cluster = SharedCluster::new();
        let worker: Arc<dyn ClusterMembership> =
            Arc::new(cluster.join(UnitId::new("chopsticks/0").unwrap(), "10.0.0.2"));
        let coordinator = coordinator_with(
            worker,
            dir.path().join("missing-credentials.yaml"),
            dir.path().join("install"),
            dir.path().join("data"),
        );
        let status = coordinator.handle_config_changed().await.unwrap();
        assert!(matches!(status, PresentationStatus::Blocked { .. }));
        assert!(!coordinator.worker_running().await);
    }

    #[tokio::test]
    async fn leader_elected_forces_running_test_state_to_failed() {
        let dir = tempdir().unwrap();
        let cluster = SharedCluster::new();
        let leader_handle = cluster.join(UnitId::new("chopsticks/0").unwrap(), "10.0.0.1");
        leader_handle
            .set_relation(RelationKey::TestState, "running".to_string())
            .await
            .unwrap();
        let leader: Arc<dyn ClusterMembership> = Arc::new(leader_handle);
        let credentials = valid_credentials_file();
        let coordinator = coordinator_with(
            leader,
            credentials.path().to_path_buf(),
            dir.path().join("install"),
            dir.path().join("data"),
        );
        coordinator.handle_leader_elected().await.unwrap();
        assert_eq!(coordinator.test_state().await, TestState::Failed);
    }

    #[tokio::test]
    async fn leader_elected_from_idle_stays_idle() {
        let dir = tempdir().unwrap();
        let cluster = SharedCluster::new();
        let leader: Arc<dyn ClusterMembership> =
            Arc::new(cluster.join(UnitId::new("chopsticks/0").unwrap(), "10.0.0.1"));
        let credentials = valid_credentials_file();
        let coordinator = coordinator_with(
            leader,
            credentials.path().to_path_buf(),
            dir.path().join("install"),
            dir.path().join("data"),
        );
        coordinator.handle_leader_elected().await.unwrap();
        assert_eq!(coordinator.test_state().await, TestState::Idle);
    }

    #[tokio::test]
    async fn leader_elected_stops_every_local_service_not_just_the_worker() {
        let dir = tempdir().unwrap();
        let cluster = SharedCluster::new();
        let leader: Arc<dyn ClusterMembership> =
            Arc::new(cluster.join(UnitId::new("chopsticks/0").unwrap(), "10.0.0.1"));
        let credentials = valid_credentials_file();
        let coordinator = coordinator_with(
            leader,
            credentials.path().to_path_buf(),
            dir.path().join("install"),
            dir.path().join("data"),
        );

        // Simulate stale services left running from a prior leadership stint.
        for name in [
            coordinator.leader_webui_name(),
            coordinator.worker_name(),
        ] {
            let definition = ServiceDefinition {
                name: name.clone(),
                program: "/usr/bin/yes".to_string(),
                args: vec![],
                env: vec![],
                restart_on_failure: false,
            };
            coordinator.service_manager().render_and_register(&definition).await.unwrap();
            coordinator.service_manager().start(&name).await.unwrap();
        }
        assert!(coordinator.leader_running().await);
        assert!(coordinator.worker_running().await);

        coordinator.handle_leader_elected().await.unwrap();

        assert!(!coordinator.leader_running().await);
        assert!(!coordinator.worker_running().await);
    }

    #[tokio::test]
    async fn maybe_start_worker_is_silent_without_leader_address() {
        let dir = tempdir().unwrap();
        let cluster = SharedCluster::new();
        cluster.join(UnitId::new("chopsticks/0").unwrap(), "10.0.0.1");
        let worker: Arc<dyn ClusterMembership> =
            Arc::new(cluster.join(UnitId::new("chopsticks/1").unwrap(), "10.0.0.2"));
        let credentials = valid_credentials_file();
        let coordinator = coordinator_with(
            worker,
            credentials.path().to_path_buf(),
            dir.path().join("install"),
            dir.path().join("data"),
        );
        coordinator.maybe_start_worker().await.unwrap();
        assert!(!coordinator.worker_running().await);
    }

    #[tokio::test]
    async fn maybe_start_worker_starts_once_leader_address_is_set() {
        let dir = tempdir().unwrap();
        let cluster = SharedCluster::new();
        let leader_handle = cluster.join(UnitId::new("chopsticks/0").unwrap(), "10.0.0.1");
        leader_handle
            .set_relation(RelationKey::LeaderAddress, "10.0.0.1:5557".to_string())
            .await
            .unwrap();
        let worker: Arc<dyn ClusterMembership> =
            Arc::new(cluster.join(UnitId::new("chopsticks/1").unwrap(), "10.0.0.2"));
        let credentials = valid_credentials_file();
        let coordinator = coordinator_with_binary(
            worker,
            credentials.path().to_path_buf(),
            dir.path().join("install"),
            dir.path().join("data"),
            "/usr/bin/yes",
        );
        coordinator.handle_install().await.unwrap();
        coordinator.maybe_start_worker().await.unwrap();
        assert!(coordinator.worker_running().await);
        coordinator
            .service_manager()
            .stop(&coordinator.worker_service_name())
            .await
            .unwrap();
    }
}
