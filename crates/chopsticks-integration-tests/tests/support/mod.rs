//! Shared fixture for building a `Coordinator` wired to a real
//! `chopsticks-membership` cluster and an in-process service manager, used
//! across the scenario tests in this crate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chopsticks_coordinator::config::WorkloadConfig;
use chopsticks_coordinator::service_manager::InProcessServiceManager;
use chopsticks_coordinator::{Coordinator, CoordinatorConfig};
use chopsticks_membership::{InProcessMembership, SharedCluster};

pub fn write_credentials(dir: &Path) -> PathBuf {
    let path = dir.join("credentials.yaml");
    std::fs::write(
        &path,
        r#"
endpoint: http://minio.internal:9000
access_key: AKIAEXAMPLE
secret_key: secretexample
bucket: chopsticks-runs
region: us-east-1
driver: s5cmd
"#,
    )
    .unwrap();
    path
}

pub fn write_scenario(install_root: &Path, name: &str) -> String {
    std::fs::create_dir_all(install_root).unwrap();
    std::fs::write(install_root.join(name), "# locust scenario\n").unwrap();
    name.to_string()
}

pub fn config(dir: &Path, binary: &str) -> CoordinatorConfig {
    let install_root = dir.join("install");
    write_scenario(&install_root, "scenario.py");
    CoordinatorConfig {
        autostart_workers: true,
        install_root,
        data_dir: dir.join("data"),
        credentials_path: write_credentials(dir),
        workload: WorkloadConfig {
            binary: PathBuf::from(binary),
            default_scenario: "scenario.py".to_string(),
        },
        daemon: Default::default(),
    }
}

/// A cluster of `count` units sharing one `SharedCluster`, joined in order
/// (unit 0 becomes leader). Returns one `Coordinator` per unit.
pub fn cluster(dir: &Path, binary: &str, count: u8) -> (SharedCluster, Vec<Coordinator>) {
    let shared = SharedCluster::new();
    let mut coordinators = Vec::new();
    for n in 0..count {
        let unit_id = chopsticks_core::UnitId::new(format!("chopsticks/{n}")).unwrap();
        let membership: Arc<InProcessMembership> =
            Arc::new(shared.join(unit_id, format!("10.0.0.{}", n + 1)));
        let service_manager = Arc::new(InProcessServiceManager::new());
        coordinators.push(Coordinator::new(membership, service_manager, config(dir, binary)));
    }
    (shared, coordinators)
}
