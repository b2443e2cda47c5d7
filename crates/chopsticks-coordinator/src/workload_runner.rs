//! Translates a validated test-start request into a correctly-parameterized
//! child process invocation (`spec.md` §4.5, argv contract in §6).

use std::path::PathBuf;

use chopsticks_core::{RetryPolicy, TestRunId};

use crate::service_manager::ServiceDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Worker,
}

/// Headless (driven entirely by `start-test` parameters) or web-UI leader
/// mode (`spec.md` §4.5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderMode {
    Headless,
    WebUi,
}

#[derive(Debug, Clone)]
pub struct LeaderParams {
    pub mode: LeaderMode,
    pub master_bind_port: u16,
    pub web_port: u16,
    pub users: u32,
    pub spawn_rate: f64,
    pub run_time: String,
    pub test_run_id: TestRunId,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct WorkerParams {
    pub leader_host: String,
    pub leader_port: u16,
}

#[derive(Debug, Clone)]
pub enum RoleParams {
    Leader(LeaderParams),
    Worker(WorkerParams),
}

/// Everything needed to build an argv for one workload invocation.
#[derive(Debug, Clone)]
pub struct WorkloadRequest {
    pub scenario_path: PathBuf,
    pub loglevel: String,
    pub role: RoleParams,
}

pub struct WorkloadRunner {
    binary: PathBuf,
    credentials_path: PathBuf,
}

impl WorkloadRunner {
    pub fn new(binary: impl Into<PathBuf>, credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            credentials_path: credentials_path.into(),
        }
    }

    /// Build the service name for a given role, matching `spec.md` §4.6.1's
    /// "stop any leader/worker workload process" phrasing: a fixed, role-scoped
    /// name the Coordinator and the service manager both agree on.
    pub fn service_name(role: Role, mode: Option<LeaderMode>) -> String {
        match (role, mode) {
            (Role::Leader, Some(LeaderMode::Headless)) => "chopsticks-workload-leader-headless".to_string(),
            (Role::Leader, Some(LeaderMode::WebUi)) => "chopsticks-workload-leader-webui".to_string(),
            (Role::Leader, None) => "chopsticks-workload-leader-headless".to_string(),
            (Role::Worker, _) => "chopsticks-workload-worker".to_string(),
        }
    }

    /// Render the full service definition (argv, env, restart policy) for
    /// this request.
    pub fn render(&self, request: &WorkloadRequest) -> ServiceDefinition {
        let (name, args, restart_on_failure) = match &request.role {
            RoleParams::Leader(params) => {
                let name = Self::service_name(Role::Leader, Some(params.mode));
                let args = self.leader_args(request, params);
                // Leader services are not auto-restarted (spec.md §4.6.1/§4.5):
                // a failed leader means a failed run, reflected via update-status.
                (name, args, false)
            }
            RoleParams::Worker(params) => {
                let name = Self::service_name(Role::Worker, None);
                let args = self.worker_args(request, params);
                (name, args, true)
            }
        };

        ServiceDefinition {
            name,
            program: self.binary.to_string_lossy().to_string(),
            args,
            env: vec![(
                "CHOPSTICKS_CREDENTIALS_PATH".to_string(),
                self.credentials_path.to_string_lossy().to_string(),
            )],
            restart_on_failure,
        }
    }

    fn leader_args(&self, request: &WorkloadRequest, params: &LeaderParams) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            request.scenario_path.to_string_lossy().to_string(),
            "--master".to_string(),
            format!("--master-bind-port={}", params.master_bind_port),
            format!("--loglevel={}", request.loglevel),
        ];
        match params.mode {
            LeaderMode::Headless => {
                let run_dir = params.data_dir.join(params.test_run_id.to_string());
                args.push("--headless".to_string());
                args.push(format!("--users={}", params.users));
                args.push(format!("--spawn-rate={}", params.spawn_rate));
                args.push(format!("--run-time={}", params.run_time));
                args.push(format!("--csv={}", run_dir.join("metrics").display()));
                args.push(format!("--html={}", run_dir.join("report.html").display()));
            }
            LeaderMode::WebUi => {
                args.push(format!("--web-port={}", params.web_port));
            }
        }
        args
    }

    fn worker_args(&self, request: &WorkloadRequest, params: &WorkerParams) -> Vec<String> {
        vec![
            "-f".to_string(),
            request.scenario_path.to_string_lossy().to_string(),
            "--worker".to_string(),
            format!("--master-host={}", params.leader_host),
            format!("--master-port={}", params.leader_port),
            format!("--loglevel={}", request.loglevel),
        ]
    }

    /// The worker restart policy quoted in `spec.md` §4.5: a flat 5 s
    /// back-off.
    pub fn worker_restart_policy() -> RetryPolicy {
        RetryPolicy::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> WorkloadRunner {
        WorkloadRunner::new("/usr/bin/chopsticks-workload", "/etc/chopsticks/credentials.yaml")
    }

    #[test]
    fn leader_headless_argv_matches_documented_contract() {
        let request = WorkloadRequest {
            scenario_path: PathBuf::from("scenarios/default.py"),
            loglevel: "INFO".to_string(),
            role: RoleParams::Leader(LeaderParams {
                mode: LeaderMode::Headless,
                master_bind_port: 5557,
                web_port: 8089,
                users: 10,
                spawn_rate: 2.0,
                run_time: "20s".to_string(),
                test_run_id: TestRunId::new(),
                data_dir: PathBuf::from("/var/lib/chopsticks/data"),
            }),
        };
        let definition = runner().render(&request);
        assert!(!definition.restart_on_failure);
        assert_eq!(definition.args[0], "-f");
        assert_eq!(definition.args[1], "scenarios/default.py");
        assert!(definition.args.contains(&"--master".to_string()));
        assert!(definition.args.contains(&"--master-bind-port=5557".to_string()));
        assert!(definition.args.contains(&"--headless".to_string()));
        assert!(definition.args.contains(&"--users=10".to_string()));
        assert!(definition.args.contains(&"--spawn-rate=2".to_string()));
        assert!(definition.args.contains(&"--run-time=20s".to_string()));
        assert!(definition.args.iter().any(|a| a.starts_with("--csv=")));
        assert!(definition.args.iter().any(|a| a.starts_with("--html=")));
    }

    #[test]
    fn leader_webui_argv_omits_headless_flags() {
        let request = WorkloadRequest {
            scenario_path: PathBuf::from("scenarios/default.py"),
            loglevel: "INFO".to_string(),
            role: RoleParams::Leader(LeaderParams {
                mode: LeaderMode::WebUi,
                master_bind_port: 5557,
                web_port: 8089,
                users: 10,
                spawn_rate: 2.0,
                run_time: "20s".to_string(),
                test_run_id: TestRunId::new(),
                data_dir: PathBuf::from("/var/lib/chopsticks/data"),
            }),
        };
        let definition = runner().render(&request);
        assert!(definition.args.contains(&"--web-port=8089".to_string()));
        assert!(!definition.args.iter().any(|a| a == "--headless"));
        assert!(!definition.args.iter().any(|a| a.starts_with("--csv=")));
    }

    #[test]
    fn worker_argv_matches_documented_contract() {
        let request = WorkloadRequest {
            scenario_path: PathBuf::from("scenarios/default.py"),
            loglevel: "WARNING".to_string(),
            role: RoleParams::Worker(WorkerParams {
                leader_host: "10.0.0.1".to_string(),
                leader_port: 5557,
            }),
        };
        let definition = runner().render(&request);
        assert!(definition.restart_on_failure);
        assert!(definition.args.contains(&"--worker".to_string()));
        assert!(definition.args.contains(&"--master-host=10.0.0.1".to_string()));
        assert!(definition.args.contains(&"--master-port=5557".to_string()));
    }

    #[test]
    fn worker_restart_policy_is_flat_five_seconds() {
        let policy = WorkloadRunner::worker_restart_policy();
        assert_eq!(
            policy.delay_for_attempt(3),
            std::time::Duration::from_secs(5)
        );
    }
}
