//! Presentation status projection (`spec.md` §4.6.4): a pure function of
//! `(role, config_valid, test_state, worker_running, leader_address)`.

use chopsticks_membership::TestState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationStatus {
    Blocked { message: String },
    Active { message: String },
    Waiting { message: String },
}

impl PresentationStatus {
    pub fn message(&self) -> &str {
        match self {
            Self::Blocked { message } | Self::Active { message } | Self::Waiting { message } => message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Worker,
}

/// The single status-projection function every event handler calls at the
/// end of its work (`spec.md` §4.6.2: "Always end/recompute ... publish
/// status").
pub fn project_status(
    role: Role,
    config_valid: bool,
    missing_config_field: Option<&str>,
    test_state: TestState,
    peer_count: usize,
    worker_running: bool,
    leader_address: Option<&str>,
) -> PresentationStatus {
    if !config_valid {
        let field = missing_config_field.unwrap_or("credentials");
        return PresentationStatus::Blocked {
            message: format!("missing required configuration: {field}"),
        };
    }

    match role {
        Role::Leader => PresentationStatus::Active {
            message: format!("Leader ready ({peer_count} workers, test: {test_state})"),
        },
        Role::Worker => match leader_address {
            None => PresentationStatus::Waiting {
                message: "Waiting for leader address".to_string(),
            },
            Some(addr) => {
                let connectivity = if worker_running { "connected" } else { "ready" };
                PresentationStatus::Active {
                    message: format!("Worker {connectivity} -> {addr}"),
                }
            }
        },
    }
}
