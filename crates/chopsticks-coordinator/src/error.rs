//! Error type for the coordinator crate, grounded on the
//! `ServiceError`/`ConfigError` split in `queue-keeper-api/src/errors.rs`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("service manager error: {0}")]
    ServiceManager(String),

    #[error("peer databag error: {0}")]
    Membership(#[from] chopsticks_membership::MembershipError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Action-handler failures, surfaced to the caller as a single human-readable
/// message (`spec.md` §7: "Action handlers recover nothing automatically;
/// they surface preconditions and sub-operation failures as a single
/// message"). Deliberately not `thiserror`-derived with structured variants:
/// every guard in `spec.md` §4.7 specifies its own literal wording, and the
/// only contract callers rely on is substring matching (e.g. "leader",
/// "already running", "invalid numeric").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionError(pub String);

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ActionError {}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
