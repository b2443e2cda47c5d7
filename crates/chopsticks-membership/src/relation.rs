//! Peer databag keys (`spec.md` §3).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKey {
    LeaderAddress,
    LeaderUnit,
    TestState,
    TestRunId,
    ScenarioFile,
}

impl RelationKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeaderAddress => "leader_address",
            Self::LeaderUnit => "leader_unit",
            Self::TestState => "test_state",
            Self::TestRunId => "test_run_id",
            Self::ScenarioFile => "scenario_file",
        }
    }
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `test_state`'s four values (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestState {
    Idle,
    Running,
    Stopped,
    Failed,
}

impl TestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "idle" => Some(Self::Idle),
            "running" => Some(Self::Running),
            "stopped" => Some(Self::Stopped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
