//! Opaque identifiers shared across the workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Stable opaque id of a cluster unit, as handed out by the membership service.
///
/// Membership services name units however they like (hostnames, ordinal
/// names like `chopsticks/2`, cloud instance ids); we treat the id as an
/// opaque, non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ParseError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ParseError::InvalidFormat {
                reason: "unit id must not be empty".to_string(),
            });
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UnitId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Opaque identifier of a test run, allocated by the leader when `start-test`
/// succeeds. A random 128-bit value (`spec.md` §3); wraps a v4 UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestRunId(Uuid);

impl TestRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TestRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TestRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TestRunId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ParseError::InvalidFormat {
                reason: format!("not a valid test run id: {e}"),
            })
    }
}

/// Opaque identifier of a single metric record, unique per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid format: {reason}")]
    InvalidFormat { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_id_rejects_empty() {
        assert!(UnitId::new("").is_err());
        assert!(UnitId::new("chopsticks/0").is_ok());
    }

    #[test]
    fn test_run_id_round_trips_through_display_and_from_str() {
        let id = TestRunId::new();
        let parsed: TestRunId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_run_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<TestRunId>().is_err());
    }

    #[test]
    fn operation_ids_are_unique() {
        assert_ne!(OperationId::new(), OperationId::new());
    }
}
