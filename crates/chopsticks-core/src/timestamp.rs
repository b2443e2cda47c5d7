//! UTC timestamp wrapper used throughout the workspace.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    pub fn add_seconds(&self, seconds: u64) -> Self {
        Self(self.0 + chrono::Duration::seconds(seconds as i64))
    }

    /// Milliseconds elapsed between `self` (start) and `other` (end). Negative
    /// durations clamp to zero: metric records are append-only and a record's
    /// `timestamp_end` is never expected to precede `timestamp_start`, but a
    /// clamp is cheaper than propagating an error through every call site.
    pub fn duration_ms_until(&self, other: Timestamp) -> f64 {
        let delta = other.0 - self.0;
        (delta.num_microseconds().unwrap_or(0) as f64 / 1000.0).max(0.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_ms_until_is_non_negative() {
        let start = Timestamp::now();
        let end = start.add_seconds(1);
        assert!(start.duration_ms_until(end) >= 999.0);
        assert_eq!(end.duration_ms_until(start), 0.0);
    }
}
