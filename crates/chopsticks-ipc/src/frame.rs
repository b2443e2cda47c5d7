//! The wire frame carried over the IPC transport.
//!
//! `MetricRecord` itself has no `test_run_id` field (`spec.md` §3 scopes that
//! to the *test run*, not the record), but the daemon's JSONL sidecar needs
//! to know which run directory a record belongs to. The workload process
//! already receives its run's output directory via the argv/environment
//! contract in `spec.md` §6, so it costs nothing for it to tag every record
//! it emits with the same id on the wire.

use chopsticks_core::MetricRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcFrame {
    pub test_run_id: String,
    pub record: MetricRecord,
}

impl IpcFrame {
    pub fn new(test_run_id: impl Into<String>, record: MetricRecord) -> Self {
        Self {
            test_run_id: test_run_id.into(),
            record,
        }
    }
}
