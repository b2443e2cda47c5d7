//! The Metric Record: the immutable unit of work the whole metrics plane is
//! built around (`spec.md` §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::OperationId;
use crate::timestamp::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Upload,
    Download,
    Delete,
    List,
    Head,
    Read,
    Write,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Head => "head",
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadType {
    S3,
    Rbd,
}

impl WorkloadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Rbd => "rbd",
        }
    }
}

/// An immutable record of one completed workload operation.
///
/// Produced by the workload process, streamed over the IPC transport, never
/// mutated after emission. `duration_ms` and `throughput_mbps` are derived at
/// construction time so every downstream consumer (the aggregator, the JSONL
/// sidecar) sees the same values `spec.md` §3 defines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub operation_id: OperationId,
    pub timestamp_start: Timestamp,
    pub timestamp_end: Timestamp,
    pub operation_type: OperationType,
    pub workload_type: WorkloadType,
    pub object_key: String,
    pub object_size_bytes: u64,
    pub duration_ms: f64,
    pub throughput_mbps: f64,
    pub success: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub driver: String,
    pub user_id: String,
    /// Number of retries the workload performed before reaching this
    /// terminal outcome. Supplemented per `SPEC_FULL.md` §3.
    #[serde(default)]
    pub retry_count: u32,
    /// Free-form tags, carried through to the on-disk JSONL sidecar only.
    /// Supplemented per `SPEC_FULL.md` §3.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl MetricRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp_start: Timestamp,
        timestamp_end: Timestamp,
        operation_type: OperationType,
        workload_type: WorkloadType,
        object_key: impl Into<String>,
        object_size_bytes: u64,
        success: bool,
        driver: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let duration_ms = timestamp_start.duration_ms_until(timestamp_end);
        let throughput_mbps = if duration_ms > 0.0 {
            (object_size_bytes as f64 / 1_048_576.0) / (duration_ms / 1000.0)
        } else {
            0.0
        };

        Self {
            operation_id: OperationId::new(),
            timestamp_start,
            timestamp_end,
            operation_type,
            workload_type,
            object_key: object_key.into(),
            object_size_bytes,
            duration_ms,
            throughput_mbps,
            success,
            error_code: None,
            error_message: None,
            driver: driver.into(),
            user_id: user_id.into(),
            retry_count: 0,
            metadata: HashMap::new(),
        }
    }

    pub fn success_str(&self) -> &'static str {
        if self.success {
            "true"
        } else {
            "false"
        }
    }
}
