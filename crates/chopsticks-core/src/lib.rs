//! Shared identifiers, timestamps, and the Metric Record itself.
//!
//! This crate sits at the bottom of the workspace's dependency order: it has
//! no awareness of IPC, HTTP, or the cluster membership service, only the
//! value types every other crate passes around.

pub mod error;
pub mod ids;
pub mod metric_record;
pub mod retry;
pub mod timestamp;

pub use error::ValidationError;
pub use ids::{OperationId, ParseError, TestRunId, UnitId};
pub use metric_record::{MetricRecord, OperationType, WorkloadType};
pub use retry::RetryPolicy;
pub use timestamp::Timestamp;
