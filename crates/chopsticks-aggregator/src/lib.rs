//! In-memory Prometheus-format accumulator for the Metrics Daemon.

pub mod aggregator;
pub mod histogram;
pub mod label;

pub use aggregator::Aggregator;
pub use label::LabelKey;
