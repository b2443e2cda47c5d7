//! The in-memory accumulator behind the `/metrics` endpoint.
//!
//! Grounded on `ServiceMetrics` in `queue-keeper-service/src/lib.rs` for the
//! overall shape (one struct behind a mutex, a `record`-style ingestion
//! method, a `render` method producing Prometheus text), and on the
//! drbd-reactor Prometheus plugin for the hand-rolled text-format writer —
//! neither source registers label sets this way, since both assume a fixed
//! set of label combinations decided at startup, so the writer here is
//! assembled fresh from those two shapes.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chopsticks_core::MetricRecord;
use parking_lot::Mutex;

use crate::histogram::{Histogram, DURATION_BUCKETS, SIZE_BUCKETS};
use crate::label::LabelKey;

#[derive(Debug, Clone)]
struct GroupState {
    duration_seconds: Histogram,
    size_bytes: Histogram,
    last_throughput_mbps: f64,
    total: u64,
}

impl Default for GroupState {
    fn default() -> Self {
        Self {
            duration_seconds: Histogram::new(DURATION_BUCKETS.len()),
            size_bytes: Histogram::new(SIZE_BUCKETS.len()),
            last_throughput_mbps: 0.0,
            total: 0,
        }
    }
}

/// Accumulates [`MetricRecord`]s into Prometheus-format text, keyed by
/// `(driver, operation, success, workload)` label group.
///
/// A `BTreeMap` keeps groups in a deterministic order so `render` output is
/// stable across calls, which the fetch-metrics snapshot and tests both rely
/// on.
#[derive(Default)]
pub struct Aggregator {
    groups: Mutex<BTreeMap<LabelKey, GroupState>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into its label group's running state. O(1) amortized:
    /// a handful of bucket comparisons, never a scan of prior observations.
    pub fn record(&self, record: &MetricRecord) {
        let key = LabelKey::from_record(record);
        let mut groups = self.groups.lock();
        let group = groups.entry(key).or_default();
        group
            .duration_seconds
            .observe(record.duration_ms / 1000.0, DURATION_BUCKETS);
        group
            .size_bytes
            .observe(record.object_size_bytes as f64, SIZE_BUCKETS);
        group.last_throughput_mbps = record.throughput_mbps;
        group.total += 1;
    }

    /// Render the full `/metrics` response body: four families, in this
    /// fixed order, HELP/TYPE header once per family, ascending `le` bucket
    /// lines and a final `+Inf` line per label group (`spec.md` §4.2).
    pub fn render(&self) -> String {
        let groups = self.groups.lock();
        let mut out = String::new();

        render_histogram_family(
            &mut out,
            &groups,
            "chopsticks_operation_duration_seconds",
            "Duration of workload operations in seconds.",
            DURATION_BUCKETS,
            |g| &g.duration_seconds,
        );
        render_histogram_family(
            &mut out,
            &groups,
            "chopsticks_operation_size_bytes",
            "Size in bytes of the data moved by each operation.",
            SIZE_BUCKETS,
            |g| &g.size_bytes,
        );
        render_gauge_family(
            &mut out,
            &groups,
            "chopsticks_operation_throughput_mbps",
            "Most recently observed throughput in MiB/s for this label group.",
            |g| g.last_throughput_mbps,
        );
        render_counter_family(
            &mut out,
            &groups,
            "chopsticks_operation_total",
            "Total number of completed operations.",
            |g| g.total,
        );

        out
    }
}

fn render_histogram_family(
    out: &mut String,
    groups: &BTreeMap<LabelKey, GroupState>,
    name: &str,
    help: &str,
    boundaries: &[f64],
    select: impl Fn(&GroupState) -> &Histogram,
) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} histogram");
    for (key, group) in groups {
        let hist = select(group);
        let cumulative = hist.cumulative_counts();
        for (boundary, count) in boundaries.iter().zip(cumulative.iter()) {
            let labels = key.render(Some(format_bucket_bound(*boundary)));
            let _ = writeln!(out, "{name}_bucket{labels} {count}");
        }
        let inf_labels = key.render(Some("+Inf".to_string()));
        let _ = writeln!(out, "{name}_bucket{inf_labels} {}", hist.count());
        let _ = writeln!(out, "{name}_sum{} {}", key.render(None), hist.sum());
        let _ = writeln!(out, "{name}_count{} {}", key.render(None), hist.count());
    }
}

fn render_gauge_family(
    out: &mut String,
    groups: &BTreeMap<LabelKey, GroupState>,
    name: &str,
    help: &str,
    select: impl Fn(&GroupState) -> f64,
) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    for (key, group) in groups {
        let _ = writeln!(out, "{name}{} {}", key.render(None), select(group));
    }
}

fn render_counter_family(
    out: &mut String,
    groups: &BTreeMap<LabelKey, GroupState>,
    name: &str,
    help: &str,
    select: impl Fn(&GroupState) -> u64,
) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
    for (key, group) in groups {
        let _ = writeln!(out, "{name}{} {}", key.render(None), select(group));
    }
}

/// Prometheus bucket bounds render without trailing zeros but must still
/// read as valid floats (e.g. `0.01`, not `0.0100000000000001`).
fn format_bucket_bound(bound: f64) -> String {
    let mut s = format!("{bound}");
    if !s.contains('.') {
        s.push_str(".0");
    }
    s
}

#[cfg(test)]
mod tests {
    use chopsticks_core::{MetricRecord, OperationType, Timestamp, WorkloadType};

    use super::*;

    fn record(success: bool, object_size_bytes: u64) -> MetricRecord {
        let start = Timestamp::now();
        let end = start.add_seconds(1);
        MetricRecord::new(
            start,
            end,
            OperationType::Upload,
            WorkloadType::S3,
            "key",
            object_size_bytes,
            success,
            "driver-1",
            "user-1",
        )
    }

    #[test]
    fn operation_total_sums_to_ingest_count_across_label_sets() {
        let agg = Aggregator::new();
        for _ in 0..3 {
            agg.record(&record(true, 1024));
        }
        for _ in 0..2 {
            agg.record(&record(false, 2048));
        }
        let rendered = agg.render();
        let total_lines: u64 = rendered
            .lines()
            .filter(|l| l.starts_with("chopsticks_operation_total{"))
            .map(|l| l.rsplit(' ').next().unwrap().parse::<u64>().unwrap())
            .sum();
        assert_eq!(total_lines, 5);
    }

    #[test]
    fn render_emits_families_in_fixed_order() {
        let agg = Aggregator::new();
        agg.record(&record(true, 1024));
        let rendered = agg.render();
        let duration_pos = rendered.find("chopsticks_operation_duration_seconds").unwrap();
        let size_pos = rendered.find("chopsticks_operation_size_bytes").unwrap();
        let throughput_pos = rendered.find("chopsticks_operation_throughput_mbps").unwrap();
        let total_pos = rendered.find("chopsticks_operation_total").unwrap();
        assert!(duration_pos < size_pos);
        assert!(size_pos < throughput_pos);
        assert!(throughput_pos < total_pos);
    }

    #[test]
    fn histogram_bucket_line_includes_le_label_before_operation() {
        let agg = Aggregator::new();
        agg.record(&record(true, 1024));
        let rendered = agg.render();
        assert!(rendered.contains(r#"{driver="driver-1",le="0.01","#)
            || rendered.contains(r#"{driver="driver-1",le="#));
    }
}
