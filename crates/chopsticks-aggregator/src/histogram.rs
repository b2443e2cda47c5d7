//! Fixed-bucket histogram accumulator.

/// Upper bounds for `operation_duration_seconds` (`spec.md` §4.2).
pub const DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0];

/// Upper bounds for `operation_size_bytes` (`spec.md` §4.2).
pub const SIZE_BUCKETS: &[f64] = &[
    1024.0,
    10_240.0,
    102_400.0,
    1_048_576.0,
    10_485_760.0,
    104_857_600.0,
    1_073_741_824.0,
];

/// Per-label-group histogram state. Observations are bucketed into the
/// smallest boundary they fit under at insertion time (O(buckets) per
/// observation); rendering turns the per-bucket counts into the cumulative
/// counts Prometheus text format expects via a single prefix sum, so render
/// cost stays O(buckets) per label group, never O(records) — the divergence
/// from the source `PrometheusExporter` that `spec.md` §5 requires.
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    bucket_counts: Vec<u64>,
    sum: f64,
    count: u64,
}

impl Histogram {
    pub fn new(num_buckets: usize) -> Self {
        Self {
            bucket_counts: vec![0; num_buckets],
            sum: 0.0,
            count: 0,
        }
    }

    pub fn observe(&mut self, value: f64, boundaries: &[f64]) {
        self.sum += value;
        self.count += 1;
        if let Some(idx) = boundaries.iter().position(|&b| value <= b) {
            self.bucket_counts[idx] += 1;
        }
        // Values exceeding every finite boundary only ever show up in the
        // `+Inf` bucket, which is always `self.count`.
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Cumulative count for each finite boundary, same length and order as
    /// `boundaries`.
    pub fn cumulative_counts(&self) -> Vec<u64> {
        let mut running = 0u64;
        self.bucket_counts
            .iter()
            .map(|&c| {
                running += c;
                running
            })
            .collect()
    }
}
