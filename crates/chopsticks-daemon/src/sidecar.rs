//! Per-run JSONL sidecar the daemon streams alongside aggregation
//! (`SPEC_FULL.md` §4.1's daemon-side supplement to `spec.md` §3's run
//! directory — distinct from the workload driver's own end-of-run export in
//! `examples/original_source/src/chopsticks/workloads/base_metrics_workload.py`,
//! which this crate never touches).

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chopsticks_core::MetricRecord;

/// Appends every ingested record as one JSON line per test run directory.
/// A new file handle is opened lazily per `test_run_id` the first time a
/// record for that run arrives, and kept open for the life of the daemon
/// process.
#[derive(Default)]
pub struct JsonlSidecar {
    data_dir: PathBuf,
    open_files: Mutex<HashMap<String, std::fs::File>>,
}

impl JsonlSidecar {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            open_files: Mutex::new(HashMap::new()),
        }
    }

    /// Append one record to `<data_dir>/<test_run_id>/metrics.jsonl`.
    /// `test_run_id` is supplied by the caller (the IPC message envelope
    /// carries it out of band from the record itself, which has no such
    /// field — see `DESIGN.md`).
    pub fn append(&self, test_run_id: &str, record: &MetricRecord) -> std::io::Result<()> {
        let mut open_files = self.open_files.lock().unwrap();
        let file = match open_files.get_mut(test_run_id) {
            Some(file) => file,
            None => {
                let run_dir = self.data_dir.join(test_run_id);
                std::fs::create_dir_all(&run_dir)?;
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(run_dir.join("metrics.jsonl"))?;
                open_files.insert(test_run_id.to_string(), file);
                open_files.get_mut(test_run_id).unwrap()
            }
        };
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        file.write_all(&line)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
