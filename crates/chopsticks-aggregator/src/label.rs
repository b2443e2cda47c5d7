//! The `(operation, workload, driver, success)` label tuple every family is
//! indexed by (`spec.md` §3, §4.2).

use std::fmt;

use chopsticks_core::{MetricRecord, OperationType, WorkloadType};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelKey {
    // Field order here is irrelevant to rendering; `render_labels` below
    // controls the sorted-by-key-name output order spec.md §4.2 requires.
    pub driver: String,
    pub operation: &'static str,
    pub success: bool,
    pub workload: &'static str,
}

impl LabelKey {
    pub fn from_record(record: &MetricRecord) -> Self {
        Self {
            driver: record.driver.clone(),
            operation: operation_label(record.operation_type),
            success: record.success,
            workload: workload_label(record.workload_type),
        }
    }

    /// `{driver="...",operation="...",success="...",workload="..."}`, labels
    /// sorted alphabetically by key name as `spec.md` §4.2 requires, with an
    /// optional extra `le` label folded in for histogram bucket lines.
    pub fn render(&self, extra_le: Option<String>) -> String {
        let mut parts = vec![format!("driver=\"{}\"", escape(&self.driver))];
        if let Some(le) = extra_le {
            parts.push(format!("le=\"{le}\""));
        }
        parts.push(format!("operation=\"{}\"", self.operation));
        parts.push(format!("success=\"{}\"", self.success));
        parts.push(format!("workload=\"{}\"", self.workload));
        format!("{{{}}}", parts.join(","))
    }
}

impl fmt::Display for LabelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(None))
    }
}

fn operation_label(op: OperationType) -> &'static str {
    op.as_str()
}

fn workload_label(wl: WorkloadType) -> &'static str {
    wl.as_str()
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_orders_labels_alphabetically_by_key() {
        let key = LabelKey {
            driver: "s5cmd".to_string(),
            operation: "upload",
            success: true,
            workload: "s3",
        };
        assert_eq!(
            key.render(None),
            r#"{driver="s5cmd",operation="upload",success="true",workload="s3"}"#
        );
    }

    #[test]
    fn render_inserts_le_between_driver_and_operation() {
        let key = LabelKey {
            driver: "s5cmd".to_string(),
            operation: "upload",
            success: true,
            workload: "s3",
        };
        assert_eq!(
            key.render(Some("0.5".to_string())),
            r#"{driver="s5cmd",le="0.5",operation="upload",success="true",workload="s3"}"#
        );
    }
}
