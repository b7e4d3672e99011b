use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One slice of a task's resource usage. Fragments are an aggregation
/// field populated by the producer, not present in `tasks.parquet` itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(rename = "id", with = "crate::model::ids")]
    pub task_id: i64,
    pub duration: i64,
    pub cpu_count: i32,
    pub cpu_usage: f64,
}

/// One computational job arriving on the workload stream.
///
/// Fragment durations are not required to sum to `duration` — this is
/// trace data, not a derived quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(with = "crate::model::ids")]
    pub id: i64,
    #[serde(with = "crate::model::timestamp")]
    pub submission_time: DateTime<Utc>,
    pub duration: i64,
    pub cpu_count: i32,
    pub cpu_capacity: f64,
    pub mem_capacity: i64,
    #[serde(default)]
    pub fragments: Vec<Fragment>,
}

impl Task {
    pub fn duration_seconds(&self) -> f64 {
        self.duration as f64 / 1000.0
    }

    pub fn total_cpu_mhz(&self) -> f64 {
        self.cpu_count as f64 * self.cpu_capacity
    }

    pub fn mem_capacity_gb(&self) -> f64 {
        self.mem_capacity as f64 / 1024.0
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }
}
