use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::task::Task;

/// The `workload` topic envelope. A task message carries a `Task`; a
/// heartbeat carries only a simulation-time timestamp and advances the
/// orchestrator's notion of time without contributing data — essential for
/// distinguishing "no new tasks yet" from "producer stalled".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type")]
pub enum WorkloadMessage {
    #[serde(rename = "task")]
    Task {
        #[serde(with = "crate::model::timestamp")]
        timestamp: DateTime<Utc>,
        task: Task,
    },
    #[serde(rename = "heartbeat")]
    Heartbeat {
        #[serde(with = "crate::model::timestamp")]
        timestamp: DateTime<Utc>,
    },
}

impl WorkloadMessage {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            WorkloadMessage::Task { timestamp, .. } => *timestamp,
            WorkloadMessage::Heartbeat { timestamp } => *timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminates_on_message_type() {
        let heartbeat = r#"{"message_type":"heartbeat","timestamp":1700000000000}"#;
        let msg: WorkloadMessage = serde_json::from_str(heartbeat).unwrap();
        assert!(matches!(msg, WorkloadMessage::Heartbeat { .. }));

        let task = r#"{"message_type":"task","timestamp":1700000000000,"task":{
            "id":1,"submission_time":1700000000000,"duration":1000,
            "cpu_count":2,"cpu_capacity":1000.0,"mem_capacity":2048
        }}"#;
        let msg: WorkloadMessage = serde_json::from_str(task).unwrap();
        assert!(matches!(msg, WorkloadMessage::Task { .. }));
    }
}
