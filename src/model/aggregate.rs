use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the simulator's `agg_results.parquet`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    #[serde(with = "crate::model::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub run_number: i64,
    pub power_draw: f64,
    pub energy_usage: f64,
    pub carbon_intensity: f64,
    pub carbon_emission: f64,
    pub cached: bool,
}

/// One row of the calibrator's `agg_results.parquet`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationAggregateRow {
    #[serde(with = "crate::model::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub run_number: i64,
    pub calibrated_property: String,
    pub best_value: f64,
    pub best_mape: f64,
    pub topology_changed: bool,
    pub task_count: i64,
}
