use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ground-truth power reading from the `power` topic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Consumption {
    #[serde(with = "crate::model::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub power_draw: f64,
    pub energy_usage: f64,
}

impl Consumption {
    pub fn energy_usage_kwh(&self) -> f64 {
        self.energy_usage / 3_600_000.0
    }

    pub fn power_draw_kw(&self) -> f64 {
        self.power_draw / 1000.0
    }
}
