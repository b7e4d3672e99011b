//! Thread-safe append-only store of ground-truth power samples, with
//! opportunistic pruning on range queries so memory does not grow
//! unbounded over a long-running process.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::model::Consumption;

pub struct PowerTracker {
    samples: Mutex<Vec<Consumption>>,
}

impl Default for PowerTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerTracker {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Consumption>> {
        self.samples.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn add(&self, sample: Consumption) {
        self.lock().push(sample);
    }

    /// Returns a frozen snapshot of samples with `start <= t <= end`. If
    /// `prune_old`, samples with `t < start` are dropped from the store in
    /// the same lock acquisition, so concurrent queries never see the
    /// store change mid-read.
    pub fn get_power_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        prune_old: bool,
    ) -> Vec<Consumption> {
        let mut samples = self.lock();
        let snapshot: Vec<Consumption> = samples
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .copied()
            .collect();
        if prune_old {
            samples.retain(|s| s.timestamp >= start);
        }
        snapshot
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.lock().iter().map(|s| s.timestamp).max()
    }

    pub fn reading_count(&self) -> usize {
        self.lock().len()
    }
}
