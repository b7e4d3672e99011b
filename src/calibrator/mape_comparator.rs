//! Time-aligns two unevenly-sampled series onto a common 60-second grid
//! and computes mean absolute percentage error within a rolling window.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapeResult {
    pub mape: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub num_points: usize,
    pub mean_simulated: f64,
    pub mean_actual: f64,
}

const GRID_STEP_SECONDS: i64 = 60;

pub struct MapeComparator {
    window: Duration,
}

impl MapeComparator {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// `simulated`/`actual` need not be sorted or pre-aligned; both are
    /// sorted internally before interpolation.
    pub fn compare(
        &self,
        simulated: &[(DateTime<Utc>, f64)],
        actual: &[(DateTime<Utc>, f64)],
        simulation_end_time: DateTime<Utc>,
    ) -> MapeResult {
        let mut simulated = simulated.to_vec();
        let mut actual = actual.to_vec();
        simulated.sort_by_key(|(t, _)| *t);
        actual.sort_by_key(|(t, _)| *t);

        let window_end = simulation_end_time;

        let (Some((sim_start, _)), Some((act_start, _))) = (simulated.first(), actual.first()) else {
            return infinite_result(window_end - self.window, window_end);
        };
        let earliest_overlap = (*sim_start).max(*act_start);
        let window_start = earliest_overlap.max(window_end - self.window);

        if window_end < window_start {
            return infinite_result(window_start, window_end);
        }

        let grid = build_grid(window_start, window_end);
        let mut sim_values = Vec::new();
        let mut act_values = Vec::new();
        for t in grid {
            if let (Some(s), Some(a)) = (interpolate_at(&simulated, t), interpolate_at(&actual, t)) {
                sim_values.push(s);
                act_values.push(a);
            }
        }

        if sim_values.is_empty() {
            return infinite_result(window_start, window_end);
        }

        let mean_simulated = mean(&sim_values);
        let mean_actual = mean(&act_values);

        let ratios: Vec<f64> = sim_values
            .iter()
            .zip(act_values.iter())
            .filter(|(_, a)| **a != 0.0)
            .map(|(s, a)| (a - s).abs() / a.abs())
            .collect();

        let mape = if ratios.is_empty() { f64::INFINITY } else { mean(&ratios) * 100.0 };

        MapeResult {
            mape,
            window_start,
            window_end,
            num_points: sim_values.len(),
            mean_simulated,
            mean_actual,
        }
    }
}

fn infinite_result(window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> MapeResult {
    MapeResult {
        mape: f64::INFINITY,
        window_start,
        window_end,
        num_points: 0,
        mean_simulated: 0.0,
        mean_actual: 0.0,
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn build_grid(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut grid = Vec::new();
    let mut t = start;
    while t <= end {
        grid.push(t);
        t += Duration::seconds(GRID_STEP_SECONDS);
    }
    grid
}

/// Linear interpolation at `t`. `None` if `t` falls outside the series'
/// own span — that span is strictly per-series, not the shared grid.
fn interpolate_at(series: &[(DateTime<Utc>, f64)], t: DateTime<Utc>) -> Option<f64> {
    let first = series.first()?;
    let last = series.last()?;
    if t < first.0 || t > last.0 {
        return None;
    }
    match series.binary_search_by_key(&t, |(ts, _)| *ts) {
        Ok(idx) => Some(series[idx].1),
        Err(idx) => {
            let (t0, v0) = series[idx - 1];
            let (t1, v1) = series[idx];
            let span = (t1 - t0).num_milliseconds() as f64;
            if span == 0.0 {
                return Some(v0);
            }
            let frac = (t - t0).num_milliseconds() as f64 / span;
            Some(v0 + (v1 - v0) * frac)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn identical_series_yields_zero_mape() {
        let comparator = MapeComparator::new(Duration::minutes(60));
        let series = vec![(t(0), 100.0), (t(5), 100.0), (t(10), 100.0)];
        let result = comparator.compare(&series, &series, t(10));
        assert!(result.mape.abs() < 1e-9);
        assert_eq!(result.mean_simulated, result.mean_actual);
    }

    #[test]
    fn empty_inputs_yield_infinite_mape_with_zeroed_means() {
        let comparator = MapeComparator::new(Duration::minutes(30));
        let result = comparator.compare(&[], &[], t(0));
        assert!(result.mape.is_infinite());
        assert_eq!(result.mean_simulated, 0.0);
        assert_eq!(result.mean_actual, 0.0);
    }

    #[test]
    fn all_zero_actual_yields_infinite_mape() {
        let comparator = MapeComparator::new(Duration::minutes(60));
        let simulated = vec![(t(0), 5.0), (t(10), 5.0)];
        let actual = vec![(t(0), 0.0), (t(10), 0.0)];
        let result = comparator.compare(&simulated, &actual, t(10));
        assert!(result.mape.is_infinite());
    }

    #[test]
    fn single_sided_overlap_yields_infinite_mape() {
        let comparator = MapeComparator::new(Duration::minutes(60));
        let simulated = vec![(t(0), 100.0), (t(10), 100.0)];
        let actual = vec![(t(100), 100.0), (t(110), 100.0)];
        let result = comparator.compare(&simulated, &actual, t(110));
        assert!(result.mape.is_infinite());
    }

    #[test]
    fn window_never_exceeds_the_configured_cap() {
        let comparator = MapeComparator::new(Duration::minutes(30));
        let series: Vec<(DateTime<Utc>, f64)> = (0..200).map(|m| (t(m), 100.0)).collect();
        let result = comparator.compare(&series, &series, t(199));
        assert!(result.window_end - result.window_start <= Duration::minutes(30));
    }
}
