//! Bounded-concurrency parameter sweep: one simulator invocation per swept
//! value, each fully isolated in its own sub-directory, collated back into
//! ascending sweep order.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use polars::prelude::*;

use crate::model::{Task, Topology};
use crate::simulator::shim::SimulationRunner;


pub struct CalibrationResult {
    pub sim_number: usize,
    pub param_value: f64,
    pub sim_dir: PathBuf,
    pub power_samples: Vec<(DateTime<Utc>, f64)>,
    pub success: bool,
    pub error_message: Option<String>,
}

struct Job {
    sim_number: usize,
    param_value: f64,
    topology: Topology,
    sim_dir: PathBuf,
}

pub struct CalibrationEngine<S: SimulationRunner> {
    shim: S,
}

impl<S: SimulationRunner> CalibrationEngine<S> {
    pub fn new(shim: S) -> Self {
        Self { shim }
    }

    /// `variant_fn` maps a dotted property path + swept value to a fresh
    /// topology variant; `None` means the point is skipped (logged).
    ///
    /// `run_number` is the calibrator's outer run counter, not the
    /// sweep-local point index — it is written verbatim into every point's
    /// `metadata.json` so that field means the same thing everywhere in the
    /// persisted-state layout.
    #[allow(clippy::too_many_arguments)]
    pub fn sweep(
        &self,
        run_number: i64,
        tasks: &[Task],
        property_path: &str,
        min: f64,
        max: f64,
        num_points: usize,
        run_dir: &Path,
        simulated_end_time: DateTime<Utc>,
        max_parallel_workers: usize,
        timeout: Duration,
        variant_fn: impl Fn(&str, f64) -> Option<Topology>,
    ) -> Vec<CalibrationResult> {
        let values = linspace(min, max, num_points);

        let mut jobs = Vec::new();
        let mut results = Vec::new();
        for (sim_number, param_value) in values.into_iter().enumerate() {
            let sim_dir = run_dir.join(format!("sim_{sim_number}"));
            match variant_fn(property_path, param_value) {
                Some(topology) => jobs.push(Job {
                    sim_number,
                    param_value,
                    topology,
                    sim_dir,
                }),
                None => {
                    log::error!(
                        "sweep point {sim_number} ({param_value}) skipped: variant_fn produced no topology"
                    );
                    results.push(CalibrationResult {
                        sim_number,
                        param_value,
                        sim_dir,
                        power_samples: Vec::new(),
                        success: false,
                        error_message: Some("no topology variant produced".to_string()),
                    });
                }
            }
        }

        let worker_count = max_parallel_workers.max(1);
        let (job_tx, job_rx) = crossbeam::channel::unbounded::<Job>();
        for job in jobs {
            job_tx.send(job).expect("receiver outlives this send loop");
        }
        drop(job_tx);

        let (result_tx, result_rx) = crossbeam::channel::unbounded::<CalibrationResult>();
        std::thread::scope(|scope| {
            for _ in 0..worker_count {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for job in job_rx.iter() {
                        let result = self.run_one(run_number, tasks, job, simulated_end_time, timeout);
                        let _ = result_tx.send(result);
                    }
                });
            }
        });
        drop(result_tx);

        results.extend(result_rx.into_iter());
        results.sort_by_key(|r| r.sim_number);
        results
    }

    /// Never panics: every failure path (shim error, missing output,
    /// unreadable parquet) becomes a `CalibrationResult` with
    /// `success: false` instead of unwinding the worker thread.
    fn run_one(
        &self,
        run_number: i64,
        tasks: &[Task],
        job: Job,
        simulated_end_time: DateTime<Utc>,
        timeout: Duration,
    ) -> CalibrationResult {
        match self
            .shim
            .run(tasks, &job.topology, &job.sim_dir, run_number, simulated_end_time, timeout)
        {
            Ok(output_dir) => match read_power_series(&output_dir) {
                Ok(power_samples) => CalibrationResult {
                    sim_number: job.sim_number,
                    param_value: job.param_value,
                    sim_dir: job.sim_dir,
                    power_samples,
                    success: true,
                    error_message: None,
                },
                Err(e) => {
                    log::error!("sweep point {} ({}): {e}", job.sim_number, job.param_value);
                    CalibrationResult {
                        sim_number: job.sim_number,
                        param_value: job.param_value,
                        sim_dir: job.sim_dir,
                        power_samples: Vec::new(),
                        success: false,
                        error_message: Some(e.to_string()),
                    }
                }
            },
            Err(e) => {
                log::error!("sweep point {} ({}) failed: {e}", job.sim_number, job.param_value);
                CalibrationResult {
                    sim_number: job.sim_number,
                    param_value: job.param_value,
                    sim_dir: job.sim_dir,
                    power_samples: Vec::new(),
                    success: false,
                    error_message: Some(e.to_string()),
                }
            }
        }
    }
}

/// Linearly-spaced values in `[min, max]`, each rounded to 2 decimal
/// places. Rounding happens here, once, because downstream metadata keys
/// are derived directly from these values.
fn linspace(min: f64, max: f64, num_points: usize) -> Vec<f64> {
    if num_points <= 1 {
        return vec![round2(min)];
    }
    let step = (max - min) / (num_points as f64 - 1.0);
    (0..num_points).map(|i| round2(min + step * i as f64)).collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn read_power_series(output_dir: &Path) -> Result<Vec<(DateTime<Utc>, f64)>, String> {
    let power_source_path = find_power_source(output_dir)
        .ok_or_else(|| format!("no powerSource.parquet found under {}", output_dir.display()))?;
    let df = ParquetReader::new(fs::File::open(&power_source_path).map_err(|e| e.to_string())?)
        .finish()
        .map_err(|e| e.to_string())?;

    let timestamp_absolute = df
        .column("timestamp_absolute")
        .and_then(|s| s.i64())
        .map_err(|e| e.to_string())?;
    let power_draw = df.column("power_draw").and_then(|s| s.f64()).map_err(|e| e.to_string())?;

    let mut series = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        if let (Some(ms), Some(power)) = (timestamp_absolute.get(i), power_draw.get(i)) {
            if let chrono::LocalResult::Single(ts) = chrono::Utc.timestamp_millis_opt(ms) {
                series.push((ts, power));
            }
        }
    }
    Ok(series)
}

fn find_power_source(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    let mut matches = Vec::new();
    collect_power_source(dir, &mut matches).ok()?;
    matches.sort();
    matches.into_iter().next()
}

fn collect_power_source(dir: &Path, matches: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_power_source(&path, matches)?;
        } else if path.file_name().and_then(|n| n.to_str()) == Some("powerSource.parquet") {
            matches.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShimError;
    use crate::model::task::Fragment;
    use crate::model::topology::{Cluster, Cpu, Host, Memory};
    use crate::model::CpuPowerModel;

    struct StubShim;

    impl SimulationRunner for StubShim {
        fn run(
            &self,
            _tasks: &[Task],
            topology: &Topology,
            sim_dir: &Path,
            run_number: i64,
            simulated_end_time: DateTime<Utc>,
            _timeout: Duration,
        ) -> Result<PathBuf, ShimError> {
            let asym_util = match &topology.clusters[0].hosts[0].cpu_power_model {
                CpuPowerModel::Asymptotic { asym_util, .. } => *asym_util,
                _ => 0.0,
            };
            if (asym_util - 0.4).abs() < 1e-9 {
                return Err(ShimError::NonZeroExit(1, "synthetic failure at 0.40".to_string()));
            }
            assert_eq!(run_number, 3, "every sweep point must carry the outer run_number, not its own index");
            let output_dir = sim_dir.join("output");
            fs::create_dir_all(&output_dir).unwrap();
            let timestamp_absolute: Vec<i64> = vec![simulated_end_time.timestamp_millis()];
            let power_draw: Vec<f64> = vec![100.0 + asym_util * 100.0];
            let mut df = df![
                "timestamp_absolute" => timestamp_absolute,
                "power_draw" => power_draw,
            ]
            .unwrap();
            ParquetWriter::new(fs::File::create(output_dir.join("powerSource.parquet")).unwrap())
                .finish(&mut df)
                .unwrap();
            Ok(output_dir)
        }

        fn rewrite_cached_metadata(&self, _: &Path, _: i64, _: DateTime<Utc>) -> Result<(), ShimError> {
            unreachable!("calibration sweep never hits the cache path")
        }
    }

    fn base_topology() -> Topology {
        Topology {
            clusters: vec![Cluster {
                name: "c0".into(),
                hosts: vec![Host {
                    name: "h0".into(),
                    count: 1,
                    cpu: Cpu {
                        core_count: 8,
                        core_speed: 2400.0,
                    },
                    memory: Memory {
                        memory_size: 16_000_000_000,
                    },
                    cpu_power_model: CpuPowerModel::Asymptotic {
                        power: 300.0,
                        idle_power: 100.0,
                        max_power: 400.0,
                        asym_util: 0.5,
                        dvfs: false,
                    },
                }],
                power_source: None,
            }],
        }
    }

    #[test]
    fn linspace_two_points_hits_the_exact_bounds() {
        assert_eq!(linspace(0.1, 0.9, 2), vec![0.10, 0.90]);
    }

    #[test]
    fn sweep_isolates_a_single_point_failure() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CalibrationEngine::new(StubShim);
        let tasks = vec![Task {
            id: 1,
            submission_time: Utc::now(),
            duration: 1000,
            cpu_count: 1,
            cpu_capacity: 1000.0,
            mem_capacity: 1024,
            fragments: vec![Fragment {
                task_id: 1,
                duration: 1000,
                cpu_count: 1,
                cpu_usage: 0.5,
            }],
        }];
        let base = base_topology();
        let results = engine.sweep(
            3,
            &tasks,
            "cpuPowerModel.asymUtil",
            0.1,
            0.9,
            9,
            dir.path(),
            Utc::now(),
            4,
            Duration::from_secs(60),
            |_path, value| {
                let mut variant = base.clone();
                variant.clusters[0].hosts[0].cpu_power_model = CpuPowerModel::Asymptotic {
                    power: 300.0,
                    idle_power: 100.0,
                    max_power: 400.0,
                    asym_util: value,
                    dvfs: false,
                };
                Some(variant)
            },
        );

        assert_eq!(results.len(), 9);
        assert!(results.windows(2).all(|w| w[0].sim_number < w[1].sim_number));
        let failed = results.iter().find(|r| !r.success).unwrap();
        assert_eq!(failed.param_value, 0.40);
        assert_eq!(results.iter().filter(|r| r.success).count(), 8);
    }
}
