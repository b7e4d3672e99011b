//! Drives the calibrator service: a consumer activity that feeds the
//! shared `TaskAccumulator`/`PowerTracker`/`TopologyManager`, and a sweep
//! loop that drives `CalibrationEngine` + `MapeComparator` and publishes
//! the best-variant topology on change.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use polars::prelude::*;
use serde_json::json;

use crate::calibrator::calibration_engine::{CalibrationEngine, CalibrationResult};
use crate::calibrator::mape_comparator::MapeComparator;
use crate::calibrator::power_tracker::PowerTracker;
use crate::calibrator::topology_manager::TopologyManager;
use crate::error::CalibrationError;
use crate::model::{CalibratableField, CalibrationAggregateRow, Consumption, TopologySnapshot, WorkloadMessage};
use crate::simulator::shim::SimulationRunner;
use crate::substrate::{decode_json, BusConsumer, BusProducer, InboundMessage};
use crate::task_accumulator::TaskAccumulator;

const POLL_TIMEOUT: StdDuration = StdDuration::from_millis(500);
const RETRY_SHORT: StdDuration = StdDuration::from_secs(1);
const RETRY_LONG: StdDuration = StdDuration::from_secs(5);

/// Outcome of one sweep-loop iteration that actually ran a simulation
/// sweep to completion (as opposed to an early retry condition).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepOutcome {
    Published { best_value: f64, best_mape: f64 },
    Unchanged { best_value: f64, best_mape: f64 },
}

/// Bookkeeping mutated only by the sweep activity. Kept behind its own
/// mutex (rather than a plain field requiring `&mut self`) so the sweep
/// loop can run on its own thread while `run_consumer` holds a shared
/// reference to the same orchestrator, exactly as `accumulator` /
/// `power_tracker` / `topology_manager` already do for the consumer side.
struct SweepState {
    run_number: i64,
    last_best_value: Option<f64>,
    last_simulation_time: Option<DateTime<Utc>>,
}

pub struct CalibratorOrchestrator<S: SimulationRunner> {
    accumulator: TaskAccumulator,
    power_tracker: PowerTracker,
    topology_manager: TopologyManager,
    engine: CalibrationEngine<S>,
    comparator: MapeComparator,
    property_path: String,
    min_value: f64,
    max_value: f64,
    linspace_points: usize,
    max_parallel_workers: usize,
    timeout: StdDuration,
    run_root: PathBuf,
    aggregate_path: PathBuf,
    workload_topic: String,
    power_topic: String,
    topology_topic: String,
    sweep_state: Mutex<SweepState>,
}

impl<S: SimulationRunner> CalibratorOrchestrator<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shim: S,
        run_root: PathBuf,
        aggregate_path: PathBuf,
        property_path: String,
        min_value: f64,
        max_value: f64,
        linspace_points: usize,
        max_parallel_workers: usize,
        mape_window: ChronoDuration,
        timeout: StdDuration,
        workload_topic: String,
        power_topic: String,
        topology_topic: String,
    ) -> Self {
        Self {
            accumulator: TaskAccumulator::new(),
            power_tracker: PowerTracker::new(),
            topology_manager: TopologyManager::new(),
            engine: CalibrationEngine::new(shim),
            comparator: MapeComparator::new(mape_window),
            property_path,
            min_value,
            max_value,
            linspace_points,
            max_parallel_workers,
            timeout,
            run_root,
            aggregate_path,
            workload_topic,
            power_topic,
            topology_topic,
            sweep_state: Mutex::new(SweepState {
                run_number: 0,
                last_best_value: None,
                last_simulation_time: None,
            }),
        }
    }

    /// The consumer activity: a single loop over workload, power, and real
    /// topology messages, feeding `TaskAccumulator`/`PowerTracker`/
    /// `TopologyManager`. Runs concurrently with `run_sweep` against the
    /// same shared stores; both observe a shutdown request through `stop`.
    pub fn run_consumer(&self, consumer: &mut dyn BusConsumer, stop: &AtomicBool) {
        let mut message_count: u64 = 0;
        while !stop.load(Ordering::Relaxed) {
            match consumer.poll(POLL_TIMEOUT) {
                None => continue,
                Some(Err(e)) => log::warn!("calibrator consumer error: {e}"),
                Some(Ok(inbound)) => {
                    message_count += 1;
                    if message_count == 1 || message_count % 100 == 0 {
                        log::info!("calibrator consumer: {message_count} messages processed");
                    }
                    if let Err(e) = self.handle_inbound(inbound) {
                        log::warn!("calibrator consumer iteration failed: {e}");
                    }
                }
            }
        }
    }

    fn handle_inbound(&self, inbound: InboundMessage) -> Result<(), CalibrationError> {
        if inbound.topic == self.workload_topic {
            self.handle_workload(decode_json(&inbound.payload)?)
        } else if inbound.topic == self.power_topic {
            self.handle_power(decode_json(&inbound.payload)?)
        } else if inbound.topic == self.topology_topic {
            self.handle_real_topology(decode_json(&inbound.payload)?)
        } else {
            log::warn!("unrecognized topic '{}', dropping message", inbound.topic);
            Ok(())
        }
    }

    fn handle_workload(&self, message: WorkloadMessage) -> Result<(), CalibrationError> {
        if let WorkloadMessage::Task { task, .. } = message {
            self.accumulator.add(task);
            let count = self.accumulator.len();
            if count % 50 == 0 {
                log::info!("calibrator accumulator: {count} tasks");
            }
        }
        Ok(())
    }

    fn handle_power(&self, sample: Consumption) -> Result<(), CalibrationError> {
        self.power_tracker.add(sample);
        Ok(())
    }

    fn handle_real_topology(&self, snapshot: TopologySnapshot) -> Result<(), CalibrationError> {
        self.topology_manager.set_real_topology(snapshot.topology);
        Ok(())
    }

    /// Runs the sweep loop until `stop` is set. Each iteration is either a
    /// retry condition (sleeps and loops back) or a completed sweep
    /// (publishes or not, then loops back immediately).
    pub fn run_sweep(&self, producer: &dyn BusProducer, sim_topology_topic: &str, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            match self.run_sweep_once(producer, sim_topology_topic) {
                Ok(outcome) => {
                    let run_number = self.sweep_state.lock().unwrap_or_else(|p| p.into_inner()).run_number;
                    log::info!("sweep run_{run_number}: {outcome:?}");
                }
                Err(e @ (CalibrationError::NoTopology | CalibrationError::NoTasks | CalibrationError::NoPowerData)) => {
                    log::debug!("sweep retry: {e}");
                    std::thread::sleep(RETRY_SHORT);
                }
                Err(e) => {
                    log::warn!("sweep iteration failed: {e}");
                    std::thread::sleep(RETRY_LONG);
                }
            }
        }
    }

    /// One sweep-loop iteration, following the algorithm in order. Never
    /// sleeps itself — callers decide retry pacing based on the error kind.
    fn run_sweep_once(
        &self,
        producer: &dyn BusProducer,
        sim_topology_topic: &str,
    ) -> Result<SweepOutcome, CalibrationError> {
        let base_topology = self.topology_manager.current().ok_or(CalibrationError::NoTopology)?;

        let tasks = self.accumulator.snapshot();
        if tasks.is_empty() {
            return Err(CalibrationError::NoTasks);
        }

        let latest_task_time = tasks.iter().map(|t| t.submission_time).max().expect("non-empty");
        let latest_power_time = self.power_tracker.latest_timestamp().ok_or(CalibrationError::NoPowerData)?;
        let first_task_time = self.accumulator.first_task_time().expect("tasks non-empty");

        let window_end = latest_task_time.min(latest_power_time);
        let window_start = first_task_time;
        let required_overlap = ChronoDuration::minutes(30).min(self.comparator.window());
        let have_overlap = window_end - window_start;
        if have_overlap < required_overlap {
            return Err(CalibrationError::InsufficientOverlap {
                have: have_overlap,
                need: required_overlap,
            });
        }

        // Re-derived from the config string rather than trusted from
        // construction: if the calibrated property is ever invalid at
        // sweep time, fail this iteration with a typed error instead of
        // silently sweeping nothing.
        let field = CalibratableField::parse_path(&self.property_path)
            .ok_or_else(|| CalibrationError::UnknownPropertyPath(self.property_path.clone()))?;

        let run_number = {
            let mut state = self.sweep_state.lock().unwrap_or_else(|p| p.into_inner());
            state.run_number += 1;
            state.run_number
        };
        let run_dir = self.run_root.join(format!("run_{run_number}"));

        let variant_base = base_topology.clone();
        let results = self.engine.sweep(
            run_number,
            &tasks,
            &self.property_path,
            self.min_value,
            self.max_value,
            self.linspace_points,
            &run_dir,
            latest_task_time,
            self.max_parallel_workers,
            self.timeout,
            |_path, value| {
                let mut variant = variant_base.clone();
                if variant.set_field_everywhere(field, value) == 0 {
                    log::warn!("sweep value {value} not accepted by any host's power model");
                }
                Some(variant)
            },
        );

        let actual_power: Vec<(DateTime<Utc>, f64)> = self
            .power_tracker
            .get_power_in_window(window_start, window_end, true)
            .into_iter()
            .map(|c| (c.timestamp, c.power_draw))
            .collect();
        if actual_power.is_empty() {
            return Err(CalibrationError::NoGroundTruth);
        }

        let (best, mape_values) = pick_best(&results, &self.comparator, &actual_power, window_end)
            .ok_or(CalibrationError::NoSuccessfulSweepPoints)?;

        let last_best_value = self.sweep_state.lock().unwrap_or_else(|p| p.into_inner()).last_best_value;
        let topology_changed = match last_best_value {
            None => true,
            Some(last) => (best.0 - last).abs() > 1e-6,
        };

        if topology_changed {
            let mut variant = base_topology.clone();
            variant.set_field_everywhere(field, best.0);
            if let Err(e) = self.topology_manager.publish(producer, sim_topology_topic, &variant) {
                log::warn!("failed to publish calibrated topology variant: {e}");
            }
        }

        self.persist_run_metadata(run_number, &run_dir, tasks.len(), window_start, window_end, &mape_values)
            .map_err(|e| {
                log::warn!("failed to persist calibration run metadata: {e}");
                CalibrationError::NoSuccessfulSweepPoints
            })?;
        self.append_aggregate_row(run_number, window_end, tasks.len(), best.0, best.1, topology_changed)
            .map_err(|e| {
                log::warn!("failed to append calibration aggregate row: {e}");
                CalibrationError::NoSuccessfulSweepPoints
            })?;

        {
            let mut state = self.sweep_state.lock().unwrap_or_else(|p| p.into_inner());
            state.last_best_value = Some(best.0);
            state.last_simulation_time = Some(window_end);
        }

        Ok(if topology_changed {
            SweepOutcome::Published { best_value: best.0, best_mape: best.1 }
        } else {
            SweepOutcome::Unchanged { best_value: best.0, best_mape: best.1 }
        })
    }

    fn persist_run_metadata(
        &self,
        run_number: i64,
        run_dir: &std::path::Path,
        task_count: usize,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        mape_values: &[(f64, f64)],
    ) -> Result<(), std::io::Error> {
        let mape_object: serde_json::Map<String, serde_json::Value> = mape_values
            .iter()
            .map(|(value, mape)| (format!("{value:.2}"), json!(mape)))
            .collect();
        let metadata = json!({
            "run_number": run_number,
            "task_count": task_count,
            "wall_clock_time": Utc::now(),
            "window": { "start": window_start, "end": window_end },
            "mape_values": mape_object,
        });
        fs::create_dir_all(run_dir)?;
        fs::write(run_dir.join("metadata.json"), serde_json::to_vec_pretty(&metadata)?)
    }

    fn append_aggregate_row(
        &self,
        run_number: i64,
        timestamp: DateTime<Utc>,
        task_count: usize,
        best_value: f64,
        best_mape: f64,
        topology_changed: bool,
    ) -> Result<(), polars::error::PolarsError> {
        let row = CalibrationAggregateRow {
            timestamp,
            run_number,
            calibrated_property: self.property_path.clone(),
            best_value,
            best_mape,
            topology_changed,
            task_count: task_count as i64,
        };
        let mut rows = read_calibration_rows(&self.aggregate_path)?;
        rows.push(row);
        write_calibration_rows(&self.aggregate_path, &rows)
    }
}

/// Best (lowest-MAPE) successful sweep point, plus the full `{value: mape}`
/// breakdown persisted to the run's metadata file. `None` if every point
/// failed.
fn pick_best(
    results: &[CalibrationResult],
    comparator: &MapeComparator,
    actual_power: &[(DateTime<Utc>, f64)],
    simulation_end_time: DateTime<Utc>,
) -> Option<((f64, f64), Vec<(f64, f64)>)> {
    let mut mape_values = Vec::new();
    for result in results.iter().filter(|r| r.success) {
        let mape_result = comparator.compare(&result.power_samples, actual_power, simulation_end_time);
        mape_values.push((result.param_value, mape_result.mape));
    }
    let best = mape_values
        .iter()
        .copied()
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    Some((best, mape_values))
}

fn read_calibration_rows(path: &std::path::Path) -> Result<Vec<CalibrationAggregateRow>, polars::error::PolarsError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let df = ParquetReader::new(fs::File::open(path)?).finish()?;
    let height = df.height();
    let timestamp = df.column("timestamp")?.i64()?;
    let run_number = df.column("run_number")?.i64()?;
    let calibrated_property = df.column("calibrated_property")?.str()?;
    let best_value = df.column("best_value")?.f64()?;
    let best_mape = df.column("best_mape")?.f64()?;
    let topology_changed = df.column("topology_changed")?.bool()?;
    let task_count = df.column("task_count")?.i64()?;

    let mut rows = Vec::with_capacity(height);
    for i in 0..height {
        let ts_ms = timestamp.get(i).unwrap_or_default();
        rows.push(CalibrationAggregateRow {
            timestamp: chrono::Utc
                .timestamp_millis_opt(ts_ms)
                .single()
                .unwrap_or_else(Utc::now),
            run_number: run_number.get(i).unwrap_or_default(),
            calibrated_property: calibrated_property.get(i).unwrap_or_default().to_string(),
            best_value: best_value.get(i).unwrap_or_default(),
            best_mape: best_mape.get(i).unwrap_or_default(),
            topology_changed: topology_changed.get(i).unwrap_or_default(),
            task_count: task_count.get(i).unwrap_or_default(),
        });
    }
    Ok(rows)
}

fn write_calibration_rows(
    path: &std::path::Path,
    rows: &[CalibrationAggregateRow],
) -> Result<(), polars::error::PolarsError> {
    let timestamp: Vec<i64> = rows.iter().map(|r| r.timestamp.timestamp_millis()).collect();
    let run_number: Vec<i64> = rows.iter().map(|r| r.run_number).collect();
    let calibrated_property: Vec<&str> = rows.iter().map(|r| r.calibrated_property.as_str()).collect();
    let best_value: Vec<f64> = rows.iter().map(|r| r.best_value).collect();
    let best_mape: Vec<f64> = rows.iter().map(|r| r.best_mape).collect();
    let topology_changed: Vec<bool> = rows.iter().map(|r| r.topology_changed).collect();
    let task_count: Vec<i64> = rows.iter().map(|r| r.task_count).collect();

    let mut df = df![
        "timestamp" => timestamp,
        "run_number" => run_number,
        "calibrated_property" => calibrated_property,
        "best_value" => best_value,
        "best_mape" => best_mape,
        "topology_changed" => topology_changed,
        "task_count" => task_count,
    ]?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| polars::error::PolarsError::Io(std::sync::Arc::new(e)))?;
    }
    let file = fs::File::create(path).map_err(|e| polars::error::PolarsError::Io(std::sync::Arc::new(e)))?;
    ParquetWriter::new(file).finish(&mut df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShimError;
    use crate::model::task::Fragment;
    use crate::model::topology::{Cluster, Cpu, CpuPowerModel, Host, Memory};
    use crate::model::{Task, Topology};
    use std::path::Path;
    use std::sync::Mutex;

    /// Synthetic simulator whose MAPE-minimizing power output is centered
    /// on a fixed `asymUtil` value, used to exercise sweep-minimum
    /// selection without an external simulator binary.
    struct SyntheticShim {
        target: f64,
    }

    impl SyntheticShim {
        fn new(target: f64) -> Self {
            Self { target }
        }
    }

    impl SimulationRunner for SyntheticShim {
        fn run(
            &self,
            _tasks: &[Task],
            topology: &Topology,
            sim_dir: &Path,
            _sim_number: i64,
            simulated_end_time: DateTime<Utc>,
            _timeout: StdDuration,
        ) -> Result<PathBuf, ShimError> {
            let asym_util = match &topology.clusters[0].hosts[0].cpu_power_model {
                CpuPowerModel::Asymptotic { asym_util, .. } => *asym_util,
                _ => 0.0,
            };
            let output_dir = sim_dir.join("output");
            fs::create_dir_all(&output_dir)?;
            let error = (asym_util - self.target).abs();
            let power = 100.0 + error * 1000.0;
            let timestamp_absolute: Vec<i64> = vec![simulated_end_time.timestamp_millis()];
            let power_draw: Vec<f64> = vec![power];
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

    struct RecordingProducer {
        sent: Mutex<Vec<(String, Option<String>, Vec<u8>)>>,
    }

    impl RecordingProducer {
        fn new() -> Self {
            Self { sent: Mutex::new(Vec::new()) }
        }
    }

    impl BusProducer for RecordingProducer {
        fn send(&self, topic: &str, key: Option<&str>, payload: &[u8]) -> Result<(), crate::error::SubstrateError> {
            self.sent.lock().unwrap().push((topic.to_string(), key.map(String::from), payload.to_vec()));
            Ok(())
        }
    }

    fn sample_topology() -> Topology {
        Topology {
            clusters: vec![Cluster {
                name: "c0".into(),
                hosts: vec![Host {
                    name: "h0".into(),
                    count: 1,
                    cpu: Cpu { core_count: 8, core_speed: 2400.0 },
                    memory: Memory { memory_size: 16_000_000_000 },
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

    fn task_at(id: i64, ts: DateTime<Utc>) -> Task {
        Task {
            id,
            submission_time: ts,
            duration: 60_000,
            cpu_count: 2,
            cpu_capacity: 1000.0,
            mem_capacity: 2048,
            fragments: vec![Fragment { task_id: id, duration: 60_000, cpu_count: 2, cpu_usage: 0.5 }],
        }
    }

    fn build_orchestrator(dir: &Path, target: f64) -> CalibratorOrchestrator<SyntheticShim> {
        build_orchestrator_with_property(dir, target, "cpuPowerModel.asymUtil")
    }

    fn build_orchestrator_with_property(
        dir: &Path,
        target: f64,
        property_path: &str,
    ) -> CalibratorOrchestrator<SyntheticShim> {
        CalibratorOrchestrator::new(
            SyntheticShim::new(target),
            dir.join("opendc"),
            dir.join("agg_results.parquet"),
            property_path.to_string(),
            0.10,
            0.90,
            9,
            4,
            ChronoDuration::minutes(1440),
            StdDuration::from_secs(60),
            "workload".to_string(),
            "power".to_string(),
            "topology".to_string(),
        )
    }

    fn seed(orchestrator: &CalibratorOrchestrator<SyntheticShim>, t0: DateTime<Utc>) {
        orchestrator.handle_real_topology(TopologySnapshot { timestamp: t0, topology: sample_topology() }).unwrap();
        for i in 0..100 {
            orchestrator.handle_workload(WorkloadMessage::Task {
                timestamp: t0,
                task: task_at(i, t0 + ChronoDuration::minutes(i)),
            }).unwrap();
        }
        for i in 0..100 {
            orchestrator
                .handle_power(Consumption {
                    timestamp: t0 + ChronoDuration::minutes(i),
                    power_draw: 100.0,
                    energy_usage: 6000.0,
                })
                .unwrap();
        }
    }

    #[test]
    fn sweep_picks_the_minimum_mape_value() {
        let dir = tempfile::tempdir().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let orchestrator = build_orchestrator(dir.path(), 0.30);
        seed(&orchestrator, t0);

        let producer = RecordingProducer::new();
        let outcome = orchestrator.run_sweep_once(&producer, "sim_topology").unwrap();
        match outcome {
            SweepOutcome::Published { best_value, .. } => assert_eq!(best_value, 0.30),
            other => panic!("expected Published, got {other:?}"),
        }
        assert_eq!(producer.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn unchanged_best_value_skips_republication() {
        let dir = tempfile::tempdir().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let orchestrator = build_orchestrator(dir.path(), 0.30);
        seed(&orchestrator, t0);

        let producer = RecordingProducer::new();
        orchestrator.run_sweep_once(&producer, "sim_topology").unwrap();
        let second = orchestrator.run_sweep_once(&producer, "sim_topology").unwrap();

        assert!(matches!(second, SweepOutcome::Unchanged { best_value, .. } if best_value == 0.30));
        assert_eq!(producer.sent.lock().unwrap().len(), 1, "second run must not republish");
    }

    #[test]
    fn missing_topology_retries_without_running_a_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = build_orchestrator(dir.path(), 0.30);
        let producer = RecordingProducer::new();
        let result = orchestrator.run_sweep_once(&producer, "sim_topology");
        assert!(matches!(result, Err(CalibrationError::NoTopology)));
    }

    #[test]
    fn insufficient_overlap_is_rejected_before_sweeping() {
        let dir = tempfile::tempdir().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let orchestrator = build_orchestrator(dir.path(), 0.30);
        orchestrator.handle_real_topology(TopologySnapshot { timestamp: t0, topology: sample_topology() }).unwrap();
        orchestrator.handle_workload(WorkloadMessage::Task { timestamp: t0, task: task_at(1, t0) }).unwrap();
        orchestrator
            .handle_power(Consumption { timestamp: t0, power_draw: 100.0, energy_usage: 6000.0 })
            .unwrap();

        let producer = RecordingProducer::new();
        let result = orchestrator.run_sweep_once(&producer, "sim_topology");
        assert!(matches!(result, Err(CalibrationError::InsufficientOverlap { .. })));
    }

    #[test]
    fn unrecognized_property_path_is_rejected_at_sweep_time() {
        let dir = tempfile::tempdir().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let orchestrator = build_orchestrator_with_property(dir.path(), 0.30, "cpuPowerModel.bogus");
        seed(&orchestrator, t0);

        let producer = RecordingProducer::new();
        let result = orchestrator.run_sweep_once(&producer, "sim_topology");
        assert!(matches!(
            result,
            Err(CalibrationError::UnknownPropertyPath(ref p)) if p == "cpuPowerModel.bogus"
        ));
    }
}
