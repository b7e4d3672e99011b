//! Drives the simulator service's consumer loop: accumulates tasks,
//! fires a simulation run at each frequency-aligned heartbeat, reuses
//! cached output when nothing relevant changed, and paces itself to the
//! configured speed factor.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use spin_sleep::SpinSleeper;

use crate::error::LoopError;
use crate::model::{Task, Topology, TopologySnapshot, WorkloadMessage};
use crate::simulator::result_cache::ResultCache;
use crate::simulator::result_processor::ResultProcessor;
use crate::simulator::shim::SimulationRunner;
use crate::substrate::{decode_json, BusConsumer, InboundMessage};
use crate::task_accumulator::TaskAccumulator;

const POLL_TIMEOUT: StdDuration = StdDuration::from_millis(500);
const PACING_DRIFT_THRESHOLD: f64 = 0.10;

struct PaceAnchor {
    wall_0: DateTime<Utc>,
    sim_0: DateTime<Utc>,
}

pub struct SimulatorOrchestrator<S: SimulationRunner> {
    accumulator: TaskAccumulator,
    cache: ResultCache,
    shim: S,
    processor: ResultProcessor,
    frequency: ChronoDuration,
    speed_factor: f64,
    timeout: StdDuration,
    run_root: PathBuf,
    workload_topic: String,
    topology_topic: String,
    sim_topology_topic: String,
    real_topology: Option<Topology>,
    sim_topology: Option<Topology>,
    run_number: i64,
    pace_anchor: Option<PaceAnchor>,
}

impl<S: SimulationRunner> SimulatorOrchestrator<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shim: S,
        processor: ResultProcessor,
        run_root: PathBuf,
        frequency: ChronoDuration,
        speed_factor: f64,
        timeout: StdDuration,
        workload_topic: String,
        topology_topic: String,
        sim_topology_topic: String,
    ) -> Self {
        Self {
            accumulator: TaskAccumulator::new(),
            cache: ResultCache::new(),
            shim,
            processor,
            frequency,
            speed_factor,
            timeout,
            run_root,
            workload_topic,
            topology_topic,
            sim_topology_topic,
            real_topology: None,
            sim_topology: None,
            run_number: 0,
            pace_anchor: None,
        }
    }

    /// Blocks until `stop` is set, handling one inbound message per
    /// iteration. Runs on a single thread, so no lock is needed beyond
    /// what `TaskAccumulator`/`ResultCache` already carry internally.
    pub fn run(&mut self, consumer: &mut dyn BusConsumer, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            match consumer.poll(POLL_TIMEOUT) {
                None => continue,
                Some(Err(e)) => log::warn!("workload consumer error: {e}"),
                Some(Ok(inbound)) => {
                    if let Err(e) = self.handle_inbound(inbound) {
                        log::warn!("simulator iteration failed: {e}");
                    }
                }
            }
        }
    }

    fn handle_inbound(&mut self, inbound: InboundMessage) -> Result<(), LoopError> {
        if inbound.topic == self.workload_topic {
            self.handle_workload(decode_json(&inbound.payload)?)
        } else if inbound.topic == self.topology_topic {
            self.handle_real_topology(decode_json(&inbound.payload)?)
        } else if inbound.topic == self.sim_topology_topic {
            self.handle_sim_topology(decode_json(&inbound.payload)?)
        } else {
            log::warn!("unrecognized topic '{}', dropping message", inbound.topic);
            Ok(())
        }
    }

    fn handle_workload(&mut self, message: WorkloadMessage) -> Result<(), LoopError> {
        match message {
            WorkloadMessage::Task { task, .. } => {
                self.accumulator.add(task);
                Ok(())
            }
            WorkloadMessage::Heartbeat { timestamp } => self.maybe_run_simulation(timestamp),
        }
    }

    fn handle_real_topology(&mut self, snapshot: TopologySnapshot) -> Result<(), LoopError> {
        if self.sim_topology.is_none() {
            self.sim_topology = Some(snapshot.topology.clone());
        }
        self.real_topology = Some(snapshot.topology);
        Ok(())
    }

    fn handle_sim_topology(&mut self, topology: Topology) -> Result<(), LoopError> {
        self.sim_topology = Some(topology);
        self.cache.clear();
        Ok(())
    }

    fn current_topology(&self) -> Option<Topology> {
        self.sim_topology.clone().or_else(|| self.real_topology.clone())
    }

    fn maybe_run_simulation(&mut self, heartbeat_time: DateTime<Utc>) -> Result<(), LoopError> {
        if !self.accumulator.should_simulate(heartbeat_time, self.frequency) {
            return Ok(());
        }
        let Some(topology) = self.current_topology() else {
            log::warn!("simulation is due but no topology has been received yet; skipping");
            return Ok(());
        };
        let simulated_end_time = self
            .accumulator
            .next_simulation_time(self.frequency)
            .expect("should_simulate implies first_task_time is set");
        let tasks = self.accumulator.snapshot();

        self.run_simulation(&tasks, &topology, simulated_end_time)?;
        self.accumulator.mark_simulated(simulated_end_time);
        self.pace(simulated_end_time);
        Ok(())
    }

    fn run_simulation(
        &mut self,
        tasks: &[Task],
        topology: &Topology,
        simulated_end_time: DateTime<Utc>,
    ) -> Result<(), LoopError> {
        self.run_number += 1;
        let run_dir = self.run_root.join(format!("run_{}", self.run_number));
        let task_count = tasks.len();

        let (output_dir, cached) = if self.cache.can_reuse(topology, task_count)? {
            let source = self.cache.last_run_dir().expect("can_reuse implies a recorded run dir");
            self.cache.copy_to_new_run(&source, &run_dir)?;
            self.shim.rewrite_cached_metadata(&run_dir, self.run_number, simulated_end_time)?;
            (run_dir.join("output"), true)
        } else {
            let output_dir = self.shim.run(
                tasks,
                topology,
                &run_dir,
                self.run_number,
                simulated_end_time,
                self.timeout,
            )?;
            self.cache.update(topology, task_count, run_dir.clone())?;
            (output_dir, false)
        };

        self.processor.process(self.run_number, &output_dir, simulated_end_time, cached)?;
        Ok(())
    }

    /// Wall-clock pacing to the configured speed factor. `speed_factor ==
    /// -1.0` disables pacing entirely. The first simulated run only records
    /// the anchor point; pacing (and drift logging) starts from the second.
    fn pace(&mut self, simulated_end_time: DateTime<Utc>) {
        if self.speed_factor < 0.0 {
            return;
        }
        let wall_now = Utc::now();
        let Some(anchor) = &self.pace_anchor else {
            self.pace_anchor = Some(PaceAnchor {
                wall_0: wall_now,
                sim_0: simulated_end_time,
            });
            return;
        };

        let sim_elapsed_secs = (simulated_end_time - anchor.sim_0).num_milliseconds() as f64 / 1000.0;
        let expected_wall_secs = sim_elapsed_secs / self.speed_factor;
        let actual_wall_secs = (wall_now - anchor.wall_0).num_milliseconds() as f64 / 1000.0;
        let sleep_secs = (expected_wall_secs - actual_wall_secs).max(0.0);
        if sleep_secs > 0.0 {
            SpinSleeper::default().sleep(StdDuration::from_secs_f64(sleep_secs));
        }
        if expected_wall_secs > 0.0 {
            let drift = (actual_wall_secs / expected_wall_secs - 1.0).abs();
            if drift > PACING_DRIFT_THRESHOLD {
                log::warn!(
                    "pacing drift {:.1}% (expected {:.2}s wall-clock, observed {:.2}s)",
                    drift * 100.0,
                    expected_wall_secs,
                    actual_wall_secs
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShimError;
    use crate::model::task::Fragment;
    use crate::model::topology::{Cluster, Cpu, CpuPowerModel, Host, Memory};
    use chrono::TimeZone;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    struct StubShim {
        invocations: AtomicUsize,
    }

    impl StubShim {
        fn new() -> Self {
            Self {
                invocations: AtomicUsize::new(0),
            }
        }
    }

    impl SimulationRunner for StubShim {
        fn run(
            &self,
            tasks: &[Task],
            _topology: &Topology,
            run_dir: &Path,
            run_number: i64,
            simulated_end_time: DateTime<Utc>,
            _timeout: StdDuration,
        ) -> Result<PathBuf, ShimError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            let output_dir = run_dir.join("output").join("nested");
            std::fs::create_dir_all(&output_dir)?;
            write_power_source(&output_dir.join("powerSource.parquet"), simulated_end_time, tasks.len());
            std::fs::write(
                run_dir.join("metadata.json"),
                serde_json::to_vec(&serde_json::json!({
                    "run_number": run_number,
                    "simulated_time": simulated_end_time,
                    "task_count": tasks.len(),
                    "cached": false,
                }))?,
            )?;
            Ok(run_dir.join("output"))
        }

        fn rewrite_cached_metadata(
            &self,
            run_dir: &Path,
            run_number: i64,
            simulated_end_time: DateTime<Utc>,
        ) -> Result<(), ShimError> {
            let path = run_dir.join("metadata.json");
            let mut value: serde_json::Value = serde_json::from_slice(&std::fs::read(&path)?)?;
            if let Some(object) = value.as_object_mut() {
                object.insert("run_number".into(), serde_json::json!(run_number));
                object.insert("simulated_time".into(), serde_json::json!(simulated_end_time));
                object.insert("cached".into(), serde_json::json!(true));
            }
            std::fs::write(&path, serde_json::to_vec(&value)?)?;
            Ok(())
        }
    }

    fn write_power_source(path: &Path, end: DateTime<Utc>, task_count: usize) {
        use polars::prelude::*;
        let n = task_count.max(1);
        let timestamp_absolute: Vec<i64> = (0..n as i64).map(|i| end.timestamp_millis() - i * 1000).collect();
        let power_draw: Vec<f64> = vec![100.0; n];
        let energy_usage: Vec<f64> = vec![10.0; n];
        let carbon_intensity: Vec<f64> = vec![0.0; n];
        let carbon_emission: Vec<f64> = vec![0.0; n];
        let mut df = df![
            "timestamp_absolute" => timestamp_absolute,
            "power_draw" => power_draw,
            "energy_usage" => energy_usage,
            "carbon_intensity" => carbon_intensity,
            "carbon_emission" => carbon_emission,
        ]
        .unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        ParquetWriter::new(std::fs::File::create(path).unwrap()).finish(&mut df).unwrap();
    }

    fn sample_topology() -> Topology {
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

    fn sample_task(id: i64, ts: DateTime<Utc>) -> Task {
        Task {
            id,
            submission_time: ts,
            duration: 60_000,
            cpu_count: 2,
            cpu_capacity: 1000.0,
            mem_capacity: 2048,
            fragments: vec![Fragment {
                task_id: id,
                duration: 60_000,
                cpu_count: 2,
                cpu_usage: 0.5,
            }],
        }
    }

    fn build_orchestrator(dir: &Path) -> SimulatorOrchestrator<StubShim> {
        let processor = ResultProcessor::new(dir.join("agg_results.parquet")).unwrap();
        SimulatorOrchestrator::new(
            StubShim::new(),
            processor,
            dir.join("opendc"),
            ChronoDuration::minutes(15),
            -1.0,
            StdDuration::from_secs(120),
            "workload".into(),
            "topology".into(),
            "sim_topology".into(),
        )
    }

    #[test]
    fn repeated_heartbeat_with_no_new_tasks_reuses_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = build_orchestrator(dir.path());
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        orchestrator.handle_real_topology(TopologySnapshot {
            timestamp: t0,
            topology: sample_topology(),
        }).unwrap();
        orchestrator.handle_workload(WorkloadMessage::Task {
            timestamp: t0,
            task: sample_task(1, t0),
        }).unwrap();

        orchestrator.maybe_run_simulation(t0 + ChronoDuration::minutes(15)).unwrap();
        assert_eq!(orchestrator.shim.invocations.load(Ordering::SeqCst), 1);

        orchestrator.maybe_run_simulation(t0 + ChronoDuration::minutes(30)).unwrap();
        assert_eq!(orchestrator.shim.invocations.load(Ordering::SeqCst), 1);

        let run_2_metadata: serde_json::Value = serde_json::from_slice(
            &std::fs::read(dir.path().join("opendc").join("run_2").join("metadata.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(run_2_metadata["cached"], serde_json::json!(true));
    }

    #[test]
    fn topology_change_invalidates_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = build_orchestrator(dir.path());
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        orchestrator.handle_real_topology(TopologySnapshot {
            timestamp: t0,
            topology: sample_topology(),
        }).unwrap();
        orchestrator.handle_workload(WorkloadMessage::Task {
            timestamp: t0,
            task: sample_task(1, t0),
        }).unwrap();
        orchestrator.maybe_run_simulation(t0 + ChronoDuration::minutes(15)).unwrap();
        assert_eq!(orchestrator.shim.invocations.load(Ordering::SeqCst), 1);

        let mut changed = sample_topology();
        changed.set_field_everywhere(crate::model::CalibratableField::AsymUtil, 0.9);
        orchestrator.handle_sim_topology(changed).unwrap();

        orchestrator.maybe_run_simulation(t0 + ChronoDuration::minutes(30)).unwrap();
        assert_eq!(orchestrator.shim.invocations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn heartbeats_without_tasks_never_trigger_a_simulation() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = build_orchestrator(dir.path());
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for i in 0..5 {
            orchestrator
                .handle_workload(WorkloadMessage::Heartbeat {
                    timestamp: t0 + ChronoDuration::minutes(15 * i),
                })
                .unwrap();
        }
        assert_eq!(orchestrator.shim.invocations.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("agg_results.parquet").exists());
    }
}
