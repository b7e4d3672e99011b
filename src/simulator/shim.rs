//! Materializes tasks + topology into the wire format the external
//! simulator binary reads, invokes it with a hard timeout, and hands back
//! the output directory for `ResultProcessor` to mine.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde_json::json;

use crate::error::ShimError;
use crate::model::task::Task;
use crate::model::topology::Topology;

/// Export interval (simulator-native units) requested in every experiment.
const EXPORT_INTERVAL: i64 = 150;

pub struct SimulatorShim {
    binary_path: PathBuf,
}

impl SimulatorShim {
    /// Verifies the simulator binary exists at construction time. A
    /// missing binary is fatal at startup, not a soft per-invocation
    /// degrade.
    pub fn new(binary_path: PathBuf) -> Result<Self, ShimError> {
        if !binary_path.is_file() {
            return Err(ShimError::BinaryMissing(binary_path));
        }
        Ok(Self { binary_path })
    }

    /// Runs one simulation. Returns the output directory on success.
    pub fn run(
        &self,
        tasks: &[Task],
        topology: &Topology,
        run_dir: &Path,
        run_number: i64,
        simulated_end_time: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<PathBuf, ShimError> {
        let input_dir = run_dir.join("input");
        let output_dir = run_dir.join("output");
        fs::create_dir_all(&input_dir)?;
        fs::create_dir_all(&output_dir)?;

        let workload_dir = input_dir.join("workload");
        fs::create_dir_all(&workload_dir)?;
        write_tasks_parquet(&workload_dir.join("tasks.parquet"), tasks)?;
        write_fragments_parquet(&workload_dir.join("fragments.parquet"), tasks)?;

        let topology_path = input_dir.join("topology.json");
        fs::write(&topology_path, serde_json::to_vec_pretty(topology)?)?;

        let experiment_path = input_dir.join("experiment.json");
        let experiment = experiment_json(&topology_path, &workload_dir, &output_dir);
        fs::write(&experiment_path, serde_json::to_vec_pretty(&experiment)?)?;

        let status = self.invoke(&experiment_path, timeout)?;
        let wall_clock_time = Utc::now();

        match status.code() {
            Some(0) => {}
            Some(code) => return Err(ShimError::NonZeroExit(code, format!("exit code {code}"))),
            None => return Err(ShimError::NonZeroExit(-1, "terminated by signal".to_string())),
        }

        let last_task_time = tasks.iter().map(|t| t.submission_time).max();
        let metadata = json!({
            "run_number": run_number,
            "simulated_time": simulated_end_time,
            "last_task_time": last_task_time,
            "task_count": tasks.len(),
            "wall_clock_time": wall_clock_time,
            "cached": false,
        });
        fs::write(run_dir.join("metadata.json"), serde_json::to_vec_pretty(&metadata)?)?;

        Ok(output_dir)
    }

    fn invoke(
        &self,
        experiment_path: &Path,
        timeout: Duration,
    ) -> Result<std::process::ExitStatus, ShimError> {
        let mut command = Command::new(&self.binary_path);
        command
            .arg("--experiment-path")
            .arg(experiment_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if std::env::var_os("JAVA_HOME").is_none() {
            if let Some(java_home) = detect_java_home() {
                command.env("JAVA_HOME", java_home);
            }
        }

        let mut child = command.spawn()?;
        let start = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if start.elapsed() >= timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ShimError::Timeout(timeout));
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

impl SimulatorShim {
    /// Patches a cached run's `metadata.json` in place after a cache-hit
    /// copy: `run_number`/`simulated_time`/`wall_clock_time` advance even
    /// though no simulator invocation happened, and `cached` flips to true.
    pub fn rewrite_cached_metadata(
        &self,
        run_dir: &Path,
        run_number: i64,
        simulated_end_time: DateTime<Utc>,
    ) -> Result<(), ShimError> {
        let path = run_dir.join("metadata.json");
        let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&path)?)?;
        if let Some(object) = value.as_object_mut() {
            object.insert("run_number".to_string(), json!(run_number));
            object.insert("simulated_time".to_string(), json!(simulated_end_time));
            object.insert("wall_clock_time".to_string(), json!(Utc::now()));
            object.insert("cached".to_string(), json!(true));
        }
        fs::write(&path, serde_json::to_vec_pretty(&value)?)?;
        Ok(())
    }
}

/// Abstraction over "run one simulation, hand back the output directory",
/// so the orchestrator can be exercised against a stub in tests without an
/// external simulator binary on disk.
pub trait SimulationRunner: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn run(
        &self,
        tasks: &[Task],
        topology: &Topology,
        run_dir: &Path,
        run_number: i64,
        simulated_end_time: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<PathBuf, ShimError>;

    fn rewrite_cached_metadata(
        &self,
        run_dir: &Path,
        run_number: i64,
        simulated_end_time: DateTime<Utc>,
    ) -> Result<(), ShimError>;
}

impl SimulationRunner for SimulatorShim {
    fn run(
        &self,
        tasks: &[Task],
        topology: &Topology,
        run_dir: &Path,
        run_number: i64,
        simulated_end_time: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<PathBuf, ShimError> {
        SimulatorShim::run(self, tasks, topology, run_dir, run_number, simulated_end_time, timeout)
    }

    fn rewrite_cached_metadata(
        &self,
        run_dir: &Path,
        run_number: i64,
        simulated_end_time: DateTime<Utc>,
    ) -> Result<(), ShimError> {
        SimulatorShim::rewrite_cached_metadata(self, run_dir, run_number, simulated_end_time)
    }
}

fn detect_java_home() -> Option<String> {
    let path = std::env::var_os("PATH")?;
    let java_bin = std::env::split_paths(&path)
        .map(|dir| dir.join("java"))
        .find(|p| p.is_file())?;
    java_bin.parent()?.parent().map(|p| p.to_string_lossy().into_owned())
}

fn experiment_json(topology_path: &Path, workload_dir: &Path, output_dir: &Path) -> serde_json::Value {
    json!({
        "name": "opendt-run",
        "topologies": [{ "pathToFile": topology_path.to_string_lossy() }],
        "workloads": [{
            "pathToFile": workload_dir.to_string_lossy(),
            "type": "ComputeWorkload",
        }],
        "outputFolder": output_dir.to_string_lossy(),
        "exportModels": [{
            "exportInterval": EXPORT_INTERVAL,
            "filesToExport": ["powerSource", "host", "task", "service"],
            "computeExportConfig": {
                "powerSourceExportColumns": ["energy_usage", "power_draw"],
            },
        }],
    })
}

fn write_tasks_parquet(path: &Path, tasks: &[Task]) -> Result<(), ShimError> {
    let ids: Vec<i32> = tasks.iter().map(|t| t.id as i32).collect();
    let submission_time: Vec<i64> = tasks.iter().map(|t| t.submission_time.timestamp_millis()).collect();
    let duration: Vec<i64> = tasks.iter().map(|t| t.duration).collect();
    let cpu_count: Vec<i32> = tasks.iter().map(|t| t.cpu_count).collect();
    let cpu_capacity: Vec<f64> = tasks.iter().map(|t| t.cpu_capacity).collect();
    let mem_capacity: Vec<i64> = tasks.iter().map(|t| t.mem_capacity).collect();

    let mut df = df![
        "id" => ids,
        "submission_time" => submission_time,
        "duration" => duration,
        "cpu_count" => cpu_count,
        "cpu_capacity" => cpu_capacity,
        "mem_capacity" => mem_capacity,
    ]?;

    let file = fs::File::create(path)?;
    ParquetWriter::new(file).finish(&mut df)?;
    Ok(())
}

fn write_fragments_parquet(path: &Path, tasks: &[Task]) -> Result<(), ShimError> {
    let mut ids: Vec<i32> = Vec::new();
    let mut duration: Vec<i64> = Vec::new();
    let mut cpu_count: Vec<i32> = Vec::new();
    let mut cpu_usage: Vec<f64> = Vec::new();

    for task in tasks {
        for fragment in &task.fragments {
            ids.push(fragment.task_id as i32);
            duration.push(fragment.duration);
            cpu_count.push(fragment.cpu_count);
            cpu_usage.push(fragment.cpu_usage);
        }
    }

    let mut df = df![
        "id" => ids,
        "duration" => duration,
        "cpu_count" => cpu_count,
        "cpu_usage" => cpu_usage,
    ]?;

    let file = fs::File::create(path)?;
    ParquetWriter::new(file).finish(&mut df)?;
    Ok(())
}
