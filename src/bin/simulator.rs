//! Entry point for the simulator service: accumulates workload, fires
//! cut-point simulations against the external OpenDC binary, and appends
//! results to the aggregate parquet file.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use opendt_core::config::RuntimeConfig;
use opendt_core::simulator::orchestrator::SimulatorOrchestrator;
use opendt_core::simulator::result_processor::ResultProcessor;
use opendt_core::simulator::shim::SimulatorShim;
use opendt_core::substrate::Topic;

#[cfg(feature = "kafka")]
use opendt_core::substrate::bus::kafka::KafkaConsumer;

/// Mirrors the OpenDC binary's default mount point; a deployment that
/// mounts it elsewhere overrides with `OPENDC_BIN_PATH`.
const DEFAULT_OPENDC_BIN_PATH: &str = "/app/opendc/bin/OpenDCExperimentRunner/bin/OpenDCExperimentRunner";
const SIMULATION_TIMEOUT: Duration = Duration::from_secs(120);

fn main() {
    env_logger::init();

    let config = match RuntimeConfig::load() {
        Ok(c) => c,
        Err(e) => {
            log::error!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let binary_path = PathBuf::from(
        std::env::var("OPENDC_BIN_PATH").unwrap_or_else(|_| DEFAULT_OPENDC_BIN_PATH.to_string()),
    );

    let workload_topic = Topic::Workload.physical_name(&config.file.kafka);
    let topology_topic = Topic::Topology.physical_name(&config.file.kafka);
    let sim_topology_topic = Topic::SimTopology.physical_name(&config.file.kafka);

    if let Err(e) = config.persist_run_snapshot("simulator") {
        log::error!("fatal: failed to persist run config/metadata snapshot: {e}");
        std::process::exit(1);
    }

    log::info!("run id: {}", config.run_id);
    log::info!("workload topic: {workload_topic} (compacted: {})", Topic::Workload.is_compacted());
    log::info!("topology topic: {topology_topic} (compacted: {})", Topic::Topology.is_compacted());
    log::info!("sim_topology topic: {sim_topology_topic} (compacted: {})", Topic::SimTopology.is_compacted());
    log::info!(
        "simulation frequency: {} minutes, speed factor: {}x",
        config.file.services.simulator.simulation_frequency_minutes,
        config.file.global.speed_factor
    );

    let shim = match SimulatorShim::new(binary_path) {
        Ok(s) => s,
        Err(e) => {
            log::error!("fatal: {e}");
            std::process::exit(1);
        }
    };

    let run_root = config.simulator_dir().join("opendc");
    let aggregate_path = config.simulator_dir().join("agg_results.parquet");
    if let Some(parent) = aggregate_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::error!("fatal: failed to create {}: {e}", parent.display());
            std::process::exit(1);
        }
    }

    let processor = match ResultProcessor::new(aggregate_path) {
        Ok(p) => p,
        Err(e) => {
            log::error!("fatal: failed to initialize result processor: {e}");
            std::process::exit(1);
        }
    };

    let mut orchestrator = SimulatorOrchestrator::new(
        shim,
        processor,
        run_root,
        ChronoDuration::minutes(config.file.services.simulator.simulation_frequency_minutes),
        config.file.global.speed_factor,
        SIMULATION_TIMEOUT,
        workload_topic.clone(),
        topology_topic.clone(),
        sim_topology_topic.clone(),
    );

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            log::info!("shutdown requested");
            stop.store(true, Ordering::SeqCst);
        }) {
            log::warn!("failed to install signal handler: {e}");
        }
    }

    #[cfg(feature = "kafka")]
    {
        let mut consumer = match KafkaConsumer::new(
            &config.kafka_bootstrap_servers,
            &config.consumer_group,
            &[&workload_topic, &topology_topic, &sim_topology_topic],
        ) {
            Ok(c) => c,
            Err(e) => {
                log::error!("fatal: failed to connect to broker: {e}");
                std::process::exit(1);
            }
        };

        log::info!("simulator service starting");
        orchestrator.run(&mut consumer, &stop);
        log::info!("simulator service stopped");
    }

    #[cfg(not(feature = "kafka"))]
    {
        let _ = &mut orchestrator;
        log::error!("fatal: built without the 'kafka' feature, no broker available");
        std::process::exit(1);
    }
}
