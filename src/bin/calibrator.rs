//! Entry point for the calibrator service: consumes workload/power/real
//! topology, sweeps the external simulator over a parameter range, and
//! publishes the best-fit topology variant to the simulator orchestrator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use opendt_core::calibrator::CalibratorOrchestrator;
use opendt_core::config::RuntimeConfig;
use opendt_core::simulator::shim::SimulatorShim;
use opendt_core::substrate::Topic;

#[cfg(feature = "kafka")]
use opendt_core::substrate::bus::kafka::{KafkaConsumer, KafkaProducer};

const DEFAULT_OPENDC_BIN_PATH: &str = "/app/opendc/bin/OpenDCExperimentRunner/bin/OpenDCExperimentRunner";
const SWEEP_POINT_TIMEOUT: Duration = Duration::from_secs(120);

fn main() {
    env_logger::init();

    let config = match RuntimeConfig::load() {
        Ok(c) => c,
        Err(e) => {
            log::error!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if !config.file.global.calibration_enabled {
        log::info!("calibration_enabled is false, calibrator service has nothing to do");
        return;
    }

    if let Err(e) = config.persist_run_snapshot("calibrator") {
        log::error!("fatal: failed to persist run config/metadata snapshot: {e}");
        std::process::exit(1);
    }

    // `RuntimeConfig::load` already validated this block exists and that
    // `calibrated_property` parses when calibration is enabled.
    let cal = config
        .file
        .services
        .calibrator
        .clone()
        .expect("calibration_enabled implies a calibrator config block");

    let binary_path = std::path::PathBuf::from(
        std::env::var("OPENDC_BIN_PATH").unwrap_or_else(|_| DEFAULT_OPENDC_BIN_PATH.to_string()),
    );

    let workload_topic = Topic::Workload.physical_name(&config.file.kafka);
    let power_topic = Topic::Power.physical_name(&config.file.kafka);
    let topology_topic = Topic::Topology.physical_name(&config.file.kafka);
    let sim_topology_topic = Topic::SimTopology.physical_name(&config.file.kafka);

    log::info!("run id: {}", config.run_id);
    log::info!("workload topic: {workload_topic} (compacted: {})", Topic::Workload.is_compacted());
    log::info!("power topic: {power_topic} (compacted: {})", Topic::Power.is_compacted());
    log::info!("topology topic: {topology_topic} (compacted: {})", Topic::Topology.is_compacted());
    log::info!("sim_topology topic: {sim_topology_topic} (compacted: {})", Topic::SimTopology.is_compacted());
    log::info!("calibrated property: {}", cal.calibrated_property);
    log::info!(
        "sweep range: [{}, {}] over {} points, {} parallel workers",
        cal.min_value,
        cal.max_value,
        cal.linspace_points,
        cal.max_parallel_workers
    );

    let shim = match SimulatorShim::new(binary_path) {
        Ok(s) => s,
        Err(e) => {
            log::error!("fatal: {e}");
            std::process::exit(1);
        }
    };

    let run_root = config.calibrator_dir().join("opendc");
    let aggregate_path = config.calibrator_dir().join("agg_results.parquet");
    if let Some(parent) = aggregate_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::error!("fatal: failed to create {}: {e}", parent.display());
            std::process::exit(1);
        }
    }

    let orchestrator = Arc::new(CalibratorOrchestrator::new(
        shim,
        run_root,
        aggregate_path,
        cal.calibrated_property.clone(),
        cal.min_value,
        cal.max_value,
        cal.linspace_points,
        cal.max_parallel_workers,
        ChronoDuration::minutes(cal.mape_window_minutes),
        SWEEP_POINT_TIMEOUT,
        workload_topic.clone(),
        power_topic.clone(),
        topology_topic.clone(),
    ));

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
            &[&workload_topic, &power_topic, &topology_topic],
        ) {
            Ok(c) => c,
            Err(e) => {
                log::error!("fatal: failed to connect to broker: {e}");
                std::process::exit(1);
            }
        };
        let producer = match KafkaProducer::new(&config.kafka_bootstrap_servers) {
            Ok(p) => p,
            Err(e) => {
                log::error!("fatal: failed to connect to broker: {e}");
                std::process::exit(1);
            }
        };

        log::info!("calibrator service starting");
        std::thread::scope(|scope| {
            let consumer_orchestrator = orchestrator.clone();
            let consumer_stop = stop.clone();
            scope.spawn(move || {
                consumer_orchestrator.run_consumer(&mut consumer, &consumer_stop);
            });

            scope.spawn(|| {
                orchestrator.run_sweep(&producer, &sim_topology_topic, &stop);
            });
        });
        log::info!("calibrator service stopped");
    }

    #[cfg(not(feature = "kafka"))]
    {
        let _ = &orchestrator;
        log::error!("fatal: built without the 'kafka' feature, no broker available");
        std::process::exit(1);
    }
}
