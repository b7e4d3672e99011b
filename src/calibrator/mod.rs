//! The calibrator service: parallel parameter sweep, ground-truth power
//! accumulation, rolling-window MAPE comparison, and best-variant feedback
//! publication.

pub mod calibration_engine;
pub mod mape_comparator;
pub mod orchestrator;
pub mod power_tracker;
pub mod topology_manager;

pub use calibration_engine::{CalibrationEngine, CalibrationResult};
pub use mape_comparator::{MapeComparator, MapeResult};
pub use orchestrator::CalibratorOrchestrator;
pub use power_tracker::PowerTracker;
pub use topology_manager::TopologyManager;
