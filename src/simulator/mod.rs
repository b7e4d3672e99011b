//! The simulator service: frequency-gated triggering, cumulative-input
//! caching, incremental result aggregation, and wall-clock pacing.

pub mod orchestrator;
pub mod result_cache;
pub mod result_processor;
pub mod shim;

pub use orchestrator::SimulatorOrchestrator;
pub use result_cache::ResultCache;
pub use result_processor::ResultProcessor;
pub use shim::{SimulationRunner, SimulatorShim};
