//! Typed error kinds shared across the simulator and calibrator services.
//!
//! Each subsystem exposes its own variant set; loop drivers match on the
//! kind to decide whether to log-and-continue (transient / degenerate data
//! / schema mismatch) or to propagate (fatal, startup only).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShimError {
    #[error("simulator binary not found at {0}")]
    BinaryMissing(PathBuf),

    #[error("simulator invocation exceeded timeout of {0:?}")]
    Timeout(std::time::Duration),

    #[error("simulator exited with status {0}: {1}")]
    NonZeroExit(i32, String),

    #[error("io error while preparing or reading simulation artifacts: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write parquet artifact: {0}")]
    Parquet(#[from] polars::error::PolarsError),

    #[error("failed to serialize json artifact: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error while copying cached run directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to canonicalize topology for hashing: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("no powerSource.parquet found under {0}")]
    MissingOutput(PathBuf),

    #[error("io error while appending aggregate results: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read or write aggregate parquet: {0}")]
    Parquet(#[from] polars::error::PolarsError),

    #[error("failed to read or write json metadata: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    /// Ground-truth power is unavailable for the comparison window; the
    /// caller should skip the best-value update for this iteration.
    #[error("no ground-truth power samples in comparison window")]
    NoGroundTruth,

    /// Accumulated task/power history does not yet span the minimum
    /// required overlap for a meaningful MAPE comparison.
    #[error("insufficient data overlap: have {have:?}, need {need:?}")]
    InsufficientOverlap {
        have: chrono::Duration,
        need: chrono::Duration,
    },

    #[error("no topology available yet")]
    NoTopology,

    #[error("no tasks accumulated yet")]
    NoTasks,

    #[error("no ground-truth power samples received yet")]
    NoPowerData,

    #[error("every sweep point failed; no best value to report")]
    NoSuccessfulSweepPoints,

    #[error("dotted property path '{0}' is not a recognized calibratable field")]
    UnknownPropertyPath(String),

    #[error("failed to decode inbound message: {0}")]
    Decode(#[from] SubstrateError),
}

#[derive(Debug, Error)]
pub enum SubstrateError {
    #[error("broker error: {0}")]
    Broker(String),

    #[error("failed to decode message payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, serde_yaml::Error),

    #[error("calibration_enabled is true but no calibrator config block was supplied")]
    CalibrationEnabledWithoutConfig,

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to persist run config/metadata snapshot: {0}")]
    Snapshot(#[from] std::io::Error),
}

/// The error surfaced at the boundary of one orchestrator loop iteration.
///
/// `Fatal` is only ever produced during startup, before any loop begins;
/// every other variant is caught by the loop driver, logged, and the loop
/// continues to its next iteration.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error(transparent)]
    Shim(#[from] ShimError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Substrate(#[from] SubstrateError),

    #[error("fatal startup error: {0}")]
    Fatal(String),
}
