//! Wire-format and in-memory data types shared by both services.

pub mod aggregate;
pub mod consumption;
pub mod ids;
pub mod task;
pub mod timestamp;
pub mod topology;
pub mod workload;

pub use aggregate::{AggregateRow, CalibrationAggregateRow};
pub use consumption::Consumption;
pub use task::{Fragment, Task};
pub use topology::{CalibratableField, CpuPowerModel, Topology, TopologySnapshot};
pub use workload::WorkloadMessage;
