//! Owns the current real and simulated/calibrated topology. Variant
//! creation always works on a deep copy taken under the lock, never on
//! the stored topology itself.

use std::sync::Mutex;

use crate::error::SubstrateError;
use crate::model::{CalibratableField, Topology};
use crate::substrate::BusProducer;

struct State {
    real_topology: Option<Topology>,
    sim_topology: Option<Topology>,
}

pub struct TopologyManager {
    state: Mutex<State>,
}

impl Default for TopologyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                real_topology: None,
                sim_topology: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// On first receipt, `sim_topology` is also initialized to a deep copy
    /// so the simulator always has something to simulate against.
    pub fn set_real_topology(&self, topology: Topology) {
        let mut state = self.lock();
        if state.sim_topology.is_none() {
            state.sim_topology = Some(topology.clone());
        }
        state.real_topology = Some(topology);
    }

    pub fn set_sim_topology(&self, topology: Topology) {
        self.lock().sim_topology = Some(topology);
    }

    /// The simulated topology, preferred over real; `None` until at least
    /// one topology message has been received.
    pub fn current(&self) -> Option<Topology> {
        let state = self.lock();
        state.sim_topology.clone().or_else(|| state.real_topology.clone())
    }

    /// Deep-copies the current topology and sets `field` to `value` on
    /// every host. Never mutates the stored topology.
    pub fn create_variant(&self, field: CalibratableField, value: f64) -> Option<Topology> {
        let mut variant = self.current()?;
        if variant.set_field_everywhere(field, value) == 0 {
            log::warn!("no host accepted calibratable field {:?}", field);
        }
        Some(variant)
    }

    /// Canonical-JSON-serializes `topology` and sends it to `topic` keyed
    /// `"topology"` so the broker's log compaction retains only the
    /// latest variant.
    pub fn publish(
        &self,
        producer: &dyn BusProducer,
        topic: &str,
        topology: &Topology,
    ) -> Result<(), SubstrateError> {
        let canonical = topology.canonical_json().map_err(SubstrateError::Decode)?;
        producer.send(topic, Some("topology"), canonical.as_bytes())
    }
}
