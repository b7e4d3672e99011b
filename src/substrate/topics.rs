use crate::config::KafkaConfig;

/// The four logical topics this crate knows about. Physical names are
/// resolved from `kafka.topics.<logical>.name` in config, falling back to
/// the logical name itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Workload,
    Power,
    Topology,
    SimTopology,
}

impl Topic {
    pub fn logical_name(self) -> &'static str {
        match self {
            Topic::Workload => "workload",
            Topic::Power => "power",
            Topic::Topology => "topology",
            Topic::SimTopology => "sim_topology",
        }
    }

    pub fn physical_name(self, kafka: &KafkaConfig) -> String {
        kafka
            .topics
            .get(self.logical_name())
            .map(|t| t.name.clone())
            .unwrap_or_else(|| self.logical_name().to_string())
    }

    /// `topology` and `sim_topology` are compacted: the broker retains only
    /// the latest message per key, which is how late subscribers recover
    /// current state without a full replay.
    pub fn is_compacted(self) -> bool {
        matches!(self, Topic::Topology | Topic::SimTopology)
    }
}
