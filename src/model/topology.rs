use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cpu {
    #[serde(rename = "coreCount")]
    pub core_count: u32,
    #[serde(rename = "coreSpeed")]
    pub core_speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    #[serde(rename = "memorySize")]
    pub memory_size: i64,
}

fn default_asym_util() -> f64 {
    0.5
}

fn default_calibration_factor() -> f64 {
    0.5
}

/// Tagged union over the power models the external simulator understands.
/// Each variant carries its own calibratable scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modelType")]
pub enum CpuPowerModel {
    #[serde(rename = "asymptotic")]
    Asymptotic {
        power: f64,
        #[serde(rename = "idlePower")]
        idle_power: f64,
        #[serde(rename = "maxPower")]
        max_power: f64,
        #[serde(rename = "asymUtil", default = "default_asym_util")]
        asym_util: f64,
        #[serde(default)]
        dvfs: bool,
    },
    #[serde(rename = "mse")]
    Mse {
        power: f64,
        #[serde(rename = "idlePower")]
        idle_power: f64,
        #[serde(rename = "maxPower")]
        max_power: f64,
        #[serde(rename = "calibrationFactor", default = "default_calibration_factor")]
        calibration_factor: f64,
    },
}

/// The closed set of dotted paths the calibrator is allowed to mutate.
/// Anything outside this set is rejected at configuration-validation time
/// rather than walked dynamically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibratableField {
    AsymUtil,
    CalibrationFactor,
    IdlePower,
    MaxPower,
    Power,
}

impl CalibratableField {
    pub fn parse_path(path: &str) -> Option<Self> {
        match path {
            "cpuPowerModel.asymUtil" => Some(Self::AsymUtil),
            "cpuPowerModel.calibrationFactor" => Some(Self::CalibrationFactor),
            "cpuPowerModel.idlePower" => Some(Self::IdlePower),
            "cpuPowerModel.maxPower" => Some(Self::MaxPower),
            "cpuPowerModel.power" => Some(Self::Power),
            _ => None,
        }
    }
}

impl CpuPowerModel {
    /// Sets the given calibratable scalar on this power model variant.
    /// Returns `false` (no-op) when the active variant does not carry
    /// that field — callers log a warning and move on to the next host.
    pub fn set_field(&mut self, field: CalibratableField) -> impl FnOnce(f64) -> bool + '_ {
        move |value| match (self, field) {
            (CpuPowerModel::Asymptotic { asym_util, .. }, CalibratableField::AsymUtil) => {
                *asym_util = value;
                true
            }
            (CpuPowerModel::Asymptotic { idle_power, .. }, CalibratableField::IdlePower) => {
                *idle_power = value;
                true
            }
            (CpuPowerModel::Asymptotic { max_power, .. }, CalibratableField::MaxPower) => {
                *max_power = value;
                true
            }
            (CpuPowerModel::Asymptotic { power, .. }, CalibratableField::Power) => {
                *power = value;
                true
            }
            (
                CpuPowerModel::Mse {
                    calibration_factor, ..
                },
                CalibratableField::CalibrationFactor,
            ) => {
                *calibration_factor = value;
                true
            }
            (CpuPowerModel::Mse { idle_power, .. }, CalibratableField::IdlePower) => {
                *idle_power = value;
                true
            }
            (CpuPowerModel::Mse { max_power, .. }, CalibratableField::MaxPower) => {
                *max_power = value;
                true
            }
            (CpuPowerModel::Mse { power, .. }, CalibratableField::Power) => {
                *power = value;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSource {
    #[serde(rename = "carbonTracePath")]
    pub carbon_trace_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub count: u32,
    pub cpu: Cpu,
    pub memory: Memory,
    #[serde(rename = "cpuPowerModel")]
    pub cpu_power_model: CpuPowerModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub hosts: Vec<Host>,
    #[serde(rename = "powerSource", default, skip_serializing_if = "Option::is_none")]
    pub power_source: Option<PowerSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub clusters: Vec<Cluster>,
}

impl Topology {
    pub fn total_host_count(&self) -> u64 {
        self.clusters
            .iter()
            .flat_map(|c| &c.hosts)
            .map(|h| h.count as u64)
            .sum()
    }

    pub fn total_core_count(&self) -> u64 {
        self.clusters
            .iter()
            .flat_map(|c| &c.hosts)
            .map(|h| h.count as u64 * h.cpu.core_count as u64)
            .sum()
    }

    pub fn total_memory_bytes(&self) -> i64 {
        self.clusters
            .iter()
            .flat_map(|c| &c.hosts)
            .map(|h| h.count as i64 * h.memory.memory_size)
            .sum()
    }

    /// Sets `field` to `value` on every host's power model across every
    /// cluster. Hosts whose active power-model variant lacks the field are
    /// skipped (caller is expected to log). Never aborts partway through.
    pub fn set_field_everywhere(&mut self, field: CalibratableField, value: f64) -> usize {
        let mut applied = 0usize;
        for cluster in &mut self.clusters {
            for host in &mut cluster.hosts {
                if host.cpu_power_model.set_field(field)(value) {
                    applied += 1;
                }
            }
        }
        applied
    }

    /// Canonical JSON (sorted keys) used as the input to `ResultCache`'s
    /// topology hash.
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        let sorted = sort_json(value);
        serde_json::to_string(&sorted)
    }
}

fn sort_json(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = std::collections::BTreeMap::new();
            for (k, v) in map {
                sorted.insert(k, sort_json(v));
            }
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_json).collect())
        }
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    #[serde(with = "crate::model::timestamp")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub topology: Topology,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_host(model: CpuPowerModel) -> Host {
        Host {
            name: "h0".into(),
            count: 1,
            cpu: Cpu {
                core_count: 8,
                core_speed: 2400.0,
            },
            memory: Memory {
                memory_size: 16_000_000_000,
            },
            cpu_power_model: model,
        }
    }

    #[test]
    fn discriminated_union_round_trips() {
        let model = CpuPowerModel::Asymptotic {
            power: 300.0,
            idle_power: 100.0,
            max_power: 400.0,
            asym_util: 0.5,
            dvfs: false,
        };
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains(r#""modelType":"asymptotic""#));
        let decoded: CpuPowerModel = serde_json::from_str(&json).unwrap();
        assert_eq!(model, decoded);
    }

    #[test]
    fn set_field_skips_mismatched_variant() {
        let mut topology = Topology {
            clusters: vec![Cluster {
                name: "c0".into(),
                hosts: vec![sample_host(CpuPowerModel::Mse {
                    power: 300.0,
                    idle_power: 100.0,
                    max_power: 400.0,
                    calibration_factor: 0.5,
                })],
                power_source: None,
            }],
        };
        let applied = topology.set_field_everywhere(CalibratableField::AsymUtil, 0.3);
        assert_eq!(applied, 0);
    }

    #[test]
    fn set_field_applies_across_all_hosts() {
        let mut topology = Topology {
            clusters: vec![
                Cluster {
                    name: "c0".into(),
                    hosts: vec![sample_host(CpuPowerModel::Asymptotic {
                        power: 300.0,
                        idle_power: 100.0,
                        max_power: 400.0,
                        asym_util: 0.5,
                        dvfs: false,
                    })],
                    power_source: None,
                },
                Cluster {
                    name: "c1".into(),
                    hosts: vec![sample_host(CpuPowerModel::Asymptotic {
                        power: 300.0,
                        idle_power: 100.0,
                        max_power: 400.0,
                        asym_util: 0.5,
                        dvfs: false,
                    })],
                    power_source: None,
                },
            ],
        };
        let applied = topology.set_field_everywhere(CalibratableField::AsymUtil, 0.3);
        assert_eq!(applied, 2);
        for cluster in &topology.clusters {
            for host in &cluster.hosts {
                match &host.cpu_power_model {
                    CpuPowerModel::Asymptotic { asym_util, .. } => assert_eq!(*asym_util, 0.3),
                    _ => panic!("unexpected variant"),
                }
            }
        }
    }
}
