//! Run configuration: a YAML file (`config.yaml` by default) plus a small
//! set of required environment overrides. Missing `RUN_ID` or an
//! unreadable/invalid config file are fatal at startup, per the error
//! handling design.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::CalibratableField;

fn default_speed_factor() -> f64 {
    10.0
}

fn default_simulation_frequency_minutes() -> i64 {
    15
}

fn default_max_parallel_workers() -> usize {
    num_cpus::get().max(1)
}

fn default_partitions() -> i32 {
    1
}

fn default_replication_factor() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,
    #[serde(default)]
    pub calibration_enabled: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            speed_factor: default_speed_factor(),
            calibration_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_simulation_frequency_minutes")]
    pub simulation_frequency_minutes: i64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            simulation_frequency_minutes: default_simulation_frequency_minutes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalibratorConfig {
    pub calibrated_property: String,
    pub min_value: f64,
    pub max_value: f64,
    pub linspace_points: usize,
    #[serde(default = "default_max_parallel_workers")]
    pub max_parallel_workers: usize,
    pub mape_window_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub calibrator: Option<CalibratorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KafkaTopicConfig {
    pub name: String,
    #[serde(default = "default_partitions")]
    pub partitions: i32,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: i32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct KafkaConfig {
    #[serde(default)]
    pub topics: HashMap<String, KafkaTopicConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    pub services: ServicesConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
}

/// Fully resolved configuration for one process: the parsed YAML plus the
/// environment-sourced values that are never put in the file.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub file: FileConfig,
    pub config_path: PathBuf,
    pub run_id: String,
    pub data_dir: PathBuf,
    pub kafka_bootstrap_servers: String,
    pub consumer_group: String,
}

impl RuntimeConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = PathBuf::from(
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.yaml".to_string()),
        );
        let contents = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::Read(config_path.clone(), e))?;
        let file: FileConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(config_path.clone(), e))?;

        validate(&file)?;

        let run_id =
            std::env::var("RUN_ID").map_err(|_| ConfigError::MissingEnv("RUN_ID"))?;
        let data_dir =
            PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()));
        let kafka_bootstrap_servers = std::env::var("KAFKA_BOOTSTRAP_SERVERS")
            .map_err(|_| ConfigError::MissingEnv("KAFKA_BOOTSTRAP_SERVERS"))?;
        let consumer_group =
            std::env::var("CONSUMER_GROUP").unwrap_or_else(|_| "opendt".to_string());

        Ok(Self {
            file,
            config_path,
            run_id,
            data_dir,
            kafka_bootstrap_servers,
            consumer_group,
        })
    }

    pub fn run_dir(&self) -> PathBuf {
        self.data_dir.join(&self.run_id)
    }

    pub fn simulator_dir(&self) -> PathBuf {
        self.run_dir().join("simulator")
    }

    pub fn calibrator_dir(&self) -> PathBuf {
        self.run_dir().join("calibrator")
    }

    /// Snapshots the config file used for this run and a small run-metadata
    /// record into the top of the run directory, so a later reader can tell
    /// which config produced a given run without cross-referencing deploy
    /// history.
    pub fn persist_run_snapshot(&self, service: &str) -> Result<(), ConfigError> {
        let run_dir = self.run_dir();
        std::fs::create_dir_all(&run_dir)?;
        std::fs::copy(&self.config_path, run_dir.join("config.yaml"))?;

        let metadata = serde_json::json!({
            "run_id": self.run_id,
            "service": service,
            "config_source": self.config_path,
            "started_at": chrono::Utc::now().to_rfc3339(),
        });
        let metadata_path = run_dir.join("metadata.json");
        let existing = std::fs::read(&metadata_path).ok();
        if existing.is_none() {
            std::fs::write(metadata_path, serde_json::to_vec_pretty(&metadata).unwrap())?;
        }
        Ok(())
    }
}

fn validate(file: &FileConfig) -> Result<(), ConfigError> {
    if file.global.speed_factor != -1.0 && file.global.speed_factor <= 0.0 {
        return Err(ConfigError::Invalid {
            field: "global.speed_factor",
            reason: "must be -1 or > 0".to_string(),
        });
    }

    if file.global.calibration_enabled && file.services.calibrator.is_none() {
        return Err(ConfigError::CalibrationEnabledWithoutConfig);
    }

    if let Some(cal) = &file.services.calibrator {
        if CalibratableField::parse_path(&cal.calibrated_property).is_none() {
            return Err(ConfigError::Invalid {
                field: "services.calibrator.calibrated_property",
                reason: format!("'{}' is not a recognized calibratable path", cal.calibrated_property),
            });
        }
        if cal.linspace_points < 2 {
            return Err(ConfigError::Invalid {
                field: "services.calibrator.linspace_points",
                reason: "must be >= 2".to_string(),
            });
        }
        if cal.min_value >= cal.max_value {
            return Err(ConfigError::Invalid {
                field: "services.calibrator.min_value",
                reason: "must be less than max_value".to_string(),
            });
        }
        if cal.mape_window_minutes <= 0 {
            return Err(ConfigError::Invalid {
                field: "services.calibrator.mape_window_minutes",
                reason: "must be > 0".to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unrecognized_calibrated_property() {
        let file = FileConfig {
            global: GlobalConfig {
                speed_factor: 10.0,
                calibration_enabled: true,
            },
            services: ServicesConfig {
                simulator: SimulatorConfig::default(),
                calibrator: Some(CalibratorConfig {
                    calibrated_property: "cpuPowerModel.bogus".to_string(),
                    min_value: 0.1,
                    max_value: 0.9,
                    linspace_points: 9,
                    max_parallel_workers: 4,
                    mape_window_minutes: 1440,
                }),
            },
            kafka: KafkaConfig::default(),
        };
        assert!(validate(&file).is_err());
    }

    #[test]
    fn rejects_calibration_enabled_without_block() {
        let file = FileConfig {
            global: GlobalConfig {
                speed_factor: 10.0,
                calibration_enabled: true,
            },
            services: ServicesConfig {
                simulator: SimulatorConfig::default(),
                calibrator: None,
            },
            kafka: KafkaConfig::default(),
        };
        assert!(matches!(
            validate(&file),
            Err(ConfigError::CalibrationEnabledWithoutConfig)
        ));
    }

    #[test]
    fn persist_run_snapshot_writes_config_and_metadata_once() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, "global:\n  speed_factor: 10.0\n").unwrap();

        let config = RuntimeConfig {
            file: FileConfig {
                global: GlobalConfig::default(),
                services: ServicesConfig {
                    simulator: SimulatorConfig::default(),
                    calibrator: None,
                },
                kafka: KafkaConfig::default(),
            },
            config_path: config_path.clone(),
            run_id: "run-1".to_string(),
            data_dir: dir.path().join("data"),
            kafka_bootstrap_servers: "localhost:9092".to_string(),
            consumer_group: "opendt".to_string(),
        };

        config.persist_run_snapshot("simulator").unwrap();
        let snapshot = std::fs::read_to_string(config.run_dir().join("config.yaml")).unwrap();
        assert_eq!(snapshot, std::fs::read_to_string(&config_path).unwrap());

        let metadata_path = config.run_dir().join("metadata.json");
        let first: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&metadata_path).unwrap()).unwrap();
        assert_eq!(first["run_id"], "run-1");
        assert_eq!(first["service"], "simulator");

        config.persist_run_snapshot("calibrator").unwrap();
        let second: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&metadata_path).unwrap()).unwrap();
        assert_eq!(second["service"], "simulator", "first writer's metadata.json is not overwritten");
    }

    #[test]
    fn accepts_well_formed_config() {
        let file = FileConfig {
            global: GlobalConfig::default(),
            services: ServicesConfig {
                simulator: SimulatorConfig::default(),
                calibrator: None,
            },
            kafka: KafkaConfig::default(),
        };
        assert!(validate(&file).is_ok());
    }
}
