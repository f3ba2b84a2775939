use crate::collectors::status::NumericMode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub listen: String,
    pub interval_secs: u64,
    #[serde(default = "default_measurement")]
    pub measurement: String,
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Source paths read by the sampler. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub thermal: ThermalConfig,
    #[serde(default)]
    pub scalars: Vec<ScalarSourceConfig>,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ThermalConfig {
    #[serde(default = "default_thermal_field")]
    pub field: String,
    /// Defaults to `pool`, whether or not the `thermal` block is present.
    #[serde(default)]
    pub first_sensor: FirstSensor,
    #[serde(default = "default_first_field")]
    pub first_field: String,
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Treatment of the first thermal path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstSensor {
    /// Part of the max pool like every other path.
    #[default]
    Pool,
    /// Excluded from the pool and reported under `first_field`.
    Separate,
    /// Not read at all.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScalarSourceConfig {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageConfig {
    pub path: String,
    #[serde(default = "default_storage_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub numeric: NumericMode,
}

impl StorageConfig {
    pub fn name_field(&self) -> String {
        format!("{}_name", self.prefix)
    }

    pub fn used_field(&self) -> String {
        format!("{}_used", self.prefix)
    }

    pub fn total_field(&self) -> String {
        format!("{}_total", self.prefix)
    }
}

impl ThermalConfig {
    /// Paths that take part in the max aggregation.
    pub fn pool(&self) -> &[String] {
        match self.first_sensor {
            FirstSensor::Pool => &self.paths,
            FirstSensor::Separate | FirstSensor::Skip => self.paths.get(1..).unwrap_or(&[]),
        }
    }

    /// Path reported on its own, if any.
    pub fn separate(&self) -> Option<&str> {
        match self.first_sensor {
            FirstSensor::Separate => self.paths.first().map(String::as_str),
            FirstSensor::Pool | FirstSensor::Skip => None,
        }
    }
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            field: default_thermal_field(),
            first_sensor: FirstSensor::default(),
            first_field: default_first_field(),
            paths: [0, 1, 2, 3, 4, 5, 6, 8]
                .iter()
                .map(|zone| format!("/sys/devices/virtual/thermal/thermal_zone{zone}/temp"))
                .collect(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        let scalar = |name: &str, path: &str| ScalarSourceConfig {
            name: name.to_string(),
            path: path.to_string(),
        };
        Self {
            thermal: ThermalConfig::default(),
            scalars: vec![
                scalar("emc", "/sys/kernel/debug/clock/emc/rate"),
                scalar("avp", "/sys/kernel/debug/clock/avp.sclk/rate"),
                scalar("nvdec", "/sys/kernel/debug/clock/nvdec/rate"),
                scalar("msenc", "/sys/kernel/debug/clock/msenc/rate"),
                scalar("gpu", "/sys/devices/platform/host1x/gpu.0/load"),
            ],
            storage: Some(StorageConfig {
                path: "/run/user/1001/sd_stats".to_string(),
                prefix: default_storage_prefix(),
                numeric: NumericMode::Integer,
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Validation("listen is required".to_string()));
        }
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "listen must be a valid host:port address".to_string(),
            ));
        }
        if self.interval_secs < 1 {
            return Err(ConfigError::Validation(
                "interval_secs must be >= 1".to_string(),
            ));
        }
        if self.measurement.trim().is_empty() {
            return Err(ConfigError::Validation(
                "measurement must not be empty".to_string(),
            ));
        }

        self.sources.validate()
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

impl SourcesConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_thermal(&self.thermal)?;
        validate_scalars(&self.scalars)?;
        if let Some(storage) = &self.storage {
            validate_storage(storage)?;
        }
        validate_field_names(&self.field_names())
    }

    /// Every field a snapshot produced from this configuration carries.
    pub fn field_names(&self) -> Vec<String> {
        let mut names = vec![self.thermal.field.clone()];
        if self.thermal.separate().is_some() {
            names.push(self.thermal.first_field.clone());
        }
        names.extend(self.scalars.iter().map(|s| s.name.clone()));
        if let Some(storage) = &self.storage {
            names.push(storage.name_field());
            names.push(storage.used_field());
            names.push(storage.total_field());
        }
        names
    }
}

fn validate_thermal(cfg: &ThermalConfig) -> Result<(), ConfigError> {
    if cfg.field.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sources.thermal.field must not be empty".to_string(),
        ));
    }
    if cfg.first_sensor != FirstSensor::Pool && cfg.paths.is_empty() {
        return Err(ConfigError::Validation(
            "sources.thermal.first_sensor requires at least one thermal path".to_string(),
        ));
    }
    if cfg.first_sensor == FirstSensor::Separate && cfg.first_field.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sources.thermal.first_field must not be empty".to_string(),
        ));
    }
    if cfg.paths.iter().any(|p| p.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "sources.thermal.paths[*] must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_scalars(scalars: &[ScalarSourceConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for scalar in scalars {
        if scalar.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "sources.scalars[*].name must not be empty".to_string(),
            ));
        }
        if !names.insert(scalar.name.clone()) {
            return Err(ConfigError::Validation(format!(
                "scalar source name '{}' must be unique",
                scalar.name
            )));
        }
        if scalar.path.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "scalar source '{}' path must not be empty",
                scalar.name
            )));
        }
    }
    Ok(())
}

fn validate_storage(cfg: &StorageConfig) -> Result<(), ConfigError> {
    if cfg.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sources.storage.path must not be empty".to_string(),
        ));
    }
    if cfg.prefix.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sources.storage.prefix must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_field_names(names: &[String]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "field name '{name}' is produced by more than one source"
            )));
        }
    }
    Ok(())
}

fn default_measurement() -> String {
    "core".to_string()
}

fn default_thermal_field() -> String {
    "thermo".to_string()
}

fn default_first_field() -> String {
    "fpga_temperature".to_string()
}

fn default_storage_prefix() -> String {
    "sd_card".to_string()
}
