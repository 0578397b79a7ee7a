//! Simulator configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("can't parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid value of {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Closed interval of values from which a parameter is sampled uniformly.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Copy)]
pub struct UniformRange {
    pub min: f64,
    pub max: f64,
}

impl UniformRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn validate(&self, name: &'static str, positive: bool) -> Result<(), ConfigError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(ConfigError::Invalid {
                name,
                reason: format!("expected finite min <= max, got [{}, {}]", self.min, self.max),
            });
        }
        if positive && self.min <= 0. {
            return Err(ConfigError::Invalid {
                name,
                reason: format!("values must be positive, got min = {}", self.min),
            });
        }
        if !positive && self.min < 0. {
            return Err(ConfigError::Invalid {
                name,
                reason: format!("values must be non-negative, got min = {}", self.min),
            });
        }
        Ok(())
    }
}

/// Parameters of normally distributed idle noise.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Copy)]
pub struct NoiseConfig {
    pub mean: f64,
    pub std_dev: f64,
}

impl NoiseConfig {
    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if !self.mean.is_finite() || !self.std_dev.is_finite() || self.std_dev < 0. {
            return Err(ConfigError::Invalid {
                name,
                reason: format!("expected finite mean and std_dev >= 0, got {:?}", self),
            });
        }
        Ok(())
    }
}

/// Shape of the decaying load spike which follows VM start.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Copy)]
pub struct SpikeConfig {
    /// Peak value added at the moment of start.
    pub amplitude: UniformRange,
    /// Decay time constant in minutes.
    pub tau_minutes: UniformRange,
}

/// Holds raw simulator config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
struct RawSimulatorConfig {
    pub start_delay: Option<UniformRange>,
    pub deallocate_delay: Option<UniformRange>,
    pub default_window_minutes: Option<u32>,
    pub cpu_baseline: Option<NoiseConfig>,
    pub network_baseline: Option<NoiseConfig>,
    pub spike_horizon_minutes: Option<f64>,
    pub cpu_spike: Option<SpikeConfig>,
    pub network_spike: Option<SpikeConfig>,
}

/// Represents simulator configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SimulatorConfig {
    /// Range of VM start duration in seconds.
    pub start_delay: UniformRange,
    /// Range of VM deallocation duration in seconds.
    pub deallocate_delay: UniformRange,
    /// Length of metrics window used when neither start time nor duration is given.
    pub default_window_minutes: u32,
    /// Idle CPU utilization in percent.
    pub cpu_baseline: NoiseConfig,
    /// Idle network traffic in bytes per sample, used for both directions.
    pub network_baseline: NoiseConfig,
    /// Time after start during which the start spike contributes to telemetry.
    pub spike_horizon_minutes: f64,
    /// CPU spike after start, amplitude in percent.
    pub cpu_spike: SpikeConfig,
    /// Network spike after start, amplitude in bytes, shared by inbound and outbound series.
    pub network_spike: SpikeConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self::from_raw(RawSimulatorConfig::default())
    }
}

impl SimulatorConfig {
    /// Creates simulator config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file<P: AsRef<Path>>(file_name: P) -> Result<Self, ConfigError> {
        let path = file_name.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Creates simulator config from YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawSimulatorConfig = if content.trim().is_empty() {
            RawSimulatorConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        let config = Self::from_raw(raw);
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawSimulatorConfig) -> Self {
        Self {
            start_delay: raw.start_delay.unwrap_or(UniformRange::new(8., 15.)),
            deallocate_delay: raw.deallocate_delay.unwrap_or(UniformRange::new(5., 12.)),
            default_window_minutes: raw.default_window_minutes.unwrap_or(15),
            cpu_baseline: raw.cpu_baseline.unwrap_or(NoiseConfig { mean: 2.0, std_dev: 0.8 }),
            network_baseline: raw.network_baseline.unwrap_or(NoiseConfig {
                mean: 150_000.,
                std_dev: 50_000.,
            }),
            spike_horizon_minutes: raw.spike_horizon_minutes.unwrap_or(10.),
            cpu_spike: raw.cpu_spike.unwrap_or(SpikeConfig {
                amplitude: UniformRange::new(40., 80.),
                tau_minutes: UniformRange::new(2., 6.),
            }),
            network_spike: raw.network_spike.unwrap_or(SpikeConfig {
                amplitude: UniformRange::new(2e6, 20e6),
                tau_minutes: UniformRange::new(2., 8.),
            }),
        }
    }

    /// Checks that all sampled ranges are well-formed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.start_delay.validate("start_delay", false)?;
        self.deallocate_delay.validate("deallocate_delay", false)?;
        if self.default_window_minutes == 0 {
            return Err(ConfigError::Invalid {
                name: "default_window_minutes",
                reason: "must be positive".to_string(),
            });
        }
        self.cpu_baseline.validate("cpu_baseline")?;
        self.network_baseline.validate("network_baseline")?;
        if !self.spike_horizon_minutes.is_finite() || self.spike_horizon_minutes < 0. {
            return Err(ConfigError::Invalid {
                name: "spike_horizon_minutes",
                reason: format!("must be non-negative, got {}", self.spike_horizon_minutes),
            });
        }
        self.cpu_spike.amplitude.validate("cpu_spike.amplitude", false)?;
        self.cpu_spike.tau_minutes.validate("cpu_spike.tau_minutes", true)?;
        self.network_spike.amplitude.validate("network_spike.amplitude", false)?;
        self.network_spike.tau_minutes.validate("network_spike.tau_minutes", true)?;
        Ok(())
    }
}

/// Selects which backend implementation serves VM operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Simulated,
    Cloud,
}

impl BackendMode {
    /// Name of environment variable which enables simulation mode.
    pub const ENV_VAR: &'static str = "AZURE_SIM_MODE";

    /// Parses simulation flag value: `1`, `true`, `yes` and `on` (any case) enable simulation.
    pub fn from_flag(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => BackendMode::Simulated,
            _ => BackendMode::Cloud,
        }
    }

    /// Reads mode from the environment, simulation is the default.
    pub fn from_env() -> Self {
        std::env::var(Self::ENV_VAR)
            .map(|value| Self::from_flag(&value))
            .unwrap_or(BackendMode::Simulated)
    }
}
