use crate::error::ConfigError;
use crate::labeling::AlertRule;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration loaded from a TOML file
///
/// Every section is optional; missing fields fall back to the defaults used
/// by the reference device.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Labeling thresholds used by the simulator
    pub rule: AlertRule,
    /// Synthetic data generation
    pub simulation: SimulationConfig,
    /// Train/test split and tree growth
    pub training: TrainingConfig,
    /// Default artifact locations
    pub paths: PathsConfig,
    /// Live sensor link
    pub live: LiveConfig,
    /// Inter-tick pacing
    pub pacing: PacingConfig,
}

/// Synthetic data generation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub samples: usize,
    pub seed: u64,
    pub distance_min: f64,
    pub distance_max: f64,
    pub size_min: f64,
    pub size_max: f64,
    /// Also append replayed predictions to the result log
    pub log_results: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            seed: 42,
            distance_min: 0.5,
            distance_max: 10.0,
            size_min: 0.1,
            size_max: 3.0,
            log_results: false,
        }
    }
}

/// Model training settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub seed: u64,
    /// Maximum tree depth, unlimited when absent
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

/// Default file locations, overridable on the command line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub dataset: PathBuf,
    pub model: PathBuf,
    pub results_log: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("simulated_data.csv"),
            model: PathBuf::from("alert_model.json"),
            results_log: PathBuf::from("results.csv"),
        }
    }
}

/// Live sensor link settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LiveConfig {
    /// Serial device path
    pub port: String,
    pub baud_rate: u32,
    /// Per-read wait for a complete line
    pub read_timeout_ms: u64,
    /// Factor converting channel distance units to meters
    pub distance_scale: f64,
    /// Use this size instead of prompting the operator
    pub fixed_size_m: Option<f64>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            read_timeout_ms: 2000,
            distance_scale: 0.01,
            fixed_size_m: None,
        }
    }
}

impl LiveConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Pacing of the inference loop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PacingConfig {
    pub tick_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self { tick_delay_ms: 100 }
    }
}

impl PacingConfig {
    pub fn tick_delay(&self) -> Duration {
        Duration::from_millis(self.tick_delay_ms)
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read,
    /// `ConfigError::TomlError` if it is not valid TOML and
    /// `ConfigError::ValidationError` if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file or use defaults
    ///
    /// A missing file or an invalid one is reported and replaced by the
    /// default configuration.
    pub fn load_or_default(path: Option<&Path>) -> Config {
        match path {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                match Config::from_file(path) {
                    Ok(config) => config,
                    Err(ConfigError::ReadError(_)) => {
                        warn!(
                            "Configuration file '{}' not found or unreadable, using defaults",
                            path.display()
                        );
                        Config::default()
                    }
                    Err(e) => {
                        error!("Configuration error in '{}': {}", path.display(), e);
                        warn!("Using default configuration due to invalid config file");
                        Config::default()
                    }
                }
            }
            None => {
                info!("Using default configuration");
                Config::default()
            }
        }
    }

    /// Check that every value is within its valid range
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rule = &self.rule;
        for (name, value) in [
            ("rule.alert_max_distance", rule.alert_max_distance),
            ("rule.alert_min_size", rule.alert_min_size),
            ("rule.beep_max_distance", rule.beep_max_distance),
            ("rule.beep_min_size", rule.beep_min_size),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        let sim = &self.simulation;
        if !(sim.distance_min > 0.0
            && sim.distance_min < sim.distance_max
            && sim.distance_max.is_finite())
        {
            return Err(ConfigError::ValidationError(format!(
                "simulation distance range [{}, {}) is invalid",
                sim.distance_min, sim.distance_max
            )));
        }
        if !(sim.size_min > 0.0 && sim.size_min < sim.size_max && sim.size_max.is_finite()) {
            return Err(ConfigError::ValidationError(format!(
                "simulation size range [{}, {}) is invalid",
                sim.size_min, sim.size_max
            )));
        }
        if sim.samples == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.samples must be positive".to_string(),
            ));
        }

        let training = &self.training;
        if !(training.test_fraction > 0.0 && training.test_fraction < 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "training.test_fraction must be in (0, 1), got {}",
                training.test_fraction
            )));
        }
        if training.min_samples_split < 2 {
            return Err(ConfigError::ValidationError(
                "training.min_samples_split must be at least 2".to_string(),
            ));
        }
        if training.max_depth == Some(0) {
            return Err(ConfigError::ValidationError(
                "training.max_depth must be positive when set".to_string(),
            ));
        }

        let live = &self.live;
        if live.baud_rate == 0 {
            return Err(ConfigError::ValidationError(
                "live.baud_rate must be positive".to_string(),
            ));
        }
        if !(live.distance_scale.is_finite() && live.distance_scale > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "live.distance_scale must be positive, got {}",
                live.distance_scale
            )));
        }
        if let Some(size) = live.fixed_size_m {
            if !(size.is_finite() && size > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "live.fixed_size_m must be positive, got {}",
                    size
                )));
            }
        }

        Ok(())
    }
}
