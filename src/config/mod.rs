/// Configuration management
#[allow(clippy::module_inception)]
pub mod config;

pub use config::{Config, LiveConfig, PacingConfig, PathsConfig, SimulationConfig, TrainingConfig};
