/// Error types for every pipeline stage
pub mod error;

/// Observations, alert levels and prediction records
pub mod observation;

/// Threshold rule producing ground-truth labels
pub mod labeling;

/// Synthetic labeled dataset generation
pub mod simulator;

/// Classifier trait, decision tree and training
pub mod model;

/// Replay and live observation sources
pub mod sources;

/// Inference loop and live input decoding
pub mod inference;

/// Prediction result log
pub mod results;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use error::{ArtifactError, ChannelError, ConfigError, LogError, ObservationError, TrainError};
pub use labeling::AlertRule;
pub use model::{AlertClassifier, ModelTrainer, TrainedModel};
pub use observation::{AlertLevel, Observation};
