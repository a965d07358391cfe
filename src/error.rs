use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Kind of on-disk artifact produced by an earlier pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Labeled dataset CSV produced by `generate-data`
    Dataset,
    /// Trained model produced by `train`
    Model,
}

impl ArtifactKind {
    /// The command that regenerates this artifact
    pub fn remedy(&self) -> &'static str {
        match self {
            ArtifactKind::Dataset => "blindspot generate-data",
            ArtifactKind::Model => "blindspot train",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Dataset => write!(f, "Data"),
            ArtifactKind::Model => write!(f, "Model"),
        }
    }
}

/// Errors that can occur while loading or storing datasets and model artifacts
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("{kind} file not found at {}. Please run '{}' first.", path.display(), kind.remedy())]
    Missing { kind: ArtifactKind, path: PathBuf },

    #[error("Invalid dataset row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("Unsupported model format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Model serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur while training a classifier
#[derive(Error, Debug, PartialEq)]
pub enum TrainError {
    #[error("Cannot train on an empty dataset")]
    EmptyDataset,

    #[error("Test fraction must be strictly between 0 and 1, got {0}")]
    InvalidTestFraction(f64),

    #[error("Training set is empty after holding out {test_rows} of {rows} rows")]
    TrainingSetEmpty { rows: usize, test_rows: usize },
}

/// Errors raised while turning a raw payload into an observation
///
/// These never escape the inference loop: the tick is skipped and a
/// diagnostic is emitted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObservationError {
    #[error("Empty payload")]
    Empty,

    #[error("Not a number: '{0}'")]
    NotNumeric(String),

    #[error("Expected 1 or 2 comma-separated fields, got {0}")]
    FieldCount(usize),

    #[error("{field} must be a positive finite number, got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("No object size available for this reading")]
    MissingSize,
}

/// Errors that can occur on the live sensor channel
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Could not open channel {port}: {reason}")]
    Unavailable { port: String, reason: String },

    #[error("Channel closed")]
    Closed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur when appending prediction records
#[derive(Error, Debug)]
pub enum LogError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
