//! Persisted model artifact
//!
//! A trained model is stored as a single JSON document holding the tree, the
//! training report and a format version. Once written it is only ever read.

use crate::error::{ArtifactError, ArtifactKind};
use crate::model::trainer::TrainingReport;
use crate::model::tree::DecisionTree;
use crate::model::AlertClassifier;
use crate::observation::{AlertLevel, Observation};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Current artifact layout version
pub const FORMAT_VERSION: u32 = 1;

/// Immutable fitted classifier with its training metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainedModel {
    format_version: u32,
    trained_at: DateTime<Utc>,
    report: TrainingReport,
    tree: DecisionTree,
}

impl TrainedModel {
    pub fn new(tree: DecisionTree, report: TrainingReport) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            trained_at: Utc::now(),
            report,
            tree,
        }
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    pub fn tree(&self) -> &DecisionTree {
        &self.tree
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Write the artifact to `path`, replacing any previous model
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        info!("Model saved to {}", path.display());
        Ok(())
    }

    /// Load an artifact written by [`TrainedModel::save`]
    ///
    /// # Errors
    ///
    /// Returns `ArtifactError::Missing` if the file does not exist,
    /// `ArtifactError::Json` if it is not a model artifact and
    /// `ArtifactError::UnsupportedVersion` for other layout versions.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ArtifactError::Missing {
                kind: ArtifactKind::Model,
                path: path.to_path_buf(),
            },
            _ => ArtifactError::IoError(e),
        })?;

        let model: TrainedModel = serde_json::from_reader(BufReader::new(file))?;
        if model.format_version != FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                found: model.format_version,
                expected: FORMAT_VERSION,
            });
        }
        if !model.tree.is_well_formed() {
            return Err(ArtifactError::Json(serde::de::Error::custom(
                "tree references missing nodes",
            )));
        }

        info!(
            "Machine learning model loaded from {} (trained {}, accuracy {:.2})",
            path.display(),
            model.trained_at.format("%Y-%m-%d %H:%M:%S"),
            model.report.accuracy
        );
        if model.report.degenerate {
            warn!("Loaded model was trained on a single class and always predicts the same level");
        }
        Ok(model)
    }
}

impl AlertClassifier for TrainedModel {
    fn predict(&self, observation: &Observation) -> AlertLevel {
        self.tree.predict(observation)
    }
}
