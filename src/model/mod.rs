/// Classifier trait, decision tree, training and persisted artifacts
pub mod artifact;
pub mod trainer;
pub mod tree;

pub use artifact::TrainedModel;
pub use trainer::{ClassCounts, ModelTrainer, TrainingReport};
pub use tree::{DecisionTree, Feature, Node, TreeParams};

use crate::labeling::AlertRule;
use crate::observation::{AlertLevel, Observation};
use std::sync::Arc;

/// Maps a feature vector to an alert level
///
/// Implementations are stateless at inference time and can be shared
/// between inference loops.
#[cfg_attr(test, mockall::automock)]
pub trait AlertClassifier {
    fn predict(&self, observation: &Observation) -> AlertLevel;
}

impl AlertClassifier for AlertRule {
    fn predict(&self, observation: &Observation) -> AlertLevel {
        self.label_observation(observation)
    }
}

impl<T: AlertClassifier + ?Sized> AlertClassifier for Arc<T> {
    fn predict(&self, observation: &Observation) -> AlertLevel {
        (**self).predict(observation)
    }
}

impl<T: AlertClassifier + ?Sized> AlertClassifier for &T {
    fn predict(&self, observation: &Observation) -> AlertLevel {
        (**self).predict(observation)
    }
}
