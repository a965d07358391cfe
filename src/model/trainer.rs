use crate::config::TrainingConfig;
use crate::error::TrainError;
use crate::model::artifact::TrainedModel;
use crate::model::tree::{DecisionTree, TreeParams};
use crate::model::AlertClassifier;
use crate::observation::{AlertLevel, LabeledSample};
use crate::simulator::Dataset;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Per-class row counts
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassCounts {
    pub none: usize,
    pub beep: usize,
    #[serde(rename = "ALERT")]
    pub alert: usize,
}

impl ClassCounts {
    fn of(samples: &[LabeledSample]) -> Self {
        let mut counts = Self::default();
        for sample in samples {
            match sample.alert_level {
                AlertLevel::None => counts.none += 1,
                AlertLevel::Beep => counts.beep += 1,
                AlertLevel::Alert => counts.alert += 1,
            }
        }
        counts
    }

    /// Number of classes with at least one row
    pub fn represented(&self) -> usize {
        [self.none, self.beep, self.alert]
            .iter()
            .filter(|&&c| c > 0)
            .count()
    }
}

/// Outcome of a training run, persisted alongside the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingReport {
    /// Exact-match accuracy on the held-out rows
    pub accuracy: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Label distribution of the training rows
    pub class_counts: ClassCounts,
    pub depth: usize,
    pub leaves: usize,
    /// Training rows covered a single class, so the model always predicts it
    pub degenerate: bool,
}

/// Splits a dataset, fits a decision tree and evaluates it
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    test_fraction: f64,
    seed: u64,
    params: TreeParams,
}

impl Default for ModelTrainer {
    fn default() -> Self {
        Self::new(0.2, 42)
    }
}

impl ModelTrainer {
    pub fn new(test_fraction: f64, seed: u64) -> Self {
        Self {
            test_fraction,
            seed,
            params: TreeParams::default(),
        }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(config.test_fraction, config.seed).with_params(TreeParams {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
        })
    }

    pub fn with_params(mut self, params: TreeParams) -> Self {
        self.params = params;
        self
    }

    /// Train and evaluate a model
    ///
    /// # Errors
    ///
    /// Returns `TrainError::EmptyDataset` for an empty dataset,
    /// `TrainError::InvalidTestFraction` when the fraction is outside `(0, 1)`
    /// and `TrainError::TrainingSetEmpty` when holding out the test rows
    /// leaves nothing to train on.
    pub fn train(&self, dataset: &Dataset) -> Result<(TrainedModel, TrainingReport), TrainError> {
        if dataset.is_empty() {
            return Err(TrainError::EmptyDataset);
        }

        let (train_idx, test_idx) = split_indices(dataset.len(), self.test_fraction, self.seed)?;
        let samples = dataset.samples();
        let train: Vec<LabeledSample> = train_idx.iter().map(|&i| samples[i]).collect();
        let test: Vec<LabeledSample> = test_idx.iter().map(|&i| samples[i]).collect();

        let tree = DecisionTree::fit(&train, &self.params)?;

        let correct = test
            .iter()
            .filter(|s| tree.predict(&s.observation()) == s.alert_level)
            .count();
        let accuracy = correct as f64 / test.len() as f64;

        let class_counts = ClassCounts::of(&train);
        let report = TrainingReport {
            accuracy,
            train_rows: train.len(),
            test_rows: test.len(),
            class_counts,
            depth: tree.depth(),
            leaves: tree.leaf_count(),
            degenerate: class_counts.represented() < 2,
        };

        info!(
            "Trained decision tree on {} rows (depth {}, {} leaves), accuracy {:.2} on {} held-out rows",
            report.train_rows, report.depth, report.leaves, report.accuracy, report.test_rows
        );
        if report.degenerate {
            warn!(
                "Training data contains a single class; the model will always predict the same level"
            );
        }

        Ok((TrainedModel::new(tree, report.clone()), report))
    }
}

/// Seeded shuffle split into `(train, test)` index sets
///
/// The test set takes the first `ceil(n * test_fraction)` shuffled indices.
pub fn split_indices(
    n: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), TrainError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TrainError::InvalidTestFraction(test_fraction));
    }

    let test_rows = (n as f64 * test_fraction).ceil() as usize;
    if test_rows >= n {
        return Err(TrainError::TrainingSetEmpty { rows: n, test_rows });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(test_rows);
    Ok((train, indices))
}
