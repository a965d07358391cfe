//! Synthetic training data for the alert classifier
//!
//! Samples are drawn uniformly from the configured distance and size ranges
//! and labeled by an [`AlertRule`]. Generation is fully determined by the
//! seed and the sample count.

use crate::config::SimulationConfig;
use crate::error::{ArtifactError, ArtifactKind};
use crate::labeling::AlertRule;
use crate::observation::{AlertLevel, LabeledSample};
use log::{debug, info};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::ops::Range;
use std::path::Path;

/// Ordered collection of labeled samples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    samples: Vec<LabeledSample>,
}

impl Dataset {
    pub fn new(samples: Vec<LabeledSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[LabeledSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of rows per alert level, indexed in severity order
    pub fn class_counts(&self) -> [usize; 3] {
        let mut counts = [0; 3];
        for sample in &self.samples {
            counts[sample.alert_level.index()] += 1;
        }
        counts
    }

    /// Write the dataset as CSV with header `distance,size,alert_level`
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let mut writer = csv::Writer::from_path(path)?;
        for sample in &self.samples {
            writer.serialize(sample)?;
        }
        writer.flush()?;
        info!("Wrote {} samples to {}", self.samples.len(), path.display());
        Ok(())
    }

    /// Read a dataset written by [`Dataset::save`]
    ///
    /// # Errors
    ///
    /// Returns `ArtifactError::Missing` if the file does not exist and
    /// `ArtifactError::InvalidRow` for rows with missing or non-positive
    /// features or an unknown label.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::Missing {
                kind: ArtifactKind::Dataset,
                path: path.to_path_buf(),
            });
        }

        let mut reader = csv::Reader::from_path(path)?;
        let mut samples = Vec::new();
        for (i, result) in reader.deserialize::<LabeledSample>().enumerate() {
            // Header is line 1, first data row is line 2
            let row = i + 2;
            let sample = result.map_err(|e| ArtifactError::InvalidRow {
                row,
                reason: e.to_string(),
            })?;
            if !(sample.distance.is_finite() && sample.distance > 0.0)
                || !(sample.size.is_finite() && sample.size > 0.0)
            {
                return Err(ArtifactError::InvalidRow {
                    row,
                    reason: format!(
                        "features must be positive, got distance={} size={}",
                        sample.distance, sample.size
                    ),
                });
            }
            samples.push(sample);
        }

        debug!("Loaded {} samples from {}", samples.len(), path.display());
        Ok(Self { samples })
    }
}

impl FromIterator<LabeledSample> for Dataset {
    fn from_iter<I: IntoIterator<Item = LabeledSample>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Generator of labeled synthetic readings
#[derive(Debug, Clone)]
pub struct DataSimulator {
    rule: AlertRule,
    distance_range: Range<f64>,
    size_range: Range<f64>,
}

impl Default for DataSimulator {
    fn default() -> Self {
        Self::new(AlertRule::default(), 0.5..10.0, 0.1..3.0)
    }
}

impl DataSimulator {
    /// Create a simulator over half-open distance and size ranges (meters)
    pub fn new(rule: AlertRule, distance_range: Range<f64>, size_range: Range<f64>) -> Self {
        Self {
            rule,
            distance_range,
            size_range,
        }
    }

    /// Build a simulator from configuration
    pub fn from_config(rule: AlertRule, config: &SimulationConfig) -> Self {
        Self::new(
            rule,
            config.distance_min..config.distance_max,
            config.size_min..config.size_max,
        )
    }

    /// Generate `n` labeled samples
    ///
    /// All distances are drawn before all sizes from a single stream seeded
    /// with `seed`, so the output depends only on `(n, seed)` and the ranges.
    pub fn generate(&self, n: usize, seed: u64) -> Dataset {
        let mut rng = StdRng::seed_from_u64(seed);
        let distance = Uniform::new(self.distance_range.start, self.distance_range.end);
        let size = Uniform::new(self.size_range.start, self.size_range.end);

        let distances: Vec<f64> = (0..n).map(|_| distance.sample(&mut rng)).collect();
        let sizes: Vec<f64> = (0..n).map(|_| size.sample(&mut rng)).collect();

        let dataset: Dataset = distances
            .into_iter()
            .zip(sizes)
            .map(|(distance, size)| LabeledSample {
                distance,
                size,
                alert_level: self.rule.label(distance, size),
            })
            .collect();

        let counts = dataset.class_counts();
        info!(
            "Generated {} samples (seed {}): {} {}, {} {}, {} {}",
            n,
            seed,
            counts[0],
            AlertLevel::None,
            counts[1],
            AlertLevel::Beep,
            counts[2],
            AlertLevel::Alert
        );
        dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeling::label;
    use quickcheck_macros::quickcheck;
    use tempfile::TempDir;

    #[test]
    fn test_generate_is_deterministic() {
        let simulator = DataSimulator::default();
        let first = simulator.generate(1000, 42);
        let second = simulator.generate(1000, 42);
        assert_eq!(first.len(), 1000);
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_seeds_differ() {
        let simulator = DataSimulator::default();
        assert_ne!(simulator.generate(50, 1), simulator.generate(50, 2));
    }

    #[test]
    fn test_samples_within_ranges_and_labeled_by_rule() {
        let dataset = DataSimulator::default().generate(1000, 7);
        for sample in dataset.samples() {
            assert!(sample.distance >= 0.5 && sample.distance < 10.0);
            assert!(sample.size >= 0.1 && sample.size < 3.0);
            assert_eq!(sample.alert_level, label(sample.distance, sample.size));
        }
    }

    #[test]
    fn test_all_classes_represented() {
        let counts = DataSimulator::default().generate(1000, 42).class_counts();
        assert!(counts.iter().all(|&c| c > 0), "counts: {:?}", counts);
        assert_eq!(counts.iter().sum::<usize>(), 1000);
    }

    #[test]
    fn test_zero_samples_is_empty() {
        assert!(DataSimulator::default().generate(0, 42).is_empty());
    }

    #[test]
    fn test_save_and_load_preserves_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("simulated_data.csv");
        let dataset = DataSimulator::default().generate(200, 3);

        dataset.save(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("distance,size,alert_level\n"));

        let loaded = Dataset::load(&path).unwrap();
        assert_eq!(loaded, dataset);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Dataset::load(Path::new("/nonexistent/simulated_data.csv"));
        assert!(matches!(
            result,
            Err(ArtifactError::Missing {
                kind: ArtifactKind::Dataset,
                ..
            })
        ));
    }

    #[test]
    fn test_load_rejects_bad_label_and_missing_values() {
        let dir = TempDir::new().unwrap();

        let path = dir.path().join("bad_label.csv");
        std::fs::write(&path, "distance,size,alert_level\n1.0,2.0,ALERT\n3.0,1.0,Beep\n").unwrap();
        match Dataset::load(&path) {
            Err(ArtifactError::InvalidRow { row, .. }) => assert_eq!(row, 3),
            other => panic!("expected invalid row, got {:?}", other),
        }

        let path = dir.path().join("missing_value.csv");
        std::fs::write(&path, "distance,size,alert_level\n1.0,,none\n").unwrap();
        assert!(matches!(
            Dataset::load(&path),
            Err(ArtifactError::InvalidRow { row: 2, .. })
        ));

        let path = dir.path().join("negative.csv");
        std::fs::write(&path, "distance,size,alert_level\n-1.0,1.0,none\n").unwrap();
        assert!(matches!(
            Dataset::load(&path),
            Err(ArtifactError::InvalidRow { row: 2, .. })
        ));
    }

    #[quickcheck]
    fn prop_generate_yields_exactly_n_rows(n: u8, seed: u64) -> bool {
        DataSimulator::default().generate(n as usize, seed).len() == n as usize
    }
}
