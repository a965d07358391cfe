//! Axis-aligned decision tree over the `(distance, size)` feature space
//!
//! CART with Gini impurity. Candidate thresholds sit halfway between adjacent
//! distinct feature values, and a sample goes left when its value is less
//! than or equal to the threshold. Nodes are stored in a flat arena with the
//! root at index 0.

use crate::error::TrainError;
use crate::model::AlertClassifier;
use crate::observation::{AlertLevel, LabeledSample, Observation};
use serde::{Deserialize, Serialize};

/// Input feature tested by a split
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Distance,
    Size,
}

impl Feature {
    pub const ALL: [Feature; 2] = [Feature::Distance, Feature::Size];

    pub fn value(&self, observation: &Observation) -> f64 {
        match self {
            Feature::Distance => observation.distance,
            Feature::Size => observation.size,
        }
    }

    fn sample_value(&self, sample: &LabeledSample) -> f64 {
        match self {
            Feature::Distance => sample.distance,
            Feature::Size => sample.size,
        }
    }
}

/// A node of the fitted tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Leaf {
        label: AlertLevel,
        /// Training samples that reached this leaf
        samples: usize,
    },
    Split {
        feature: Feature,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Growth limits for the tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// Stop splitting below this depth, unlimited when `None`
    pub max_depth: Option<usize>,
    /// Nodes with fewer samples become leaves
    pub min_samples_split: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

#[derive(Debug)]
struct Split {
    feature: Feature,
    threshold: f64,
    impurity: f64,
}

/// Fitted decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Fit a tree on labeled samples
    ///
    /// # Errors
    ///
    /// Returns `TrainError::EmptyDataset` when `samples` is empty.
    pub fn fit(samples: &[LabeledSample], params: &TreeParams) -> Result<Self, TrainError> {
        if samples.is_empty() {
            return Err(TrainError::EmptyDataset);
        }

        let mut tree = DecisionTree { nodes: Vec::new() };
        tree.grow(samples, (0..samples.len()).collect(), 0, params);
        Ok(tree)
    }

    /// A tree consisting of a single leaf
    pub fn constant(label: AlertLevel) -> Self {
        Self {
            nodes: vec![Node::Leaf { label, samples: 0 }],
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }

    /// Length of the longest root-to-leaf path in edges
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            match self.nodes.get(id) {
                Some(Node::Split { left, right, .. }) => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
                Some(Node::Leaf { .. }) => max_depth = max_depth.max(depth),
                None => {}
            }
        }
        max_depth
    }

    /// Check that every split points at existing nodes further down the arena
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(id, node)| match node {
                Node::Split { left, right, .. } => {
                    *left > id && *right > id && *left < self.nodes.len() && *right < self.nodes.len()
                }
                Node::Leaf { .. } => true,
            })
    }

    fn grow(
        &mut self,
        samples: &[LabeledSample],
        indices: Vec<usize>,
        depth: usize,
        params: &TreeParams,
    ) -> usize {
        let id = self.nodes.len();
        let counts = class_counts(samples, &indices);
        let leaf = Node::Leaf {
            label: majority(&counts),
            samples: indices.len(),
        };

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let depth_reached = params.max_depth.is_some_and(|max| depth >= max);
        if pure || depth_reached || indices.len() < params.min_samples_split {
            self.nodes.push(leaf);
            return id;
        }

        let Some(split) = best_split(samples, &indices, &counts) else {
            // Identical feature values with mixed labels
            self.nodes.push(leaf);
            return id;
        };

        // Reserve the slot so children get higher indices
        self.nodes.push(leaf);
        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| split.feature.sample_value(&samples[i]) <= split.threshold);

        let left = self.grow(samples, left_indices, depth + 1, params);
        let right = self.grow(samples, right_indices, depth + 1, params);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }
}

impl AlertClassifier for DecisionTree {
    fn predict(&self, observation: &Observation) -> AlertLevel {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    id = if feature.value(observation) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Some(Node::Leaf { label, .. }) => return *label,
                None => return AlertLevel::None,
            }
        }
    }
}

fn class_counts(samples: &[LabeledSample], indices: &[usize]) -> [usize; 3] {
    let mut counts = [0; 3];
    for &i in indices {
        counts[samples[i].alert_level.index()] += 1;
    }
    counts
}

/// Most frequent label; ties go to the more severe level
fn majority(counts: &[usize; 3]) -> AlertLevel {
    let mut best = AlertLevel::None;
    for level in AlertLevel::ALL {
        if counts[level.index()] >= counts[best.index()] {
            best = level;
        }
    }
    best
}

fn gini(counts: &[usize; 3], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

/// Lowest weighted Gini impurity split, `None` when no feature varies
fn best_split(samples: &[LabeledSample], indices: &[usize], counts: &[usize; 3]) -> Option<Split> {
    let n = indices.len();
    let mut best: Option<Split> = None;

    for feature in Feature::ALL {
        let mut sorted: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| {
                let sample = &samples[i];
                (feature.sample_value(sample), sample.alert_level.index())
            })
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left = [0usize; 3];
        for k in 0..n - 1 {
            left[sorted[k].1] += 1;
            let (value, next) = (sorted[k].0, sorted[k + 1].0);
            if value == next {
                continue;
            }

            let left_total = k + 1;
            let right_total = n - left_total;
            let right = [counts[0] - left[0], counts[1] - left[1], counts[2] - left[2]];
            let impurity = (left_total as f64 * gini(&left, left_total)
                + right_total as f64 * gini(&right, right_total))
                / n as f64;

            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = value + (next - value) / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some(Split {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
    }

    best
}
