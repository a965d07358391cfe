//! Threshold rule that assigns ground-truth alert levels
//!
//! The rule is the source of truth for synthetic labels. Comparisons are
//! strict, so a reading sitting exactly on a threshold falls through to the
//! next weaker level.

use crate::observation::{AlertLevel, Observation};
use serde::{Deserialize, Serialize};

/// Two-threshold labeling rule
///
/// An object triggers `Alert` when it is closer than `alert_max_distance` and
/// larger than `alert_min_size`, otherwise `Beep` when closer than
/// `beep_max_distance` and larger than `beep_min_size`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertRule {
    /// Distance (m) below which a large object raises an alert
    pub alert_max_distance: f64,
    /// Size (m) above which a close object raises an alert
    pub alert_min_size: f64,
    /// Distance (m) below which an object beeps
    pub beep_max_distance: f64,
    /// Size (m) above which an object beeps
    pub beep_min_size: f64,
}

impl Default for AlertRule {
    fn default() -> Self {
        Self {
            alert_max_distance: 2.0,
            alert_min_size: 1.5,
            beep_max_distance: 5.0,
            beep_min_size: 0.5,
        }
    }
}

impl AlertRule {
    /// Create a rule with custom thresholds
    pub fn new(
        alert_max_distance: f64,
        alert_min_size: f64,
        beep_max_distance: f64,
        beep_min_size: f64,
    ) -> Self {
        Self {
            alert_max_distance,
            alert_min_size,
            beep_max_distance,
            beep_min_size,
        }
    }

    /// Label a reading
    ///
    /// Non-positive or non-finite inputs are outside the sensor domain and
    /// map to `AlertLevel::None`.
    pub fn label(&self, distance: f64, size: f64) -> AlertLevel {
        if !(distance.is_finite() && size.is_finite()) || distance <= 0.0 || size <= 0.0 {
            return AlertLevel::None;
        }

        if distance < self.alert_max_distance && size > self.alert_min_size {
            AlertLevel::Alert
        } else if distance < self.beep_max_distance && size > self.beep_min_size {
            AlertLevel::Beep
        } else {
            AlertLevel::None
        }
    }

    /// Label an observation
    pub fn label_observation(&self, observation: &Observation) -> AlertLevel {
        self.label(observation.distance, observation.size)
    }
}

/// Label a reading with the default thresholds
pub fn label(distance: f64, size: f64) -> AlertLevel {
    AlertRule::default().label(distance, size)
}
