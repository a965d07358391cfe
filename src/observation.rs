//! Core data types for the blind-spot alert pipeline
//!
//! This module defines the observation, label and record types shared by the
//! simulator, the trainer and the inference loop.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp type for prediction records (wall-clock local time)
pub type Timestamp = DateTime<Local>;

/// Format used for timestamps in the result log
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single proximity reading expressed in meters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    /// Distance to the object in meters
    pub distance: f64,
    /// Estimated object size in meters
    pub size: f64,
}

impl Observation {
    pub fn new(distance: f64, size: f64) -> Self {
        Self { distance, size }
    }
}

/// Severity of a proximity event
///
/// The text forms are `none`, `beep` and `ALERT`. The uppercase `ALERT` is
/// part of the file formats and must not be normalised.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertLevel {
    /// Nothing in the blind spot worth reporting
    #[serde(rename = "none")]
    None,
    /// Object in the blind spot
    #[serde(rename = "beep")]
    Beep,
    /// Large object very close
    #[serde(rename = "ALERT")]
    Alert,
}

impl AlertLevel {
    /// All levels in ascending severity
    pub const ALL: [AlertLevel; 3] = [AlertLevel::None, AlertLevel::Beep, AlertLevel::Alert];

    /// Label as stored in datasets, artifacts and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::None => "none",
            AlertLevel::Beep => "beep",
            AlertLevel::Alert => "ALERT",
        }
    }

    /// Human-readable alert message for this level
    pub fn message(&self) -> &'static str {
        match self {
            AlertLevel::None => "No alert",
            AlertLevel::Beep => "Beep! Object detected in blind spot.",
            AlertLevel::Alert => "!!! ALERT: Large object detected very close!",
        }
    }

    /// Dense index used by the classifier for per-class counts
    pub(crate) fn index(&self) -> usize {
        match self {
            AlertLevel::None => 0,
            AlertLevel::Beep => 1,
            AlertLevel::Alert => 2,
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = String;

    /// Parse the exact text form; casing is significant
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AlertLevel::None),
            "beep" => Ok(AlertLevel::Beep),
            "ALERT" => Ok(AlertLevel::Alert),
            other => Err(format!("unknown alert level '{}'", other)),
        }
    }
}

/// An observation paired with its ground-truth label
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LabeledSample {
    pub distance: f64,
    pub size: f64,
    pub alert_level: AlertLevel,
}

impl LabeledSample {
    pub fn observation(&self) -> Observation {
        Observation::new(self.distance, self.size)
    }
}

/// One line of the prediction log
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub timestamp: Timestamp,
    pub distance_m: f64,
    pub size_m: f64,
    pub prediction: AlertLevel,
    pub alert_message: String,
}

impl PredictionRecord {
    /// Build a record stamped with the current local time
    pub fn now(observation: &Observation, prediction: AlertLevel) -> Self {
        Self {
            timestamp: Local::now(),
            distance_m: observation.distance,
            size_m: observation.size,
            prediction,
            alert_message: prediction.message().to_string(),
        }
    }

    /// Fields in log column order, formatted for the CSV log
    pub fn to_row(&self) -> [String; 5] {
        [
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.2}", self.distance_m),
            format!("{:.2}", self.size_m),
            self.prediction.as_str().to_string(),
            self.alert_message.clone(),
        ]
    }
}
