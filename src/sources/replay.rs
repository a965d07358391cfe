use crate::error::{ArtifactError, ArtifactKind, ObservationError};
use crate::observation::Observation;
use crate::simulator::Dataset;
use crate::sources::{RawObservation, SourcePoll};
use log::debug;
use std::path::Path;

#[derive(Debug, Clone)]
enum ReplayRow {
    Decoded(Observation),
    /// Undecoded CSV record, parsed when it is replayed
    Record(csv::ByteRecord),
}

/// Finite, restartable replay of stored feature rows
///
/// Rows read from a file are decoded one at a time as they are replayed, so
/// a malformed row surfaces as a [`RawObservation::Malformed`] payload
/// instead of failing the whole file.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    rows: Vec<ReplayRow>,
    position: usize,
    distance_col: usize,
    size_col: usize,
}

impl ReplaySource {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self {
            rows: observations.into_iter().map(ReplayRow::Decoded).collect(),
            position: 0,
            distance_col: 0,
            size_col: 1,
        }
    }

    /// Replay the features of a dataset in row order
    pub fn from_dataset(dataset: &Dataset) -> Self {
        Self::new(dataset.samples().iter().map(|s| s.observation()).collect())
    }

    /// Replay a CSV with `distance` and `size` columns
    ///
    /// Other columns, such as `alert_level`, are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ArtifactError::Missing` if the file does not exist and
    /// `ArtifactError::InvalidRow` if the header lacks a feature column.
    pub fn from_path(path: &Path) -> Result<Self, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::Missing {
                kind: ArtifactKind::Dataset,
                path: path.to_path_buf(),
            });
        }

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = reader.byte_headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| String::from_utf8_lossy(h).trim() == name)
                .ok_or_else(|| ArtifactError::InvalidRow {
                    row: 1,
                    reason: format!("missing '{}' column", name),
                })
        };
        let distance_col = column("distance")?;
        let size_col = column("size")?;

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            rows.push(ReplayRow::Record(record?));
        }

        debug!("Loaded {} replay rows from {}", rows.len(), path.display());
        Ok(Self {
            rows,
            position: 0,
            distance_col,
            size_col,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Start again from the first row
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn next(&mut self) -> SourcePoll {
        let index = self.position;
        let Some(row) = self.rows.get(index) else {
            return SourcePoll::Exhausted;
        };

        let payload = match row {
            ReplayRow::Decoded(observation) => RawObservation::Features(*observation),
            ReplayRow::Record(record) => match self.decode(record) {
                Ok(observation) => RawObservation::Features(observation),
                Err(error) => RawObservation::Malformed {
                    raw: record
                        .iter()
                        .map(|field| String::from_utf8_lossy(field).into_owned())
                        .collect::<Vec<_>>()
                        .join(","),
                    error,
                },
            },
        };
        self.position = index + 1;
        SourcePoll::Payload(payload)
    }

    fn decode(&self, record: &csv::ByteRecord) -> Result<Observation, ObservationError> {
        let field = |col: usize| -> Result<f64, ObservationError> {
            let raw = record
                .get(col)
                .ok_or(ObservationError::FieldCount(record.len()))?;
            let text = String::from_utf8_lossy(raw);
            let text = text.trim();
            match text.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(ObservationError::NotNumeric(text.to_string())),
            }
        };
        Ok(Observation::new(field(self.distance_col)?, field(self.size_col)?))
    }
}
