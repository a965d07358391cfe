use crate::error::LogError;
use crate::observation::PredictionRecord;
use log::debug;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Column names of the prediction log
pub const LOG_HEADER: [&str; 5] = [
    "timestamp",
    "distance_m",
    "size_m",
    "prediction",
    "alert_message",
];

/// Append-only CSV log of predictions
///
/// The header is written only when the file is missing or empty, so
/// restarting the process keeps appending to the same table. Appends from
/// one process are serialized; the file must have a single writing process.
#[derive(Debug)]
pub struct ResultLogger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ResultLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, preceded by the header on first write
    pub fn append(&self, record: &PredictionRecord) -> Result<(), LogError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(LOG_HEADER)?;
        }
        writer.write_record(record.to_row())?;
        writer.flush()?;

        debug!(
            "Logged {} prediction to {}",
            record.prediction,
            self.path.display()
        );
        Ok(())
    }
}
