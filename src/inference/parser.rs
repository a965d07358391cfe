//! Decoding of sensor lines and out-of-band size input
//!
//! The sensor reports distance only, in channel units (centimeters on the
//! reference device). Two framings are accepted: a single distance field, or
//! `distance,speed` where speed is parsed but not used for classification.
//! Object size is not on the wire and comes from a [`SizeProvider`].

use crate::error::ObservationError;
use log::warn;
use std::io::{BufRead, BufReader, Stdin, Stdout, Write};

/// A decoded sensor line, still in channel units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub distance: f64,
    pub speed: Option<f64>,
}

/// Decode one trimmed sensor line
pub fn parse_reading(line: &str) -> Result<SensorReading, ObservationError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ObservationError::Empty);
    }

    let fields: Vec<&str> = line.split(',').collect();
    let (distance, speed) = match fields.as_slice() {
        [distance] => (parse_number(distance)?, None),
        [distance, speed] => (parse_number(distance)?, Some(parse_number(speed)?)),
        other => return Err(ObservationError::FieldCount(other.len())),
    };

    if distance <= 0.0 {
        return Err(ObservationError::OutOfRange {
            field: "distance",
            value: distance,
        });
    }

    Ok(SensorReading { distance, speed })
}

/// Parse an operator-supplied object size in meters
pub fn parse_size(input: &str) -> Result<f64, ObservationError> {
    let size = parse_number(input)?;
    if size <= 0.0 {
        return Err(ObservationError::OutOfRange {
            field: "size",
            value: size,
        });
    }
    Ok(size)
}

fn parse_number(field: &str) -> Result<f64, ObservationError> {
    let field = field.trim();
    match field.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ObservationError::NotNumeric(field.to_string())),
    }
}

/// Source of the object size for a live reading
///
/// `acquire` may block without bound. `Ok(None)` means the input has been
/// closed and no further sizes will arrive.
#[cfg_attr(test, mockall::automock)]
pub trait SizeProvider {
    fn acquire(&mut self, distance_m: f64) -> Result<Option<f64>, ObservationError>;
}

/// Same size for every reading
#[derive(Debug, Clone, Copy)]
pub struct FixedSize(pub f64);

impl SizeProvider for FixedSize {
    fn acquire(&mut self, _distance_m: f64) -> Result<Option<f64>, ObservationError> {
        Ok(Some(self.0))
    }
}

/// Asks an operator for the size of each detected object
pub struct OperatorPrompt<R, W> {
    input: R,
    output: W,
}

impl OperatorPrompt<BufReader<Stdin>, Stdout> {
    /// Prompt on stdout and read answers from stdin
    pub fn stdin() -> Self {
        Self::new(BufReader::new(std::io::stdin()), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> OperatorPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> SizeProvider for OperatorPrompt<R, W> {
    fn acquire(&mut self, distance_m: f64) -> Result<Option<f64>, ObservationError> {
        let prompt = write!(
            self.output,
            "Distance: {:.2}m. Enter estimated object size (in meters): ",
            distance_m
        )
        .and_then(|_| self.output.flush());
        if let Err(e) = prompt {
            warn!("Failed to write size prompt: {}", e);
        }

        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(0) => Ok(None),
            Ok(_) => parse_size(&answer).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                Err(ObservationError::NotNumeric(e.to_string()))
            }
            Err(e) => {
                warn!("Failed to read size input: {}", e);
                Ok(None)
            }
        }
    }
}
