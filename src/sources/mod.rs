//! Observation sources for the inference loop
//!
//! A [`StreamSource`] is either a finite replay of stored feature rows or a
//! live text-line channel. Both are pulled through the same
//! [`StreamSource::next`] call.

/// Live sensor channel abstraction
pub mod live;
/// Replay of stored feature rows
pub mod replay;
/// Serial device channel
pub mod serial;

pub use live::{LineChannel, LiveSource};
pub use replay::ReplaySource;
pub use serial::SerialChannel;

use crate::error::{ChannelError, ObservationError};
use crate::observation::Observation;

/// Raw payload produced by a source
#[derive(Debug, Clone, PartialEq)]
pub enum RawObservation {
    /// Features already expressed in meters (replayed rows)
    Features(Observation),
    /// Undecoded text line from the sensor link
    Line(String),
    /// Stored row whose features could not be decoded
    Malformed {
        raw: String,
        error: ObservationError,
    },
}

/// Result of pulling a source once
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePoll {
    Payload(RawObservation),
    /// Nothing arrived before the read timeout; try again
    Idle,
    /// No more rows (replay only)
    Exhausted,
}

/// Replay or live observation source
pub enum StreamSource {
    Replay(ReplaySource),
    Live(LiveSource),
}

impl StreamSource {
    /// Pull the next payload
    ///
    /// # Errors
    ///
    /// Returns `ChannelError` when the live channel fails. Timeouts are not
    /// errors and surface as `SourcePoll::Idle`.
    pub fn next(&mut self) -> Result<SourcePoll, ChannelError> {
        match self {
            StreamSource::Replay(replay) => Ok(replay.next()),
            StreamSource::Live(live) => live.next(),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, StreamSource::Live(_))
    }

    /// Release the underlying channel, if any
    pub fn close(&mut self) {
        if let StreamSource::Live(live) = self {
            live.close();
        }
    }
}

impl From<ReplaySource> for StreamSource {
    fn from(source: ReplaySource) -> Self {
        StreamSource::Replay(source)
    }
}

impl From<LiveSource> for StreamSource {
    fn from(source: LiveSource) -> Self {
        StreamSource::Live(source)
    }
}
