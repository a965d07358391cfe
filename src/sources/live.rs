use crate::error::ChannelError;
use crate::sources::{RawObservation, SourcePoll};
use log::{debug, info};
use std::time::Duration;

/// Duplex text-line connection to a sensor device
///
/// `read_line` is a bounded wait: it returns `Ok(None)` when no complete
/// line arrived within `timeout`, which callers must treat as "poll again",
/// never as end of stream.
#[cfg_attr(test, mockall::automock)]
pub trait LineChannel {
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, ChannelError>;
}

/// Conceptually infinite source backed by a [`LineChannel`]
pub struct LiveSource {
    channel: Option<Box<dyn LineChannel + Send>>,
    read_timeout: Duration,
}

impl LiveSource {
    pub fn new(channel: Box<dyn LineChannel + Send>, read_timeout: Duration) -> Self {
        Self {
            channel: Some(channel),
            read_timeout,
        }
    }

    /// Wait for the next line
    ///
    /// Blank lines and timeouts both yield `SourcePoll::Idle`.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Closed` after [`LiveSource::close`], or the
    /// channel's own error if the read fails.
    pub fn next(&mut self) -> Result<SourcePoll, ChannelError> {
        let channel = self.channel.as_mut().ok_or(ChannelError::Closed)?;
        match channel.read_line(self.read_timeout)? {
            Some(line) => {
                let line = line.trim();
                if line.is_empty() {
                    Ok(SourcePoll::Idle)
                } else {
                    debug!("Received line: {}", line);
                    Ok(SourcePoll::Payload(RawObservation::Line(line.to_string())))
                }
            }
            None => Ok(SourcePoll::Idle),
        }
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    /// Drop the channel, releasing the device handle
    pub fn close(&mut self) {
        if self.channel.take().is_some() {
            info!("Sensor channel closed");
        }
    }
}
