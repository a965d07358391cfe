use crate::error::{ChannelError, ObservationError};
use crate::inference::parser::{parse_reading, SizeProvider};
use crate::model::AlertClassifier;
use crate::observation::{AlertLevel, Observation, PredictionRecord};
use crate::results::ResultLogger;
use crate::sources::{RawObservation, SourcePoll, StreamSource};
use log::{debug, error, info, warn};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const RULE: &str = "-----------------------------------";

/// Counters describing one run of the inference loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Payloads pulled from the source
    pub ticks: usize,
    /// Observations classified
    pub predictions: usize,
    /// Predictions above `AlertLevel::None`
    pub alerts: usize,
    /// Payloads discarded as malformed
    pub skipped: usize,
    /// Pulls that timed out
    pub idle: usize,
    /// Records appended to the result log
    pub logged: usize,
    /// Records that failed to append
    pub log_failures: usize,
    /// The loop stopped on a shutdown request rather than end of stream
    pub cancelled: bool,
}

enum TickOutcome {
    Ready(Observation),
    Invalid(String, ObservationError),
    InputClosed,
}

/// Pulls observations, classifies them and reports alerts
///
/// Replay sources run until exhausted and only print non-`None` alerts.
/// Live sources run until the shutdown flag is cleared and report every
/// prediction. Records are appended when a logger is attached.
pub struct InferenceLoop<C: AlertClassifier> {
    classifier: C,
    source: StreamSource,
    size_provider: Option<Box<dyn SizeProvider + Send>>,
    logger: Option<ResultLogger>,
    output: Box<dyn Write + Send>,
    distance_scale: f64,
    tick_delay: Duration,
    running: Arc<Mutex<bool>>,
}

impl<C: AlertClassifier> InferenceLoop<C> {
    /// Create a loop printing to stdout with no pacing and no logging
    pub fn new(classifier: C, source: StreamSource) -> Self {
        Self {
            classifier,
            source,
            size_provider: None,
            logger: None,
            output: Box::new(std::io::stdout()),
            distance_scale: 0.01,
            tick_delay: Duration::ZERO,
            running: Arc::new(Mutex::new(true)),
        }
    }

    pub fn with_size_provider(mut self, provider: Box<dyn SizeProvider + Send>) -> Self {
        self.size_provider = Some(provider);
        self
    }

    pub fn with_logger(mut self, logger: ResultLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_output(mut self, output: Box<dyn Write + Send>) -> Self {
        self.output = output;
        self
    }

    /// Factor converting live channel distances to meters
    pub fn with_distance_scale(mut self, scale: f64) -> Self {
        self.distance_scale = scale;
        self
    }

    pub fn with_tick_delay(mut self, delay: Duration) -> Self {
        self.tick_delay = delay;
        self
    }

    /// Share an externally owned shutdown flag
    pub fn with_shutdown_flag(mut self, running: Arc<Mutex<bool>>) -> Self {
        self.running = running;
        self
    }

    /// Flag that stops the loop at its next safe point when set to `false`
    pub fn shutdown_handle(&self) -> Arc<Mutex<bool>> {
        Arc::clone(&self.running)
    }

    /// Run until the source is exhausted or shutdown is requested
    ///
    /// The source is closed before returning.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError` if the live channel fails. Malformed payloads
    /// never end the loop.
    pub fn run(&mut self) -> Result<LoopSummary, ChannelError> {
        let live = self.source.is_live();
        if live {
            info!("Starting live inference loop");
            self.emit("\n--- Real-Time Blind Spot Alert System ---");
            self.emit("Press Ctrl+C to exit.");
        } else {
            info!("Starting replay inference loop");
            self.emit("Starting haptic awareness system with ML model...");
            self.emit(RULE);
        }

        let mut summary = LoopSummary::default();
        let result = self.run_ticks(live, &mut summary);
        self.source.close();

        match &result {
            Ok(()) if live => self.emit("\n--- System stopped by user. ---"),
            Ok(()) if !summary.cancelled => {
                self.emit(RULE);
                self.emit("Simulation finished.");
            }
            Ok(()) => self.emit("Simulation stopped."),
            Err(e) => error!("Inference loop aborted: {}", e),
        }
        info!(
            "Inference loop finished: {} ticks, {} predictions, {} alerts, {} skipped, {} logged",
            summary.ticks, summary.predictions, summary.alerts, summary.skipped, summary.logged
        );

        result.map(|_| summary)
    }

    fn run_ticks(&mut self, live: bool, summary: &mut LoopSummary) -> Result<(), ChannelError> {
        loop {
            if !self.is_running() {
                summary.cancelled = true;
                return Ok(());
            }

            let payload = match self.source.next()? {
                SourcePoll::Exhausted => return Ok(()),
                SourcePoll::Idle => {
                    summary.idle += 1;
                    self.pace();
                    continue;
                }
                SourcePoll::Payload(payload) => payload,
            };
            summary.ticks += 1;

            let observation = match self.resolve(payload) {
                TickOutcome::Ready(observation) => observation,
                TickOutcome::Invalid(raw, e) => {
                    warn!("Skipping invalid reading '{}': {}", raw, e);
                    self.emit(&format!("Received invalid data: '{}' ({})", raw, e));
                    summary.skipped += 1;
                    self.pace();
                    continue;
                }
                TickOutcome::InputClosed => {
                    info!("Size input closed, stopping");
                    summary.cancelled = true;
                    return Ok(());
                }
            };

            // Shutdown may have been requested while waiting for the size
            if !self.is_running() {
                summary.cancelled = true;
                return Ok(());
            }

            let prediction = self.classifier.predict(&observation);
            summary.predictions += 1;
            if prediction != AlertLevel::None {
                summary.alerts += 1;
            }
            debug!(
                "distance={:.2} size={:.2} -> {}",
                observation.distance, observation.size, prediction
            );

            if live {
                self.emit(&format!(
                    "  -> Prediction: {} | Alert: {}\n",
                    prediction.as_str().to_uppercase(),
                    prediction.message()
                ));
            } else if prediction != AlertLevel::None {
                self.emit(&format!(
                    "Distance: {:.2}m, Size: {:.2}m -> {} (Predicted: {})",
                    observation.distance,
                    observation.size,
                    prediction.message(),
                    prediction
                ));
            }

            if let Some(logger) = &self.logger {
                match logger.append(&PredictionRecord::now(&observation, prediction)) {
                    Ok(()) => summary.logged += 1,
                    Err(e) => {
                        error!("Failed to log prediction to {}: {}", logger.path().display(), e);
                        summary.log_failures += 1;
                    }
                }
            }

            self.pace();
        }
    }

    fn resolve(&mut self, payload: RawObservation) -> TickOutcome {
        match payload {
            RawObservation::Features(observation) => {
                for (field, value) in [("distance", observation.distance), ("size", observation.size)]
                {
                    if !(value.is_finite() && value > 0.0) {
                        return TickOutcome::Invalid(
                            format!("{},{}", observation.distance, observation.size),
                            ObservationError::OutOfRange { field, value },
                        );
                    }
                }
                TickOutcome::Ready(observation)
            }
            RawObservation::Malformed { raw, error } => TickOutcome::Invalid(raw, error),
            RawObservation::Line(line) => {
                let reading = match parse_reading(&line) {
                    Ok(reading) => reading,
                    Err(e) => return TickOutcome::Invalid(line, e),
                };
                let distance = reading.distance * self.distance_scale;

                let Some(provider) = self.size_provider.as_mut() else {
                    return TickOutcome::Invalid(line, ObservationError::MissingSize);
                };
                match provider.acquire(distance) {
                    Ok(Some(size)) => TickOutcome::Ready(Observation::new(distance, size)),
                    Ok(None) => TickOutcome::InputClosed,
                    Err(e) => TickOutcome::Invalid(line, e),
                }
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running.lock().map(|running| *running).unwrap_or(false)
    }

    fn pace(&self) {
        if !self.tick_delay.is_zero() {
            std::thread::sleep(self.tick_delay);
        }
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.output, "{}", line) {
            warn!("Failed to write output: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::parser::{FixedSize, MockSizeProvider};
    use crate::labeling::AlertRule;
    use crate::model::MockAlertClassifier;
    use crate::sources::live::MockLineChannel;
    use crate::sources::{LiveSource, ReplaySource};
    use std::collections::VecDeque;
    use tempfile::TempDir;

    /// Writer whose contents can be inspected after the loop takes ownership
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Live source replaying `lines`, clearing `running` once they run out
    fn live_source(lines: &[&str], running: Arc<Mutex<bool>>) -> StreamSource {
        let mut script: VecDeque<String> = lines.iter().map(|l| l.to_string()).collect();
        let mut channel = MockLineChannel::new();
        channel.expect_read_line().returning(move |_| match script.pop_front() {
            Some(line) => Ok(Some(line)),
            None => {
                *running.lock().unwrap() = false;
                Ok(None)
            }
        });
        LiveSource::new(Box::new(channel), Duration::ZERO).into()
    }

    #[test]
    fn test_replay_prints_only_alerts() {
        let source = ReplaySource::new(vec![
            Observation::new(1.0, 2.0),
            Observation::new(3.0, 1.0),
            Observation::new(8.0, 0.2),
        ]);
        let output = SharedBuffer::default();
        let mut inference = InferenceLoop::new(AlertRule::default(), source.into())
            .with_output(Box::new(output.clone()));

        let summary = inference.run().unwrap();
        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.predictions, 3);
        assert_eq!(summary.alerts, 2);
        assert_eq!(summary.logged, 0);
        assert!(!summary.cancelled);

        let text = output.text();
        assert!(text.contains(
            "Distance: 1.00m, Size: 2.00m -> !!! ALERT: Large object detected very close! (Predicted: ALERT)"
        ));
        assert!(text.contains(
            "Distance: 3.00m, Size: 1.00m -> Beep! Object detected in blind spot. (Predicted: beep)"
        ));
        assert!(text.starts_with("Starting haptic awareness system with ML model...\n"));
        assert!(!text.contains("8.00m"));
        assert!(text.trim_end().ends_with("Simulation finished."));
    }

    #[test]
    fn test_replay_skips_undecodable_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.csv");
        std::fs::write(
            &path,
            "distance,size,alert_level\n1.0,2.0,ALERT\nabc,1.0,none\n3.0,1.0,beep\n",
        )
        .unwrap();

        let output = SharedBuffer::default();
        let mut inference =
            InferenceLoop::new(AlertRule::default(), ReplaySource::from_path(&path).unwrap().into())
                .with_output(Box::new(output.clone()));

        let summary = inference.run().unwrap();
        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.predictions, 2);
        assert!(!summary.cancelled);

        let text = output.text();
        assert!(text.contains("Received invalid data: 'abc,1.0,none'"));
        assert!(text.trim_end().ends_with("Simulation finished."));
    }

    #[test]
    fn test_replay_skips_out_of_range_rows() {
        let source = ReplaySource::new(vec![Observation::new(-1.0, 2.0), Observation::new(1.0, 2.0)]);
        let mut inference = InferenceLoop::new(AlertRule::default(), source.into())
            .with_output(Box::new(std::io::sink()));

        let summary = inference.run().unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.predictions, 1);
    }

    #[test]
    fn test_live_converts_centimeters_before_predicting() {
        let running = Arc::new(Mutex::new(true));
        let mut classifier = MockAlertClassifier::new();
        classifier
            .expect_predict()
            .withf(|obs| (obs.distance - 1.5).abs() < 1e-12 && obs.size == 2.0)
            .times(1)
            .return_const(AlertLevel::Alert);

        let mut sizes = MockSizeProvider::new();
        sizes
            .expect_acquire()
            .withf(|distance| (*distance - 1.5).abs() < 1e-12)
            .times(1)
            .returning(|_| Ok(Some(2.0)));

        let output = SharedBuffer::default();
        let mut inference =
            InferenceLoop::new(classifier, live_source(&["150"], Arc::clone(&running)))
                .with_size_provider(Box::new(sizes))
                .with_shutdown_flag(running)
                .with_output(Box::new(output.clone()));

        let summary = inference.run().unwrap();
        assert_eq!(summary.predictions, 1);
        assert!(summary.cancelled);
        assert!(output.text().contains(
            "  -> Prediction: ALERT | Alert: !!! ALERT: Large object detected very close!"
        ));
    }

    #[test]
    fn test_live_reports_every_level() {
        let running = Arc::new(Mutex::new(true));
        let output = SharedBuffer::default();
        let mut inference = InferenceLoop::new(
            AlertRule::default(),
            live_source(&["800"], Arc::clone(&running)),
        )
        .with_size_provider(Box::new(FixedSize(0.2)))
        .with_shutdown_flag(running)
        .with_output(Box::new(output.clone()));

        inference.run().unwrap();
        assert!(output
            .text()
            .contains("  -> Prediction: NONE | Alert: No alert"));
    }

    #[test]
    fn test_malformed_line_does_not_stop_loop_or_log() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("results.csv");
        let running = Arc::new(Mutex::new(true));
        let output = SharedBuffer::default();

        let mut inference = InferenceLoop::new(
            AlertRule::default(),
            live_source(&["150", "abc", "300,-2.0"], Arc::clone(&running)),
        )
        .with_size_provider(Box::new(FixedSize(1.0)))
        .with_logger(ResultLogger::new(&log_path))
        .with_shutdown_flag(running)
        .with_output(Box::new(output.clone()));

        let summary = inference.run().unwrap();
        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.predictions, 2);
        assert_eq!(summary.logged, 2);
        assert!(output.text().contains("Received invalid data: 'abc'"));

        let log = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with(",1.50,1.00,beep,Beep! Object detected in blind spot."));
        assert!(lines[2].ends_with(",3.00,1.00,beep,Beep! Object detected in blind spot."));
    }

    #[test]
    fn test_invalid_size_skips_tick() {
        let running = Arc::new(Mutex::new(true));
        let mut sizes = MockSizeProvider::new();
        let mut answers = VecDeque::from(vec![
            Err(ObservationError::NotNumeric("big".to_string())),
            Ok(Some(2.0)),
        ]);
        sizes
            .expect_acquire()
            .times(2)
            .returning(move |_| answers.pop_front().unwrap_or(Ok(None)));

        let mut inference = InferenceLoop::new(
            AlertRule::default(),
            live_source(&["100", "100"], Arc::clone(&running)),
        )
        .with_size_provider(Box::new(sizes))
        .with_shutdown_flag(running)
        .with_output(Box::new(std::io::sink()));

        let summary = inference.run().unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.predictions, 1);
        assert_eq!(summary.alerts, 1);
    }

    #[test]
    fn test_shutdown_during_size_wait_discards_tick() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("results.csv");
        let running = Arc::new(Mutex::new(true));

        let flag = Arc::clone(&running);
        let mut sizes = MockSizeProvider::new();
        sizes.expect_acquire().times(1).returning(move |_| {
            // Operator answers after Ctrl+C was pressed
            *flag.lock().unwrap() = false;
            Ok(Some(2.0))
        });

        let mut classifier = MockAlertClassifier::new();
        classifier.expect_predict().never();

        let mut inference = InferenceLoop::new(
            classifier,
            live_source(&["150", "150"], Arc::clone(&running)),
        )
        .with_size_provider(Box::new(sizes))
        .with_logger(ResultLogger::new(&log_path))
        .with_shutdown_flag(running)
        .with_output(Box::new(std::io::sink()));

        let summary = inference.run().unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.predictions, 0);
        assert!(!log_path.exists());
    }

    #[test]
    fn test_closed_size_input_stops_loop() {
        let running = Arc::new(Mutex::new(true));
        let mut sizes = MockSizeProvider::new();
        sizes.expect_acquire().times(1).returning(|_| Ok(None));

        let mut inference = InferenceLoop::new(
            AlertRule::default(),
            live_source(&["150", "150"], Arc::clone(&running)),
        )
        .with_size_provider(Box::new(sizes))
        .with_shutdown_flag(running)
        .with_output(Box::new(std::io::sink()));

        let summary = inference.run().unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.predictions, 0);
    }

    #[test]
    fn test_missing_size_provider_skips_lines() {
        let running = Arc::new(Mutex::new(true));
        let mut inference = InferenceLoop::new(
            AlertRule::default(),
            live_source(&["150"], Arc::clone(&running)),
        )
        .with_shutdown_flag(running)
        .with_output(Box::new(std::io::sink()));

        let summary = inference.run().unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.predictions, 0);
    }

    #[test]
    fn test_idle_polls_are_counted() {
        let running = Arc::new(Mutex::new(true));
        let flag = Arc::clone(&running);
        let mut polls = 0;
        let mut channel = MockLineChannel::new();
        channel.expect_read_line().returning(move |_| {
            polls += 1;
            if polls == 3 {
                *flag.lock().unwrap() = false;
            }
            Ok(None)
        });

        let mut inference = InferenceLoop::new(
            AlertRule::default(),
            LiveSource::new(Box::new(channel), Duration::ZERO).into(),
        )
        .with_shutdown_flag(running)
        .with_output(Box::new(std::io::sink()));

        let summary = inference.run().unwrap();
        assert_eq!(summary.idle, 3);
        assert_eq!(summary.ticks, 0);
        assert!(summary.cancelled);
    }

    #[test]
    fn test_channel_failure_aborts() {
        let mut channel = MockLineChannel::new();
        channel.expect_read_line().returning(|_| {
            Err(ChannelError::IoError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device unplugged",
            )))
        });

        let mut inference = InferenceLoop::new(
            AlertRule::default(),
            LiveSource::new(Box::new(channel), Duration::ZERO).into(),
        )
        .with_output(Box::new(std::io::sink()));

        assert!(matches!(inference.run(), Err(ChannelError::IoError(_))));
    }

    #[test]
    fn test_shutdown_before_start() {
        let source = ReplaySource::new(vec![Observation::new(1.0, 2.0)]);
        let mut inference = InferenceLoop::new(AlertRule::default(), source.into())
            .with_output(Box::new(std::io::sink()));
        *inference.shutdown_handle().lock().unwrap() = false;

        let summary = inference.run().unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.ticks, 0);
    }
}
