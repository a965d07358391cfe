use blindspot::error::{ArtifactError, ChannelError};
use blindspot::inference::{FixedSize, InferenceLoop};
use blindspot::labeling::AlertRule;
use blindspot::model::{AlertClassifier, ModelTrainer, TrainedModel};
use blindspot::observation::{AlertLevel, Observation};
use blindspot::results::{ResultLogger, LOG_HEADER};
use blindspot::simulator::{DataSimulator, Dataset};
use blindspot::sources::{LineChannel, LiveSource, ReplaySource, SerialChannel};
use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

/// Channel serving fixed lines, then clearing the shutdown flag
struct ScriptedChannel {
    lines: VecDeque<String>,
    running: Arc<Mutex<bool>>,
}

impl LineChannel for ScriptedChannel {
    fn read_line(&mut self, _timeout: Duration) -> Result<Option<String>, ChannelError> {
        match self.lines.pop_front() {
            Some(line) => Ok(Some(line)),
            None => {
                *self.running.lock().unwrap() = false;
                Ok(None)
            }
        }
    }
}

fn trained_model(dir: &Path) -> TrainedModel {
    let dataset_path = dir.join("simulated_data.csv");
    let model_path = dir.join("alert_model.json");

    DataSimulator::default()
        .generate(1000, 42)
        .save(&dataset_path)
        .unwrap();
    let dataset = Dataset::load(&dataset_path).unwrap();
    let (model, _) = ModelTrainer::default().train(&dataset).unwrap();
    model.save(&model_path).unwrap();
    TrainedModel::load(&model_path).unwrap()
}

#[test]
fn test_generate_train_and_reload() {
    let dir = TempDir::new().unwrap();
    let model = trained_model(dir.path());

    assert_eq!(model.report().accuracy, 1.0);
    assert!(!model.report().degenerate);
    assert_eq!(model.report().train_rows + model.report().test_rows, 1000);

    // Clear-cut cases far from every threshold
    assert_eq!(model.predict(&Observation::new(1.0, 2.5)), AlertLevel::Alert);
    assert_eq!(model.predict(&Observation::new(3.5, 1.0)), AlertLevel::Beep);
    assert_eq!(model.predict(&Observation::new(8.0, 0.3)), AlertLevel::None);
}

#[test]
fn test_generation_is_reproducible_on_disk() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("a.csv");
    let second = dir.path().join("b.csv");

    DataSimulator::default().generate(200, 7).save(&first).unwrap();
    DataSimulator::default().generate(200, 7).save(&second).unwrap();

    assert_eq!(
        std::fs::read(&first).unwrap(),
        std::fs::read(&second).unwrap()
    );
}

#[test]
fn test_replay_dataset_through_model() {
    let dir = TempDir::new().unwrap();
    let model = trained_model(dir.path());
    let dataset = Dataset::load(&dir.path().join("simulated_data.csv")).unwrap();
    let expected_alerts = dataset
        .samples()
        .iter()
        .filter(|s| model.predict(&s.observation()) != AlertLevel::None)
        .count();

    let source = ReplaySource::from_path(&dir.path().join("simulated_data.csv")).unwrap();
    let mut inference =
        InferenceLoop::new(&model, source.into()).with_output(Box::new(std::io::sink()));
    let summary = inference.run().unwrap();

    assert_eq!(summary.ticks, 1000);
    assert_eq!(summary.predictions, 1000);
    assert_eq!(summary.alerts, expected_alerts);
    assert_eq!(summary.logged, 0);
    assert!(!summary.cancelled);
}

#[test]
fn test_missing_artifacts_name_their_remedy() {
    let dir = TempDir::new().unwrap();

    let err = TrainedModel::load(&dir.path().join("alert_model.json")).unwrap_err();
    assert!(matches!(err, ArtifactError::Missing { .. }));
    assert!(err.to_string().contains("blindspot train"));

    let err = Dataset::load(&dir.path().join("simulated_data.csv")).unwrap_err();
    assert!(err.to_string().contains("blindspot generate-data"));
}

#[test]
fn test_live_session_logs_valid_readings() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("results.csv");
    let running = Arc::new(Mutex::new(true));

    let channel = ScriptedChannel {
        lines: ["150", "garbage", "", "300,-1.5", "900"]
            .iter()
            .map(|l| l.to_string())
            .collect(),
        running: Arc::clone(&running),
    };

    let mut inference = InferenceLoop::new(
        AlertRule::default(),
        LiveSource::new(Box::new(channel), Duration::from_millis(10)).into(),
    )
    .with_size_provider(Box::new(FixedSize(2.0)))
    .with_logger(ResultLogger::new(&log_path))
    .with_shutdown_flag(running)
    .with_output(Box::new(std::io::sink()));

    let summary = inference.run().unwrap();
    assert_eq!(summary.predictions, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.logged, 3);
    assert!(summary.cancelled);

    let log = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines[0], LOG_HEADER.join(","));
    assert!(lines[1].ends_with(",1.50,2.00,ALERT,!!! ALERT: Large object detected very close!"));
    assert!(lines[2].ends_with(",3.00,2.00,beep,Beep! Object detected in blind spot."));
    assert!(lines[3].ends_with(",9.00,2.00,none,No alert"));
    assert_eq!(lines.len(), 4);
}

#[cfg(unix)]
#[test]
fn test_live_session_over_file_descriptor() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("results.csv");
    let model = trained_model(dir.path());

    let mut device = NamedTempFile::new().unwrap();
    device.write_all(b"100\n400\n").unwrap();
    device.flush().unwrap();

    let channel = SerialChannel::open(device.path().to_str().unwrap(), 9600).unwrap();
    let mut inference = InferenceLoop::new(
        model,
        LiveSource::new(Box::new(channel), Duration::from_millis(10)).into(),
    )
    .with_size_provider(Box::new(FixedSize(2.5)))
    .with_logger(ResultLogger::new(&log_path))
    .with_tick_delay(Duration::from_millis(5))
    .with_output(Box::new(std::io::sink()));

    let running = inference.shutdown_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        *running.lock().unwrap() = false;
    });
    let summary = inference.run().unwrap();
    stopper.join().unwrap();

    assert_eq!(summary.predictions, 2);
    assert!(summary.cancelled);

    let log = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains(",1.00,2.50,ALERT,"));
    assert!(lines[2].contains(",4.00,2.50,beep,"));
}

#[test]
fn test_unavailable_channel() {
    let err = SerialChannel::open("/nonexistent/ttyUSB0", 9600).err().unwrap();
    assert!(matches!(err, ChannelError::Unavailable { .. }));
}
