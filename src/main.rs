use anyhow::Context;
use blindspot::config::Config;
use blindspot::error::{ArtifactError, ChannelError};
use blindspot::inference::{FixedSize, InferenceLoop, OperatorPrompt, SizeProvider};
use blindspot::model::{ModelTrainer, TrainedModel};
use blindspot::results::ResultLogger;
use blindspot::simulator::{DataSimulator, Dataset};
use blindspot::sources::{LiveSource, ReplaySource, SerialChannel};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Command-line arguments for the blind-spot alert system
#[derive(Parser, Debug)]
#[command(
    name = "blindspot",
    about = "Blind-spot awareness system - ML alert classifier for proximity sensors",
    long_about = "Generates labeled proximity data, trains a decision-tree classifier on it, \
                  and raises blind-spot alerts from replayed data or a live serial sensor."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        global = true,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Generate a labeled synthetic dataset
    GenerateData {
        /// Number of samples
        samples: Option<usize>,
        /// Random seed
        seed: Option<u64>,
        /// Output CSV path
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Train a classifier on a dataset and save the model
    Train {
        dataset: Option<PathBuf>,
        model: Option<PathBuf>,
    },
    /// Replay a dataset through the trained model
    Simulate {
        dataset: Option<PathBuf>,
        model: Option<PathBuf>,
        /// Skip the pause between ticks
        #[arg(long)]
        no_delay: bool,
    },
    /// Classify live readings from a serial sensor
    Monitor {
        channel: Option<String>,
        model: Option<PathBuf>,
        log: Option<PathBuf>,
        /// Serial baud rate
        #[arg(long, value_name = "B")]
        baud: Option<u32>,
        /// Use a fixed object size in meters instead of prompting
        #[arg(long, value_name = "M")]
        size: Option<f64>,
    },
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files fall back to defaults in Config::load_or_default
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
        }

        match &self.command {
            Command::GenerateData {
                samples: Some(0), ..
            } => Err("Number of samples must be positive".to_string()),
            Command::Monitor {
                size: Some(size), ..
            } if !(size.is_finite() && *size > 0.0) => {
                Err(format!("Object size must be a positive number, got {}", size))
            }
            _ => Ok(()),
        }
    }
}

fn generate_data(
    config: &Config,
    samples: Option<usize>,
    seed: Option<u64>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let samples = samples.unwrap_or(config.simulation.samples);
    let seed = seed.unwrap_or(config.simulation.seed);
    let output = output.unwrap_or_else(|| config.paths.dataset.clone());

    let simulator = DataSimulator::from_config(config.rule, &config.simulation);
    let dataset = simulator.generate(samples, seed);
    dataset
        .save(&output)
        .with_context(|| format!("Failed to write dataset to {}", output.display()))?;

    let [none, beep, alert] = dataset.class_counts();
    info!(
        "Class balance: none={}, beep={}, ALERT={}",
        none, beep, alert
    );
    println!(
        "Data generated and saved to {} ({} samples)",
        output.display(),
        dataset.len()
    );
    Ok(())
}

fn train(config: &Config, dataset: Option<PathBuf>, model: Option<PathBuf>) -> anyhow::Result<()> {
    let dataset_path = dataset.unwrap_or_else(|| config.paths.dataset.clone());
    let model_path = model.unwrap_or_else(|| config.paths.model.clone());

    let dataset = Dataset::load(&dataset_path)?;
    let (model, report) = ModelTrainer::from_config(&config.training)
        .train(&dataset)
        .context("Training failed")?;

    println!("Model Accuracy: {:.2}", report.accuracy);
    if report.degenerate {
        println!("Warning: training data contains a single class.");
    }

    model
        .save(&model_path)
        .with_context(|| format!("Failed to write model to {}", model_path.display()))?;
    println!("Model saved to {}", model_path.display());
    Ok(())
}

fn simulate(
    config: &Config,
    dataset: Option<PathBuf>,
    model: Option<PathBuf>,
    no_delay: bool,
) -> anyhow::Result<()> {
    let dataset_path = dataset.unwrap_or_else(|| config.paths.dataset.clone());
    let model_path = model.unwrap_or_else(|| config.paths.model.clone());

    let model = TrainedModel::load(&model_path)?;
    let source = ReplaySource::from_path(&dataset_path)?;

    let tick_delay = if no_delay {
        Duration::ZERO
    } else {
        config.pacing.tick_delay()
    };

    let mut inference = InferenceLoop::new(model, source.into()).with_tick_delay(tick_delay);
    if config.simulation.log_results {
        inference = inference.with_logger(ResultLogger::new(&config.paths.results_log));
    }
    install_shutdown_handler(inference.shutdown_handle())?;

    let summary = inference.run()?;
    info!(
        "Replayed {} rows: {} alerts, {} skipped",
        summary.ticks, summary.alerts, summary.skipped
    );
    Ok(())
}

fn monitor(
    config: &Config,
    channel: Option<String>,
    model: Option<PathBuf>,
    log: Option<PathBuf>,
    baud: Option<u32>,
    size: Option<f64>,
) -> anyhow::Result<()> {
    let port = channel.unwrap_or_else(|| config.live.port.clone());
    let model_path = model.unwrap_or_else(|| config.paths.model.clone());
    let log_path = log.unwrap_or_else(|| config.paths.results_log.clone());
    let baud_rate = baud.unwrap_or(config.live.baud_rate);

    let model = TrainedModel::load(&model_path)?;
    println!("Model '{}' loaded successfully.", model_path.display());

    let serial = SerialChannel::open(&port, baud_rate)?;
    println!("Successfully connected to {} at {} baud.", port, baud_rate);
    let source = LiveSource::new(Box::new(serial), config.live.read_timeout());

    let size_provider: Box<dyn SizeProvider + Send> = match size.or(config.live.fixed_size_m) {
        Some(size) => {
            info!("Using fixed object size {:.2}m", size);
            Box::new(FixedSize(size))
        }
        None => Box::new(OperatorPrompt::stdin()),
    };

    let mut inference = InferenceLoop::new(model, source.into())
        .with_size_provider(size_provider)
        .with_logger(ResultLogger::new(&log_path))
        .with_distance_scale(config.live.distance_scale)
        .with_tick_delay(config.pacing.tick_delay());
    install_shutdown_handler(inference.shutdown_handle())?;

    let summary = inference.run()?;
    info!(
        "Monitor stopped after {} predictions ({} alerts, {} logged to {})",
        summary.predictions,
        summary.alerts,
        summary.logged,
        log_path.display()
    );
    if summary.log_failures > 0 {
        warn!("{} predictions could not be logged", summary.log_failures);
    }
    Ok(())
}

/// Clear `running` on the first Ctrl+C and exit immediately on the second
fn install_shutdown_handler(running: Arc<Mutex<bool>>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        let mut flag = running.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *flag {
            info!("Received interrupt signal (SIGINT), shutting down gracefully...");
            *flag = false;
        } else {
            warn!("Second interrupt received, exiting immediately");
            std::process::exit(130);
        }
    })
    .context("Error setting SIGINT handler for graceful shutdown")
}

/// Process exit code for a failed command
fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(ArtifactError::Missing { .. }) = cause.downcast_ref::<ArtifactError>() {
            return 2;
        }
        if let Some(ChannelError::Unavailable { .. }) = cause.downcast_ref::<ChannelError>() {
            return 3;
        }
    }
    1
}

fn run(cli: Cli, config: &Config) -> anyhow::Result<()> {
    match cli.command {
        Command::GenerateData {
            samples,
            seed,
            output,
        } => generate_data(config, samples, seed, output),
        Command::Train { dataset, model } => train(config, dataset, model),
        Command::Simulate {
            dataset,
            model,
            no_delay,
        } => simulate(config, dataset, model, no_delay),
        Command::Monitor {
            channel,
            model,
            log,
            baud,
            size,
        } => monitor(config, channel, model, log, baud, size),
    }
}

fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let config = Config::load_or_default(cli.config.as_deref());

    if let Err(e) = run(cli, &config) {
        error!("{:#}", e);
        std::process::exit(exit_code(&e));
    }
}
