/// Per-tick classification loop
pub mod engine;
/// Sensor line decoding and size providers
pub mod parser;

pub use engine::{InferenceLoop, LoopSummary};
pub use parser::{parse_reading, parse_size, FixedSize, OperatorPrompt, SensorReading, SizeProvider};
