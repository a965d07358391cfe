/// Append-only prediction log
pub mod logger;

pub use logger::{ResultLogger, LOG_HEADER};
