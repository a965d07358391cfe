/// Ground-truth labeling rule
pub mod rules;

pub use rules::{label, AlertRule};
