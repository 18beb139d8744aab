use thiserror::Error;

use crate::bbox::BoundsError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid bounds: {0}")]
    Bounds(#[from] BoundsError),
    #[error("at least one sensor must be configured")]
    NoSensors,
    #[error("sensor names must not be empty")]
    EmptySensorName,
    #[error("sensor '{0}' is configured more than once")]
    DuplicateSensor(String),
    #[error("window sizes must be distinct positive integers, got {0:?}")]
    WindowSize(Vec<usize>),
    #[error("depth range [{min}, {max}) is empty: min must be less than max")]
    DepthRange { min: f64, max: f64 },
    #[error("no QC thresholds can be set for unknown variable '{0}'")]
    UnknownQcVariable(String),
    #[error("QC thresholds for '{0}' need min < max and a positive spike threshold")]
    QcThreshold(String),
}
