use std::io;
use thiserror::Error;

/// Error type for the monitor library
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A metrics source could not be read for this tick (permission denied,
    /// interface absent, timeout). Transient: the scheduler skips the tick.
    #[error("Metrics source unavailable: {0}")]
    SourceUnavailable(String),

    /// The requested window holds no usable value for any requested metric.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Entry timestamp is not strictly greater than the newest entry in history.
    #[error("Out-of-order entry: timestamp {timestamp} is not after {newest}")]
    OutOfOrder { timestamp: i64, newest: i64 },

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type alias for the monitor library
pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    pub fn source_unavailable<S: Into<String>>(msg: S) -> Self {
        MonitorError::SourceUnavailable(msg.into())
    }

    pub fn insufficient_data<S: Into<String>>(msg: S) -> Self {
        MonitorError::InsufficientData(msg.into())
    }

    pub fn config_invalid<S: Into<String>>(msg: S) -> Self {
        MonitorError::ConfigInvalid(msg.into())
    }

    pub fn runtime<S: Into<String>>(msg: S) -> Self {
        MonitorError::Runtime(msg.into())
    }

    /// Whether the error only affects the current tick and sampling may continue.
    pub fn is_transient(&self) -> bool {
        matches!(self, MonitorError::SourceUnavailable(_))
    }
}
