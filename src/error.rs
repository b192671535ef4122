//! Monitor errors.

use std::path::PathBuf;
use thiserror::Error;

/// Monitor error types.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Configuration missing or malformed. Fatal at startup.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A log partition could not be written.
    #[error("Failed to write log partition {path}: {source}")]
    LogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The log directory could not be listed or read.
    #[error("Failed to read log directory {path}: {source}")]
    LogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Alert delivery failed.
    #[error("Notifier delivery failed: {0}")]
    Notifier(String),

    /// Prober could not be constructed.
    #[error("Prober setup failed: {0}")]
    Probe(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
