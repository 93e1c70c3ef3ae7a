//! Error types for the scanning engine.
//!
//! These never leave the engine's public operations: scans log them and skip
//! the offending unit. They exist so internal helpers can use `?`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading one unit (file, directory, process, command)
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Filesystem access failed
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document or record could not be parsed
    #[error("malformed json in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A TOML manifest could not be parsed
    #[error("malformed toml in {path:?}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// An external command could not be run or exited unsuccessfully
    #[error("command `{command}` failed: {message}")]
    Command { command: String, message: String },

    /// Information about a process could not be read (gone, permission denied)
    #[error("process {pid} unavailable: {reason}")]
    ProcessUnavailable { pid: u32, reason: String },
}

impl MonitorError {
    /// Wrap an io error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MonitorError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a serde_json error with the path it concerns
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        MonitorError::Json {
            path: path.into(),
            source,
        }
    }
}

/// Result type for engine-internal operations
pub type Result<T> = std::result::Result<T, MonitorError>;
