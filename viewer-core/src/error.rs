//! src/error.rs
//! ============================================================================
//! # `AppError`: application-level error type
//!
//! Errors raised while wiring the data source into a running program: config
//! discovery and parsing, logging setup, library scanning. The data source
//! itself never surfaces these to the viewer; pipeline failures are carried by
//! [`CoreError`] and end up as the `fetch_failed` flag.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{error_core::CoreError, logging::LoggingError};

/// Unified error type for everything outside the fetch pipeline.
#[derive(Debug, Error)]
pub enum AppError {
    /// Standard IO error, auto-converted from `io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TOML config parsing error.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// TOML config serialization error.
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Config file I/O error with path.
    #[error("Failed to access config file {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No platform config directory could be determined.
    #[error("Could not determine config directory")]
    ConfigDirUnavailable,

    /// Logging could not be initialized.
    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    /// Pipeline or collaborator error escaping into application code.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Serialization error (JSON output of the driver).
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AppError {
    /// Create a config I/O error for the given path
    pub fn config_io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Self::ConfigIo {
            path: path.into(),
            source,
        }
    }
}
