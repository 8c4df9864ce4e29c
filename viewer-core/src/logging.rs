//! src/logging.rs
//! ============================================================================
//! # Structured logging
//!
//! One global `tracing` subscriber:
//! - JSON lines written to a rolling file through a non-blocking
//!   `tracing-appender` writer
//! - optional human-readable stderr layer
//! - both filtered by `RUST_LOG` plus the configured level directive
//!
//! Events across the crate carry `marker` / `operation_type` fields so the
//! JSON output can be grouped per concern (`CACHE_OPERATION`,
//! `FETCH_PIPELINE`, `FETCH_ERROR`, `EXIF_ERROR`).

use std::{
    path::{Component, Path, PathBuf},
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Layer, filter::Directive, fmt::time::ChronoUtc, layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub log_dir: PathBuf,
    pub log_file_prefix: CompactString,
    pub log_level: CompactString,
    pub max_log_files: usize,
    pub rotation: LogRotation,
    /// Mirror events to stderr in human-readable form.
    pub stderr: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Never,
    Daily,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: CompactString::const_new("fvds"),
            log_level: CompactString::const_new("info"),
            max_log_files: 10,
            rotation: LogRotation::Daily,
            stderr: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Logger already initialized")]
    AlreadyInitialized,

    #[error("Invalid log directory: {0}")]
    InvalidLogDirectory(String),

    #[error("Failed to create log directory: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to install global tracing subscriber: {0}")]
    SubscriberInit(String),
}

static LOGGER_INSTALLED: AtomicBool = AtomicBool::new(false);

// Logger builder
pub struct LoggerBuilder {
    config: LoggerConfig,
}

impl LoggerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Install the global subscriber.
    ///
    /// Keep the returned guard alive for as long as logs should be flushed.
    pub async fn build(self) -> Result<WorkerGuard, LoggingError> {
        if LOGGER_INSTALLED.swap(true, Ordering::AcqRel) {
            return Err(LoggingError::AlreadyInitialized);
        }

        let result = self.install().await;
        if result.is_err() {
            LOGGER_INSTALLED.store(false, Ordering::Release);
        }
        result
    }

    async fn install(self) -> Result<WorkerGuard, LoggingError> {
        let config = self.config;
        validate_config(&config)?;
        setup_log_directory(&config.log_dir).await?;

        let rotation = match config.rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Daily => Rotation::DAILY,
        };

        let file_appender = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(config.log_file_prefix.as_str())
            .filename_suffix("jsonl")
            .max_log_files(config.max_log_files)
            .build(&config.log_dir)
            .map_err(|e| LoggingError::ConfigError(e.to_string()))?;

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let level = config.log_level.clone();
        let make_filter = || -> Result<EnvFilter, LoggingError> {
            let directive = Directive::from_str(&level).map_err(|e| {
                LoggingError::ConfigError(format!("Invalid log level {level:?}: {e}"))
            })?;
            Ok(EnvFilter::from_default_env().add_directive(directive))
        };

        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_writer(non_blocking)
            .with_filter(make_filter()?);

        let stderr_layer = if config.stderr {
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_filter(make_filter()?),
            )
        } else {
            None
        };

        tracing_subscriber::registry()
            .with(json_layer)
            .with(stderr_layer)
            .try_init()
            .map_err(|e| LoggingError::SubscriberInit(e.to_string()))?;

        Ok(guard)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_config(config: &LoggerConfig) -> Result<(), LoggingError> {
    if config.log_file_prefix.is_empty() {
        return Err(LoggingError::ConfigError(
            "Log file prefix must not be empty".to_string(),
        ));
    }

    if config.max_log_files == 0 {
        return Err(LoggingError::ConfigError(
            "Max log files must be greater than 0".to_string(),
        ));
    }

    validate_log_directory(&config.log_dir)
}

fn validate_log_directory(path: &Path) -> Result<(), LoggingError> {
    if path.components().count() == 0 {
        return Err(LoggingError::InvalidLogDirectory("Empty path".to_string()));
    }

    if path.components().any(|c| c == Component::ParentDir) {
        return Err(LoggingError::InvalidLogDirectory(
            "Path contains parent directory references".to_string(),
        ));
    }

    Ok(())
}

async fn setup_log_directory(log_dir: &Path) -> Result<(), LoggingError> {
    if !TokioFs::try_exists(log_dir).await.unwrap_or(false) {
        TokioFs::create_dir_all(log_dir).await?;
    }
    Ok(())
}
