//! src/config.rs
//! ============================================================================
//! # Config: configuration loader and saver (directories only)
//!
//! Loads and saves the viewer's settings as TOML from the platform config
//! path using the [`directories`](https://docs.rs/directories) crate.
//!
//! ## Features
//! - XDG-compliant config discovery and writing (Linux, macOS, Windows)
//! - Defaults written on first run
//! - Every section optional in the file; missing sections fall back to defaults
//! - Async load/save for Tokio callers
//!
//! ## Example
//! ```rust,ignore
//! let config = Config::load().await?;
//! config.save_to(&Config::config_path()?).await?;
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing::info;

use crate::{error::AppError, logging::LoggerConfig};

/// Layout of a local media library served by the local download manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Library root; the other paths are relative to it.
    pub root: PathBuf,

    /// Directory of pre-rendered `<stem>.jpg` thumbnails.
    pub thumbnails_dir: PathBuf,

    /// Directory of originals. Live photos are an image and a video sharing
    /// a stem.
    pub originals_dir: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./library"),
            thumbnails_dir: PathBuf::from("thumbnails"),
            originals_dir: PathBuf::from("originals"),
        }
    }
}

impl LibraryConfig {
    #[must_use]
    pub fn thumbnails_path(&self) -> PathBuf {
        self.root.join(&self.thumbnails_dir)
    }

    #[must_use]
    pub fn originals_path(&self) -> PathBuf {
        self.root.join(&self.originals_dir)
    }
}

/// Dimension probing limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Upper bound on a single probe; exceeding it fails the probe
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub logging: LoggerConfig,
}

impl Config {
    /// Loads config from the platform config dir, or writes and returns
    /// defaults when no file exists yet.
    ///
    /// The config is expected at `$XDG_CONFIG_HOME/fvds/config.toml`
    /// (Linux), or equivalent on Windows/macOS.
    pub async fn load() -> Result<Self, AppError> {
        let path = Self::config_path()?;

        if TokioFs::try_exists(&path).await.unwrap_or(false) {
            Self::load_from(&path).await
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config = Self::default();
            default_config.save_to(&path).await?;

            Ok(default_config)
        }
    }

    /// Loads config from an explicit path.
    pub async fn load_from(path: &Path) -> Result<Self, AppError> {
        info!("Loading config from {}", path.display());

        let text = TokioFs::read_to_string(path)
            .await
            .map_err(|e| AppError::config_io(path, e))?;

        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(text)?)
    }

    /// Saves config to an explicit path, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<(), AppError> {
        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::config_io(parent, e))?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(path, toml_str)
            .await
            .map_err(|e| AppError::config_io(path, e))?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> Result<PathBuf, AppError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the config directory (without filename).
    pub fn config_dir() -> Result<PathBuf, AppError> {
        let proj_dirs = ProjectDirs::from("dev", "FileViewer", "fvds")
            .ok_or(AppError::ConfigDirUnavailable)?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogRotation;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [library]
            root = "/srv/photos"

            [probe]
            timeout = "250ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.library.root, PathBuf::from("/srv/photos"));
        assert_eq!(config.library.thumbnails_dir, PathBuf::from("thumbnails"));
        assert_eq!(
            config.library.thumbnails_path(),
            PathBuf::from("/srv/photos/thumbnails")
        );
        assert_eq!(config.probe.timeout, Duration::from_millis(250));
        assert_eq!(config.logging.log_level, "info");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml_str("[probe]\ntimeout = 12").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.probe.timeout = Duration::from_secs(3);
        config.logging.rotation = LogRotation::Never;
        config.save_to(&path).await.unwrap();

        let loaded = Config::load_from(&path).await.unwrap();
        assert_eq!(loaded.probe, config.probe);
        assert_eq!(loaded.library, config.library);
        assert_eq!(loaded.logging.rotation, LogRotation::Never);
    }

    #[tokio::test]
    async fn test_missing_file_is_config_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("absent.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConfigIo { .. }));
    }

    #[test]
    fn test_config_path_is_named_after_binary() {
        // No home directory in some sandboxes.
        let Ok(path) = Config::config_path() else {
            return;
        };

        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("config.toml"));
        assert!(path.to_string_lossy().to_lowercase().contains("fvds"));
    }
}
