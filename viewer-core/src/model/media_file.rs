//! `media_file.rs`
//!
//! The file descriptor handed to the data source by the surrounding app.
//! Opaque beyond its ID, its media type, and the locator the download
//! collaborator resolves.

use std::path::Path;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Stable integer identifier of a file.
pub type FileId = i64;

/// Media type of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileType {
    Image,
    Video,
    LivePhoto,
}

impl FileType {
    /// Classify a single-component original by its extension.
    ///
    /// Live photos are two files and cannot be recognized from one extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "heic" | "heif" | "avif" | "tif"
            | "tiff" => Some(Self::Image),
            "mov" | "mp4" | "m4v" | "webm" | "mkv" => Some(Self::Video),
            _ => None,
        }
    }

    /// Classify a path by its extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::LivePhoto => "live_photo",
        }
    }
}

/// A media file as known to the viewer. Never mutated by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: FileId,
    pub file_type: FileType,
    /// Collaborator-specific handle used to find (and decrypt) the bytes.
    pub locator: CompactString,
}

impl MediaFile {
    pub fn new(id: FileId, file_type: FileType, locator: impl Into<CompactString>) -> Self {
        Self {
            id,
            file_type,
            locator: locator.into(),
        }
    }
}
