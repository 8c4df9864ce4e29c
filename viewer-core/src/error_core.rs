//! Core error handling module
//!
//! • One enum for every failure the fetch pipeline and its collaborators can
//!   produce
//! • `CompactString` payloads keep the hot error path allocation-light
//! • First-class `tracing` integration through [`CoreError::trace`]
//! • `#[non_exhaustive]` for forward-compatible extension
use std::{
    fmt::Display,
    io::{self, ErrorKind},
    sync::Arc,
};

use compact_str::{CompactString, ToCompactString};
use smallvec::{SmallVec, smallvec};
use thiserror::Error;
use tracing::{Level, event};

use crate::model::media_file::FileId;

/// `EmptyUrl` stage name for the thumbnail fetch.
pub const THUMBNAIL_STAGE: &str = "thumbnail";

/// Convenient alias carrying our unified error type
pub type CoreResult<T> = Result<T, CoreError>;

/// Primary error enumeration (grouped by concern)
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    // ────────────────────────────────────────────────────────────
    // Download collaborator
    // ────────────────────────────────────────────────────────────
    #[error("Thumbnail fetch failed for file {file_id}: {reason}")]
    ThumbnailFetch {
        file_id: FileId,
        reason: CompactString,
    },

    #[error("Original fetch failed for file {file_id}: {reason}")]
    OriginalFetch {
        file_id: FileId,
        reason: CompactString,
    },

    #[error("Empty {stage} URL returned for file {file_id}")]
    EmptyUrl { file_id: FileId, stage: &'static str },

    #[error("Unexpected source for file {file_id}: expected {expected}")]
    UnexpectedSource {
        file_id: FileId,
        expected: &'static str,
    },

    // ────────────────────────────────────────────────────────────
    // Dimension probing
    // ────────────────────────────────────────────────────────────
    #[error("Could not probe dimensions of {url}: {reason}")]
    Probe {
        url: CompactString,
        reason: CompactString,
    },

    // ────────────────────────────────────────────────────────────
    // Metadata side-channel
    // ────────────────────────────────────────────────────────────
    #[error("Could not fetch bytes from {url}: {reason}")]
    ByteFetch {
        url: CompactString,
        reason: CompactString,
    },

    #[error("Metadata extraction failed: {0}")]
    MetadataExtraction(CompactString),

    // ------------------------------------------------------------
    // Invalid State
    // ------------------------------------------------------------
    #[error("Invalid fetch transition: {outcome} while {state}")]
    InvalidTransition {
        state: &'static str,
        outcome: &'static str,
    },

    // ────────────────────────────────────────────────────────────
    // File-system
    // ────────────────────────────────────────────────────────────
    #[error("I/O error: {kind:?}")]
    Io {
        kind: ErrorKind,
        #[source]
        source: Arc<io::Error>,
    },

    /// Any other error, with description.
    #[error("Unexpected error: {0}")]
    Other(CompactString),
}

impl From<io::Error> for CoreError {
    fn from(e: io::Error) -> Self {
        Self::Io {
            kind: e.kind(),
            source: Arc::new(e),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fast classification helpers
// ────────────────────────────────────────────────────────────────────────────
impl CoreError {
    /// Failures that most likely came from the network or decryption layer.
    ///
    /// A thumbnail failure is always network-class since thumbnails are
    /// already normalized JPEGs. An original failure may also hide a format
    /// problem, which only the renderer can detect.
    #[inline]
    #[must_use]
    pub fn is_network_class(&self) -> bool {
        matches!(
            self,
            Self::ThumbnailFetch { .. }
                | Self::OriginalFetch { .. }
                | Self::ByteFetch { .. }
                | Self::Io { .. }
                | Self::EmptyUrl {
                    stage: THUMBNAIL_STAGE,
                    ..
                }
        )
    }

    // ────────────────────────────────────────────────────────────
    // Attribute helpers – used for JSON log grouping
    // ────────────────────────────────────────────────────────────
    #[inline]
    #[must_use]
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::ThumbnailFetch { .. }
            | Self::EmptyUrl {
                stage: THUMBNAIL_STAGE,
                ..
            } => "thumbnail_fetch",

            Self::OriginalFetch { .. }
            | Self::EmptyUrl { .. }
            | Self::UnexpectedSource { .. } => "original_fetch",

            Self::Probe { .. } => "dimension_probe",

            Self::ByteFetch { .. } | Self::MetadataExtraction(_) => "metadata_extraction",

            Self::InvalidTransition { .. } => "invalid_state",

            Self::Io { .. } => "file_system",

            Self::Other(_) => "unknown_error",
        }
    }

    #[inline]
    #[must_use]
    pub const fn error_marker(&self) -> &'static str {
        match self {
            Self::ByteFetch { .. } | Self::MetadataExtraction(_) => "EXIF_ERROR",
            _ => "FETCH_ERROR",
        }
    }

    /// File the error is about, when the variant carries one.
    #[must_use]
    pub const fn file_id(&self) -> Option<FileId> {
        match self {
            Self::ThumbnailFetch { file_id, .. }
            | Self::OriginalFetch { file_id, .. }
            | Self::EmptyUrl { file_id, .. }
            | Self::UnexpectedSource { file_id, .. } => Some(*file_id),
            _ => None,
        }
    }

    // ────────────────────────────────────────────────────────────
    // Structured-field extraction (SmallVec avoids heap ≤4 items)
    // ────────────────────────────────────────────────────────────
    #[must_use]
    pub fn extract_trace_fields(&self) -> SmallVec<[(&'static str, CompactString); 4]> {
        match self {
            Self::ThumbnailFetch { file_id, reason } | Self::OriginalFetch { file_id, reason } => {
                smallvec![
                    ("file_id", file_id.to_compact_string()),
                    ("reason", reason.clone()),
                ]
            }

            Self::EmptyUrl { file_id, stage } => smallvec![
                ("file_id", file_id.to_compact_string()),
                ("stage", CompactString::const_new(*stage)),
            ],

            Self::Probe { url, reason } | Self::ByteFetch { url, reason } => smallvec![
                ("url", url.clone()),
                ("reason", reason.clone()),
            ],

            _ => smallvec![],
        }
    }

    // ────────────────────────────────────────────────────────────
    // Single-call structured emission
    // ────────────────────────────────────────────────────────────
    #[must_use]
    pub fn trace(self) -> Self {
        let extra = self.extract_trace_fields();

        event!(
            Level::ERROR,
            marker = self.error_marker(),
            op_type = self.operation_type(),
            file_id = self.file_id(),
            error = %self,
            network_class = self.is_network_class(),
            extra = ?extra,
        );

        self
    }

    // ────────────────────────────────────────────────────────────
    // Lightweight smart-constructors
    // ────────────────────────────────────────────────────────────
    #[must_use]
    pub fn thumbnail_fetch(file_id: FileId, reason: impl Display) -> Self {
        Self::ThumbnailFetch {
            file_id,
            reason: reason.to_compact_string(),
        }
    }

    #[must_use]
    pub fn original_fetch(file_id: FileId, reason: impl Display) -> Self {
        Self::OriginalFetch {
            file_id,
            reason: reason.to_compact_string(),
        }
    }

    #[must_use]
    pub fn probe(url: &str, reason: impl Display) -> Self {
        Self::Probe {
            url: CompactString::new(url),
            reason: reason.to_compact_string(),
        }
    }

    #[must_use]
    pub fn byte_fetch(url: &str, reason: impl Display) -> Self {
        Self::ByteFetch {
            url: CompactString::new(url),
            reason: reason.to_compact_string(),
        }
    }

    #[must_use]
    pub fn metadata_extraction(reason: impl Display) -> Self {
        Self::MetadataExtraction(reason.to_compact_string())
    }

    #[must_use]
    pub fn other(reason: impl Display) -> Self {
        Self::Other(reason.to_compact_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(CoreError::thumbnail_fetch(1, "timeout").is_network_class());
        assert!(CoreError::original_fetch(1, "timeout").is_network_class());
        assert!(!CoreError::probe("file:///x.png", "corrupt").is_network_class());
        assert!(
            !CoreError::EmptyUrl {
                file_id: 3,
                stage: "video"
            }
            .is_network_class()
        );
    }

    #[test]
    fn test_empty_thumbnail_url_is_a_thumbnail_failure() {
        let thumb = CoreError::EmptyUrl {
            file_id: 3,
            stage: THUMBNAIL_STAGE,
        };
        assert_eq!(thumb.operation_type(), "thumbnail_fetch");
        assert!(thumb.is_network_class());

        let original = CoreError::EmptyUrl {
            file_id: 3,
            stage: "original",
        };
        assert_eq!(original.operation_type(), "original_fetch");
        assert!(!original.is_network_class());
    }

    #[test]
    fn test_file_id_and_fields() {
        let err = CoreError::original_fetch(7, "decrypt failed");
        assert_eq!(err.file_id(), Some(7));
        assert_eq!(err.operation_type(), "original_fetch");

        let fields = err.extract_trace_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].1, "7");

        assert_eq!(CoreError::other("x").file_id(), None);
    }

    #[test]
    fn test_io_conversion_keeps_kind() {
        let err: CoreError = io::Error::new(ErrorKind::NotFound, "gone").into();
        assert!(matches!(
            err,
            CoreError::Io {
                kind: ErrorKind::NotFound,
                ..
            }
        ));
        assert_eq!(err.clone().operation_type(), "file_system");
    }
}
