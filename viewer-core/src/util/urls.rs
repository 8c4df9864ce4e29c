//! Conversions between local paths and the URLs handed to the renderer.

use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// `file://` URL for a local path.
#[must_use]
pub fn file_url(path: &Path) -> String {
    format!("{FILE_SCHEME}{}", path.display())
}

/// Local path behind a `file://` URL or a bare path.
///
/// Returns `None` for any other scheme.
#[must_use]
pub fn local_path(url: &str) -> Option<PathBuf> {
    if let Some(rest) = url.strip_prefix(FILE_SCHEME) {
        return (!rest.is_empty()).then(|| PathBuf::from(rest));
    }

    if url.is_empty() || url.contains("://") {
        None
    } else {
        Some(PathBuf::from(url))
    }
}
