//! Port definitions for the download/decryption collaborator.
//!
//! The data source never touches bytes itself. It asks the collaborator for
//! renderable URLs (object URLs, `file://` URLs, anything the renderer
//! understands) and only cares whether that succeeded.
//!
//! Contract: a method either returns a usable, non-empty URL or fails. The
//! pipeline still guards against empty URLs and treats them as a failure of
//! that stage.

use async_trait::async_trait;

use crate::{error_core::CoreResult, model::media_file::MediaFile};

/// Lazily resolved halves of a live photo.
///
/// Each half is independently awaitable and independently failable.
#[async_trait]
pub trait LivePhotoSourceUrl: Send + Sync {
    /// Renderable URL of the still image.
    async fn image(&self) -> CoreResult<String>;

    /// Renderable URL of the video clip.
    async fn video(&self) -> CoreResult<String>;
}

/// Shape of a file's renderable original.
pub enum SourceUrl {
    /// Image or video.
    Single(String),
    /// Live photo image/video pair.
    LivePhoto(Box<dyn LivePhotoSourceUrl>),
}

impl SourceUrl {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Single(_) => "single URL",
            Self::LivePhoto(_) => "live photo pair",
        }
    }
}

impl std::fmt::Debug for SourceUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(url) => f.debug_tuple("Single").field(url).finish(),
            Self::LivePhoto(_) => f.write_str("LivePhoto(..)"),
        }
    }
}

/// Result of [`DownloadManager::renderable_source_urls`].
#[derive(Debug)]
pub struct RenderableSourceUrls {
    pub url: SourceUrl,
}

impl RenderableSourceUrls {
    #[must_use]
    pub fn single(url: impl Into<String>) -> Self {
        Self {
            url: SourceUrl::Single(url.into()),
        }
    }

    #[must_use]
    pub fn live_photo(pair: impl LivePhotoSourceUrl + 'static) -> Self {
        Self {
            url: SourceUrl::LivePhoto(Box::new(pair)),
        }
    }
}

/// Turns a file into renderable URLs. Implementations must be thread-safe.
#[async_trait]
pub trait DownloadManager: Send + Sync {
    /// Renderable URL of the file's (pre-normalized) thumbnail.
    async fn renderable_thumbnail_url(&self, file: &MediaFile) -> CoreResult<String>;

    /// Renderable URL(s) of the file's original.
    async fn renderable_source_urls(&self, file: &MediaFile) -> CoreResult<RenderableSourceUrls>;
}
