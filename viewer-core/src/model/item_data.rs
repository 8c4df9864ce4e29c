//! `item_data.rs`
//!
//! The renderable state of one file as served to the slide viewer.
//!
//! Every field is optional. An absent flag and a `false` flag are different
//! things to the viewer (`is_content_zoomable` in particular is only ever set
//! to `false`), so the flags stay `Option<bool>` and are skipped when
//! serialized.

use serde::{Deserialize, Serialize};

/// Natural pixel size of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Best data currently known for rendering a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemData {
    /// Static image URL (image, or the still of a live photo).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// Renderable original of a video.
    #[serde(default, rename = "videoURL", skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    /// Video half of a live photo, set only after the still is present.
    #[serde(
        default,
        rename = "livePhotoVideoURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub live_photo_video_url: Option<String>,

    /// Still fetching; show a loading indicator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_content_loading: Option<bool>,

    /// Explicitly `false` while only a thumbnail is shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_content_zoomable: Option<bool>,

    /// The pipeline gave up. May coexist with partial URLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_failed: Option<bool>,
}

impl ItemData {
    /// Empty entry stored on first request, before anything is fetched.
    #[must_use]
    pub fn loading_placeholder() -> Self {
        Self {
            is_content_loading: Some(true),
            ..Self::default()
        }
    }

    /// A static image with its natural size.
    #[must_use]
    pub fn image(src: impl Into<String>, dimensions: Dimensions) -> Self {
        Self {
            src: Some(src.into()),
            width: Some(dimensions.width),
            height: Some(dimensions.height),
            ..Self::default()
        }
    }

    /// A thumbnail: shown with a loading indicator and without zoom.
    #[must_use]
    pub fn thumbnail(src: impl Into<String>, dimensions: Dimensions) -> Self {
        Self {
            is_content_loading: Some(true),
            is_content_zoomable: Some(false),
            ..Self::image(src, dimensions)
        }
    }

    /// A video original. Videos render their own poster frame.
    #[must_use]
    pub fn video(url: impl Into<String>) -> Self {
        Self {
            video_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// This data with the video half of a live photo attached.
    #[must_use]
    pub fn with_live_photo_video(&self, url: impl Into<String>) -> Self {
        Self {
            live_photo_video_url: Some(url.into()),
            ..self.clone()
        }
    }

    /// Keep whatever is shown, swap the loading indicator for the error one.
    #[must_use]
    pub fn marked_failed(&self) -> Self {
        Self {
            is_content_loading: None,
            fetch_failed: Some(true),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_content_loading == Some(true)
    }

    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.fetch_failed == Some(true)
    }

    #[must_use]
    pub fn is_zoomable(&self) -> bool {
        self.is_content_zoomable != Some(false)
    }

    #[must_use]
    pub fn dimensions(&self) -> Option<Dimensions> {
        Some(Dimensions::new(self.width?, self.height?))
    }
}
