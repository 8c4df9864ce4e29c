//! `src/fetch/state.rs`
//! ============================================================================
//! # Per-file fetch state machine
//!
//! ```text
//! Unstarted ─▶ ThumbnailPending ─▶ ThumbnailReady ─▶ OriginalPending ─▶ OriginalReady
//!                     │                                  │      │              ▲
//!                     ▼                                  │      ▼              │
//!                  Failed ◀──────────────────────────────┘  LivePhotoImageReady
//!                     ▲                                         │
//!                     └─────────────────────────────────────────┘
//! ```
//!
//! [`advance`] is pure: it maps the current state, the cached value and the
//! outcome of one collaborator call to the next state and the value to cache.
//! Applying the result (writing the cache, notifying) is the pipeline's job.

use crate::{
    error_core::{CoreError, CoreResult},
    model::item_data::ItemData,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchState {
    Unstarted,
    ThumbnailPending,
    ThumbnailReady,
    OriginalPending,
    /// Live photo still is shown, video half still outstanding.
    LivePhotoImageReady,
    OriginalReady,
    Failed,
}

impl FetchState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::OriginalReady | Self::Failed)
    }

    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(
            self,
            Self::ThumbnailPending | Self::OriginalPending | Self::LivePhotoImageReady
        )
    }

    /// State after issuing the next collaborator request, if one follows.
    #[must_use]
    pub const fn requested(self) -> Option<Self> {
        match self {
            Self::Unstarted => Some(Self::ThumbnailPending),
            Self::ThumbnailReady => Some(Self::OriginalPending),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unstarted => "unstarted",
            Self::ThumbnailPending => "thumbnail_pending",
            Self::ThumbnailReady => "thumbnail_ready",
            Self::OriginalPending => "original_pending",
            Self::LivePhotoImageReady => "live_photo_image_ready",
            Self::OriginalReady => "original_ready",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for FetchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one collaborator step, as seen by the state machine.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// Thumbnail URL with its probed size.
    Thumbnail(ItemData),
    /// Image original with its probed size.
    Image(ItemData),
    /// Renderable video URL.
    Video(String),
    /// Live photo still with its probed size.
    LivePhotoImage(ItemData),
    /// Live photo video URL.
    LivePhotoVideo(String),
    Failed(CoreError),
}

impl StageOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Thumbnail(_) => "thumbnail",
            Self::Image(_) => "image",
            Self::Video(_) => "video",
            Self::LivePhotoImage(_) => "live_photo_image",
            Self::LivePhotoVideo(_) => "live_photo_video",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: FetchState,
    /// Written to the cache, followed by a refresh, on every stage.
    pub data: ItemData,
}

impl Transition {
    const fn to(state: FetchState, data: ItemData) -> Self {
        Self { state, data }
    }
}

/// Apply one stage outcome.
///
/// Failures keep whatever is cached and flip it to the failed form.
/// Pairings the pipeline never produces are rejected.
pub fn advance(
    state: FetchState,
    current: Option<&ItemData>,
    outcome: StageOutcome,
) -> CoreResult<Transition> {
    use FetchState as S;
    use StageOutcome as O;

    let transition = match (state, outcome) {
        (S::ThumbnailPending, O::Thumbnail(thumb)) => {
            let data = ItemData {
                is_content_loading: Some(true),
                is_content_zoomable: Some(false),
                ..thumb
            };
            Transition::to(S::ThumbnailReady, data)
        }

        (S::OriginalPending, O::Image(image)) => Transition::to(S::OriginalReady, image),

        (S::OriginalPending, O::Video(url)) => {
            Transition::to(S::OriginalReady, ItemData::video(url))
        }

        (S::OriginalPending, O::LivePhotoImage(image)) => {
            Transition::to(S::LivePhotoImageReady, image)
        }

        (S::LivePhotoImageReady, O::LivePhotoVideo(url)) => {
            let data = current.cloned().unwrap_or_default().with_live_photo_video(url);
            Transition::to(S::OriginalReady, data)
        }

        (pending, O::Failed(_)) if pending.is_pending() => {
            let data = current.cloned().unwrap_or_default().marked_failed();
            Transition::to(S::Failed, data)
        }

        (state, outcome) => {
            return Err(CoreError::InvalidTransition {
                state: state.as_str(),
                outcome: outcome.as_str(),
            });
        }
    };

    Ok(transition)
}
