//! `src/fetch/pipeline.rs`
//! ============================================================================
//! # Fetch pipeline
//!
//! Drives one file through the state machine in [`super::state`]: performs
//! the collaborator calls in order, feeds each outcome to [`advance`] and
//! applies the resulting transition to the cache context the pipeline was
//! started with.
//!
//! Errors never leave the pipeline. They end up as `fetch_failed` on the
//! cached value plus one refresh notification.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use crate::{
    cache::context::ViewerCacheContext,
    collab::download::{DownloadManager, SourceUrl},
    error_core::{CoreError, CoreResult, THUMBNAIL_STAGE},
    fetch::state::{FetchState, StageOutcome, advance},
    model::{
        item_data::ItemData,
        media_file::{FileId, FileType, MediaFile},
    },
    probe::DimensionProber,
};

/// Reject the empty URLs some collaborators hand out instead of failing.
fn ensure_url(file_id: FileId, stage: &'static str, url: String) -> CoreResult<String> {
    if url.trim().is_empty() {
        Err(CoreError::EmptyUrl { file_id, stage })
    } else {
        Ok(url)
    }
}

/// Any thumbnail-stage error, including an unreadable thumbnail, is a
/// thumbnail failure.
fn thumbnail_stage_error(file_id: FileId, e: CoreError) -> CoreError {
    match e {
        CoreError::ThumbnailFetch { .. } | CoreError::EmptyUrl { .. } => e,
        other => CoreError::thumbnail_fetch(file_id, other),
    }
}

pub struct FetchPipeline {
    ctx: Arc<ViewerCacheContext>,
    downloads: Arc<dyn DownloadManager>,
    prober: Arc<dyn DimensionProber>,
    file: MediaFile,
    state: FetchState,
}

impl std::fmt::Debug for FetchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchPipeline")
            .field("generation", &self.ctx.generation())
            .field("file", &self.file)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl FetchPipeline {
    #[must_use]
    pub fn new(
        ctx: Arc<ViewerCacheContext>,
        downloads: Arc<dyn DownloadManager>,
        prober: Arc<dyn DimensionProber>,
        file: MediaFile,
    ) -> Self {
        Self {
            ctx,
            downloads,
            prober,
            file,
            state: FetchState::Unstarted,
        }
    }

    #[must_use]
    pub const fn state(&self) -> FetchState {
        self.state
    }

    #[must_use]
    pub const fn file(&self) -> &MediaFile {
        &self.file
    }

    /// Run to a terminal state and return it.
    #[instrument(
        name = "fetch_pipeline",
        skip(self),
        fields(
            file_id = self.file.id,
            file_type = self.file.file_type.as_str(),
            generation = self.ctx.generation(),
        )
    )]
    pub async fn run(mut self) -> FetchState {
        self.request();
        let thumbnail = self.thumbnail().await;
        self.step(thumbnail);

        if self.state != FetchState::ThumbnailReady {
            return self.state;
        }

        self.request();
        match self.downloads.renderable_source_urls(&self.file).await {
            Ok(sources) => self.original(sources.url).await,
            Err(e) => self.step(StageOutcome::Failed(e)),
        }

        self.state
    }

    fn request(&mut self) {
        if let Some(next) = self.state.requested() {
            debug!(
                marker = "FETCH_PIPELINE",
                from = self.state.as_str(),
                to = next.as_str(),
                "Requesting next stage"
            );
            self.state = next;
        }
    }

    async fn thumbnail(&self) -> StageOutcome {
        let url = self.downloads.renderable_thumbnail_url(&self.file).await;
        match self.probed(url, THUMBNAIL_STAGE).await {
            Ok(data) => StageOutcome::Thumbnail(data),
            Err(e) => StageOutcome::Failed(thumbnail_stage_error(self.file.id, e)),
        }
    }

    async fn original(&mut self, source: SourceUrl) {
        match (self.file.file_type, source) {
            (FileType::Image, SourceUrl::Single(url)) => {
                let outcome = match self.probed(Ok(url), "original").await {
                    Ok(data) => StageOutcome::Image(data),
                    Err(e) => StageOutcome::Failed(e),
                };
                self.step(outcome);
            }

            (FileType::Video, SourceUrl::Single(url)) => {
                let outcome = match ensure_url(self.file.id, "video", url) {
                    Ok(url) => StageOutcome::Video(url),
                    Err(e) => StageOutcome::Failed(e),
                };
                self.step(outcome);
            }

            (FileType::LivePhoto, SourceUrl::LivePhoto(pair)) => {
                let image = pair.image().await;
                let outcome = match self.probed(image, "live photo image").await {
                    Ok(data) => StageOutcome::LivePhotoImage(data),
                    Err(e) => StageOutcome::Failed(e),
                };
                self.step(outcome);

                if self.state != FetchState::LivePhotoImageReady {
                    return;
                }

                let outcome = match pair
                    .video()
                    .await
                    .and_then(|url| ensure_url(self.file.id, "live photo video", url))
                {
                    Ok(url) => StageOutcome::LivePhotoVideo(url),
                    Err(e) => StageOutcome::Failed(e),
                };
                self.step(outcome);
            }

            (file_type, source) => {
                debug!(got = source.kind(), "Source shape does not match file type");
                let expected = match file_type {
                    FileType::LivePhoto => "live photo pair",
                    FileType::Image | FileType::Video => "single URL",
                };
                self.step(StageOutcome::Failed(CoreError::UnexpectedSource {
                    file_id: self.file.id,
                    expected,
                }));
            }
        }
    }

    /// Validate a fetched image URL and pair it with its natural size.
    async fn probed(&self, url: CoreResult<String>, stage: &'static str) -> CoreResult<ItemData> {
        let url = ensure_url(self.file.id, stage, url?)?;
        let dimensions = self.prober.probe(&url).await?;
        Ok(ItemData::image(url, dimensions))
    }

    fn step(&mut self, outcome: StageOutcome) {
        let outcome = match outcome {
            StageOutcome::Failed(e) => StageOutcome::Failed(e.trace()),
            other => other,
        };

        let current = self.ctx.items().get(self.file.id);
        match advance(self.state, current.as_ref(), outcome) {
            Ok(transition) => {
                debug!(
                    marker = "FETCH_PIPELINE",
                    from = self.state.as_str(),
                    to = transition.state.as_str(),
                    "Stage complete"
                );

                self.ctx.update(self.file.id, transition.data);
                self.state = transition.state;
            }

            Err(e) => {
                error!(
                    marker = "FETCH_PIPELINE",
                    operation_type = e.operation_type(),
                    error = %e,
                    "Pipeline reached an impossible state, giving up"
                );

                let failed = current.unwrap_or_default().marked_failed();
                self.ctx.update(self.file.id, failed);
                self.state = FetchState::Failed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::item_data::Dimensions,
        testing::{MockDownloads, MockProber},
    };

    fn pipeline(
        downloads: MockDownloads,
        prober: MockProber,
        file: MediaFile,
    ) -> (Arc<ViewerCacheContext>, FetchPipeline) {
        let ctx = Arc::new(ViewerCacheContext::new(0));
        let pipeline = FetchPipeline::new(
            Arc::clone(&ctx),
            Arc::new(downloads),
            Arc::new(prober),
            file,
        );
        (ctx, pipeline)
    }

    #[test]
    fn test_ensure_url() {
        assert_eq!(ensure_url(1, "thumbnail", "a".into()).unwrap(), "a");
        assert!(matches!(
            ensure_url(1, "thumbnail", "  ".into()),
            Err(CoreError::EmptyUrl {
                file_id: 1,
                stage: "thumbnail"
            })
        ));
    }

    #[tokio::test]
    async fn test_image_runs_to_original_ready() {
        let downloads = MockDownloads::new()
            .with_thumbnail(1, "thumb://1")
            .with_original(1, "orig://1");
        let prober = MockProber::new()
            .with("thumb://1", 10, 8)
            .with("orig://1", 1000, 800);
        let (ctx, pipeline) = pipeline(
            downloads,
            prober,
            MediaFile::new(1, FileType::Image, "1.jpg"),
        );

        assert_eq!(pipeline.state(), FetchState::Unstarted);
        assert_eq!(pipeline.run().await, FetchState::OriginalReady);
        assert_eq!(
            ctx.items().get(1),
            Some(ItemData::image("orig://1", Dimensions::new(1000, 800)))
        );
    }

    #[tokio::test]
    async fn test_mismatched_source_fails() {
        let downloads = MockDownloads::new()
            .with_thumbnail(2, "thumb://2")
            .with_original(2, "orig://2");
        let prober = MockProber::new().with("thumb://2", 10, 8);
        let (ctx, pipeline) = pipeline(
            downloads,
            prober,
            MediaFile::new(2, FileType::LivePhoto, "2"),
        );

        assert_eq!(pipeline.run().await, FetchState::Failed);

        let data = ctx.items().get(2).unwrap();
        assert!(data.has_failed());
        assert_eq!(data.src.as_deref(), Some("thumb://2"));
    }

    #[tokio::test]
    async fn test_live_photo_video_failure_keeps_still() {
        let downloads = MockDownloads::new()
            .with_thumbnail(3, "thumb://3")
            .with_live_photo(
                3,
                Ok("img://3".into()),
                Err(CoreError::original_fetch(3, "decrypt failed")),
            );
        let prober = MockProber::new()
            .with("thumb://3", 10, 8)
            .with("img://3", 300, 200);
        let (ctx, pipeline) = pipeline(
            downloads,
            prober,
            MediaFile::new(3, FileType::LivePhoto, "3"),
        );

        assert_eq!(pipeline.run().await, FetchState::Failed);

        let data = ctx.items().get(3).unwrap();
        assert_eq!(data.src.as_deref(), Some("img://3"));
        assert_eq!(data.dimensions(), Some(Dimensions::new(300, 200)));
        assert!(data.live_photo_video_url.is_none());
        assert!(data.has_failed());
    }

    #[tokio::test]
    async fn test_retired_context_drops_pipeline_updates() {
        let downloads = MockDownloads::new()
            .with_thumbnail(4, "thumb://4")
            .with_original(4, "orig://4");
        let prober = MockProber::new()
            .with("thumb://4", 1, 1)
            .with("orig://4", 2, 2);
        let (ctx, pipeline) = pipeline(
            downloads,
            prober,
            MediaFile::new(4, FileType::Image, "4.jpg"),
        );

        ctx.retire();
        assert_eq!(pipeline.run().await, FetchState::OriginalReady);
        assert!(ctx.items().get(4).is_none());
    }

    #[test]
    fn test_thumbnail_stage_error() {
        let unreadable = thumbnail_stage_error(5, CoreError::probe("thumb://5", "corrupt"));
        assert!(matches!(unreadable, CoreError::ThumbnailFetch { file_id: 5, .. }));
        assert_eq!(unreadable.operation_type(), "thumbnail_fetch");
        assert!(unreadable.to_string().contains("corrupt"));

        let offline = thumbnail_stage_error(5, CoreError::thumbnail_fetch(5, "offline"));
        assert!(offline.to_string().ends_with("offline"));
    }

    #[tokio::test]
    async fn test_unreadable_thumbnail_fails_as_thumbnail() {
        let downloads = MockDownloads::new()
            .with_thumbnail(6, "thumb://6")
            .with_original(6, "orig://6");
        let (ctx, pipeline) = pipeline(
            downloads,
            MockProber::new(),
            MediaFile::new(6, FileType::Image, "6.jpg"),
        );

        assert_eq!(pipeline.run().await, FetchState::Failed);
        assert_eq!(
            ctx.items().get(6),
            Some(ItemData {
                fetch_failed: Some(true),
                ..ItemData::default()
            })
        );
    }

    #[tokio::test]
    async fn test_each_stage_notifies() {
        let downloads = MockDownloads::new()
            .with_thumbnail(7, "thumb://7")
            .with_live_photo(7, Ok("img://7".into()), Ok("vid://7".into()));
        let prober = MockProber::new()
            .with("thumb://7", 10, 8)
            .with("img://7", 300, 200);
        let (ctx, pipeline) = pipeline(
            downloads,
            prober,
            MediaFile::new(7, FileType::LivePhoto, "7"),
        );

        let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        ctx.register(
            7,
            Arc::new(move || {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }),
        );

        assert_eq!(pipeline.run().await, FetchState::OriginalReady);
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 3);

        let data = ctx.items().get(7).unwrap();
        assert_eq!(data.live_photo_video_url.as_deref(), Some("vid://7"));
        assert_eq!(data.dimensions(), Some(Dimensions::new(300, 200)));
    }
}
