//! In-crate mock collaborators for unit tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Weak,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
    cache::context::ViewerCacheContext,
    collab::download::{DownloadManager, LivePhotoSourceUrl, RenderableSourceUrls},
    error_core::{CoreError, CoreResult},
    model::{
        item_data::{Dimensions, ItemData},
        media_file::{FileId, MediaFile},
    },
    probe::DimensionProber,
};

enum MockSource {
    Single(CoreResult<String>),
    LivePhoto {
        image: CoreResult<String>,
        video: CoreResult<String>,
    },
}

struct MockPair {
    image: CoreResult<String>,
    video: CoreResult<String>,
}

#[async_trait]
impl LivePhotoSourceUrl for MockPair {
    async fn image(&self) -> CoreResult<String> {
        self.image.clone()
    }

    async fn video(&self) -> CoreResult<String> {
        self.video.clone()
    }
}

/// Download manager answering from per-file tables.
///
/// Files without an entry fail. Original requests can be held back with a
/// gate until the test opens it.
#[derive(Default)]
pub struct MockDownloads {
    thumbnails: HashMap<FileId, CoreResult<String>>,
    originals: HashMap<FileId, MockSource>,
    gate: Option<watch::Receiver<bool>>,
    thumbnail_calls: AtomicUsize,
    original_calls: AtomicUsize,
}

impl MockDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thumbnail(mut self, id: FileId, url: &str) -> Self {
        self.thumbnails.insert(id, Ok(url.to_owned()));
        self
    }

    pub fn with_failing_thumbnail(mut self, id: FileId) -> Self {
        self.thumbnails
            .insert(id, Err(CoreError::thumbnail_fetch(id, "network down")));
        self
    }

    pub fn with_original(mut self, id: FileId, url: &str) -> Self {
        self.originals
            .insert(id, MockSource::Single(Ok(url.to_owned())));
        self
    }

    pub fn with_failing_original(mut self, id: FileId) -> Self {
        self.originals.insert(
            id,
            MockSource::Single(Err(CoreError::original_fetch(id, "decryption failed"))),
        );
        self
    }

    pub fn with_live_photo(
        mut self,
        id: FileId,
        image: CoreResult<String>,
        video: CoreResult<String>,
    ) -> Self {
        self.originals
            .insert(id, MockSource::LivePhoto { image, video });
        self
    }

    /// Hold every original request until `true` is sent on the returned
    /// channel.
    pub fn gated(mut self) -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        self.gate = Some(rx);
        (self, tx)
    }

    pub fn thumbnail_calls(&self) -> usize {
        self.thumbnail_calls.load(Ordering::SeqCst)
    }

    pub fn original_calls(&self) -> usize {
        self.original_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DownloadManager for MockDownloads {
    async fn renderable_thumbnail_url(&self, file: &MediaFile) -> CoreResult<String> {
        self.thumbnail_calls.fetch_add(1, Ordering::SeqCst);
        self.thumbnails
            .get(&file.id)
            .cloned()
            .unwrap_or_else(|| Err(CoreError::thumbnail_fetch(file.id, "unknown file")))
    }

    async fn renderable_source_urls(&self, file: &MediaFile) -> CoreResult<RenderableSourceUrls> {
        self.original_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            gate.wait_for(|open| *open)
                .await
                .map_err(CoreError::other)?;
        }

        match self.originals.get(&file.id) {
            Some(MockSource::Single(url)) => url.clone().map(RenderableSourceUrls::single),
            Some(MockSource::LivePhoto { image, video }) => {
                Ok(RenderableSourceUrls::live_photo(MockPair {
                    image: image.clone(),
                    video: video.clone(),
                }))
            }
            None => Err(CoreError::original_fetch(file.id, "unknown file")),
        }
    }
}

/// Prober answering from a URL table; unknown URLs fail.
#[derive(Default)]
pub struct MockProber {
    sizes: HashMap<String, Dimensions>,
    calls: AtomicUsize,
}

impl MockProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, width: u32, height: u32) -> Self {
        self.sizes
            .insert(url.to_owned(), Dimensions::new(width, height));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DimensionProber for MockProber {
    async fn probe(&self, url: &str) -> CoreResult<Dimensions> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sizes
            .get(url)
            .copied()
            .ok_or_else(|| CoreError::probe(url, "corrupt image"))
    }
}

/// Refresh callback that snapshots the cached value each time it fires.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<Option<ItemData>>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback reading `id` from `ctx` whenever it is invoked.
    pub fn callback(
        &self,
        ctx: &Arc<ViewerCacheContext>,
        id: FileId,
    ) -> impl Fn() + Send + Sync + 'static {
        let ctx: Weak<ViewerCacheContext> = Arc::downgrade(ctx);
        let seen = Arc::clone(&self.seen);
        move || {
            let snapshot = ctx.upgrade().and_then(|ctx| ctx.items().get(id));
            seen.lock().push(snapshot);
        }
    }

    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn snapshots(&self) -> Vec<ItemData> {
        self.seen.lock().iter().flatten().cloned().collect()
    }
}
