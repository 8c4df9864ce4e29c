//! src/data_source.rs
//! ============================================================================
//! # File viewer data source
//!
//! What the paging viewer talks to. Reads are synchronous and never fail:
//! the viewer gets the best data known right now and a promise (its refresh
//! callback) that it will hear about anything better.
//!
//! The first read of a file stores a loading placeholder and spawns that
//! file's fetch pipeline. The placeholder doubles as the "already started"
//! flag, so a file is orchestrated at most once per cache lifetime unless its
//! failed entry is forgotten.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use arc_swap::ArcSwap;
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument};

use crate::{
    cache::context::ViewerCacheContext,
    collab::download::DownloadManager,
    error_core::{CoreError, CoreResult},
    fetch::pipeline::FetchPipeline,
    model::{item_data::ItemData, media_file::MediaFile},
    probe::DimensionProber,
    tasks::fetch_task::spawn_fetch_task,
};

pub struct FileViewerDataSource {
    active: ArcSwap<ViewerCacheContext>,
    downloads: Arc<dyn DownloadManager>,
    prober: Arc<dyn DimensionProber>,
    tasks: TaskTracker,
    runtime: Handle,
    generation: AtomicU64,
}

impl std::fmt::Debug for FileViewerDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ctx = self.active.load();
        f.debug_struct("FileViewerDataSource")
            .field("generation", &ctx.generation())
            .field("entries", &ctx.items().len())
            .field("in_flight", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl FileViewerDataSource {
    /// Build a data source spawning its pipelines on the current runtime.
    ///
    /// Fails when called outside a Tokio runtime; use [`Self::with_handle`]
    /// there.
    pub fn new(
        downloads: Arc<dyn DownloadManager>,
        prober: Arc<dyn DimensionProber>,
    ) -> CoreResult<Self> {
        let runtime = Handle::try_current().map_err(CoreError::other)?;
        Ok(Self::with_handle(runtime, downloads, prober))
    }

    #[must_use]
    pub fn with_handle(
        runtime: Handle,
        downloads: Arc<dyn DownloadManager>,
        prober: Arc<dyn DimensionProber>,
    ) -> Self {
        Self {
            active: ArcSwap::from_pointee(ViewerCacheContext::new(0)),
            downloads,
            prober,
            tasks: TaskTracker::new(),
            runtime,
            generation: AtomicU64::new(0),
        }
    }

    /// The cache context currently served.
    #[must_use]
    pub fn context(&self) -> Arc<ViewerCacheContext> {
        self.active.load_full()
    }

    /// Number of pipelines still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    // ────────────────────────────────────────────────────────────
    // Viewer surface
    // ────────────────────────────────────────────────────────────

    /// Best data currently known for `file`.
    ///
    /// `on_needs_refresh` replaces any callback registered for this file
    /// before and fires whenever the cached value improves (or fails). Never
    /// blocks and never fails.
    #[instrument(skip(self, file, on_needs_refresh), fields(file_id = file.id))]
    pub fn item_data_for_file<F>(&self, file: &MediaFile, on_needs_refresh: F) -> ItemData
    where
        F: Fn() + Send + Sync + 'static,
    {
        let ctx = self.active.load_full();
        ctx.register(file.id, Arc::new(on_needs_refresh));

        if ctx
            .items()
            .insert_if_absent(file.id, ItemData::loading_placeholder())
        {
            let pipeline = FetchPipeline::new(
                Arc::clone(&ctx),
                Arc::clone(&self.downloads),
                Arc::clone(&self.prober),
                file.clone(),
            );
            spawn_fetch_task(&self.tasks, &self.runtime, pipeline);
        }

        ctx.items()
            .get(file.id)
            .unwrap_or_else(ItemData::loading_placeholder)
    }

    /// Forget `file`'s entry if its fetch failed, so the next read retries.
    ///
    /// Returns whether an entry was removed.
    pub fn forget_failed_item_data_for_file(&self, file: &MediaFile) -> bool {
        let removed = self
            .active
            .load()
            .items()
            .delete_if(file.id, ItemData::has_failed);

        if removed {
            debug!(
                marker = "CACHE_OPERATION",
                operation_type = "forget_failed",
                file_id = file.id,
                "Forgot failed item"
            );
        }
        removed
    }

    /// Forget every failed entry. Returns how many were removed.
    pub fn forget_failed_items(&self) -> usize {
        let ctx = self.active.load_full();
        let removed = ctx
            .items()
            .file_ids()
            .into_iter()
            .filter(|id| ctx.items().delete_if(*id, ItemData::has_failed))
            .count();

        info!(
            marker = "CACHE_OPERATION",
            operation_type = "forget_failed",
            removed,
            "Forgot failed items"
        );
        removed
    }

    /// Drop every cached value and callback, e.g. on logout.
    ///
    /// Pipelines already running finish against the retired context: their
    /// updates are discarded and no callback registered before the reset
    /// fires again.
    pub fn reset(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let previous = self
            .active
            .swap(Arc::new(ViewerCacheContext::new(generation)));
        previous.retire();

        info!(
            generation,
            in_flight = self.tasks.len(),
            "Reset file viewer data source"
        );
    }

    /// Wait until every pipeline spawned so far has finished.
    pub async fn settle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}
