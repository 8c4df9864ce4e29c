//! `context.rs`
//!
//! The cache and the refresh registry bundled into one lifetime.
//!
//! A context belongs to one logged-in session. Logging out retires it and the
//! data source swaps in a fresh one; pipelines still running against a
//! retired context have their updates dropped and can no longer reach any
//! callback.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::ReentrantMutex;
use tracing::{debug, info};

use crate::{
    cache::{
        item_cache::ItemDataCache,
        refresh_registry::{NeedsRefresh, RefreshRegistry},
    },
    model::{item_data::ItemData, media_file::FileId},
};

#[derive(Debug)]
pub struct ViewerCacheContext {
    generation: u64,
    items: ItemDataCache,
    refresh: RefreshRegistry,
    retired: AtomicBool,
    /// Serializes `update` against `retire`. Reentrant so a callback may
    /// retire the context it is being called from.
    gate: ReentrantMutex<()>,
}

impl ViewerCacheContext {
    #[must_use]
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            items: ItemDataCache::new(),
            refresh: RefreshRegistry::new(),
            retired: AtomicBool::new(false),
            gate: ReentrantMutex::new(()),
        }
    }

    /// Sequence number of this context; bumped on every reset.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn items(&self) -> &ItemDataCache {
        &self.items
    }

    #[must_use]
    pub const fn refresh(&self) -> &RefreshRegistry {
        &self.refresh
    }

    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub fn register(&self, file_id: FileId, callback: NeedsRefresh) {
        if self.refresh.register(file_id, callback) {
            debug!(file_id, generation = self.generation, "Replaced refresh callback");
        }
    }

    /// Store new data for a file and tell its viewer to re-read.
    ///
    /// Returns `false` when the update was dropped because the context has
    /// been retired. No callback runs once `retire` has returned.
    pub fn update(&self, file_id: FileId, data: ItemData) -> bool {
        let _gate = self.gate.lock();

        if self.is_retired() {
            debug!(
                marker = "CACHE_OPERATION",
                operation_type = "orphaned_update",
                file_id,
                generation = self.generation,
                "Dropping update for retired context"
            );
            return false;
        }

        self.items.set(file_id, data);
        self.refresh.invoke(file_id);

        true
    }

    /// Stop serving this context: later updates are dropped and every
    /// callback registered so far is released.
    pub fn retire(&self) {
        let _gate = self.gate.lock();

        if !self.retired.swap(true, Ordering::AcqRel) {
            self.refresh.clear();
            info!(
                generation = self.generation,
                entries = self.items.len(),
                "Retired viewer cache context"
            );
        }
    }
}
