//! `src/cache/item_cache.rs`
//! ============================================================================
//! # Item Data Cache
//!
//! File ID → best known [`ItemData`].
//! - Unconditional overwrite on `set`, entries replaced by value
//! - Entries live until explicitly deleted; no eviction, no TTL
//! - Atomic insert-if-absent so the first request for a file is the only one
//!   that starts a fetch
//! - Hit/miss/write counters for monitoring

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::RandomState;
use dashmap::{DashMap, mapref::entry::Entry};
use tracing::{debug, instrument};

use crate::model::{item_data::ItemData, media_file::FileId};

/// Cache statistics for monitoring and debugging
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    deletions: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deletion(&self) {
        self.deletions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletions: self.deletions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub deletions: u64,
}

impl CacheStatsSnapshot {
    #[expect(clippy::cast_precision_loss, reason = "Expected precision loss")]
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Keyed store of the current best [`ItemData`] per file.
#[derive(Debug, Default)]
pub struct ItemDataCache {
    entries: DashMap<FileId, ItemData, RandomState>,
    stats: CacheStats,
}

impl ItemDataCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(RandomState::new()),
            stats: CacheStats::default(),
        }
    }

    /// Current data for a file, if any.
    pub fn get(&self, file_id: FileId) -> Option<ItemData> {
        let found = self.entries.get(&file_id).map(|entry| entry.value().clone());

        if found.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }

        found
    }

    /// Overwrite the entry for a file.
    #[instrument(level = "trace", skip(self, data))]
    pub fn set(&self, file_id: FileId, data: ItemData) {
        self.entries.insert(file_id, data);
        self.stats.record_write();
    }

    /// Store `data` only when the file has no entry yet.
    ///
    /// Returns `true` if this call created the entry.
    pub fn insert_if_absent(&self, file_id: FileId, data: ItemData) -> bool {
        match self.entries.entry(file_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(data);
                self.stats.record_write();
                true
            }
        }
    }

    /// Remove the entry for a file.
    pub fn delete(&self, file_id: FileId) -> Option<ItemData> {
        let removed = self.entries.remove(&file_id).map(|(_, data)| data);
        if removed.is_some() {
            self.stats.record_deletion();
        }
        removed
    }

    /// Remove the entry for a file only if `predicate` holds for it.
    pub fn delete_if<F>(&self, file_id: FileId, predicate: F) -> bool
    where
        F: FnOnce(&ItemData) -> bool,
    {
        let removed = self
            .entries
            .remove_if(&file_id, |_, data| predicate(data))
            .is_some();

        if removed {
            self.stats.record_deletion();
            debug!(
                marker = "CACHE_OPERATION",
                operation_type = "cache_conditional_delete",
                file_id,
                "Removed cache entry"
            );
        }

        removed
    }

    /// Snapshot of every file ID currently cached.
    #[must_use]
    pub fn file_ids(&self) -> Vec<FileId> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics snapshot
    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}
