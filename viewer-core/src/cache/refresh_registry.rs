//! `refresh_registry.rs`
//!
//! File ID → the one callback to run when better data for that file lands.
//!
//! A single slot per key, not a subscriber list: only one display surface
//! consumes a file's updates at a time, so each registration replaces the
//! previous one.

use std::{fmt, sync::Arc};

use ahash::RandomState;
use dashmap::DashMap;
use tracing::trace;

use crate::model::media_file::FileId;

/// Callback telling the viewer to re-read a file's data.
pub type NeedsRefresh = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct RefreshRegistry {
    slots: DashMap<FileId, NeedsRefresh, RandomState>,
}

impl RefreshRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Register `callback` for a file, replacing any previous one.
    ///
    /// Returns `true` if a previous registration was replaced.
    pub fn register(&self, file_id: FileId, callback: NeedsRefresh) -> bool {
        self.slots.insert(file_id, callback).is_some()
    }

    /// Run the callback currently registered for a file, if any.
    ///
    /// The callback runs with no map lock held, so it may call back into the
    /// data source. Returns `true` if a callback ran.
    pub fn invoke(&self, file_id: FileId) -> bool {
        let callback = self.slots.get(&file_id).map(|slot| Arc::clone(slot.value()));

        match callback {
            Some(callback) => {
                trace!(file_id, "Invoking refresh callback");
                callback();
                true
            }
            None => false,
        }
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.slots.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for RefreshRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRegistry")
            .field("registered", &self.slots.len())
            .finish()
    }
}
