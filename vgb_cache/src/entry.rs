//! Cache entries: one per (file path, grid name), owning the load protocol.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use vgb_core::GridMeta;
use vgb_io::VolumeFile;

use crate::grid::SharedGrid;

/// Composite cache key: file path plus grid name.
///
/// Cheap to clone; the same two `Arc`s serve as the map key and as the
/// entry's knowledge of its own identity.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) struct EntryKey {
    pub(crate) filepath: Arc<Path>,
    pub(crate) grid_name: Arc<str>,
}

/// One record of the global file cache.
///
/// The entry owns the shared grid and everything needed for the lazy tree
/// load: a load mutex serializing read attempts, a monotonic loaded flag
/// published with release ordering, and the error text of the most recent
/// failed attempt. User counts live in the cache's slot table, not here —
/// they are mutated only under the global cache lock.
pub(crate) struct CacheEntry {
    key: EntryKey,
    grid: Arc<SharedGrid>,
    /// True once a tree read has completed for this entry, successfully or
    /// not. A failed read is terminal until eviction clears the entry.
    is_loaded: AtomicBool,
    error: Mutex<Option<String>>,
    /// Serializes tree reads for this one grid. Held across file I/O.
    load_lock: Mutex<()>,
}

impl CacheEntry {
    pub(crate) fn new(filepath: Arc<Path>, meta: GridMeta) -> Self {
        let key = EntryKey {
            filepath,
            grid_name: Arc::from(meta.name.as_str()),
        };
        Self {
            key,
            grid: Arc::new(SharedGrid::new(meta)),
            is_loaded: AtomicBool::new(false),
            error: Mutex::new(None),
            load_lock: Mutex::new(()),
        }
    }

    #[inline]
    pub(crate) fn key(&self) -> &EntryKey {
        &self.key
    }

    #[inline]
    pub(crate) fn grid(&self) -> &Arc<SharedGrid> {
        &self.grid
    }

    #[inline]
    pub(crate) fn load_lock(&self) -> &Mutex<()> {
        &self.load_lock
    }

    /// Lock-free fast-path check, paired with the release store in
    /// [`CacheEntry::load_tree`].
    #[inline]
    pub(crate) fn is_loaded(&self) -> bool {
        self.is_loaded.load(Ordering::Acquire)
    }

    /// Error text of the most recent tree read, if it failed.
    pub(crate) fn error(&self) -> Option<String> {
        self.error.lock().clone()
    }

    /// Read this grid's tree from its file and publish the result.
    ///
    /// Caller must hold `load_lock` and have verified the entry is not
    /// loaded. On failure the error text is recorded and the entry still
    /// becomes loaded: a broken file is reported once, not retried on
    /// every access. The loaded flag is stored with release ordering so
    /// lock-free readers that observe it also observe the tree.
    pub(crate) fn load_tree(&self) {
        *self.error.lock() = None;

        log::debug!(
            "volume {}: load grid '{}'",
            self.key.filepath.display(),
            self.key.grid_name
        );

        let result = VolumeFile::open(&self.key.filepath)
            .and_then(|mut file| file.read_tree(&self.key.grid_name));
        match result {
            Ok(tree) => self.grid.set_tree(tree),
            Err(err) => {
                log::warn!(
                    "volume {}: grid '{}' failed to load: {err}",
                    self.key.filepath.display(),
                    self.key.grid_name
                );
                *self.error.lock() = Some(err.to_string());
            }
        }

        self.is_loaded.store(true, Ordering::Release);
    }

    /// Reset to the unloaded state after the eviction check cleared the
    /// tree. Runs under the global cache lock, when no tree user exists.
    pub(crate) fn reset_unloaded(&self) {
        self.grid.clear_tree();
        self.is_loaded.store(false, Ordering::Release);
    }
}

impl core::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("filepath", &self.key.filepath)
            .field("grid_name", &self.key.grid_name)
            .field("is_loaded", &self.is_loaded())
            .finish()
    }
}
