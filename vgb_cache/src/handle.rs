//! Grid handles: per-consumer views of a grid, private or cache-backed.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vgb_core::{GridMeta, GridType, Transform};
use vgb_io::GridTree;

use crate::cache::FileCache;
use crate::entry::CacheEntry;
use crate::grid::{SharedGrid, TreeGuard};

/// The cache side of a file-backed handle.
struct CacheBacking {
    cache: Arc<FileCache>,
    entry: Arc<CacheEntry>,
}

/// A lightweight per-consumer view of one grid.
///
/// A handle is either *local* — it owns its grid outright, nothing else
/// references it, and it is always considered loaded — or *file-backed*,
/// pointing at a shared [`FileCache`] entry. A file-backed handle starts as
/// a metadata user; calling [`GridHandle::load`] promotes it to a tree
/// user, reading the voxel tree from disk if no other user has already
/// done so.
///
/// The handle's own loaded flag tracks whether *this* handle completed the
/// promotion protocol. The entry's tree may be resident while the flag is
/// false (another user loaded it); only after `load` returns is it safe for
/// this consumer to rely on the tree.
///
/// Cloning a handle registers one more user of the same class with the
/// cache; dropping one releases it, which may evict the entry or drop its
/// tree.
pub struct GridHandle {
    grid: Arc<SharedGrid>,
    backing: Option<CacheBacking>,
    is_loaded: AtomicBool,
}

impl GridHandle {
    /// A private handle owning `tree` outright. Never touches the cache.
    pub fn local(meta: GridMeta, tree: GridTree) -> Self {
        Self {
            grid: Arc::new(SharedGrid::with_tree(meta, tree)),
            backing: None,
            is_loaded: AtomicBool::new(true),
        }
    }

    /// A file-backed handle, registered as a metadata user of the cache
    /// entry for (`filepath`, `meta.name`).
    pub(crate) fn cached(cache: Arc<FileCache>, filepath: &Path, meta: GridMeta) -> Self {
        let entry = cache.add_metadata_user(filepath, meta);
        Self {
            grid: Arc::clone(entry.grid()),
            backing: Some(CacheBacking { cache, entry }),
            is_loaded: AtomicBool::new(false),
        }
    }

    /// Grid name.
    #[inline]
    pub fn name(&self) -> &str {
        self.grid.name()
    }

    /// Declared voxel type.
    #[inline]
    pub fn grid_type(&self) -> GridType {
        self.grid.meta().grid_type
    }

    /// Decoded f32 channels per voxel.
    #[inline]
    pub fn channels(&self) -> u32 {
        self.grid.meta().channels()
    }

    /// Index-to-object transform.
    #[inline]
    pub fn transform(&self) -> Transform {
        self.grid.meta().transform
    }

    /// True for handles not backed by the file cache.
    #[inline]
    pub fn is_local(&self) -> bool {
        self.backing.is_none()
    }

    /// Whether this handle has completed its tree-load protocol.
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.is_loaded.load(Ordering::Acquire)
    }

    /// Promote this handle to a tree user, reading the tree on demand.
    ///
    /// Lock-free when already loaded. Otherwise the entry's load mutex
    /// serializes concurrent attempts; whichever attempt runs first
    /// performs the one file read, and every attempt observes the same
    /// outcome afterwards. A read failure is recorded on the entry and is
    /// terminal — check [`GridHandle::error_message`] after loading.
    pub fn load(&self) {
        // Fast path: already loaded, or not file-backed.
        if self.is_loaded() {
            return;
        }
        let Some(backing) = &self.backing else {
            return;
        };

        // Double-checked: another thread may have finished our promotion
        // between the unlocked check and here.
        let _guard = backing.entry.load_lock().lock();
        if self.is_loaded() {
            return;
        }

        backing.cache.change_to_tree_user(&backing.entry);

        // Already read by another user: adopt the published result.
        if backing.entry.is_loaded() {
            self.is_loaded.store(true, Ordering::Release);
            return;
        }

        backing.entry.load_tree();
        self.is_loaded.store(true, Ordering::Release);
    }

    /// Demote this handle back to a metadata user.
    ///
    /// The entry's tree stays resident while any other tree user remains;
    /// when the last one demotes or drops, the eviction check frees the
    /// voxel data.
    pub fn unload(&self) {
        if !self.is_loaded() {
            return;
        }
        let Some(backing) = &self.backing else {
            // Local handles own their tree and stay loaded.
            return;
        };

        let _guard = backing.entry.load_lock().lock();
        if !self.is_loaded() {
            return;
        }

        log::debug!("volume grid '{}': unload", self.name());
        backing.cache.change_to_metadata_user(&backing.entry);
        self.is_loaded.store(false, Ordering::Release);
    }

    /// Error text of the most recent tree read, if this handle is loaded
    /// and that read failed.
    pub fn error_message(&self) -> Option<String> {
        if !self.is_loaded() {
            return None;
        }
        self.backing.as_ref().and_then(|b| b.entry.error())
    }

    /// Read access to the voxel tree.
    ///
    /// Returns `None` until this handle has loaded, and for loaded handles
    /// whose read failed (or whose grid type carries no voxel payload).
    pub fn tree(&self) -> Option<TreeGuard<'_>> {
        if !self.is_loaded() {
            return None;
        }
        self.grid.tree()
    }
}

impl Clone for GridHandle {
    fn clone(&self) -> Self {
        let loaded = self.is_loaded();
        if let Some(backing) = &self.backing {
            backing.cache.copy_user(&backing.entry, loaded);
        }
        Self {
            grid: Arc::clone(&self.grid),
            backing: self.backing.as_ref().map(|b| CacheBacking {
                cache: Arc::clone(&b.cache),
                entry: Arc::clone(&b.entry),
            }),
            is_loaded: AtomicBool::new(loaded),
        }
    }
}

impl Drop for GridHandle {
    fn drop(&mut self) {
        if let Some(backing) = &self.backing {
            backing
                .cache
                .remove_user(&backing.entry, self.is_loaded.load(Ordering::Acquire));
        }
    }
}

impl core::fmt::Debug for GridHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GridHandle")
            .field("name", &self.name())
            .field("grid_type", &self.grid_type())
            .field("is_local", &self.is_local())
            .field("is_loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_handle() -> GridHandle {
        let mut tree = GridTree::new(4, 1);
        tree.push_block([0, 0, 0], vec![2.0; 64]).unwrap();
        GridHandle::local(GridMeta::new("noise", GridType::Float), tree)
    }

    #[test]
    fn test_local_handle_always_loaded() {
        let handle = local_handle();
        assert!(handle.is_local());
        assert!(handle.is_loaded());
        assert!(handle.tree().is_some());

        // load and unload are no-ops for local handles.
        handle.load();
        handle.unload();
        assert!(handle.is_loaded());
        assert!(handle.error_message().is_none());
    }

    #[test]
    fn test_cached_handle_counts() {
        let cache = Arc::new(FileCache::new());
        let path = Path::new("/tmp/missing.vgb");
        let handle = GridHandle::cached(
            Arc::clone(&cache),
            path,
            GridMeta::new("density", GridType::Float),
        );
        assert!(!handle.is_loaded());
        assert_eq!(cache.len(), 1);

        let copy = handle.clone();
        drop(handle);
        assert_eq!(cache.len(), 1, "copy keeps the entry alive");

        drop(copy);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_load_failure_is_terminal() {
        let cache = Arc::new(FileCache::new());
        let path = Path::new("/tmp/definitely-not-here.vgb");
        let handle = GridHandle::cached(
            Arc::clone(&cache),
            path,
            GridMeta::new("density", GridType::Float),
        );

        handle.load();
        assert!(handle.is_loaded());
        let msg = handle.error_message().expect("missing file must error");
        assert!(msg.contains("I/O error"), "unexpected message: {msg}");
        assert!(handle.tree().is_none());

        // A second load is a no-op; the failure stays cached.
        handle.load();
        assert_eq!(handle.error_message(), Some(msg));
        drop(handle);
        assert!(cache.is_empty());
    }
}
