//! The global file cache: deduplicated entries with explicit user counting.
//!
//! Grids read from volume files are shared between every consumer with the
//! same (file path, grid name): original objects, their copy-on-write
//! duplicates, and anything else holding a handle. Consumers come in two
//! classes. Metadata users only need a grid's descriptive attributes; tree
//! users also need the voxel data resident. An entry's voxel tree exists
//! only while it has at least one tree user, and the entry itself exists
//! only while it has at least one user of either class.
//!
//! One mutex guards the key set and every entry's counters, giving strict
//! sequential consistency for user-count transitions. It is held briefly
//! and never across file I/O.
//!
//! TODO: cache per-file directory enumeration as well, so reloading a
//! collection of an already-open file skips the directory scan.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use vgb_core::GridMeta;

use crate::entry::{CacheEntry, EntryKey};

static GLOBAL_CACHE: Lazy<Arc<FileCache>> = Lazy::new(|| Arc::new(FileCache::new()));

/// Map value: the entry plus its user counts.
///
/// Counters live here, in the map value, rather than inside `CacheEntry`:
/// they are mutated through ordinary `&mut` access under the cache mutex,
/// while the `Arc` gives handles a stable reference across unrelated
/// insertions and removals.
struct EntrySlot {
    entry: Arc<CacheEntry>,
    num_metadata_users: u32,
    num_tree_users: u32,
}

/// Process-wide cache of grids read from volume files.
///
/// Most consumers use [`FileCache::global`]; tests and embedders that want
/// isolation construct their own and hand it to
/// [`GridCollection::with_cache`](crate::GridCollection::with_cache).
#[derive(Default)]
pub struct FileCache {
    entries: Mutex<HashMap<EntryKey, EntrySlot>>,
}

impl FileCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache instance, constructed on first use.
    pub fn global() -> Arc<FileCache> {
        Arc::clone(&GLOBAL_CACHE)
    }

    /// Find or create the entry for (`filepath`, `meta.name`) and register
    /// one metadata user. A fresh entry wraps an empty-tree grid built
    /// from `meta`; when the entry already exists, `meta` is dropped and
    /// the cached grid's metadata wins.
    pub(crate) fn add_metadata_user(&self, filepath: &Path, meta: GridMeta) -> Arc<CacheEntry> {
        let mut entries = self.entries.lock();
        let key = EntryKey {
            filepath: Arc::from(filepath),
            grid_name: Arc::from(meta.name.as_str()),
        };
        let slot = entries.entry(key).or_insert_with_key(|key| {
            log::debug!(
                "volume {}: cache grid '{}'",
                key.filepath.display(),
                key.grid_name
            );
            EntrySlot {
                entry: Arc::new(CacheEntry::new(Arc::clone(&key.filepath), meta)),
                num_metadata_users: 0,
                num_tree_users: 0,
            }
        });
        slot.num_metadata_users += 1;
        Arc::clone(&slot.entry)
    }

    /// Register one more user of `entry`, in the class of the handle being
    /// duplicated.
    pub(crate) fn copy_user(&self, entry: &CacheEntry, tree_user: bool) {
        let mut entries = self.entries.lock();
        let Some(slot) = entries.get_mut(entry.key()) else {
            debug_assert!(false, "copy_user on evicted entry");
            return;
        };
        if tree_user {
            slot.num_tree_users += 1;
        } else {
            slot.num_metadata_users += 1;
        }
    }

    /// Release one user of `entry`, then run the eviction check.
    pub(crate) fn remove_user(&self, entry: &CacheEntry, tree_user: bool) {
        let mut entries = self.entries.lock();
        let Some(slot) = entries.get_mut(entry.key()) else {
            debug_assert!(false, "remove_user on evicted entry");
            return;
        };
        if tree_user {
            debug_assert!(slot.num_tree_users > 0);
            slot.num_tree_users -= 1;
        } else {
            debug_assert!(slot.num_metadata_users > 0);
            slot.num_metadata_users -= 1;
        }
        Self::update_for_release(&mut entries, entry.key());
    }

    /// Move one user of `entry` from the metadata class to the tree class.
    pub(crate) fn change_to_tree_user(&self, entry: &CacheEntry) {
        let mut entries = self.entries.lock();
        let Some(slot) = entries.get_mut(entry.key()) else {
            debug_assert!(false, "change_to_tree_user on evicted entry");
            return;
        };
        debug_assert!(slot.num_metadata_users > 0);
        slot.num_tree_users += 1;
        slot.num_metadata_users -= 1;
        Self::update_for_release(&mut entries, entry.key());
    }

    /// Move one user of `entry` from the tree class to the metadata class.
    pub(crate) fn change_to_metadata_user(&self, entry: &CacheEntry) {
        let mut entries = self.entries.lock();
        let Some(slot) = entries.get_mut(entry.key()) else {
            debug_assert!(false, "change_to_metadata_user on evicted entry");
            return;
        };
        debug_assert!(slot.num_tree_users > 0);
        slot.num_metadata_users += 1;
        slot.num_tree_users -= 1;
        Self::update_for_release(&mut entries, entry.key());
    }

    /// Eviction check, after any transition that can lower a count.
    ///
    /// With no users left the entry is erased. With metadata users but no
    /// tree users the entry survives, but its voxel tree is dropped and the
    /// entry returns to the unloaded state — nobody needs those voxels, and
    /// the next tree user will read them again.
    fn update_for_release(entries: &mut HashMap<EntryKey, EntrySlot>, key: &EntryKey) {
        let Some(slot) = entries.get_mut(key) else {
            return;
        };
        if slot.num_metadata_users + slot.num_tree_users == 0 {
            log::debug!(
                "volume {}: evict grid '{}'",
                key.filepath.display(),
                key.grid_name
            );
            entries.remove(key);
        } else if slot.num_tree_users == 0 {
            log::debug!(
                "volume {}: drop tree of grid '{}'",
                key.filepath.display(),
                key.grid_name
            );
            slot.entry.reset_unloaded();
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Whether an entry exists for (`filepath`, `grid_name`).
    pub fn contains(&self, filepath: &Path, grid_name: &str) -> bool {
        let entries = self.entries.lock();
        entries
            .keys()
            .any(|k| &*k.filepath == filepath && &*k.grid_name == grid_name)
    }
}

impl Drop for FileCache {
    fn drop(&mut self) {
        // Every consumer must have released its handles by teardown.
        debug_assert!(
            self.entries.get_mut().is_empty(),
            "file cache dropped with {} live entries",
            self.entries.get_mut().len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgb_core::GridType;

    fn key_path() -> &'static Path {
        Path::new("/tmp/does-not-exist.vgb")
    }

    #[test]
    fn test_dedup_by_key() {
        let cache = FileCache::new();
        let a = cache.add_metadata_user(key_path(), GridMeta::new("density", GridType::Float));
        let b = cache.add_metadata_user(key_path(), GridMeta::new("density", GridType::Float));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        let c = cache.add_metadata_user(key_path(), GridMeta::new("heat", GridType::Float));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);

        cache.remove_user(&a, false);
        cache.remove_user(&b, false);
        cache.remove_user(&c, false);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_at_zero_users() {
        let cache = FileCache::new();
        let entry = cache.add_metadata_user(key_path(), GridMeta::new("density", GridType::Float));
        cache.copy_user(&entry, false);
        assert_eq!(cache.len(), 1);

        cache.remove_user(&entry, false);
        assert_eq!(cache.len(), 1);
        cache.remove_user(&entry, false);
        assert_eq!(cache.len(), 0);
        assert!(!cache.contains(key_path(), "density"));
    }

    #[test]
    fn test_class_change_keeps_entry() {
        let cache = FileCache::new();
        let entry = cache.add_metadata_user(key_path(), GridMeta::new("density", GridType::Float));
        // Metadata user becomes the sole tree user: zero metadata users
        // alone must not evict.
        cache.change_to_tree_user(&entry);
        assert_eq!(cache.len(), 1);
        cache.change_to_metadata_user(&entry);
        assert_eq!(cache.len(), 1);
        cache.remove_user(&entry, false);
        assert!(cache.is_empty());
    }
}
