//! The shared backing grid: immutable metadata plus a lazily populated tree.

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use vgb_core::GridMeta;
use vgb_io::GridTree;

/// Read guard over a grid's voxel tree.
pub type TreeGuard<'a> = MappedRwLockReadGuard<'a, GridTree>;

/// One backing grid, shared by every handle that references it.
///
/// Metadata is immutable after construction and readable without
/// synchronization. The tree slot starts empty for file-backed grids and is
/// populated on demand; it is written only by the cache entry's load path
/// and cleared only by the cache's eviction check.
pub struct SharedGrid {
    meta: GridMeta,
    tree: RwLock<Option<GridTree>>,
}

impl SharedGrid {
    /// A grid with metadata only; the tree slot is empty.
    pub fn new(meta: GridMeta) -> Self {
        Self {
            meta,
            tree: RwLock::new(None),
        }
    }

    /// A grid with its tree already resident.
    pub fn with_tree(meta: GridMeta, tree: GridTree) -> Self {
        Self {
            meta,
            tree: RwLock::new(Some(tree)),
        }
    }

    /// Grid metadata.
    #[inline]
    pub fn meta(&self) -> &GridMeta {
        &self.meta
    }

    /// Grid name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Whether a tree is currently resident.
    pub fn has_tree(&self) -> bool {
        self.tree.read().is_some()
    }

    /// Read access to the resident tree, if any.
    pub fn tree(&self) -> Option<TreeGuard<'_>> {
        RwLockReadGuard::try_map(self.tree.read(), Option::as_ref).ok()
    }

    /// Install a freshly read tree.
    pub(crate) fn set_tree(&self, tree: GridTree) {
        *self.tree.write() = Some(tree);
    }

    /// Drop the resident tree, keeping metadata.
    pub(crate) fn clear_tree(&self) {
        *self.tree.write() = None;
    }
}

impl core::fmt::Debug for SharedGrid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedGrid")
            .field("name", &self.meta.name)
            .field("grid_type", &self.meta.grid_type)
            .field("has_tree", &self.has_tree())
            .finish()
    }
}
