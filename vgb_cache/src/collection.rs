//! Grid collections: every grid discovered in one volume file load.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard};
use vgb_core::{sequence, SequenceSpec};
use vgb_io::{VgbError, VolumeFile};

use crate::cache::FileCache;
use crate::handle::GridHandle;

/// Read guard over one handle of a collection.
///
/// Keep these short-lived: the guard holds the collection's state lock,
/// which `unload` and `update_frame` need for writing.
pub type GridRef<'a> = MappedRwLockReadGuard<'a, GridHandle>;

/// Read guard over all handles of a collection.
pub type GridsRef<'a> = MappedRwLockReadGuard<'a, [GridHandle]>;

#[derive(Clone, Default)]
struct CollectionState {
    /// Absolute path last loaded from (or attempted). `None` means nothing
    /// is loaded and the next `load` will hit the disk.
    path: Option<PathBuf>,
    /// Current resolved sequence frame; `None` means outside the sequence
    /// range. Ignored for non-sequence collections.
    frame: Option<i32>,
    /// Discovered grids, in file enumeration order.
    handles: Vec<GridHandle>,
    /// Aggregate error of the whole collection load.
    error: Option<String>,
    /// Active grid index, clamped on access.
    active: usize,
}

/// The ordered list of grids discovered in one volume file, loaded lazily.
///
/// A collection is created around a source path and starts empty. The
/// first [`GridCollection::load`] enumerates grid metadata — no voxel data
/// — and registers each grid with the file cache as a metadata user.
/// Individual grids are promoted to tree users on demand via
/// [`GridCollection::load_grid`] or [`GridHandle::load`].
///
/// A failed load is terminal: the attempted path stays recorded and repeat
/// calls short-circuit to the same answer until [`GridCollection::unload`]
/// (or a sequence frame change) resets the collection.
///
/// Cloning a collection is cheap and is how copy-on-write duplication
/// works: the clones share every cached grid, with user counts keeping the
/// data alive exactly as long as someone needs it.
pub struct GridCollection {
    cache: Arc<FileCache>,
    /// Configured source path; for sequences this carries the frame-number
    /// digit run that [`sequence::frame_path`] substitutes.
    source_path: PathBuf,
    sequence: Option<SequenceSpec>,
    state: RwLock<CollectionState>,
    /// Guards the whole-file enumeration. Held across file I/O; distinct
    /// from every cache-entry lock.
    load_lock: Mutex<()>,
}

impl GridCollection {
    /// A collection over `path`, using the process-wide file cache.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_cache(path, FileCache::global())
    }

    /// A collection over `path`, using an explicit cache instance.
    pub fn with_cache(path: impl Into<PathBuf>, cache: Arc<FileCache>) -> Self {
        Self {
            cache,
            source_path: path.into(),
            sequence: None,
            state: RwLock::new(CollectionState {
                frame: Some(0),
                ..Default::default()
            }),
            load_lock: Mutex::new(()),
        }
    }

    /// Treat the source path as a frame sequence.
    #[must_use]
    pub fn with_sequence(mut self, spec: SequenceSpec) -> Self {
        self.sequence = Some(spec);
        self
    }

    /// The configured source path.
    #[inline]
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// The absolute path of the last load attempt, if any.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.state.read().path.clone()
    }

    /// Whether a load has been attempted and not undone.
    pub fn is_loaded(&self) -> bool {
        self.state.read().path.is_some()
    }

    /// The aggregate error of the last load, if any.
    pub fn error_message(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    /// The current resolved sequence frame (`None` = outside range).
    pub fn resolved_frame(&self) -> Option<i32> {
        self.state.read().frame
    }

    /// Re-resolve the sequence frame for `scene_frame`, unloading the
    /// collection when the frame changed. No-op for non-sequence
    /// collections.
    pub fn update_frame(&self, scene_frame: i32) {
        let Some(spec) = &self.sequence else {
            return;
        };
        let frame = spec.frame_at(scene_frame);
        let mut state = self.state.write();
        if state.frame != frame {
            self.unload_locked(&mut state);
            state.frame = frame;
        }
    }

    /// Enumerate the grids of the resolved file, metadata only.
    ///
    /// Returns true when the collection is usable without error. Outside a
    /// sequence's range there is nothing to show and nothing to do, which
    /// counts as success. Repeat calls with an unchanged resolved path do
    /// no I/O.
    pub fn load(&self) -> bool {
        // Fast path: nothing to do, or a previous attempt stands.
        {
            let state = self.state.read();
            if self.sequence.is_some() && state.frame.is_none() {
                return true;
            }
            if state.path.is_some() {
                return state.error.is_none();
            }
        }

        // Double-checked: lose the race and the earlier attempt answers.
        let _guard = self.load_lock.lock();
        let frame = {
            let state = self.state.read();
            if state.path.is_some() {
                return state.error.is_none();
            }
            state.frame
        };

        let path = match (&self.sequence, frame) {
            (Some(_), Some(frame)) => sequence::frame_path(&self.source_path, frame),
            (Some(_), None) => return true,
            (None, _) => self.source_path.clone(),
        };

        log::info!("volume load {}", path.display());

        if !path.exists() {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let message = VgbError::NotFound { filename }.to_string();
            log::info!("volume {}: {message}", path.display());

            let mut state = self.state.write();
            state.path = Some(path);
            state.error = Some(message);
            return false;
        }

        let mut handles = Vec::new();
        let mut error = None;
        match VolumeFile::open(&path) {
            Ok(file) => {
                if let Some(err) = file.directory_error() {
                    // Keep whatever enumerated; the error is still reported.
                    error = Some(err.to_string());
                }
                for record in file.grids() {
                    if record.meta.name.is_empty() {
                        log::warn!("volume {}: skipping unnamed grid", path.display());
                        continue;
                    }
                    handles.push(GridHandle::cached(
                        Arc::clone(&self.cache),
                        &path,
                        record.meta.clone(),
                    ));
                }
            }
            Err(err) => {
                log::info!("volume {}: {err}", path.display());
                error = Some(err.to_string());
            }
        }

        let ok = error.is_none();
        let mut state = self.state.write();
        state.path = Some(path);
        state.error = error;
        state.handles = handles;
        ok
    }

    /// Destroy every handle, clear the error, and forget the path.
    ///
    /// This is the only way out of a failed-load state, and the only path
    /// that shrinks the handle list. Dropping the handles releases their
    /// cache users, which may evict entries or free voxel trees.
    pub fn unload(&self) {
        let mut state = self.state.write();
        self.unload_locked(&mut state);
    }

    fn unload_locked(&self, state: &mut CollectionState) {
        if let Some(path) = &state.path {
            log::info!("volume unload {}", path.display());
        }
        state.handles.clear();
        state.error = None;
        state.path = None;
    }

    /// Number of discovered grids.
    pub fn len(&self) -> usize {
        self.state.read().handles.len()
    }

    /// True if no grids are discovered.
    pub fn is_empty(&self) -> bool {
        self.state.read().handles.is_empty()
    }

    /// All handles, in discovery order.
    pub fn grids(&self) -> GridsRef<'_> {
        RwLockReadGuard::map(self.state.read(), |s| s.handles.as_slice())
    }

    /// The handle at `index`.
    pub fn grid_at(&self, index: usize) -> Option<GridRef<'_>> {
        RwLockReadGuard::try_map(self.state.read(), |s| s.handles.get(index)).ok()
    }

    /// The first handle named `name`.
    pub fn find_grid(&self, name: &str) -> Option<GridRef<'_>> {
        RwLockReadGuard::try_map(self.state.read(), |s| {
            s.handles.iter().find(|h| h.name() == name)
        })
        .ok()
    }

    /// The active handle: the stored index clamped into range.
    pub fn active_grid(&self) -> Option<GridRef<'_>> {
        RwLockReadGuard::try_map(self.state.read(), |s| {
            let last = s.handles.len().checked_sub(1)?;
            s.handles.get(s.active.min(last))
        })
        .ok()
    }

    /// Set the active grid index (clamped on access, not here).
    pub fn set_active_index(&self, index: usize) {
        self.state.write().active = index;
    }

    /// Promote the grid at `index` to a tree user, loading its voxel tree
    /// on demand. On failure the grid's error is copied into the
    /// collection error and false is returned.
    pub fn load_grid(&self, index: usize) -> bool {
        let error = {
            let state = self.state.read();
            let Some(handle) = state.handles.get(index) else {
                return false;
            };
            handle.load();
            handle.error_message()
        };
        match error {
            Some(message) => {
                self.state.write().error = Some(message);
                false
            }
            None => true,
        }
    }

    /// Demote the grid at `index` back to a metadata user.
    pub fn unload_grid(&self, index: usize) {
        let state = self.state.read();
        if let Some(handle) = state.handles.get(index) {
            handle.unload();
        }
    }
}

impl Clone for GridCollection {
    fn clone(&self) -> Self {
        // Cloning the state clones every handle, registering the duplicate
        // users with the cache.
        let state = self.state.read().clone();
        Self {
            cache: Arc::clone(&self.cache),
            source_path: self.source_path.clone(),
            sequence: self.sequence,
            state: RwLock::new(state),
            load_lock: Mutex::new(()),
        }
    }
}

impl core::fmt::Debug for GridCollection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.read();
        f.debug_struct("GridCollection")
            .field("source_path", &self.source_path)
            .field("path", &state.path)
            .field("grids", &state.handles.len())
            .field("error", &state.error)
            .finish()
    }
}
