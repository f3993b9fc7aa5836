//! # vgb_cache
//!
//! Reference-counted, file-backed cache for sparse volume grids.
//!
//! Many independent consumers — an original volume object, its
//! copy-on-write duplicates, render threads — need the grids of the same
//! VGB file. This crate makes them share one decoded copy: grids are
//! cached process-wide by (file path, grid name), metadata-only consumers
//! never pay for voxel data, and voxel trees are read lazily, once, no
//! matter how many threads ask.
//!
//! ## Architecture
//!
//! - [`FileCache`]: process-wide map from (file path, grid name) to a
//!   shared cache entry, with explicit metadata-user and tree-user counts.
//!   An entry lives while anyone references it; its voxel tree lives while
//!   a *tree* user references it. Both transitions are immediate, not
//!   deferred: dropping the last user frees the data.
//! - [`GridHandle`]: a per-consumer view of one grid. File-backed handles
//!   start as metadata users; [`GridHandle::load`] promotes to tree user
//!   with a double-checked, acquire/release-published protocol, so the
//!   already-loaded fast path takes no lock at all.
//! - [`GridCollection`]: the ordered grids of one file load, including
//!   sequence frame resolution ([`SequenceSpec`]) and terminal error
//!   recording.
//!
//! ## Quick Start
//!
//! ```ignore
//! use vgb_cache::GridCollection;
//!
//! let volume = GridCollection::new("clouds.vgb");
//! if !volume.load() {
//!     eprintln!("{}", volume.error_message().unwrap());
//! }
//!
//! // Metadata is free; voxel data is read on demand.
//! for grid in volume.grids().iter() {
//!     println!("{} ({})", grid.name(), grid.grid_type());
//! }
//! if volume.load_grid(0) {
//!     let grid = volume.grid_at(0).unwrap();
//!     let tree = grid.tree().unwrap();
//!     println!("{} blocks resident", tree.num_blocks());
//! }
//! ```
//!
//! ## Concurrency
//!
//! Three lock scopes exist and nest in one direction only: a collection's
//! load guard (held across metadata enumeration), a cache entry's load
//! mutex (held across that one grid's tree read), and the cache's own
//! mutex (held briefly for counter and key-set changes, never across
//! I/O). Handle clone and drop are safe from any thread at any time,
//! including concurrently with another thread loading the same entry.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cache;
mod collection;
mod entry;
mod grid;
mod handle;

pub use cache::FileCache;
pub use collection::{GridCollection, GridRef, GridsRef};
pub use grid::{SharedGrid, TreeGuard};
pub use handle::GridHandle;

// Re-export the types the public surface speaks in.
pub use vgb_core::{sequence, GridMeta, GridType, SequenceMode, SequenceSpec, Transform};
pub use vgb_io::{GridTree, TreeBlock, VgbError};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use vgb_cache::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{FileCache, GridCollection, GridHandle};
    pub use vgb_core::{GridMeta, GridType, SequenceMode, SequenceSpec, Transform};
    pub use vgb_io::GridTree;
}
