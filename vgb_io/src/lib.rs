//! # vgb_io
//!
//! The VGB container format: named sparse volume grids whose metadata is
//! enumerable without touching voxel data.
//!
//! The reader exposes exactly the three operations a lazy-loading consumer
//! needs:
//!
//! - [`VolumeFile::open`]: open by path, parse header and grid directory
//! - [`VolumeFile::grids`]: enumerate grid metadata (no voxel I/O)
//! - [`VolumeFile::read_tree`]: read one grid's voxel tree by name
//!
//! A corrupt directory yields a partial grid list plus
//! [`VolumeFile::directory_error`] rather than an all-or-nothing failure.
//!
//! ## Example
//!
//! ```ignore
//! use vgb_io::VolumeFile;
//!
//! let mut file = VolumeFile::open("smoke_0042.vgb")?;
//! for record in file.grids() {
//!     println!("{} ({})", record.meta.name, record.meta.grid_type);
//! }
//! let density = file.read_tree("density")?;
//! println!("{} blocks", density.num_blocks());
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod format;
pub mod tree;

pub use error::{Result, VgbError};
pub use format::{
    write_volume, write_volume_to, GridRecord, VgbHeader, VolumeFile, HEADER_SIZE, VGB_MAGIC,
    VGB_VERSION,
};
pub use tree::{GridTree, TreeBlock};

// Re-export core types for convenience.
pub use vgb_core::{GridMeta, GridType, Transform};
