//! VGB binary container format.
//!
//! A VGB file holds zero or more named sparse grids. Metadata is fully
//! enumerable without reading voxel data, and each grid's tree is
//! independently loadable by name.
//!
//! # Format Specification
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │ HEADER (16 bytes)                                                  │
//! ├────────────────────────────────────────────────────────────────────┤
//! │  0-3:   Magic "VGBF"                                               │
//! │  4-5:   version (u16 LE)                                           │
//! │  6-7:   flags (u16 LE)                                             │
//! │  8-11:  grid_count (u32 LE)                                        │
//! │ 12-15:  reserved                                                   │
//! ├────────────────────────────────────────────────────────────────────┤
//! │ DIRECTORY (grid_count records, variable size)                      │
//! │  For each grid:                                                    │
//! │    name_len (u16 LE), name (UTF-8)                                 │
//! │    type tag (u8), reserved (u8)                                    │
//! │    transform (16 × f32 LE, row-major)                              │
//! │    tree_offset (u64 LE, absolute), tree_len (u64 LE)               │
//! ├────────────────────────────────────────────────────────────────────┤
//! │ TREE PAYLOADS (one per grid, at tree_offset)                       │
//! │    block_dim (u32), channels (u32), num_blocks (u32), reserved     │
//! │    For each block:                                                 │
//! │      coord (3 × i32 LE)                                            │
//! │      values (block_dim³ × channels × f32 LE)                       │
//! └────────────────────────────────────────────────────────────────────┘
//! ```

pub mod header;
pub mod reader;
pub mod writer;

pub use header::{VgbHeader, HEADER_SIZE, VGB_MAGIC, VGB_VERSION};
pub use reader::{GridRecord, VolumeFile};
pub use writer::{write_volume, write_volume_to};
