//! # vgb_core
//!
//! Core types and frame math for the VGB (volume grid bundle) ecosystem.
//!
//! This crate holds everything that needs no I/O and no synchronization:
//! the closed grid-type enumeration, grid metadata (name, type, index-to-
//! object transform), and the pure arithmetic that maps scene time onto a
//! frame of a volume sequence.
//!
//! ## Modules
//!
//! - [`types`]: `GridType`, `Transform`, `GridMeta`
//! - [`sequence`]: sequence frame resolution and frame-number path templating
//!
//! ## Usage
//!
//! ```ignore
//! use vgb_core::{SequenceMode, SequenceSpec};
//!
//! let spec = SequenceSpec::new(SequenceMode::Repeat, 1, 0, 10);
//! assert_eq!(spec.frame_at(21), Some(1));
//! ```

#![warn(clippy::all)]

pub mod sequence;
pub mod types;

pub use sequence::{frame_path, SequenceMode, SequenceSpec};
pub use types::{GridMeta, GridType, Transform};
