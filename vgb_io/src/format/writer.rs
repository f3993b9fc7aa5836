//! VGB file writing.
//!
//! Directory records are laid out immediately after the header with
//! absolute tree offsets, so readers can enumerate metadata without
//! touching any voxel payload.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use vgb_core::GridMeta;

use super::header::{VgbHeader, HEADER_SIZE};
use crate::error::{Result, VgbError};
use crate::tree::GridTree;

/// Fixed bytes per directory record, excluding the grid name.
const RECORD_FIXED_SIZE: u64 = 2 + 2 + 64 + 8 + 8;

/// Write a volume file containing the given grids, in order.
pub fn write_volume(path: impl AsRef<Path>, grids: &[(GridMeta, GridTree)]) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_volume_to(&mut writer, grids)?;
    writer.flush()?;
    Ok(())
}

/// Write a volume stream. See [`write_volume`].
pub fn write_volume_to<W: Write>(writer: &mut W, grids: &[(GridMeta, GridTree)]) -> Result<()> {
    for (meta, tree) in grids {
        if meta.name.len() > u16::MAX as usize {
            return Err(VgbError::InvalidFormat {
                message: format!("grid name of {} bytes is too long", meta.name.len()),
            });
        }
        if tree.channels() != meta.grid_type.channels() {
            return Err(VgbError::InvalidFormat {
                message: format!(
                    "tree for grid '{}' has {} channels but type {} expects {}",
                    meta.name,
                    tree.channels(),
                    meta.grid_type,
                    meta.grid_type.channels()
                ),
            });
        }
    }

    let grid_count = u32::try_from(grids.len()).map_err(|_| VgbError::InvalidFormat {
        message: "too many grids for one file".to_string(),
    })?;
    writer.write_all(&VgbHeader::new(grid_count).to_bytes())?;

    let directory_size: u64 = grids
        .iter()
        .map(|(meta, _)| RECORD_FIXED_SIZE + meta.name.len() as u64)
        .sum();

    // Directory pass: records with absolute tree offsets.
    let mut offset = HEADER_SIZE as u64 + directory_size;
    for (meta, tree) in grids {
        let tree_len = tree_payload_len(tree);
        writer.write_all(&(meta.name.len() as u16).to_le_bytes())?;
        writer.write_all(meta.name.as_bytes())?;
        writer.write_all(&[meta.grid_type.tag(), 0])?;
        for value in meta.transform.to_flat() {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.write_all(&offset.to_le_bytes())?;
        writer.write_all(&tree_len.to_le_bytes())?;
        offset += tree_len;
    }

    // Payload pass: tree data in directory order.
    for (_, tree) in grids {
        writer.write_all(&tree.block_dim().to_le_bytes())?;
        writer.write_all(&tree.channels().to_le_bytes())?;
        writer.write_all(&(tree.num_blocks() as u32).to_le_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?;
        for block in tree.blocks() {
            for c in block.coord {
                writer.write_all(&c.to_le_bytes())?;
            }
            for value in &block.values {
                writer.write_all(&value.to_le_bytes())?;
            }
        }
    }

    Ok(())
}

fn tree_payload_len(tree: &GridTree) -> u64 {
    16 + tree.num_blocks() as u64 * (12 + tree.values_per_block() as u64 * 4)
}
