//! VGB file reading: header parse, metadata enumeration, on-demand tree reads.
//!
//! Opening a file parses the header and the grid directory only — no voxel
//! data is touched until [`VolumeFile::read_tree`] is called for a specific
//! grid. A corrupt directory is tolerated: records parsed before the
//! corruption point stay available and the failure is reported alongside
//! them, so one bad record does not hide an entire file.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use vgb_core::{GridMeta, GridType, Transform};

use super::header::{VgbHeader, HEADER_SIZE};
use crate::error::{Result, VgbError};
use crate::tree::GridTree;

/// Upper bound on a grid name, to reject nonsense lengths early.
const MAX_NAME_LEN: usize = 4096;

/// Upper bound on voxels per block axis.
const MAX_BLOCK_DIM: u32 = 256;

/// Size of the per-grid tree payload header.
const TREE_HEADER_SIZE: u64 = 16;

/// Bytes per block coordinate triple.
const COORD_SIZE: u64 = 12;

/// One directory record: grid metadata plus the location of its tree.
#[derive(Debug, Clone)]
pub struct GridRecord {
    /// Grid metadata (name, type, transform).
    pub meta: GridMeta,
    pub(crate) tree_offset: u64,
    pub(crate) tree_len: u64,
}

/// An open VGB file with its directory parsed.
pub struct VolumeFile<R> {
    reader: R,
    header: VgbHeader,
    records: Vec<GridRecord>,
    directory_error: Option<VgbError>,
}

impl VolumeFile<BufReader<File>> {
    /// Open a VGB file and parse its grid directory.
    ///
    /// Fails on I/O errors and on header-level corruption. Directory-level
    /// corruption is not fatal; see [`VolumeFile::directory_error`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> VolumeFile<R> {
    /// Parse a VGB stream. See [`VolumeFile::open`].
    pub fn from_reader(mut reader: R) -> Result<Self> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_bytes)?;
        let header = VgbHeader::from_bytes(&header_bytes);
        header.validate()?;

        let expected = header.grid_count as usize;
        let mut records = Vec::with_capacity(expected.min(1024));
        let mut directory_error = None;

        for _ in 0..expected {
            match read_record(&mut reader) {
                Ok(record) => records.push(record),
                Err(err) => {
                    let err = match err {
                        VgbError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                            VgbError::TruncatedDirectory {
                                parsed: records.len(),
                                expected,
                            }
                        }
                        other => other,
                    };
                    log::warn!("volume directory scan stopped: {err}");
                    directory_error = Some(err);
                    break;
                }
            }
        }

        Ok(Self {
            reader,
            header,
            records,
            directory_error,
        })
    }

    /// The parsed file header.
    #[inline]
    pub fn header(&self) -> &VgbHeader {
        &self.header
    }

    /// All successfully enumerated grid records, in file order.
    #[inline]
    pub fn grids(&self) -> &[GridRecord] {
        &self.records
    }

    /// The error that stopped directory parsing, if any.
    ///
    /// A non-`None` value means [`VolumeFile::grids`] is a partial list.
    #[inline]
    pub fn directory_error(&self) -> Option<&VgbError> {
        self.directory_error.as_ref()
    }

    /// Read the voxel tree of the named grid.
    ///
    /// When a file contains several grids with the same name, the first
    /// record wins.
    pub fn read_tree(&mut self, name: &str) -> Result<GridTree> {
        let record = self
            .records
            .iter()
            .find(|r| r.meta.name == name)
            .cloned()
            .ok_or_else(|| VgbError::GridNotFound {
                name: name.to_string(),
            })?;

        self.reader.seek(SeekFrom::Start(record.tree_offset))?;

        let block_dim = read_u32(&mut self.reader)?;
        let channels = read_u32(&mut self.reader)?;
        let num_blocks = read_u32(&mut self.reader)?;
        let _reserved = read_u32(&mut self.reader)?;

        if block_dim == 0 || block_dim > MAX_BLOCK_DIM {
            return Err(VgbError::InvalidFormat {
                message: format!("unreasonable block dimension {block_dim}"),
            });
        }
        if channels != record.meta.grid_type.channels() {
            return Err(VgbError::InvalidFormat {
                message: format!(
                    "tree declares {channels} channels but grid '{}' is {}",
                    record.meta.name, record.meta.grid_type
                ),
            });
        }

        let mut tree = GridTree::new(block_dim, channels);
        let values_per_block = tree.values_per_block();

        let expected_len = TREE_HEADER_SIZE
            + num_blocks as u64 * (COORD_SIZE + values_per_block as u64 * 4);
        if record.tree_len != expected_len {
            return Err(VgbError::InvalidFormat {
                message: format!(
                    "tree payload length {} does not match declared {} blocks",
                    record.tree_len, num_blocks
                ),
            });
        }

        for _ in 0..num_blocks {
            let coord = [
                read_i32(&mut self.reader)?,
                read_i32(&mut self.reader)?,
                read_i32(&mut self.reader)?,
            ];
            let mut values = vec![0.0f32; values_per_block];
            read_f32_slice(&mut self.reader, &mut values)?;
            tree.push_block(coord, values)?;
        }

        Ok(tree)
    }
}

/// Parse one directory record.
///
/// Record layout:
/// - name_len (u16 LE), name (UTF-8, name_len bytes)
/// - type tag (u8), reserved (u8)
/// - transform (16 × f32 LE, row-major)
/// - tree_offset (u64 LE, absolute), tree_len (u64 LE)
fn read_record<R: Read>(reader: &mut R) -> Result<GridRecord> {
    let name_len = read_u16(reader)? as usize;
    if name_len > MAX_NAME_LEN {
        return Err(VgbError::InvalidFormat {
            message: format!("grid name length {name_len} exceeds limit"),
        });
    }
    let mut name_bytes = vec![0u8; name_len];
    reader.read_exact(&mut name_bytes)?;
    let name = String::from_utf8(name_bytes).map_err(|_| VgbError::InvalidFormat {
        message: "grid name is not valid UTF-8".to_string(),
    })?;

    let mut tag_bytes = [0u8; 2];
    reader.read_exact(&mut tag_bytes)?;
    let grid_type = GridType::from_tag(tag_bytes[0]);

    let mut flat = [0.0f32; 16];
    read_f32_slice(reader, &mut flat)?;
    let transform = Transform::from_flat(&flat);

    let tree_offset = read_u64(reader)?;
    let tree_len = read_u64(reader)?;

    Ok(GridRecord {
        meta: GridMeta {
            name,
            grid_type,
            transform,
        },
        tree_offset,
        tree_len,
    })
}

fn read_u16<R: Read>(reader: &mut R) -> Result<u16> {
    let mut bytes = [0u8; 2];
    reader.read_exact(&mut bytes)?;
    Ok(u16::from_le_bytes(bytes))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(i32::from_le_bytes(bytes))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

fn read_f32_slice<R: Read>(reader: &mut R, out: &mut [f32]) -> Result<()> {
    let mut bytes = vec![0u8; out.len() * 4];
    reader.read_exact(&mut bytes)?;
    for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::writer::write_volume_to;
    use std::io::Cursor;

    fn sample_grids() -> Vec<(GridMeta, GridTree)> {
        let mut density_tree = GridTree::new(4, 1);
        density_tree.push_block([0, 0, 0], vec![0.5; 64]).unwrap();
        density_tree.push_block([1, 0, -2], vec![1.5; 64]).unwrap();

        let mut velocity_tree = GridTree::new(4, 3);
        velocity_tree.push_block([0, 0, 0], vec![0.1; 192]).unwrap();

        vec![
            (GridMeta::new("density", GridType::Float), density_tree),
            (
                GridMeta::new("velocity", GridType::Vec3Float)
                    .with_transform(Transform::uniform_scale(0.1)),
                velocity_tree,
            ),
        ]
    }

    fn sample_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        write_volume_to(&mut bytes, &sample_grids()).unwrap();
        bytes
    }

    #[test]
    fn test_enumerate_without_tree_read() {
        let file = VolumeFile::from_reader(Cursor::new(sample_bytes())).unwrap();
        assert!(file.directory_error().is_none());
        assert_eq!(file.grids().len(), 2);
        assert_eq!(file.grids()[0].meta.name, "density");
        assert_eq!(file.grids()[1].meta.grid_type, GridType::Vec3Float);
    }

    #[test]
    fn test_read_tree_by_name() {
        let mut file = VolumeFile::from_reader(Cursor::new(sample_bytes())).unwrap();
        let tree = file.read_tree("density").unwrap();
        assert_eq!(tree.num_blocks(), 2);
        assert_eq!(tree.blocks()[1].coord, [1, 0, -2]);
        assert!((tree.blocks()[0].values[0] - 0.5).abs() < 1e-6);

        let tree = file.read_tree("velocity").unwrap();
        assert_eq!(tree.channels(), 3);
    }

    #[test]
    fn test_missing_grid() {
        let mut file = VolumeFile::from_reader(Cursor::new(sample_bytes())).unwrap();
        assert!(matches!(
            file.read_tree("temperature"),
            Err(VgbError::GridNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = sample_bytes();
        bytes[0..4].copy_from_slice(b"BADM");
        assert!(matches!(
            VolumeFile::from_reader(Cursor::new(bytes)),
            Err(VgbError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_truncated_directory_keeps_partial() {
        let bytes = sample_bytes();
        // Cut the stream in the middle of the second record: the first
        // record is 2 + 7 + 2 + 64 + 16 = 91 bytes after the header.
        let cut = HEADER_SIZE + 91 + 10;
        let file = VolumeFile::from_reader(Cursor::new(bytes[..cut].to_vec())).unwrap();
        assert_eq!(file.grids().len(), 1);
        assert_eq!(file.grids()[0].meta.name, "density");
        assert!(matches!(
            file.directory_error(),
            Some(VgbError::TruncatedDirectory {
                parsed: 1,
                expected: 2
            })
        ));
    }

    #[test]
    fn test_unknown_type_tag_enumerates() {
        let mut bytes = sample_bytes();
        // First record's type tag sits right after the header, the name
        // length field and the 7-byte name.
        let tag_pos = HEADER_SIZE + 2 + 7;
        bytes[tag_pos] = 200;
        let mut file = VolumeFile::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(file.grids()[0].meta.grid_type, GridType::Unknown);
        // The tree now disagrees with the declared (unknown, zero-channel)
        // type, so reading it fails cleanly rather than misdecoding.
        assert!(file.read_tree("density").is_err());
    }
}
