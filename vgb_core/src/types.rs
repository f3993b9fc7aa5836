//! Core data types for volume grids.
//!
//! Grid metadata is immutable after construction and may be shared freely
//! between threads without locking.

use core::fmt;

/// The voxel type of a grid, as declared by the file that contains it.
///
/// This is a closed enumeration over the types the container format can
/// declare. Unrecognized type tags map to [`GridType::Unknown`], which is a
/// valid zero-channel variant rather than an error: a file written by a
/// newer tool still enumerates, its unknown grids simply expose no voxel
/// channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridType {
    /// One boolean per voxel.
    Bool,
    /// One f32 per voxel.
    Float,
    /// One f64 per voxel (stored decoded as f32).
    Double,
    /// One i32 per voxel.
    Int32,
    /// One i64 per voxel.
    Int64,
    /// Three f32 components per voxel.
    Vec3Float,
    /// Three f64 components per voxel (stored decoded as f32).
    Vec3Double,
    /// Three i32 components per voxel.
    Vec3Int,
    /// One string per voxel; voxel data is not decoded.
    String,
    /// Topology-only grid, one active bit per voxel.
    Mask,
    /// Type tag not recognized by this build.
    Unknown,
}

impl GridType {
    /// Number of decoded f32 channels per voxel.
    ///
    /// `String` and `Unknown` grids expose zero channels: they enumerate
    /// and carry metadata, but no voxel payload is decoded for them.
    #[inline]
    pub const fn channels(self) -> u32 {
        match self {
            GridType::Bool
            | GridType::Float
            | GridType::Double
            | GridType::Int32
            | GridType::Int64
            | GridType::Mask => 1,
            GridType::Vec3Float | GridType::Vec3Double | GridType::Vec3Int => 3,
            GridType::String | GridType::Unknown => 0,
        }
    }

    /// On-disk type tag.
    #[inline]
    pub const fn tag(self) -> u8 {
        match self {
            GridType::Bool => 0,
            GridType::Float => 1,
            GridType::Double => 2,
            GridType::Int32 => 3,
            GridType::Int64 => 4,
            GridType::Vec3Float => 5,
            GridType::Vec3Double => 6,
            GridType::Vec3Int => 7,
            GridType::String => 8,
            GridType::Mask => 9,
            GridType::Unknown => 255,
        }
    }

    /// Decode an on-disk type tag. Unrecognized tags yield `Unknown`.
    #[inline]
    pub const fn from_tag(tag: u8) -> Self {
        match tag {
            0 => GridType::Bool,
            1 => GridType::Float,
            2 => GridType::Double,
            3 => GridType::Int32,
            4 => GridType::Int64,
            5 => GridType::Vec3Float,
            6 => GridType::Vec3Double,
            7 => GridType::Vec3Int,
            8 => GridType::String,
            9 => GridType::Mask,
            _ => GridType::Unknown,
        }
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GridType::Bool => "bool",
            GridType::Float => "float",
            GridType::Double => "double",
            GridType::Int32 => "int32",
            GridType::Int64 => "int64",
            GridType::Vec3Float => "vec3f",
            GridType::Vec3Double => "vec3d",
            GridType::Vec3Int => "vec3i",
            GridType::String => "string",
            GridType::Mask => "mask",
            GridType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Affine transform from grid index space to object space.
///
/// Row-major 4x4 matrix. Perspective maps are not supported by the format;
/// readers fall back to identity for anything that is not affine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Row-major matrix elements.
    pub matrix: [[f32; 4]; 4],
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Transform = Transform {
        matrix: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Create a transform from a row-major matrix.
    #[inline]
    pub const fn new(matrix: [[f32; 4]; 4]) -> Self {
        Self { matrix }
    }

    /// Uniform scale by `s` (voxel size), identity rotation.
    #[inline]
    pub const fn uniform_scale(s: f32) -> Self {
        Self {
            matrix: [
                [s, 0.0, 0.0, 0.0],
                [0.0, s, 0.0, 0.0],
                [0.0, 0.0, s, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Flatten to 16 row-major elements.
    #[inline]
    pub fn to_flat(&self) -> [f32; 16] {
        let mut out = [0.0f32; 16];
        for (row, elems) in self.matrix.iter().enumerate() {
            out[row * 4..row * 4 + 4].copy_from_slice(elems);
        }
        out
    }

    /// Rebuild from 16 row-major elements.
    #[inline]
    pub fn from_flat(flat: &[f32; 16]) -> Self {
        let mut matrix = [[0.0f32; 4]; 4];
        for (row, elems) in matrix.iter_mut().enumerate() {
            elems.copy_from_slice(&flat[row * 4..row * 4 + 4]);
        }
        Self { matrix }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Descriptive attributes of one named grid.
///
/// This is everything a metadata-only consumer needs: the grid can be
/// listed, typed, and placed in space without its voxel tree ever being
/// read.
#[derive(Debug, Clone, PartialEq)]
pub struct GridMeta {
    /// Grid name, unique per file by convention (duplicates are tolerated).
    pub name: String,
    /// Declared voxel type.
    pub grid_type: GridType,
    /// Index-to-object transform.
    pub transform: Transform,
}

impl GridMeta {
    /// Metadata with an identity transform.
    pub fn new(name: impl Into<String>, grid_type: GridType) -> Self {
        Self {
            name: name.into(),
            grid_type,
            transform: Transform::IDENTITY,
        }
    }

    /// Replace the transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Number of decoded f32 channels per voxel.
    #[inline]
    pub fn channels(&self) -> u32 {
        self.grid_type.channels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels() {
        assert_eq!(GridType::Float.channels(), 1);
        assert_eq!(GridType::Mask.channels(), 1);
        assert_eq!(GridType::Vec3Double.channels(), 3);
        assert_eq!(GridType::String.channels(), 0);
        assert_eq!(GridType::Unknown.channels(), 0);
    }

    #[test]
    fn test_tag_roundtrip() {
        for ty in [
            GridType::Bool,
            GridType::Float,
            GridType::Double,
            GridType::Int32,
            GridType::Int64,
            GridType::Vec3Float,
            GridType::Vec3Double,
            GridType::Vec3Int,
            GridType::String,
            GridType::Mask,
            GridType::Unknown,
        ] {
            assert_eq!(GridType::from_tag(ty.tag()), ty);
        }
    }

    #[test]
    fn test_unrecognized_tag_is_unknown() {
        assert_eq!(GridType::from_tag(42), GridType::Unknown);
        assert_eq!(GridType::from_tag(10), GridType::Unknown);
    }

    #[test]
    fn test_transform_flat_roundtrip() {
        let t = Transform::uniform_scale(0.25);
        let restored = Transform::from_flat(&t.to_flat());
        assert_eq!(t, restored);
    }

    #[test]
    fn test_meta_builder() {
        let meta = GridMeta::new("density", GridType::Float)
            .with_transform(Transform::uniform_scale(0.1));
        assert_eq!(meta.name, "density");
        assert_eq!(meta.channels(), 1);
        assert!((meta.transform.matrix[0][0] - 0.1).abs() < 1e-6);
    }
}
