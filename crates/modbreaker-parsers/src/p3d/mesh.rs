// modbreaker-parsers/src/p3d/mesh.rs
//! P3D mesh records and the parse outcome types

use std::fmt;

use modbreaker_core::{BoundingBox, Stage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signature::{MLOD_MAGIC, ODOL_MAGIC};

/// P3D sub-format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshVariant {
    /// Editable model (`MLOD`)
    Mlod,
    /// Binarized model (`ODOL`)
    Odol,
    Unknown,
}

impl MeshVariant {
    /// Variant by the first four bytes
    pub fn detect(buffer: &[u8]) -> Self {
        match buffer.get(..4) {
            Some(magic) if magic == MLOD_MAGIC => MeshVariant::Mlod,
            Some(magic) if magic == ODOL_MAGIC => MeshVariant::Odol,
            _ => MeshVariant::Unknown,
        }
    }
}

impl fmt::Display for MeshVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MeshVariant::Mlod => "MLOD",
            MeshVariant::Odol => "ODOL",
            MeshVariant::Unknown => "unknown",
        })
    }
}

/// How much geometry was recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshValidity {
    /// Vertices and at least one in-range triangle
    Triangulated,
    /// Full vertex block, no usable face block
    VerticesOnly,
    /// Vertex block clamped to the buffer; faces not attempted
    Partial,
    /// No geometry
    Absent,
}

impl MeshValidity {
    pub fn has_vertices(&self) -> bool {
        !matches!(self, MeshValidity::Absent)
    }
}

impl fmt::Display for MeshValidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MeshValidity::Triangulated => "triangulated",
            MeshValidity::VerticesOnly => "vertices-only",
            MeshValidity::Partial => "partial",
            MeshValidity::Absent => "absent",
        })
    }
}

/// Geometry recovered from one P3D file.
///
/// `triangles` is non-empty only when `validity` is `Triangulated`, and
/// then every index is below `vertices.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshRecord {
    pub variant: MeshVariant,
    /// Vertex positions in file order
    pub vertices: Vec<[f32; 3]>,
    /// Triangles as vertex indices, in file order
    pub triangles: Vec<[u32; 3]>,
    /// Triangle cap applied to this record
    pub face_limit: usize,
    pub validity: MeshValidity,
    /// Axis-aligned bounds of `vertices`
    pub bounding_box: Option<BoundingBox>,
}

impl MeshRecord {
    /// Record with no geometry
    pub fn absent(variant: MeshVariant, face_limit: usize) -> Self {
        Self {
            variant,
            vertices: Vec::new(),
            triangles: Vec::new(),
            face_limit,
            validity: MeshValidity::Absent,
            bounding_box: None,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_triangulated(&self) -> bool {
        self.validity == MeshValidity::Triangulated
    }

    /// Check every triangle index against the vertex count
    pub fn indices_in_range(&self) -> bool {
        let count = self.vertices.len() as u64;
        self.triangles
            .iter()
            .all(|tri| tri.iter().all(|idx| u64::from(*idx) < count))
    }
}

/// What the parser saw while building a [`MeshRecord`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshDiagnostics {
    /// Vertex count from the header
    pub declared_vertices: u32,
    /// Triangle count of the accepted face block
    pub declared_triangles: Option<u32>,
    /// The declared vertex count did not fit the buffer
    pub vertices_clamped: bool,
    /// A plausible face block was found
    pub face_block_found: bool,
    /// Offset of the face block's count field
    pub face_block_offset: Option<u64>,
    /// Triangles rejected for an out-of-range index
    pub dropped_triangles: usize,
    /// In-range triangles cut by the face limit
    pub truncated_triangles: usize,
}

/// Hard mesh failure: a fixed header field is missing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("Truncated {variant} header at offset {offset}")]
    TruncatedHeader { variant: MeshVariant, offset: u64 },
}

impl MeshError {
    pub fn offset(&self) -> u64 {
        match self {
            MeshError::TruncatedHeader { offset, .. } => *offset,
        }
    }
}

impl From<MeshError> for modbreaker_core::Error {
    fn from(err: MeshError) -> Self {
        modbreaker_core::Error::parse(Stage::MeshHeader, err.offset(), err.to_string())
    }
}
