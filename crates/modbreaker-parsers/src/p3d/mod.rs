// modbreaker-parsers/src/p3d/mod.rs
//! P3D Model Parser
//!
//! P3D comes in two unrelated layouts sharing one extension: MLOD, the
//! editable form, and ODOL, the binarized form most mods ship. Only the
//! first LOD's vertex positions and triangle indices are recovered.
//!
//! # Format Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      P3D (first LOD)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  MLOD: magic | version | lod count | vertex count           │
//! │        vertices @16                                         │
//! │  ODOL: magic | version | lod count | flags | vertex count   │
//! │        vertices @20                                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Vertex block: count x (f32 x, f32 y, f32 z)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  MLOD: u32 count, count x 3 x u16                           │
//! │  ODOL: f32 radius, u32 flags, u32 count, count x 3 x u32    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only a short fixed header is a hard error. A vertex count larger than
//! the buffer is clamped ([`MeshValidity::Partial`]); a face block that
//! cannot be found leaves [`MeshValidity::VerticesOnly`].

mod mesh;
mod probe;

pub use mesh::{MeshDiagnostics, MeshError, MeshRecord, MeshValidity, MeshVariant};
pub use probe::{FaceBlock, FaceProbe, FixedOffsetProbe, IndexWidth};

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use modbreaker_core::BoundingBox;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::reader::ByteReader;
use crate::traits::{ParseOptions, ParseResult, Parser};

/// Where the fixed fields of one variant live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantLayout {
    /// Offset of the `u32` vertex count
    pub count_offset: usize,
    /// Offset of the first vertex; also the fixed header length
    pub vertices_offset: usize,
    /// Bytes per vertex record
    pub vertex_stride: usize,
    /// Distance from the end of the vertex block to the triangle count
    pub face_probe_offset: usize,
    pub index_width: IndexWidth,
}

impl VariantLayout {
    pub const MLOD: Self = Self {
        count_offset: 12,
        vertices_offset: 16,
        vertex_stride: 12,
        face_probe_offset: 0,
        index_width: IndexWidth::U16,
    };

    pub const ODOL: Self = Self {
        count_offset: 16,
        vertices_offset: 20,
        vertex_stride: 12,
        face_probe_offset: 8,
        index_width: IndexWidth::U32,
    };
}

/// Mesh parser layouts and limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshOptions {
    pub mlod: VariantLayout,
    pub odol: VariantLayout,
    /// Triangles kept per mesh, in file order
    pub max_triangles: usize,
    /// Face counts above this are treated as misread data
    pub max_plausible_triangles: u32,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            mlod: VariantLayout::MLOD,
            odol: VariantLayout::ODOL,
            max_triangles: 5000,
            max_plausible_triangles: 1_000_000,
        }
    }
}

impl MeshOptions {
    pub fn layout(&self, variant: MeshVariant) -> Option<&VariantLayout> {
        match variant {
            MeshVariant::Mlod => Some(&self.mlod),
            MeshVariant::Odol => Some(&self.odol),
            MeshVariant::Unknown => None,
        }
    }

    /// Face probe configured for a variant's layout
    pub fn probe(&self, variant: MeshVariant) -> Option<FixedOffsetProbe> {
        self.layout(variant).map(|layout| FixedOffsetProbe {
            skip: layout.face_probe_offset,
            index_width: layout.index_width,
            max_plausible: self.max_plausible_triangles,
        })
    }
}

/// Parse one P3D buffer.
///
/// Deterministic: the same bytes and options always give the same record
/// and diagnostics.
pub fn parse_mesh(buffer: &[u8], options: &MeshOptions) -> Result<(MeshRecord, MeshDiagnostics), MeshError> {
    let variant = MeshVariant::detect(buffer);
    let mut diagnostics = MeshDiagnostics::default();

    let (layout, probe) = match (options.layout(variant), options.probe(variant)) {
        (Some(layout), Some(probe)) => (*layout, probe),
        _ => {
            trace!("no P3D magic; geometry absent");
            return Ok((MeshRecord::absent(variant, options.max_triangles), diagnostics));
        }
    };

    if buffer.len() < layout.vertices_offset {
        return Err(MeshError::TruncatedHeader {
            variant,
            offset: buffer.len() as u64,
        });
    }

    let declared = ByteReader::at(buffer, layout.count_offset)
        .read_u32()
        .map_err(|e| MeshError::TruncatedHeader {
            variant,
            offset: e.offset as u64,
        })?;
    diagnostics.declared_vertices = declared;

    let stride = layout.vertex_stride.max(12);
    let fit = (buffer.len() - layout.vertices_offset) / stride;
    let count = (declared as usize).min(fit);
    diagnostics.vertices_clamped = count < declared as usize;

    let mut record = MeshRecord::absent(variant, options.max_triangles);
    if count == 0 {
        debug!(%variant, declared, "no vertices recovered");
        return Ok((record, diagnostics));
    }

    let block = &buffer[layout.vertices_offset..layout.vertices_offset + count * stride];
    record.vertices = block
        .chunks_exact(stride)
        .map(|v| {
            [
                LittleEndian::read_f32(&v[0..4]),
                LittleEndian::read_f32(&v[4..8]),
                LittleEndian::read_f32(&v[8..12]),
            ]
        })
        .collect();
    record.bounding_box = BoundingBox::from_points(&record.vertices);

    if diagnostics.vertices_clamped {
        debug!(%variant, declared, kept = count, "vertex block clamped to buffer");
        record.validity = MeshValidity::Partial;
        return Ok((record, diagnostics));
    }

    let vertex_end = layout.vertices_offset + count * stride;
    let Some(faces) = probe.try_locate_faces(buffer, vertex_end) else {
        record.validity = MeshValidity::VerticesOnly;
        return Ok((record, diagnostics));
    };

    diagnostics.face_block_found = true;
    diagnostics.face_block_offset = Some(faces.count_offset as u64);
    diagnostics.declared_triangles = Some(faces.count);

    let vertex_count = count as u64;
    for tri in faces.triangles(buffer) {
        if tri.iter().any(|idx| u64::from(*idx) >= vertex_count) {
            diagnostics.dropped_triangles += 1;
        } else if record.triangles.len() < options.max_triangles {
            record.triangles.push(tri);
        } else {
            diagnostics.truncated_triangles += 1;
        }
    }

    record.validity = if record.triangles.is_empty() {
        MeshValidity::VerticesOnly
    } else {
        MeshValidity::Triangulated
    };

    debug!(
        %variant,
        vertices = record.vertices.len(),
        triangles = record.triangles.len(),
        dropped = diagnostics.dropped_triangles,
        truncated = diagnostics.truncated_triangles,
        validity = %record.validity,
        "parsed P3D"
    );

    Ok((record, diagnostics))
}

/// P3D Model Parser
#[derive(Debug, Default, Clone)]
pub struct P3dParser {
    options: MeshOptions,
}

impl P3dParser {
    /// Create a new P3D parser
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: MeshOptions) -> Self {
        Self { options }
    }

    /// Parse a borrowed buffer with this parser's options
    pub fn read(&self, buffer: &[u8]) -> Result<(MeshRecord, MeshDiagnostics), MeshError> {
        parse_mesh(buffer, &self.options)
    }
}

impl Parser for P3dParser {
    type Output = (MeshRecord, MeshDiagnostics);

    fn extensions(&self) -> &[&str] {
        &["p3d"]
    }

    fn name(&self) -> &str {
        "P3D Model Parser"
    }

    fn parse_with_options(&self, data: Bytes, options: &ParseOptions) -> ParseResult<Self::Output> {
        Ok(parse_mesh(&data, &options.mesh)?)
    }
}
