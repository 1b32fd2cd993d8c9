// modbreaker-parsers/src/p3d/probe.rs
//! Face block location
//!
//! Neither P3D variant states where its face block starts; it is assumed
//! to follow the vertex block at a fixed distance. A probe reads the
//! candidate count there and only accepts it when the records would fit.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Width of one stored vertex index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexWidth {
    U16,
    U32,
}

impl IndexWidth {
    pub fn bytes(&self) -> usize {
        match self {
            IndexWidth::U16 => 2,
            IndexWidth::U32 => 4,
        }
    }

    /// Size of one triangle record
    pub fn triangle_bytes(&self) -> usize {
        self.bytes() * 3
    }

    fn read(&self, bytes: &[u8]) -> u32 {
        match self {
            IndexWidth::U16 => u32::from(LittleEndian::read_u16(bytes)),
            IndexWidth::U32 => LittleEndian::read_u32(bytes),
        }
    }
}

/// A face block that passed the plausibility checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBlock {
    /// Offset of the `u32` triangle count
    pub count_offset: usize,
    /// Declared triangle count
    pub count: u32,
    /// Offset of the first triangle record
    pub records_offset: usize,
    pub index_width: IndexWidth,
}

impl FaceBlock {
    /// Triangles in file order. The caller must pass the buffer the block
    /// was located in.
    pub fn triangles<'a>(&self, buffer: &'a [u8]) -> impl Iterator<Item = [u32; 3]> + 'a {
        let width = self.index_width;
        let stride = width.triangle_bytes();
        let end = (self.records_offset + self.count as usize * stride).min(buffer.len());
        let start = self.records_offset.min(end);

        buffer[start..end].chunks_exact(stride).map(move |rec| {
            let w = width.bytes();
            [width.read(&rec[..w]), width.read(&rec[w..2 * w]), width.read(&rec[2 * w..])]
        })
    }
}

/// Strategy for finding the face block after the vertex block
pub trait FaceProbe {
    /// Look for a plausible face block following a vertex block that ends
    /// at `after_vertex_offset`
    fn try_locate_faces(&self, buffer: &[u8], after_vertex_offset: usize) -> Option<FaceBlock>;
}

/// Probe at a fixed distance past the vertices with a fixed index width
#[derive(Debug, Clone, Copy)]
pub struct FixedOffsetProbe {
    /// Bytes between the end of the vertex block and the triangle count
    pub skip: usize,
    pub index_width: IndexWidth,
    /// Largest triangle count considered plausible
    pub max_plausible: u32,
}

impl FaceProbe for FixedOffsetProbe {
    fn try_locate_faces(&self, buffer: &[u8], after_vertex_offset: usize) -> Option<FaceBlock> {
        let count_offset = after_vertex_offset.checked_add(self.skip)?;
        let count_bytes = buffer.get(count_offset..count_offset.checked_add(4)?)?;
        let count = LittleEndian::read_u32(count_bytes);
        let records_offset = count_offset + 4;

        if count == 0 || count > self.max_plausible {
            trace!(count_offset, count, "face count implausible");
            return None;
        }

        let needed = (count as usize).checked_mul(self.index_width.triangle_bytes())?;
        if needed > buffer.len() - records_offset {
            trace!(count_offset, count, needed, "face block runs past buffer");
            return None;
        }

        Some(FaceBlock {
            count_offset,
            count,
            records_offset,
            index_width: self.index_width,
        })
    }
}
