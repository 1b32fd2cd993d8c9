// modbreaker-parsers/src/paa.rs
//! PAA texture header reader
//!
//! Only metadata is read; pixel data is never decoded.
//!
//! ```text
//! ┌────────────────────────────┐
//! │ u16 type tag               │  FF01..FF05 (DXT1-5), 4444, 1555, 8080, 8888
//! ├────────────────────────────┤
//! │ TAGG*                      │  "GGAT" + 4-byte name + u32 length + data
//! ├────────────────────────────┤
//! │ u16 palette entries        │  followed by entries * 3 bytes
//! ├────────────────────────────┤
//! │ mip 0: u16 width, u16 h,   │  width bit 15 marks LZO compression
//! │        u24 length, data    │
//! └────────────────────────────┘
//! ```

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::reader::{ByteReader, Underrun};
use crate::traits::{ParseError, ParseOptions, ParseResult, Parser};

const TAGG_MAGIC: &[u8; 4] = b"GGAT";
/// TAGG holding the 16 mipmap offsets
const OFFSETS_TAGG: &[u8; 4] = b"SFFO";
const LZO_FLAG: u16 = 0x8000;

/// Pixel format named by the type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaaFormat {
    Dxt1,
    Dxt2,
    Dxt3,
    Dxt4,
    Dxt5,
    Argb4444,
    Argb1555,
    Ai88,
    Argb8888,
}

impl PaaFormat {
    pub fn from_tag(tag: u16) -> Option<Self> {
        Some(match tag {
            0xFF01 => PaaFormat::Dxt1,
            0xFF02 => PaaFormat::Dxt2,
            0xFF03 => PaaFormat::Dxt3,
            0xFF04 => PaaFormat::Dxt4,
            0xFF05 => PaaFormat::Dxt5,
            0x4444 => PaaFormat::Argb4444,
            0x1555 => PaaFormat::Argb1555,
            0x8080 => PaaFormat::Ai88,
            0x8888 => PaaFormat::Argb8888,
            _ => return None,
        })
    }

    pub fn is_block_compressed(&self) -> bool {
        matches!(
            self,
            PaaFormat::Dxt1 | PaaFormat::Dxt2 | PaaFormat::Dxt3 | PaaFormat::Dxt4 | PaaFormat::Dxt5
        )
    }
}

impl fmt::Display for PaaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaaFormat::Dxt1 => "DXT1",
            PaaFormat::Dxt2 => "DXT2",
            PaaFormat::Dxt3 => "DXT3",
            PaaFormat::Dxt4 => "DXT4",
            PaaFormat::Dxt5 => "DXT5",
            PaaFormat::Argb4444 => "ARGB4444",
            PaaFormat::Argb1555 => "ARGB1555",
            PaaFormat::Ai88 => "AI88",
            PaaFormat::Argb8888 => "ARGB8888",
        })
    }
}

/// Texture metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaaInfo {
    pub format: PaaFormat,
    /// Width of the largest mipmap
    pub width: u16,
    pub height: u16,
    pub lzo_compressed: bool,
    /// Mipmaps listed in the offsets TAGG, 0 when it is missing
    pub mipmap_count: usize,
    /// TAGG names in file order (`CGVA`, `CXAM`, `GALF`, `SFFO`, ...)
    pub taggs: Vec<String>,
    pub byte_size: u64,
}

fn underrun(err: Underrun) -> ParseError {
    ParseError::Texture {
        offset: err.offset as u64,
        message: err.to_string(),
    }
}

/// Read the header of a PAA buffer
pub fn read_info(buffer: &[u8]) -> ParseResult<PaaInfo> {
    let mut reader = ByteReader::new(buffer);

    let tag = reader.read_u16().map_err(underrun)?;
    let format = PaaFormat::from_tag(tag).ok_or_else(|| ParseError::Texture {
        offset: 0,
        message: format!("unknown type tag {tag:#06x}"),
    })?;

    let mut taggs = Vec::new();
    let mut mipmap_count = 0;
    while reader.peek(4) == Some(TAGG_MAGIC.as_slice()) {
        reader.skip(4).map_err(underrun)?;
        let name = reader.take(4).map_err(underrun)?;
        let len = reader.read_u32().map_err(underrun)? as usize;
        let data = reader.take(len).map_err(underrun)?;

        if name == OFFSETS_TAGG {
            mipmap_count = data
                .chunks_exact(4)
                .filter(|c| c.iter().any(|b| *b != 0))
                .count();
        }
        taggs.push(String::from_utf8_lossy(name).into_owned());
    }

    let palette = reader.read_u16().map_err(underrun)? as usize;
    reader.skip(palette * 3).map_err(underrun)?;

    let raw_width = reader.read_u16().map_err(underrun)?;
    let height = reader.read_u16().map_err(underrun)?;
    let width = raw_width & !LZO_FLAG;

    trace!(%format, width, height, taggs = taggs.len(), "paa header");

    Ok(PaaInfo {
        format,
        width,
        height,
        lzo_compressed: raw_width & LZO_FLAG != 0,
        mipmap_count,
        taggs,
        byte_size: buffer.len() as u64,
    })
}

/// Parser for `.paa` / `.pac` headers
#[derive(Debug, Clone, Copy, Default)]
pub struct PaaParser;

impl PaaParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for PaaParser {
    type Output = PaaInfo;

    fn extensions(&self) -> &[&str] {
        &["paa", "pac"]
    }

    fn name(&self) -> &str {
        "PAA Texture Header"
    }

    fn parse_with_options(&self, data: Bytes, _options: &ParseOptions) -> ParseResult<Self::Output> {
        read_info(&data)
    }
}

#[cfg(test)]
pub(crate) fn build_paa(tag: u16, width: u16, height: u16, mips: usize) -> Vec<u8> {
    let mut out = tag.to_le_bytes().to_vec();

    out.extend_from_slice(b"GGATCGVA");
    out.extend_from_slice(&4u32.to_le_bytes());
    out.extend_from_slice(&[0x80, 0x80, 0x80, 0xFF]);

    out.extend_from_slice(b"GGATSFFO");
    out.extend_from_slice(&64u32.to_le_bytes());
    for i in 0..16u32 {
        let offset = if (i as usize) < mips { 100 + i * 10 } else { 0 };
        out.extend_from_slice(&offset.to_le_bytes());
    }

    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&[8, 0, 0]);
    out.extend_from_slice(&[0u8; 8]);
    out
}
