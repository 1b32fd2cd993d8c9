// modbreaker-parsers/src/pbo/mod.rs
//! PBO Archive Parser
//!
//! PBO is the container every DayZ mod ships its assets in. It is a flat
//! table of named entries followed by their data, with no central
//! directory at the end: offsets are implied by accumulating data sizes.
//!
//! # Format Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! |                         PBO Archive                         |
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │            Header Extension Entry                       ││
//! │  │  - empty name, packing 'Vers' (00 73 72 65 56)          ││
//! │  │  - asciiz key/value pairs ("prefix", "product", ...)    ││
//! │  │  - empty key terminates                                 ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                 Entry Table                             ││
//! │  │  asciiz name, u32 packing, u32 original size,           ││
//! │  │  u32 reserved, u32 timestamp, u32 data size             ││
//! │  │  ... terminated by a record with an empty name          ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │              Entry Data (table order)                   ││
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐                    ││
//! │  │  │ Entry 1 │ │ Entry 2 │ │ Entry N │ ...                ││
//! │  │  └─────────┘ └─────────┘ └─────────┘                    ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  [ optional trailer: 0x00 + SHA-1, not read ]               │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod archive;
mod compression;
mod entry;
mod error;

pub use archive::{ArchiveStatistics, PboArchive};
pub use compression::{LzssError, PboCompression};
pub use entry::{format_bytes, PboEntry};
pub use error::{ArchiveError, ArchiveResult};

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::signature::PBO_MAGIC;
use crate::traits::{ParseOptions, ParseResult, Parser};

/// Packing method of the header extension entry ("Vers")
pub const PACKING_VERS: u32 = 0x5665_7273;

/// Packing method of LZSS-packed entries ("Cprs")
pub const PACKING_CPRS: u32 = 0x4370_7273;

/// How an entry's data is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackingMethod {
    /// Raw bytes
    Stored,
    /// LZSS-packed
    Packed,
    /// Anything else (encrypted or tool-specific); cannot be extracted
    Unknown(u32),
}

impl PackingMethod {
    pub fn from_raw(value: u32) -> Self {
        match value {
            0 => PackingMethod::Stored,
            PACKING_CPRS => PackingMethod::Packed,
            other => PackingMethod::Unknown(other),
        }
    }

    pub fn raw(&self) -> u32 {
        match self {
            PackingMethod::Stored => 0,
            PackingMethod::Packed => PACKING_CPRS,
            PackingMethod::Unknown(value) => *value,
        }
    }
}

impl fmt::Display for PackingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackingMethod::Stored => f.write_str("stored"),
            PackingMethod::Packed => f.write_str("packed"),
            PackingMethod::Unknown(value) => write!(f, "unknown(0x{:08X})", value),
        }
    }
}

/// Archive reader tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveOptions {
    /// Compare the trailing LZSS checksum when one is present
    pub verify_checksums: bool,
    /// Largest declared unpacked size accepted for a packed entry
    pub max_unpacked_size: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            verify_checksums: true,
            max_unpacked_size: 512 * 1024 * 1024, // 512 MB
        }
    }
}

/// PBO Archive Parser
#[derive(Debug, Default, Clone, Copy)]
pub struct PboParser;

impl PboParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for PboParser {
    type Output = PboArchive;

    fn extensions(&self) -> &[&str] {
        &["pbo"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(PBO_MAGIC)
    }

    fn name(&self) -> &str {
        "PBO Archive Parser"
    }

    fn parse_with_options(&self, data: Bytes, options: &ParseOptions) -> ParseResult<Self::Output> {
        Ok(PboArchive::open_with_options(data, &options.archive)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing_method_from_raw() {
        assert_eq!(PackingMethod::from_raw(0), PackingMethod::Stored);
        assert_eq!(PackingMethod::from_raw(PACKING_CPRS), PackingMethod::Packed);
        assert_eq!(PackingMethod::from_raw(7), PackingMethod::Unknown(7));
        assert_eq!(PackingMethod::Unknown(7).raw(), 7);
        assert_eq!(PackingMethod::Packed.to_string(), "packed");
    }

    #[test]
    fn test_vers_matches_magic() {
        let mut magic = vec![0u8];
        magic.extend_from_slice(&PACKING_VERS.to_le_bytes());
        assert_eq!(magic, PBO_MAGIC);
    }

    #[test]
    fn test_parser_rejects_garbage() {
        let parser = PboParser::new();
        assert!(parser.parse(Bytes::from_static(b"garbage data here")).is_err());
        assert!(parser.can_parse("Addons\\Weapons.PBO", &[]));
    }
}
