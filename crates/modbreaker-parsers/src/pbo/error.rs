// modbreaker-parsers/src/pbo/error.rs
//! Hard failures of the archive reader

use modbreaker_core::Stage;
use thiserror::Error;

/// Result alias for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors raised while opening a PBO or extracting an entry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("Invalid PBO signature: expected 00 73 72 65 56, found {found:02X?}")]
    InvalidSignature { found: Vec<u8> },

    #[error("Entry table truncated at offset {offset} after {entries_read} entries")]
    TruncatedTable { offset: u64, entries_read: usize },

    #[error("Entry {name} out of bounds: offset {offset} + size {size} exceeds archive length {archive_len}")]
    OutOfBounds {
        name: String,
        offset: u64,
        size: u64,
        archive_len: u64,
    },

    #[error("Corrupt entry {name} at offset {offset}: {reason}")]
    CorruptEntry {
        name: String,
        offset: u64,
        reason: String,
    },

    #[error("Unsupported packing method 0x{method:08X} for {name} at offset {offset}")]
    UnsupportedPacking { name: String, method: u32, offset: u64 },

    #[error("Entry not found: {0}")]
    EntryNotFound(String),
}

impl ArchiveError {
    /// Pipeline stage the error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            ArchiveError::InvalidSignature { .. } => Stage::ArchiveHeader,
            ArchiveError::TruncatedTable { .. } => Stage::ArchiveTable,
            ArchiveError::OutOfBounds { .. }
            | ArchiveError::CorruptEntry { .. }
            | ArchiveError::UnsupportedPacking { .. }
            | ArchiveError::EntryNotFound(_) => Stage::ArchiveExtract,
        }
    }

    /// Byte offset the error refers to
    pub fn offset(&self) -> u64 {
        match self {
            ArchiveError::InvalidSignature { .. } | ArchiveError::EntryNotFound(_) => 0,
            ArchiveError::TruncatedTable { offset, .. }
            | ArchiveError::OutOfBounds { offset, .. }
            | ArchiveError::CorruptEntry { offset, .. }
            | ArchiveError::UnsupportedPacking { offset, .. } => *offset,
        }
    }
}

impl From<ArchiveError> for modbreaker_core::Error {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::EntryNotFound(path) => modbreaker_core::Error::EntryNotFound { path },
            other => modbreaker_core::Error::parse(other.stage(), other.offset(), other.to_string()),
        }
    }
}
