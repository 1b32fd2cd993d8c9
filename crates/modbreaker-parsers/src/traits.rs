// modbreaker-parsers/src/traits.rs
//! Core traits defining the parser interface for all file formats.
//!
//! Every parser takes an owned [`Bytes`] buffer, so archive payloads and
//! memory-mapped files flow through without copying. Options for all
//! parsers travel together in [`ParseOptions`].

use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigOptions;
use crate::economy::EconomyError;
use crate::p3d::{MeshError, MeshOptions};
use crate::pbo::{ArchiveError, ArchiveOptions};
use crate::signature::{detect_named, FileKind};

/// Errors that can occur during parsing operations
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Economy(#[from] EconomyError),

    #[error("Invalid texture header at offset {offset}: {message}")]
    Texture { offset: u64, message: String },

    #[error("Nested error in {context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Wrap this error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ParseError::Nested {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<ParseError> for modbreaker_core::Error {
    fn from(err: ParseError) -> Self {
        use modbreaker_core::{Error, Stage};

        match err {
            ParseError::Io(e) => Error::Io(e),
            ParseError::Archive(e) => e.into(),
            ParseError::Mesh(e) => e.into(),
            ParseError::Economy(e) => Error::parse(Stage::Economy, 0, e.to_string()),
            ParseError::Texture { offset, message } => Error::parse(Stage::Sidecar, offset, message),
            ParseError::Nested { context, source } => Error::from(*source).with_context(context),
        }
    }
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Configuration options for parsing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Archive reader options
    pub archive: ArchiveOptions,
    /// Mesh parser layouts and limits
    pub mesh: MeshOptions,
    /// Config reader thresholds
    pub config: ConfigOptions,
    /// Whether to use memory mapping for large files
    pub use_memory_mapping: bool,
    /// Minimum file size to enable memory mapping
    pub memory_mapping_threshold: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            archive: ArchiveOptions::default(),
            mesh: MeshOptions::default(),
            config: ConfigOptions::default(),
            use_memory_mapping: true,
            memory_mapping_threshold: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl ParseOptions {
    /// Load options from a JSON document; missing fields keep their defaults
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Core trait for all file format parsers
///
/// Implementors of this trait provide the ability to parse a specific
/// file format found in DayZ mod packages.
pub trait Parser: Send + Sync {
    /// The parsed output type
    type Output: Send + Sync;

    /// Returns the file extensions this parser handles (e.g., ["pbo"])
    fn extensions(&self) -> &[&str];

    /// Returns the magic bytes that identify this file type (if applicable)
    fn magic_bytes(&self) -> Option<&[u8]> {
        None
    }

    /// Returns a human-readable name for this parser
    fn name(&self) -> &str;

    /// Parse a buffer with default options
    fn parse(&self, data: Bytes) -> ParseResult<Self::Output> {
        self.parse_with_options(data, &ParseOptions::default())
    }

    /// Parse a buffer with custom options
    fn parse_with_options(&self, data: Bytes, options: &ParseOptions) -> ParseResult<Self::Output>;

    /// Parse from a file path
    fn parse_file(&self, path: &Path) -> ParseResult<Self::Output> {
        self.parse_file_with_options(path, &ParseOptions::default())
    }

    /// Parse from a file path with options
    fn parse_file_with_options(&self, path: &Path, options: &ParseOptions) -> ParseResult<Self::Output> {
        let data = read_source(path, options)?;
        self.parse_with_options(data, options)
            .map_err(|e| e.with_context(path.display().to_string()))
    }

    /// Check if this parser can handle a file, by magic first and then name
    fn can_parse(&self, name: &str, header: &[u8]) -> bool {
        if let Some(magic) = self.magic_bytes() {
            if header.starts_with(magic) {
                return true;
            }
        }

        let kind = FileKind::from_name(name);
        kind != FileKind::Other
            && self
                .extensions()
                .iter()
                .any(|ext| FileKind::from_extension(ext) == kind)
            && (header.is_empty() || detect_named(header, name) != crate::signature::FileFormat::Unknown)
    }
}

/// Read a whole file, memory-mapping it when it is large enough
pub fn read_source(path: &Path, options: &ParseOptions) -> std::io::Result<Bytes> {
    let file = std::fs::File::open(path)?;

    if options.use_memory_mapping {
        let metadata = file.metadata()?;
        if metadata.len() >= options.memory_mapping_threshold {
            // Safety: the map is read-only and the file is not expected to
            // change while a scan holds it.
            #[allow(unsafe_code)]
            let mmap = unsafe { memmap2::Mmap::map(&file) }?;
            return Ok(Bytes::from_owner(mmap));
        }
    }

    std::fs::read(path).map(Bytes::from)
}
