// modbreaker-vfs/src/search.rs
//! VFS search functionality

use modbreaker_parsers::signature::FileKind;

use crate::node::VfsNode;
use crate::path::glob_match;

/// Search query builder
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Path pattern (glob, case-insensitive), matched against the full path
    /// and the file name
    pub pattern: Option<String>,
    /// File extension filter
    pub extension: Option<String>,
    /// File kind filter
    pub kind: Option<FileKind>,
    /// Minimum file size
    pub min_size: Option<u64>,
    /// Maximum file size
    pub max_size: Option<u64>,
    /// Only files below this directory
    pub under: Option<String>,
}

impl SearchQuery {
    /// Create a new search query
    pub fn new() -> Self {
        Self::default()
    }

    /// Set path pattern
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set file extension filter
    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = Some(ext.into());
        self
    }

    pub fn with_kind(mut self, kind: FileKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set size range
    pub fn with_size_range(mut self, min: u64, max: u64) -> Self {
        self.min_size = Some(min);
        self.max_size = Some(max);
        self
    }

    /// Restrict to a directory subtree
    pub fn under(mut self, dir: impl Into<String>) -> Self {
        self.under = Some(dir.into());
        self
    }

    /// Check if a node matches this query
    pub fn matches(&self, node: &VfsNode) -> bool {
        if !node.is_file() {
            return false;
        }

        if let Some(ref pattern) = self.pattern {
            let path = node.path.trim_start_matches('/');
            if !glob_match(pattern, path) && !glob_match(pattern, &node.name) {
                return false;
            }
        }

        if let Some(ref ext) = self.extension {
            if !node.has_extension(ext) {
                return false;
            }
        }

        if let Some(kind) = self.kind {
            if node.kind() != kind {
                return false;
            }
        }

        if self.min_size.is_some_and(|min| node.size < min) {
            return false;
        }

        if self.max_size.is_some_and(|max| node.size > max) {
            return false;
        }

        true
    }
}
