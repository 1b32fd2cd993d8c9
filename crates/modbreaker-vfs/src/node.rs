// modbreaker-vfs/src/node.rs
//! VFS node structures

use modbreaker_parsers::signature::{extension_of, FileKind};
use serde::Serialize;

/// VFS node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeType {
    Directory,
    File,
}

/// VFS node representing a file or directory
#[derive(Debug, Clone, Serialize)]
pub struct VfsNode {
    /// Node name (without path)
    pub name: String,
    /// Full VFS path, case preserved
    pub path: String,
    pub node_type: NodeType,
    /// File size after extraction (0 for directories)
    pub size: u64,
    /// Mount point ID this node belongs to
    pub mount_id: usize,
    /// Offset within the mount source (for archive files)
    pub offset: Option<u64>,
    /// Stored size when the entry is packed
    pub compressed_size: Option<u64>,
    pub metadata: NodeMetadata,
}

/// Node metadata
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeMetadata {
    /// Case-folded file extension (if file)
    pub extension: Option<String>,
    /// What the file is by name
    pub kind: Option<FileKind>,
    /// Packing method name for archive entries
    pub packing: Option<String>,
    /// Unix timestamp, when the source records one
    pub timestamp: Option<u32>,
}

impl VfsNode {
    /// Create a new file node
    pub fn new_file(path: impl Into<String>, size: u64, mount_id: usize) -> Self {
        let path = path.into();
        let name = crate::path::filename(&path).to_string();

        Self {
            metadata: NodeMetadata {
                extension: extension_of(&name),
                kind: Some(FileKind::from_name(&name)),
                ..Default::default()
            },
            name,
            path,
            node_type: NodeType::File,
            size,
            mount_id,
            offset: None,
            compressed_size: None,
        }
    }

    /// Create a new directory node
    pub fn new_directory(path: impl Into<String>, mount_id: usize) -> Self {
        let path = path.into();
        Self {
            name: crate::path::filename(&path).to_string(),
            path,
            node_type: NodeType::Directory,
            size: 0,
            mount_id,
            offset: None,
            compressed_size: None,
            metadata: Default::default(),
        }
    }

    pub fn is_file(&self) -> bool {
        self.node_type == NodeType::File
    }

    pub fn is_directory(&self) -> bool {
        self.node_type == NodeType::Directory
    }

    /// Get the file extension
    pub fn extension(&self) -> Option<&str> {
        self.metadata.extension.as_deref()
    }

    /// Check if file has a specific extension (case-insensitive)
    pub fn has_extension(&self, ext: &str) -> bool {
        self.extension()
            .map(|e| e.eq_ignore_ascii_case(ext.trim_start_matches('.')))
            .unwrap_or(false)
    }

    /// Kind by name, `Other` for directories
    pub fn kind(&self) -> FileKind {
        self.metadata.kind.unwrap_or(FileKind::Other)
    }
}
