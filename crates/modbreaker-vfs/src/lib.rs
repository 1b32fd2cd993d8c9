// modbreaker-vfs/src/lib.rs
//! ModBreaker Virtual File System
//!
//! One case-insensitive, `/`-separated view over a mod folder:
//! - PBO archives, mounted at their `prefix` property
//! - PBOs nested inside archives, one level deep
//! - loose files next to the archives, which override archive entries
//!
//! # Example
//! ```no_run
//! use modbreaker_vfs::VfsTree;
//! use modbreaker_parsers::ParseOptions;
//! use std::path::Path;
//!
//! let vfs = VfsTree::new();
//! let summary = vfs.mount_folder(Path::new("/path/to/@MyMod"), &ParseOptions::default()).unwrap();
//! println!("{} archives", summary.archives);
//!
//! if vfs.exists("\\mymod\\gear\\jacket.p3d") {
//!     let data = vfs.read_file("\\mymod\\gear\\jacket.p3d").unwrap();
//!     println!("{} bytes", data.len());
//! }
//! ```

pub mod mount;
pub mod node;
pub mod path;
pub mod search;
pub mod sidecar;
pub mod tree;

pub use mount::{ArchiveMount, FileIndex, FilesystemMount, MountError, MountPoint, MountResult};
pub use node::{NodeMetadata, NodeType, VfsNode};
pub use search::SearchQuery;
pub use sidecar::{merge_references, MatchQuality, SidecarKind, SidecarReference, SidecarResolver};
pub use tree::{MountSummary, VfsTree};

#[cfg(test)]
pub(crate) mod test_support {
    use bytes::Bytes;

    /// Uncompressed PBO with an optional `prefix` property
    pub fn stored_pbo(prefix: Option<&str>, files: &[(&str, &[u8])]) -> Bytes {
        let mut out = modbreaker_parsers::signature::PBO_MAGIC.to_vec();
        out.extend_from_slice(&[0u8; 16]);
        if let Some(prefix) = prefix {
            out.extend_from_slice(b"prefix\0");
            out.extend_from_slice(prefix.as_bytes());
            out.push(0);
        }
        out.push(0);
        for (name, data) in files {
            out.extend_from_slice(name.as_bytes());
            out.push(0);
            for field in [0u32, 0, 0, 0, data.len() as u32] {
                out.extend_from_slice(&field.to_le_bytes());
            }
        }
        out.extend_from_slice(&[0u8; 21]);
        for (_, data) in files {
            out.extend_from_slice(data);
        }
        Bytes::from(out)
    }

    /// DXT5 texture header with a single mipmap entry
    pub fn paa_header(width: u16, height: u16) -> Vec<u8> {
        let mut out = 0xFF05u16.to_le_bytes().to_vec();
        out.extend_from_slice(b"GGATSFFO");
        out.extend_from_slice(&64u32.to_le_bytes());
        for i in 0..16u32 {
            let offset: u32 = if i == 0 { 90 } else { 0 };
            out.extend_from_slice(&offset.to_le_bytes());
        }
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(&[8, 0, 0]);
        out.extend_from_slice(&[0u8; 8]);
        out
    }
}
