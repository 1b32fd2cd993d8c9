// modbreaker-parsers/src/pbo/entry.rs
//! PBO entry table records

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::PackingMethod;
use crate::signature::{extension_of, fold_case, FileKind};

/// One file in a PBO entry table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PboEntry {
    /// Path inside the archive, case and backslashes preserved
    pub name: String,
    /// Packing method
    pub packing: PackingMethod,
    /// Unpacked size in bytes
    pub original_size: u32,
    /// Size of the stored (possibly packed) data
    pub data_size: u32,
    /// Unix timestamp, 0 when unset
    pub timestamp: u32,
    /// Absolute offset of the entry's data in the archive
    pub offset: u64,
    /// Absolute offset of the entry's table record
    pub header_offset: u64,
}

impl PboEntry {
    /// Case-folded name with forward slashes
    pub fn folded_name(&self) -> String {
        fold_case(&self.name)
    }

    /// Get the filename without path
    pub fn filename(&self) -> &str {
        self.name.rsplit(['\\', '/']).next().unwrap_or(&self.name)
    }

    /// Get the parent directory path (as stored)
    pub fn parent(&self) -> Option<&str> {
        self.name.rfind(['\\', '/']).map(|idx| &self.name[..idx])
    }

    /// Case-folded file extension
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }

    /// What the entry is by name
    pub fn kind(&self) -> FileKind {
        FileKind::from_name(&self.name)
    }

    pub fn is_packed(&self) -> bool {
        self.packing == PackingMethod::Packed
    }

    /// Offset one past the entry's last data byte
    pub fn data_end(&self) -> u64 {
        self.offset + u64::from(self.data_size)
    }

    /// Calculate compression ratio
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 1.0;
        }
        f64::from(self.data_size) / f64::from(self.original_size)
    }

    /// Modification time, `None` when the packer left it at zero
    pub fn modified(&self) -> Option<SystemTime> {
        (self.timestamp != 0).then(|| UNIX_EPOCH + Duration::from_secs(u64::from(self.timestamp)))
    }
}

/// Format byte count as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
