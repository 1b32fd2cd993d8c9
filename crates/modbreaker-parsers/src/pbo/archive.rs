// modbreaker-parsers/src/pbo/archive.rs
//! Opened PBO archive: entry table, header properties and extraction

use std::collections::HashMap;

use bytes::Bytes;
use tracing::{debug, trace};

use super::compression::PboCompression;
use super::entry::PboEntry;
use super::error::{ArchiveError, ArchiveResult};
use super::{ArchiveOptions, PackingMethod, PACKING_VERS};
use crate::reader::{decode_name, ByteReader, Underrun};
use crate::signature::{fold_case, FileKind, PBO_MAGIC};

/// Parsed PBO archive.
///
/// Holds a cheap clone of the caller's buffer; stored entries are
/// extracted as zero-copy slices of it.
#[derive(Debug, Clone)]
pub struct PboArchive {
    data: Bytes,
    /// Header extension key/value pairs, in file order
    pub properties: Vec<(String, String)>,
    /// All entries in table order
    pub entries: Vec<PboEntry>,
    /// Folded name to entry index
    pub path_index: HashMap<String, usize>,
    /// Offset of the first data byte
    pub data_start: u64,
    options: ArchiveOptions,
}

impl PboArchive {
    /// Open with default options
    pub fn open(data: Bytes) -> ArchiveResult<Self> {
        Self::open_with_options(data, &ArchiveOptions::default())
    }

    /// Validate the signature and read the header extension and entry table
    pub fn open_with_options(data: Bytes, options: &ArchiveOptions) -> ArchiveResult<Self> {
        if !data.starts_with(PBO_MAGIC) {
            return Err(ArchiveError::InvalidSignature {
                found: data[..data.len().min(PBO_MAGIC.len())].to_vec(),
            });
        }

        let mut reader = ByteReader::new(&data);

        // Header extension entry, then its key/value strings
        let header = read_record(&mut reader, 0)?;
        if header.packing != PACKING_VERS || !header.name.is_empty() {
            return Err(ArchiveError::InvalidSignature {
                found: data[..PBO_MAGIC.len()].to_vec(),
            });
        }

        let mut properties = Vec::new();
        loop {
            let key = reader.read_asciiz().map_err(|e| truncated(e, 0))?;
            if key.is_empty() {
                break;
            }
            let value = reader.read_asciiz().map_err(|e| truncated(e, 0))?;
            properties.push((decode_name(key), decode_name(value)));
        }

        let mut entries: Vec<PboEntry> = Vec::new();
        loop {
            let record = read_record(&mut reader, entries.len())?;
            if record.name.is_empty() {
                break;
            }

            let packing = PackingMethod::from_raw(record.packing);
            let original_size = match packing {
                PackingMethod::Stored => {
                    if record.original_size != 0 && record.original_size != record.data_size {
                        trace!(
                            name = %record.name,
                            declared = record.original_size,
                            data_size = record.data_size,
                            "stored entry declares a different original size"
                        );
                    }
                    record.data_size
                }
                _ => record.original_size,
            };

            entries.push(PboEntry {
                name: record.name,
                packing,
                original_size,
                data_size: record.data_size,
                timestamp: record.timestamp,
                offset: 0,
                header_offset: record.header_offset as u64,
            });
        }

        let data_start = reader.position() as u64;
        let mut cursor = data_start;
        for entry in &mut entries {
            entry.offset = cursor;
            cursor += u64::from(entry.data_size);
        }

        let mut path_index = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            // First occurrence wins on duplicate names
            path_index.entry(entry.folded_name()).or_insert(idx);
        }

        debug!(
            entries = entries.len(),
            properties = properties.len(),
            data_start,
            "opened PBO"
        );

        Ok(Self {
            data,
            properties,
            entries,
            path_index,
            data_start,
            options: options.clone(),
        })
    }

    /// Entries in table order
    pub fn list_entries(&self) -> &[PboEntry] {
        &self.entries
    }

    /// Get total number of entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Length of the underlying buffer
    pub fn archive_len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Header property by key (case-insensitive)
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Virtual path prefix the archive mounts under (`prefix` property)
    pub fn prefix(&self) -> Option<&str> {
        self.property("prefix").filter(|p| !p.is_empty())
    }

    /// Get an entry by name, ignoring case and separator style
    pub fn get(&self, name: &str) -> Option<&PboEntry> {
        self.path_index.get(&fold_case(name)).map(|idx| &self.entries[*idx])
    }

    /// Check if name exists in archive
    pub fn contains(&self, name: &str) -> bool {
        self.path_index.contains_key(&fold_case(name))
    }

    /// Read an entry's payload.
    ///
    /// Stored entries are returned as a slice of the archive buffer, packed
    /// ones are unpacked and must come out at exactly `original_size`.
    pub fn extract(&self, entry: &PboEntry) -> ArchiveResult<Bytes> {
        let archive_len = self.archive_len();
        if entry.data_end() > archive_len {
            return Err(ArchiveError::OutOfBounds {
                name: entry.name.clone(),
                offset: entry.offset,
                size: u64::from(entry.data_size),
                archive_len,
            });
        }

        let raw = self.data.slice(entry.offset as usize..entry.data_end() as usize);

        match entry.packing {
            PackingMethod::Stored => Ok(raw),
            PackingMethod::Packed => {
                let expected = entry.original_size as usize;
                if expected > self.options.max_unpacked_size {
                    return Err(ArchiveError::CorruptEntry {
                        name: entry.name.clone(),
                        offset: entry.offset,
                        reason: format!(
                            "declared size {} exceeds limit {}",
                            expected, self.options.max_unpacked_size
                        ),
                    });
                }

                let out = PboCompression::decompress(&raw, expected, self.options.verify_checksums)
                    .map_err(|e| ArchiveError::CorruptEntry {
                        name: entry.name.clone(),
                        offset: entry.offset,
                        reason: e.to_string(),
                    })?;

                if out.len() != expected {
                    return Err(ArchiveError::CorruptEntry {
                        name: entry.name.clone(),
                        offset: entry.offset,
                        reason: format!("unpacked {} bytes, expected {}", out.len(), expected),
                    });
                }

                trace!(name = %entry.name, packed = raw.len(), unpacked = out.len(), "unpacked entry");
                Ok(Bytes::from(out))
            }
            PackingMethod::Unknown(method) => Err(ArchiveError::UnsupportedPacking {
                name: entry.name.clone(),
                method,
                offset: entry.header_offset,
            }),
        }
    }

    /// Look an entry up by name and extract it
    pub fn extract_by_name(&self, name: &str) -> ArchiveResult<Bytes> {
        let entry = self
            .get(name)
            .ok_or_else(|| ArchiveError::EntryNotFound(name.to_string()))?;
        self.extract(entry)
    }

    /// Find entries matching a pattern (`*` wildcards, case-insensitive)
    pub fn find(&self, pattern: &str) -> Vec<&PboEntry> {
        let pattern = fold_case(pattern);
        let parts: Vec<&str> = pattern.split('*').collect();

        self.entries
            .iter()
            .filter(|entry| {
                let path = entry.folded_name();

                if parts.len() == 1 {
                    return path.contains(&pattern);
                }

                let mut pos = 0;
                for (i, part) in parts.iter().enumerate() {
                    if part.is_empty() {
                        continue;
                    }

                    if i == 0 {
                        if !path.starts_with(*part) {
                            return false;
                        }
                        pos = part.len();
                    } else if i == parts.len() - 1 {
                        if !path[pos..].ends_with(*part) {
                            return false;
                        }
                    } else if let Some(idx) = path[pos..].find(*part) {
                        pos += idx + part.len();
                    } else {
                        return false;
                    }
                }
                true
            })
            .collect()
    }

    /// Entries of one kind (by name suffix)
    pub fn find_by_kind(&self, kind: FileKind) -> Vec<&PboEntry> {
        self.entries.iter().filter(|e| e.kind() == kind).collect()
    }

    /// Entries directly inside a directory
    pub fn list_directory(&self, path: &str) -> Vec<&PboEntry> {
        let dir = fold_case(path);
        let dir = dir.trim_matches('/');
        let prefix = if dir.is_empty() { String::new() } else { format!("{}/", dir) };

        self.entries
            .iter()
            .filter(|entry| {
                let name = entry.folded_name();
                name.strip_prefix(&prefix)
                    .map(|rest| !rest.contains('/'))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Get archive statistics
    pub fn statistics(&self) -> ArchiveStatistics {
        let mut stats = ArchiveStatistics {
            total_entries: self.entries.len(),
            ..Default::default()
        };

        for entry in &self.entries {
            match entry.packing {
                PackingMethod::Stored => stats.stored_count += 1,
                PackingMethod::Packed => stats.packed_count += 1,
                PackingMethod::Unknown(_) => stats.unsupported_count += 1,
            }
            stats.total_original += u64::from(entry.original_size);
            stats.total_data += u64::from(entry.data_size);
            if entry.data_end() > self.archive_len() {
                stats.out_of_bounds_count += 1;
            }

            let ext = entry.extension().unwrap_or_default();
            *stats.extensions.entry(ext).or_insert(0) += 1;
        }

        if stats.total_original > 0 {
            stats.compression_ratio = stats.total_data as f64 / stats.total_original as f64;
        }

        stats
    }
}

/// Raw table record before normalisation
struct RawRecord {
    name: String,
    packing: u32,
    original_size: u32,
    timestamp: u32,
    data_size: u32,
    header_offset: usize,
}

/// Name, then packing / original size / reserved / timestamp / data size
fn read_record(reader: &mut ByteReader<'_>, entries_read: usize) -> ArchiveResult<RawRecord> {
    let header_offset = reader.position();
    let map = |e: Underrun| truncated(e, entries_read);

    let name = reader.read_asciiz().map_err(map)?;
    let packing = reader.read_u32().map_err(map)?;
    let original_size = reader.read_u32().map_err(map)?;
    let _reserved = reader.read_u32().map_err(map)?;
    let timestamp = reader.read_u32().map_err(map)?;
    let data_size = reader.read_u32().map_err(map)?;

    Ok(RawRecord {
        name: decode_name(name),
        packing,
        original_size,
        timestamp,
        data_size,
        header_offset,
    })
}

fn truncated(err: Underrun, entries_read: usize) -> ArchiveError {
    ArchiveError::TruncatedTable {
        offset: err.offset as u64,
        entries_read,
    }
}

/// Archive statistics
#[derive(Debug, Default, serde::Serialize)]
pub struct ArchiveStatistics {
    /// Total number of entries
    pub total_entries: usize,
    pub stored_count: usize,
    pub packed_count: usize,
    /// Entries with a packing method that cannot be extracted
    pub unsupported_count: usize,
    /// Entries whose data runs past the end of the buffer
    pub out_of_bounds_count: usize,
    /// Total unpacked size in bytes
    pub total_original: u64,
    /// Total stored size in bytes
    pub total_data: u64,
    /// Overall compression ratio
    pub compression_ratio: f64,
    /// Entry count by folded extension ("" for none)
    pub extensions: HashMap<String, usize>,
}

impl ArchiveStatistics {
    /// Get top N extensions by entry count
    pub fn top_extensions(&self, n: usize) -> Vec<(&str, usize)> {
        let mut exts: Vec<_> = self.extensions.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        exts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        exts.truncate(n);
        exts
    }
}
