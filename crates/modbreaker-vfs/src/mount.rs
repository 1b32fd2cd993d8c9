// modbreaker-vfs/src/mount.rs
//! VFS mount point abstraction
//!
//! A mount exposes one file source (a PBO archive or a directory on disk)
//! under a VFS directory. Every mount keeps a [`FileIndex`] keyed by
//! [`path_key`], so lookups ignore case and separator style the way the
//! game does.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, warn};
use walkdir::WalkDir;

use modbreaker_parsers::pbo::{ArchiveError, PboArchive, PboEntry};
use modbreaker_parsers::signature::{file_stem, FileKind};
use modbreaker_parsers::{read_source, ParseOptions};

use crate::node::VfsNode;
use crate::path::{is_under, join_paths, normalize_path, path_key};

/// Result type for mount operations
pub type MountResult<T> = Result<T, MountError>;

/// Mount operation errors
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("Mount source not found: {0}")]
    NotFound(String),

    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl MountError {
    fn not_found(path: &str) -> Self {
        MountError::PathNotFound { path: path.to_string() }
    }
}

impl From<MountError> for modbreaker_core::Error {
    fn from(err: MountError) -> Self {
        use modbreaker_core::Error;

        match err {
            MountError::PathNotFound { path } => Error::VfsNotFound(path),
            MountError::Io(e) => Error::Io(e),
            MountError::Archive(e) => e.into(),
            other @ (MountError::NotFound(_) | MountError::InvalidPath(_)) => Error::MountFailed(other.to_string()),
        }
    }
}

/// Mount point trait
/// Provides abstraction over different file sources (archives, filesystem)
pub trait MountPoint: Send + Sync {
    /// Get mount point unique ID
    fn id(&self) -> usize;

    /// Get mount point name/label
    fn name(&self) -> &str;

    /// Get mount priority (higher = checked first)
    fn priority(&self) -> i32 {
        0
    }

    /// VFS directory this mount's files live under
    fn root(&self) -> &str;

    /// Check if a file or directory exists in this mount
    fn exists(&self, path: &str) -> bool;

    /// Get node metadata for a path
    fn get_node(&self, path: &str) -> MountResult<VfsNode>;

    /// List the files and subdirectories directly inside a directory
    fn list_directory(&self, path: &str) -> MountResult<Vec<VfsNode>>;

    /// Read a whole file
    fn read_file(&self, path: &str) -> MountResult<Bytes>;

    /// Every file in this mount, sorted by path
    fn files(&self) -> Vec<VfsNode>;

    /// Get total file count
    fn file_count(&self) -> usize;

    /// Get total size in bytes
    fn total_size(&self) -> u64;
}

/// File nodes of one mount keyed by [`path_key`]
#[derive(Debug, Default, Clone)]
pub struct FileIndex {
    files: BTreeMap<String, VfsNode>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; an existing file with the same key is kept
    pub fn insert(&mut self, node: VfsNode) -> bool {
        let key = path_key(&node.path);
        if self.files.contains_key(&key) {
            return false;
        }
        self.files.insert(key, node);
        true
    }

    pub fn get(&self, path: &str) -> Option<&VfsNode> {
        self.files.get(&path_key(path))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn is_directory(&self, path: &str) -> bool {
        let dir = path_key(path);
        self.files.keys().any(|key| is_under(key, &dir))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &VfsNode> {
        self.files.values()
    }

    pub fn total_size(&self) -> u64 {
        self.files.values().map(|n| n.size).sum()
    }

    /// Direct children of a directory, directories first
    pub fn list_directory(&self, path: &str, mount_id: usize) -> Vec<VfsNode> {
        let dir = path_key(path);
        let mut dirs: BTreeMap<String, VfsNode> = BTreeMap::new();
        let mut files = Vec::new();

        for (key, node) in &self.files {
            if !is_under(key, &dir) {
                continue;
            }
            let start = if dir == "/" { 1 } else { dir.len() + 1 };
            let rest = &key[start..];
            match rest.find('/') {
                None => files.push(node.clone()),
                // Keys and display paths share byte positions
                Some(slash) => {
                    let end = start + slash;
                    dirs.entry(key[..end].to_string())
                        .or_insert_with(|| VfsNode::new_directory(&node.path[..end], mount_id));
                }
            }
        }

        dirs.into_values().chain(files).collect()
    }
}

/// A PBO archive mounted at its prefix
pub struct ArchiveMount {
    id: usize,
    name: String,
    root: String,
    archive: PboArchive,
    index: FileIndex,
    /// Path key to entry table index
    entries: HashMap<String, usize>,
}

impl ArchiveMount {
    /// Mount at the archive's `prefix` property, or at `/`
    pub fn new(id: usize, name: impl Into<String>, archive: PboArchive) -> Self {
        let root = archive.prefix().map(normalize_path).unwrap_or_else(|| "/".to_string());
        Self::with_root(id, name, archive, &root)
    }

    /// Mount at an explicit VFS directory
    pub fn with_root(id: usize, name: impl Into<String>, archive: PboArchive, root: &str) -> Self {
        let root = normalize_path(root);
        let mut index = FileIndex::new();
        let mut entries = HashMap::with_capacity(archive.entry_count());

        for (idx, entry) in archive.list_entries().iter().enumerate() {
            let node = entry_node(id, &root, entry);
            let key = path_key(&node.path);
            if index.insert(node) {
                entries.insert(key, idx);
            }
        }

        Self {
            id,
            name: name.into(),
            root,
            archive,
            index,
            entries,
        }
    }

    /// Open an archive file and mount it at its prefix, falling back to
    /// the file stem when the archive has none
    pub fn open(id: usize, path: &Path, options: &ParseOptions) -> MountResult<Self> {
        if !path.is_file() {
            return Err(MountError::NotFound(path.display().to_string()));
        }

        let data = read_source(path, options)?;
        let archive = PboArchive::open_with_options(data, &options.archive)?;
        let name = path.display().to_string();

        let root = match archive.prefix() {
            Some(prefix) => normalize_path(prefix),
            None => {
                let file = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                normalize_path(file_stem(file))
            }
        };

        debug!(archive = %name, root = %root, entries = archive.entry_count(), "mounted archive");
        Ok(Self::with_root(id, name, archive, &root))
    }

    pub fn archive(&self) -> &PboArchive {
        &self.archive
    }

    /// Archive entries that are themselves PBOs, with their VFS paths
    pub fn nested_archives(&self) -> Vec<(String, &PboEntry)> {
        self.archive
            .find_by_kind(FileKind::Archive)
            .into_iter()
            .map(|entry| (join_paths(&self.root, &entry.name), entry))
            .collect()
    }

    fn entry(&self, path: &str) -> Option<&PboEntry> {
        self.entries
            .get(&path_key(path))
            .and_then(|idx| self.archive.list_entries().get(*idx))
    }
}

fn entry_node(mount_id: usize, root: &str, entry: &PboEntry) -> VfsNode {
    let mut node = VfsNode::new_file(join_paths(root, &entry.name), u64::from(entry.original_size), mount_id);
    node.offset = Some(entry.offset);
    if entry.is_packed() {
        node.compressed_size = Some(u64::from(entry.data_size));
    }
    node.metadata.packing = Some(entry.packing.to_string());
    node.metadata.timestamp = (entry.timestamp != 0).then_some(entry.timestamp);
    node
}

impl MountPoint for ArchiveMount {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn root(&self) -> &str {
        &self.root
    }

    fn exists(&self, path: &str) -> bool {
        self.index.get(path).is_some() || self.index.is_directory(path)
    }

    fn get_node(&self, path: &str) -> MountResult<VfsNode> {
        if let Some(node) = self.index.get(path) {
            return Ok(node.clone());
        }
        if self.index.is_directory(path) {
            return Ok(VfsNode::new_directory(normalize_path(path), self.id));
        }
        Err(MountError::not_found(path))
    }

    fn list_directory(&self, path: &str) -> MountResult<Vec<VfsNode>> {
        if !self.index.is_directory(path) {
            return Err(MountError::not_found(path));
        }
        Ok(self.index.list_directory(path, self.id))
    }

    fn read_file(&self, path: &str) -> MountResult<Bytes> {
        let entry = self.entry(path).ok_or_else(|| MountError::not_found(path))?;
        Ok(self.archive.extract(entry)?)
    }

    fn files(&self) -> Vec<VfsNode> {
        self.index.nodes().cloned().collect()
    }

    fn file_count(&self) -> usize {
        self.index.len()
    }

    fn total_size(&self) -> u64 {
        self.index.total_size()
    }
}

/// Local filesystem mount point
pub struct FilesystemMount {
    id: usize,
    name: String,
    root_path: PathBuf,
    root: String,
    index: FileIndex,
    /// Path key to location relative to `root_path`
    locations: HashMap<String, PathBuf>,
    options: ParseOptions,
}

impl FilesystemMount {
    /// Mount every file under `root_path` at `/`
    pub fn new(id: usize, name: impl Into<String>, root_path: impl AsRef<Path>) -> MountResult<Self> {
        Self::with_filter(id, name, root_path, "/", |_| true)
    }

    /// Mount the files under `root_path` accepted by `filter` at `vfs_root`
    pub fn with_filter(
        id: usize,
        name: impl Into<String>,
        root_path: impl AsRef<Path>,
        vfs_root: &str,
        filter: impl Fn(&Path) -> bool,
    ) -> MountResult<Self> {
        let root_path = root_path.as_ref().to_path_buf();

        if !root_path.exists() {
            return Err(MountError::NotFound(root_path.display().to_string()));
        }
        if !root_path.is_dir() {
            return Err(MountError::InvalidPath(format!("{} is not a directory", root_path.display())));
        }

        let root = normalize_path(vfs_root);
        let mut index = FileIndex::new();
        let mut locations = HashMap::new();

        for entry in WalkDir::new(&root_path).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !filter(entry.path()) {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&root_path) else {
                continue;
            };
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let vfs_path = join_paths(&root, &relative.to_string_lossy());

            let key = path_key(&vfs_path);
            if index.insert(VfsNode::new_file(vfs_path, size, id)) {
                locations.insert(key, relative.to_path_buf());
            }
        }

        debug!(root = %root_path.display(), files = index.len(), "mounted directory");

        Ok(Self {
            id,
            name: name.into(),
            root_path,
            root,
            index,
            locations,
            options: ParseOptions::default(),
        })
    }

    /// Mount everything under `root_path` except files of the given kinds
    pub fn excluding_kinds(
        id: usize,
        name: impl Into<String>,
        root_path: impl AsRef<Path>,
        kinds: &[FileKind],
    ) -> MountResult<Self> {
        Self::with_filter(id, name, root_path, "/", |path| {
            !kinds.contains(&FileKind::from_name(&path.to_string_lossy()))
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

impl MountPoint for FilesystemMount {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        // Loose files override packed ones
        1
    }

    fn root(&self) -> &str {
        &self.root
    }

    fn exists(&self, path: &str) -> bool {
        self.index.get(path).is_some() || self.index.is_directory(path)
    }

    fn get_node(&self, path: &str) -> MountResult<VfsNode> {
        if let Some(node) = self.index.get(path) {
            return Ok(node.clone());
        }
        if self.index.is_directory(path) {
            return Ok(VfsNode::new_directory(normalize_path(path), self.id));
        }
        Err(MountError::not_found(path))
    }

    fn list_directory(&self, path: &str) -> MountResult<Vec<VfsNode>> {
        if !self.index.is_directory(path) {
            return Err(MountError::not_found(path));
        }
        Ok(self.index.list_directory(path, self.id))
    }

    fn read_file(&self, path: &str) -> MountResult<Bytes> {
        let relative = self
            .locations
            .get(&path_key(path))
            .ok_or_else(|| MountError::not_found(path))?;
        Ok(read_source(&self.root_path.join(relative), &self.options)?)
    }

    fn files(&self) -> Vec<VfsNode> {
        self.index.nodes().cloned().collect()
    }

    fn file_count(&self) -> usize {
        self.index.len()
    }

    fn total_size(&self) -> u64 {
        self.index.total_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::stored_pbo;

    fn archive_mount() -> ArchiveMount {
        let data = stored_pbo(
            Some("MyMod\\Gear"),
            &[
                ("Data\\Jacket.p3d", b"MLOD"),
                ("Data\\jacket_co.paa", b"tex"),
                ("config.cpp", b"class CfgPatches {};"),
            ],
        );
        ArchiveMount::new(3, "gear.pbo", PboArchive::open(data).unwrap())
    }

    #[test]
    fn test_archive_mount_paths() {
        let mount = archive_mount();
        assert_eq!(mount.root(), "/MyMod/Gear");
        assert!(mount.exists("mymod\\gear\\data\\JACKET.P3D"));
        assert!(mount.exists("/mymod/gear/data"));
        assert!(!mount.exists("/mymod/gear/missing.paa"));

        let node = mount.get_node("/MYMOD/GEAR/DATA/jacket_co.paa").unwrap();
        assert_eq!(node.path, "/MyMod/Gear/Data/jacket_co.paa");
        assert_eq!(node.size, 3);
        assert_eq!(node.mount_id, 3);
    }

    #[test]
    fn test_archive_mount_read_and_list() {
        let mount = archive_mount();
        assert_eq!(&mount.read_file("/mymod/gear/config.cpp").unwrap()[..], b"class CfgPatches {};");
        assert!(matches!(
            mount.read_file("/mymod/gear/none.cpp"),
            Err(MountError::PathNotFound { .. })
        ));

        let listing = mount.list_directory("/mymod/gear").unwrap();
        let names: Vec<_> = listing.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Data", "config.cpp"]);
        assert!(listing[0].is_directory());
        assert_eq!(mount.file_count(), 3);
    }

    #[test]
    fn test_archive_without_prefix() {
        let data = stored_pbo(None, &[("a.txt", b"a")]);
        let mount = ArchiveMount::new(0, "x", PboArchive::open(data).unwrap());
        assert_eq!(mount.root(), "/");
        assert!(mount.exists("/A.TXT"));
    }

    #[test]
    fn test_filesystem_mount() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("mymod/data")).unwrap();
        std::fs::write(dir.path().join("mymod/data/Shirt_CO.paa"), b"paa").unwrap();
        std::fs::write(dir.path().join("mymod/packed.pbo"), b"pbo").unwrap();

        let mount = FilesystemMount::new(1, "loose", dir.path()).unwrap();
        assert_eq!(mount.file_count(), 2);
        assert!(mount.exists("\\MYMOD\\DATA\\shirt_co.PAA"));
        assert_eq!(&mount.read_file("/mymod/data/shirt_co.paa").unwrap()[..], b"paa");

        let loose = FilesystemMount::excluding_kinds(2, "loose", dir.path(), &[FileKind::Archive]).unwrap();
        assert_eq!(loose.file_count(), 1);
        assert!(!loose.exists("/mymod/packed.pbo"));
    }

    #[test]
    fn test_filesystem_mount_missing_root() {
        let err = FilesystemMount::new(0, "x", "/definitely/not/here").err().unwrap();
        assert!(matches!(err, MountError::NotFound(_)));
        let core: modbreaker_core::Error = err.into();
        assert!(matches!(core, modbreaker_core::Error::MountFailed(_)));
    }
}
