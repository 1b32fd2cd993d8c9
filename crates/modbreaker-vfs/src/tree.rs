// modbreaker-vfs/src/tree.rs
//! One view over several mounts
//!
//! Mounts are consulted in priority order; for a path present in several
//! mounts the highest priority wins.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use modbreaker_parsers::pbo::PboArchive;
use modbreaker_parsers::signature::{detect_named, FileFormat, FileKind};
use modbreaker_parsers::ParseOptions;

use crate::mount::{ArchiveMount, FilesystemMount, MountError, MountPoint, MountResult};
use crate::node::VfsNode;
use crate::path::{self, is_under, path_key};
use crate::search::SearchQuery;

/// What [`VfsTree::mount_folder`] mounted
#[derive(Debug, Clone, Default, Serialize)]
pub struct MountSummary {
    pub archives: usize,
    pub nested_archives: usize,
    pub loose_files: usize,
    /// Archives that could not be opened, with the reason
    pub failed: Vec<(String, String)>,
}

/// Layered archives and folders of one mod setup
pub struct VfsTree {
    /// Highest priority first
    mounts: RwLock<Vec<Arc<dyn MountPoint>>>,
    next_id: AtomicUsize,
}

impl VfsTree {
    pub fn new() -> Self {
        Self {
            mounts: RwLock::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Reserve an id for a new mount
    pub fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn add_mount(&self, mount: Arc<dyn MountPoint>) {
        let mut mounts = self.mounts.write();
        mounts.push(mount);

        // Sort by priority (descending); stable, so equal priorities keep mount order
        mounts.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.read().len()
    }

    /// Mount one PBO file, then the PBOs nested inside it (one level)
    pub fn mount_archive_file(&self, archive_path: &Path, options: &ParseOptions) -> MountResult<usize> {
        let mount = ArchiveMount::open(self.next_id(), archive_path, options)?;
        let nested = self.mount_nested(&mount, options);
        self.add_mount(Arc::new(mount));
        Ok(nested)
    }

    fn mount_nested(&self, outer: &ArchiveMount, options: &ParseOptions) -> usize {
        let mut mounted = 0;

        for (vfs_path, entry) in outer.nested_archives() {
            let data = match outer.archive().extract(entry) {
                Ok(data) => data,
                Err(e) => {
                    warn!(entry = %vfs_path, error = %e, "nested archive not extractable");
                    continue;
                }
            };
            if detect_named(&data, &entry.name) != FileFormat::Archive {
                warn!(entry = %vfs_path, "nested .pbo has no PBO signature");
                continue;
            }

            match PboArchive::open_with_options(data, &options.archive) {
                Ok(archive) => {
                    // Nested archives without a prefix live next to their container entry
                    let root = match archive.prefix() {
                        Some(prefix) => path::normalize_path(prefix),
                        // Entry names of this kind end in ".pbo"
                        None => path::normalize_path(vfs_path.get(..vfs_path.len().saturating_sub(4)).unwrap_or(&vfs_path)),
                    };
                    let mount = ArchiveMount::with_root(self.next_id(), vfs_path.clone(), archive, &root);
                    self.add_mount(Arc::new(mount));
                    mounted += 1;
                }
                Err(e) => warn!(entry = %vfs_path, error = %e, "nested archive not readable"),
            }
        }
        mounted
    }

    /// Mount a mod folder: every PBO below it (and their nested PBOs) plus
    /// the loose files next to them. Unreadable archives are reported in
    /// the summary, not raised.
    pub fn mount_folder(&self, folder: &Path, options: &ParseOptions) -> MountResult<MountSummary> {
        if !folder.is_dir() {
            return Err(MountError::NotFound(folder.display().to_string()));
        }

        let mut summary = MountSummary::default();
        let mut archives: Vec<_> = WalkDir::new(folder)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && FileKind::from_name(&e.path().to_string_lossy()) == FileKind::Archive)
            .map(|e| e.into_path())
            .collect();
        archives.sort();

        for archive_path in archives {
            match self.mount_archive_file(&archive_path, options) {
                Ok(nested) => {
                    summary.archives += 1;
                    summary.nested_archives += nested;
                }
                Err(e) => {
                    warn!(archive = %archive_path.display(), error = %e, "skipping archive");
                    summary.failed.push((archive_path.display().to_string(), e.to_string()));
                }
            }
        }

        let loose = FilesystemMount::excluding_kinds(self.next_id(), folder.display().to_string(), folder, &[FileKind::Archive])?;
        summary.loose_files = loose.file_count();
        if loose.file_count() > 0 {
            self.add_mount(Arc::new(loose));
        }

        info!(
            folder = %folder.display(),
            archives = summary.archives,
            nested = summary.nested_archives,
            loose = summary.loose_files,
            failed = summary.failed.len(),
            "mounted mod folder"
        );
        Ok(summary)
    }

    pub fn exists(&self, path: &str) -> bool {
        let normalized = path::normalize_path(path);
        self.mounts.read().iter().any(|m| m.exists(&normalized))
    }

    /// Node from the highest-priority mount that has `path`
    pub fn get_node(&self, path: &str) -> MountResult<VfsNode> {
        let normalized = path::normalize_path(path);
        self.mounts
            .read()
            .iter()
            .find_map(|m| m.get_node(&normalized).ok())
            .ok_or(MountError::PathNotFound { path: normalized })
    }

    /// Read a whole file from the highest-priority mount that has it
    pub fn read_file(&self, path: &str) -> MountResult<Bytes> {
        let normalized = path::normalize_path(path);
        let mounts = self.mounts.read();

        let mut last_error = None;
        for mount in mounts.iter() {
            match mount.read_file(&normalized) {
                Ok(data) => return Ok(data),
                Err(MountError::PathNotFound { .. }) => {}
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or(MountError::PathNotFound { path: normalized }))
    }

    /// Every visible file, one node per path, sorted by path
    pub fn files(&self) -> Vec<VfsNode> {
        let mut merged = BTreeMap::new();
        for mount in self.mounts.read().iter() {
            for node in mount.files() {
                merged.entry(path_key(&node.path)).or_insert(node);
            }
        }
        merged.into_values().collect()
    }

    /// Visible files anywhere below a directory
    pub fn files_under(&self, dir: &str) -> Vec<VfsNode> {
        let dir = path_key(dir);
        self.files()
            .into_iter()
            .filter(|node| is_under(&path_key(&node.path), &dir))
            .collect()
    }

    /// Files matching a query, sorted by path
    pub fn search(&self, query: &SearchQuery) -> Vec<VfsNode> {
        let candidates = match &query.under {
            Some(dir) => self.files_under(dir),
            None => self.files(),
        };
        candidates.into_iter().filter(|node| query.matches(node)).collect()
    }

}

impl Default for VfsTree {
    fn default() -> Self {
        Self::new()
    }
}
