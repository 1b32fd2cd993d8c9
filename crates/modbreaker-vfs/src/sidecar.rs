// modbreaker-vfs/src/sidecar.rs
//! Sidecar resolution
//!
//! A mesh (or a class's `model`) has textures and materials living next to
//! it, named after it with DayZ suffixes:
//!
//! ```text
//! mymod/gear/jacket.p3d
//! mymod/gear/data/jacket_co.paa      suffixed
//! mymod/gear/data/jacket_nohq.paa    suffixed
//! mymod/gear/data/Jacket.rvmat       normalized
//! ```
//!
//! Materials list further textures by path; those are added as
//! `Referenced` even when they live elsewhere in the VFS.

use std::fmt;

use serde::Serialize;
use tracing::{debug, trace};

use modbreaker_parsers::config::{ClassHierarchy, ClassId, ConfigOptions, HierarchyError, PropertyMap};
use modbreaker_parsers::paa::{read_info, PaaFormat};
use modbreaker_parsers::rvmat::read_material;
use modbreaker_parsers::signature::{file_stem, fold_case, FileKind};

use crate::node::VfsNode;
use crate::path::{normalize_path, parent_path, path_key};
use crate::tree::VfsTree;

/// Class properties that name textures and materials directly
const HIDDEN_TEXTURES: &str = "hiddenSelectionsTextures";
const HIDDEN_MATERIALS: &str = "hiddenSelectionsMaterials";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SidecarKind {
    Texture,
    Material,
}

impl SidecarKind {
    pub fn from_kind(kind: FileKind) -> Option<Self> {
        match kind {
            FileKind::Texture => Some(SidecarKind::Texture),
            FileKind::Material => Some(SidecarKind::Material),
            _ => None,
        }
    }
}

impl fmt::Display for SidecarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SidecarKind::Texture => "texture",
            SidecarKind::Material => "material",
        })
    }
}

/// How a sidecar was tied to its base, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MatchQuality {
    /// Same stem, same case
    Exact,
    /// Same stem ignoring case
    Normalized,
    /// Stem followed by `_suffix` (`_co`, `_nohq`, `_smdi`, ...)
    Suffixed,
    /// Named by a material or a class property
    Referenced,
}

impl fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchQuality::Exact => "exact",
            MatchQuality::Normalized => "normalized",
            MatchQuality::Suffixed => "suffixed",
            MatchQuality::Referenced => "referenced",
        })
    }
}

/// One texture or material tied to a mesh or class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SidecarReference {
    pub kind: SidecarKind,
    /// VFS path, case as mounted (as written when not mounted)
    pub path: String,
    /// Byte size, `None` when the file is not in the VFS
    pub size: Option<u64>,
    pub quality: MatchQuality,
    /// Textures a material references, in stage order
    pub textures: Vec<String>,
    /// Largest mipmap when the texture header is readable
    pub dimensions: Option<(u16, u16)>,
    pub format: Option<PaaFormat>,
    /// Material or class that named this sidecar
    pub referenced_by: Option<String>,
}

impl SidecarReference {
    fn new(kind: SidecarKind, path: String, quality: MatchQuality) -> Self {
        Self {
            kind,
            path,
            size: None,
            quality,
            textures: Vec::new(),
            dimensions: None,
            format: None,
            referenced_by: None,
        }
    }

    pub fn is_present(&self) -> bool {
        self.size.is_some()
    }
}

/// How `candidate` (a file stem) relates to `base` (a mesh stem)
pub fn match_quality(base: &str, candidate: &str) -> Option<MatchQuality> {
    if base.is_empty() {
        return None;
    }
    if candidate == base {
        return Some(MatchQuality::Exact);
    }

    let (base, candidate) = (fold_case(base), fold_case(candidate));
    if candidate == base {
        return Some(MatchQuality::Normalized);
    }
    candidate
        .strip_prefix(&base)
        .filter(|rest| rest.len() > 1 && rest.starts_with('_'))
        .map(|_| MatchQuality::Suffixed)
}

/// Finds the textures and materials of meshes and classes in a [`VfsTree`]
#[derive(Debug, Clone)]
pub struct SidecarResolver {
    options: ConfigOptions,
    read_texture_headers: bool,
}

impl Default for SidecarResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SidecarResolver {
    pub fn new() -> Self {
        Self::with_options(ConfigOptions::default())
    }

    /// Options used when decoding materials
    pub fn with_options(options: ConfigOptions) -> Self {
        Self {
            options,
            read_texture_headers: true,
        }
    }

    /// Skip reading PAA headers; only sizes are reported
    pub fn without_texture_headers(mut self) -> Self {
        self.read_texture_headers = false;
        self
    }

    /// Sidecars of a mesh path or model reference, sorted by path.
    ///
    /// Searches the base's directory subtree. A base whose directory is not
    /// mounted yields an empty set.
    pub fn resolve(&self, tree: &VfsTree, base_path: &str) -> Vec<SidecarReference> {
        let base = normalize_path(base_path);
        let stem = file_stem(&base);
        let dir = parent_path(&base).unwrap_or_else(|| "/".to_string());

        let mut found = Vec::new();
        for node in tree.files_under(&dir) {
            let Some(kind) = SidecarKind::from_kind(node.kind()) else {
                continue;
            };
            let Some(quality) = match_quality(stem, file_stem(&node.name)) else {
                continue;
            };
            trace!(base = %base, sidecar = %node.path, %quality, "sidecar match");
            self.push_reference(tree, &mut found, kind, &node.path, quality, None);
        }

        debug!(base = %base, sidecars = found.len(), "resolved sidecars");
        finish(found)
    }

    /// Sidecars of a class: those of its effective `model` plus every path
    /// in its `hiddenSelectionsTextures[]` / `hiddenSelectionsMaterials[]`
    pub fn resolve_class(
        &self,
        tree: &VfsTree,
        hierarchy: &ClassHierarchy,
        id: ClassId,
    ) -> Result<Vec<SidecarReference>, HierarchyError> {
        let class_name = hierarchy
            .get(id)
            .map(|c| c.name.clone())
            .ok_or(HierarchyError::UnknownId(id.0))?;

        let mut found = match hierarchy.model_path(id)? {
            Some(model) => self.resolve(tree, &model),
            None => Vec::new(),
        };

        let resolved = hierarchy.effective_properties(id)?;
        found.extend(self.resolve_selections(tree, &resolved.properties, &class_name));
        Ok(finish(found))
    }

    /// Textures and materials named by `hiddenSelections*` properties,
    /// sorted by path. `owner` is recorded as `referenced_by`.
    pub fn resolve_selections(&self, tree: &VfsTree, properties: &PropertyMap, owner: &str) -> Vec<SidecarReference> {
        let mut found = Vec::new();
        for (property, kind) in [
            (HIDDEN_TEXTURES, SidecarKind::Texture),
            (HIDDEN_MATERIALS, SidecarKind::Material),
        ] {
            let Some(value) = properties.get(property) else {
                continue;
            };
            for path in value.strings() {
                if is_file_reference(path) {
                    self.push_reference(tree, &mut found, kind, path, MatchQuality::Referenced, Some(owner));
                }
            }
        }
        finish(found)
    }

    /// Add one sidecar; a material also adds the textures it names
    fn push_reference(
        &self,
        tree: &VfsTree,
        out: &mut Vec<SidecarReference>,
        kind: SidecarKind,
        path: &str,
        quality: MatchQuality,
        referenced_by: Option<&str>,
    ) {
        let node = tree.get_node(path).ok().filter(VfsNode::is_file);
        let display = node.as_ref().map_or_else(|| normalize_path(path), |n| n.path.clone());

        let mut reference = SidecarReference::new(kind, display, quality);
        reference.referenced_by = referenced_by.map(str::to_string);
        reference.size = node.as_ref().map(|n| n.size);

        if node.is_some() {
            match kind {
                SidecarKind::Texture if self.read_texture_headers => self.read_texture(tree, &mut reference),
                SidecarKind::Material => self.read_material(tree, &mut reference),
                SidecarKind::Texture => {}
            }
        }

        let textures = reference.textures.clone();
        let material = reference.path.clone();
        out.push(reference);

        for texture in textures {
            let mut nested = SidecarReference::new(SidecarKind::Texture, String::new(), MatchQuality::Referenced);
            let node = tree.get_node(&texture).ok().filter(VfsNode::is_file);
            nested.path = node.as_ref().map_or_else(|| normalize_path(&texture), |n| n.path.clone());
            nested.size = node.as_ref().map(|n| n.size);
            nested.referenced_by = Some(material.clone());
            if node.is_some() && self.read_texture_headers {
                self.read_texture(tree, &mut nested);
            }
            out.push(nested);
        }
    }

    fn read_texture(&self, tree: &VfsTree, reference: &mut SidecarReference) {
        let info = tree
            .read_file(&reference.path)
            .map_err(|e| e.to_string())
            .and_then(|data| read_info(&data).map_err(|e| e.to_string()));

        match info {
            Ok(info) => {
                reference.dimensions = Some((info.width, info.height));
                reference.format = Some(info.format);
            }
            Err(e) => trace!(texture = %reference.path, error = %e, "texture header unreadable"),
        }
    }

    fn read_material(&self, tree: &VfsTree, reference: &mut SidecarReference) {
        match tree.read_file(&reference.path) {
            Ok(data) => {
                let info = read_material(&data, &self.options);
                reference.textures = info.textures.into_vec();
            }
            Err(e) => trace!(material = %reference.path, error = %e, "material unreadable"),
        }
    }
}

/// Procedural sources (`#(argb,...)`) and empty strings name no file
fn is_file_reference(path: &str) -> bool {
    let path = path.trim();
    !path.is_empty() && !path.starts_with('#')
}

/// Combine reference sets, keeping the best match per path and kind
pub fn merge_references(sets: impl IntoIterator<Item = Vec<SidecarReference>>) -> Vec<SidecarReference> {
    finish(sets.into_iter().flatten().collect())
}

/// Sort by path and keep the best match per path and kind
fn finish(mut found: Vec<SidecarReference>) -> Vec<SidecarReference> {
    found.sort_by(|a, b| {
        path_key(&a.path)
            .cmp(&path_key(&b.path))
            .then(a.kind.cmp(&b.kind))
            .then(a.quality.cmp(&b.quality))
    });
    found.dedup_by(|later, kept| later.kind == kept.kind && path_key(&later.path) == path_key(&kept.path));
    found
}
