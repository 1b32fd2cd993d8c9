// modbreaker-catalog/src/entry.rs
//! Catalog records

use std::sync::Arc;

use serde::Serialize;

use modbreaker_core::BoundingBox;
use modbreaker_parsers::config::{ConfigClass, ConfigSection, ConfigValue, PropertyMap};
use modbreaker_parsers::economy::EconomyItem;
use modbreaker_parsers::p3d::{MeshDiagnostics, MeshRecord, MeshValidity, MeshVariant};
use modbreaker_vfs::{SidecarKind, SidecarReference};

/// How a class's `model` found its mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JoinMethod {
    /// Same VFS path, ignoring case and separators
    Path,
    /// Only one mounted mesh has the model's file stem
    Stem,
    /// The model names no mounted mesh, or several share its stem
    Unmatched,
    /// The class has no `model`
    NoModel,
}

impl JoinMethod {
    pub fn is_joined(&self) -> bool {
        matches!(self, JoinMethod::Path | JoinMethod::Stem)
    }
}

/// Geometry counts of a joined mesh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshSummary {
    /// VFS path of the mesh
    pub path: String,
    pub variant: MeshVariant,
    pub validity: MeshValidity,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub bounding_box: Option<BoundingBox>,
    pub dropped_triangles: usize,
    pub truncated_triangles: usize,
}

impl MeshSummary {
    pub fn new(path: impl Into<String>, record: &MeshRecord, diagnostics: &MeshDiagnostics) -> Self {
        Self {
            path: path.into(),
            variant: record.variant,
            validity: record.validity,
            vertex_count: record.vertex_count(),
            triangle_count: record.triangle_count(),
            bounding_box: record.bounding_box,
            dropped_triangles: diagnostics.dropped_triangles,
            truncated_triangles: diagnostics.truncated_triangles,
        }
    }
}

/// One class joined to its mesh and sidecars
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    /// The class as declared
    pub class: ConfigClass,
    /// VFS path of the config it came from
    pub source: String,
    /// Own properties over inherited ones
    pub properties: PropertyMap,
    /// Effective `model` as written
    pub model: Option<String>,
    pub join: JoinMethod,
    pub mesh: Option<MeshSummary>,
    /// Full geometry, when requested; shared between classes using one mesh
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Arc<MeshRecord>>,
    pub sidecars: Vec<SidecarReference>,
    /// Spawn record from the mod's `types.xml`, matched by class name
    pub economy: Option<EconomyItem>,
}

impl CatalogEntry {
    pub fn name(&self) -> &str {
        &self.class.name
    }

    pub fn section(&self) -> ConfigSection {
        self.class.section
    }

    pub fn parent(&self) -> Option<&str> {
        self.class.parent.as_deref()
    }

    pub fn has_mesh(&self) -> bool {
        self.mesh.is_some()
    }

    /// Effective property by name, ignoring case
    pub fn property(&self, name: &str) -> Option<&ConfigValue> {
        self.properties.get(name)
    }

    pub fn textures(&self) -> impl Iterator<Item = &SidecarReference> {
        self.sidecars.iter().filter(|s| s.kind == SidecarKind::Texture)
    }

    pub fn materials(&self) -> impl Iterator<Item = &SidecarReference> {
        self.sidecars.iter().filter(|s| s.kind == SidecarKind::Material)
    }
}
