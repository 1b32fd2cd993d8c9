// modbreaker-core/src/types.rs
//! Common types used across ModBreaker
//!
//! Geometry value types shared by the mesh parser and the catalog, and the
//! pipeline stage tag carried by hard errors.

use serde::{Deserialize, Serialize};

/// 3D vector (vertex position, bounds corner)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn from_array(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point, `None` for an empty set.
    pub fn from_points(points: &[[f32; 3]]) -> Option<Self> {
        let first = Vec3::from_array(*points.first()?);
        let mut bbox = Self::new(first, first);
        for p in &points[1..] {
            bbox.expand(Vec3::from_array(*p));
        }
        Some(bbox)
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Pipeline stage a hard error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// PBO signature / header extension
    ArchiveHeader,
    /// PBO entry table
    ArchiveTable,
    /// Reading or unpacking one PBO entry
    ArchiveExtract,
    /// P3D fixed header
    MeshHeader,
    /// Texture header read during sidecar lookup
    Sidecar,
    /// Economy `types.xml` table
    Economy,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::ArchiveHeader => "archive header",
            Stage::ArchiveTable => "archive table",
            Stage::ArchiveExtract => "archive extract",
            Stage::MeshHeader => "mesh header",
            Stage::Sidecar => "sidecar",
            Stage::Economy => "economy table",
        };
        f.write_str(name)
    }
}
