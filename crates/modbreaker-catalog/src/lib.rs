// modbreaker-catalog/src/lib.rs
//! ModBreaker catalog
//!
//! Joins the classes recovered from every config in a mounted mod with the
//! meshes their `model` names and the textures and materials around them.
//!
//! ```no_run
//! use modbreaker_catalog::CatalogBuilder;
//! use std::path::Path;
//!
//! let catalog = CatalogBuilder::new().build_folder(Path::new("/path/to/@MyMod")).unwrap();
//! for entry in catalog.iter().filter(|e| e.has_mesh()) {
//!     println!("{} -> {:?}", entry.name(), entry.mesh.as_ref().map(|m| &m.path));
//! }
//! println!("{}", catalog.diagnostics);
//! ```

pub mod builder;
pub mod diagnostics;
pub mod entry;

pub use builder::{Catalog, CatalogBuilder, CatalogOptions};
pub use diagnostics::{CatalogDiagnostics, CatalogFailure};
pub use entry::{CatalogEntry, JoinMethod, MeshSummary};
