// modbreaker-parsers/src/lib.rs
//! modbreaker-parsers
//!
//! Readers for the file formats found in DayZ mod packages.
//!
//! # Supported Formats
//!
//! | Format | Extension            | Description |
//! |--------|----------------------|-------------|
//! | PBO    | `.pbo`               | Mod archive (stored or LZSS-packed entries) |
//! | P3D    | `.p3d`               | Mesh, editable (MLOD) or binarized (ODOL) |
//! | Config | `.bin` `.cpp` `.hpp` | Class declarations, rapified or text |
//! | PAA    | `.paa` `.pac`        | Texture (header only) |
//! | RVMAT  | `.rvmat`             | Material, rapified or text |
//! | Types  | `.xml`               | Central economy item table |
//!
//! # Example
//!
//! ```rust,ignore
//! use modbreaker_parsers::{PboParser, Parser};
//!
//! let parser = PboParser::new();
//! let archive = parser.parse_file("@MyMod/addons/clothing.pbo".as_ref())?;
//!
//! println!("Found {} entries", archive.entry_count());
//! ```

pub mod config;
pub mod economy;
pub mod logging;
pub mod p3d;
pub mod paa;
pub mod pbo;
pub mod reader;
pub mod rvmat;
pub mod signature;
pub mod traits;

// Re-export main types
pub use traits::{read_source, ParseError, ParseOptions, ParseResult, Parser};

pub use config::{
    ClassHierarchy, ClassId, ConfigClass, ConfigDiagnostics, ConfigOptions, ConfigReader, ConfigReport,
    ConfigSection, ConfigTier, ConfigValue,
};
pub use economy::{read_types, EconomyError, EconomyItem, EconomyTable, TypesXmlParser};
pub use p3d::{parse_mesh, MeshDiagnostics, MeshError, MeshOptions, MeshRecord, MeshValidity, MeshVariant, P3dParser};
pub use paa::{PaaFormat, PaaInfo, PaaParser};
pub use pbo::{ArchiveError, ArchiveOptions, PackingMethod, PboArchive, PboEntry, PboParser};
pub use rvmat::{MaterialInfo, RvmatParser};
pub use signature::{detect, detect_named, fold_case, FileFormat, FileKind};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
