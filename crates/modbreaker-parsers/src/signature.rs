// modbreaker-parsers/src/signature.rs
//! Format detection by magic bytes, with a file-name hint as fallback.
//!
//! | Magic                      | Format                    |
//! |----------------------------|---------------------------|
//! | `00 73 72 65 56` (`\0sreV`)| PBO archive               |
//! | `MLOD`                     | P3D, editable (MLOD)      |
//! | `ODOL`                     | P3D, binarized (ODOL)     |
//! | `00 72 61 50` (`\0raP`)    | rapified config / rvmat   |
//! | PAA type tag + `GGAT`      | PAA texture               |
//!
//! All file-name comparisons in the workspace go through [`fold_case`].
//! Entry names inside PBOs use backslashes and arbitrary casing
//! (`Data\Model.P3D`, `config.BIN`), so ad hoc `ends_with` checks miss
//! real files.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Shortest buffer that can carry any recognised magic
pub const MIN_HEADER_LEN: usize = 4;

/// PBO header extension entry: empty name followed by the `Vers` method
pub const PBO_MAGIC: &[u8] = b"\0sreV";
pub const MLOD_MAGIC: &[u8; 4] = b"MLOD";
pub const ODOL_MAGIC: &[u8; 4] = b"ODOL";
pub const RAP_MAGIC: &[u8; 4] = b"\0raP";

/// PAA type tags (little-endian u16 at offset 0)
const PAA_TYPE_TAGS: &[u16] = &[0xFF01, 0xFF02, 0xFF03, 0xFF04, 0xFF05, 0x4444, 0x1555, 0x8080, 0x8888];
const PAA_TAGG: &[u8; 4] = b"GGAT";

/// Result of signature detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileFormat {
    /// PBO container
    Archive,
    /// P3D mesh, MLOD variant
    MlodMesh,
    /// P3D mesh, ODOL variant
    OdolMesh,
    /// config.bin (rapified) or config.cpp (text)
    Config,
    /// PAA texture
    Texture,
    /// RVMAT material
    Material,
    /// XML document, such as an economy `types.xml`
    Xml,
    Unknown,
}

impl FileFormat {
    pub fn is_mesh(&self) -> bool {
        matches!(self, FileFormat::MlodMesh | FileFormat::OdolMesh)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileFormat::Archive => "PBO archive",
            FileFormat::MlodMesh => "P3D (MLOD)",
            FileFormat::OdolMesh => "P3D (ODOL)",
            FileFormat::Config => "config",
            FileFormat::Texture => "PAA texture",
            FileFormat::Material => "RVMAT material",
            FileFormat::Xml => "XML document",
            FileFormat::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// What a file is by name alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Archive,
    Mesh,
    Config,
    Texture,
    Material,
    Xml,
    Other,
}

impl FileKind {
    /// Suffixes recognised for each kind, already case-folded
    pub const SUFFIXES: &'static [(&'static str, FileKind)] = &[
        ("pbo", FileKind::Archive),
        ("p3d", FileKind::Mesh),
        ("bin", FileKind::Config),
        ("cpp", FileKind::Config),
        ("hpp", FileKind::Config),
        ("paa", FileKind::Texture),
        ("pac", FileKind::Texture),
        ("rvmat", FileKind::Material),
        ("xml", FileKind::Xml),
    ];

    /// Classify a path or entry name by its extension
    pub fn from_name(name: &str) -> Self {
        extension_of(name)
            .map(|ext| Self::from_extension(&ext))
            .unwrap_or(FileKind::Other)
    }

    /// Classify a bare extension (with or without the leading dot)
    pub fn from_extension(ext: &str) -> Self {
        let ext = fold_case(ext.trim_start_matches('.'));
        Self::SUFFIXES
            .iter()
            .find(|(suffix, _)| *suffix == ext)
            .map(|(_, kind)| *kind)
            .unwrap_or(FileKind::Other)
    }

    /// Config sources are only recognised by name when they are called
    /// `config.*`; any other `.bin` is left alone.
    pub fn is_config_name(name: &str) -> bool {
        Self::from_name(name) == FileKind::Config && file_stem(&fold_case(name)) == "config"
    }
}

/// The one case normalisation used for every name comparison.
///
/// ASCII-lowercases and turns backslashes into forward slashes. Non-ASCII
/// characters pass through untouched.
pub fn fold_case(name: &str) -> String {
    name.chars()
        .map(|c| if c == '\\' { '/' } else { c.to_ascii_lowercase() })
        .collect()
}

/// Case-folded extension of the last path component, without the dot
pub fn extension_of(name: &str) -> Option<String> {
    let folded = fold_case(name);
    let file = folded.rsplit('/').next().unwrap_or(&folded);
    match file.rfind('.') {
        Some(idx) if idx + 1 < file.len() => Some(file[idx + 1..].to_string()),
        _ => None,
    }
}

/// Case-insensitive suffix test (`suffix` may include the dot)
pub fn has_suffix(name: &str, suffix: &str) -> bool {
    fold_case(name).ends_with(&fold_case(suffix))
}

/// Last path component without its extension (either separator)
pub fn file_stem(path: &str) -> &str {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match file.rfind('.') {
        Some(idx) if idx > 0 => &file[..idx],
        _ => file,
    }
}

/// Classify a buffer.
///
/// Magic bytes decide whenever they are conclusive; the extension hint is
/// consulted only otherwise. Buffers shorter than [`MIN_HEADER_LEN`] are
/// always [`FileFormat::Unknown`].
pub fn detect(buffer: &[u8], extension_hint: Option<&str>) -> FileFormat {
    if buffer.len() < MIN_HEADER_LEN {
        return FileFormat::Unknown;
    }

    if let Some(format) = detect_magic(buffer) {
        return format;
    }

    match extension_hint.map(FileKind::from_extension) {
        Some(FileKind::Archive) => FileFormat::Archive,
        Some(FileKind::Config) => FileFormat::Config,
        Some(FileKind::Texture) => FileFormat::Texture,
        Some(FileKind::Material) => FileFormat::Material,
        Some(FileKind::Xml) => FileFormat::Xml,
        // Variant cannot be guessed without the magic
        Some(FileKind::Mesh) | Some(FileKind::Other) | None => FileFormat::Unknown,
    }
}

/// [`detect`] using the extension of an entry name or path
pub fn detect_named(buffer: &[u8], name: &str) -> FileFormat {
    detect(buffer, extension_of(name).as_deref())
}

fn detect_magic(buffer: &[u8]) -> Option<FileFormat> {
    if buffer.starts_with(PBO_MAGIC) {
        return Some(FileFormat::Archive);
    }

    match &buffer[..4] {
        m if m == MLOD_MAGIC => return Some(FileFormat::MlodMesh),
        m if m == ODOL_MAGIC => return Some(FileFormat::OdolMesh),
        m if m == RAP_MAGIC => return Some(FileFormat::Config),
        _ => {}
    }

    let tag = u16::from_le_bytes([buffer[0], buffer[1]]);
    if PAA_TYPE_TAGS.contains(&tag) && buffer.get(2..6) == Some(PAA_TAGG.as_slice()) {
        return Some(FileFormat::Texture);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_pbo_header() -> Vec<u8> {
        let mut data = PBO_MAGIC.to_vec();
        data.extend_from_slice(&[0u8; 16]);
        data
    }

    #[test]
    fn test_detect_by_magic() {
        assert_eq!(detect(&minimal_pbo_header(), None), FileFormat::Archive);
        assert_eq!(detect(b"MLOD\x01\x01\0\0", None), FileFormat::MlodMesh);
        assert_eq!(detect(b"ODOL\x07\0\0\0", None), FileFormat::OdolMesh);
        assert_eq!(detect(b"\0raP\0\0\0\0\x08\0\0\0", None), FileFormat::Config);
        assert_eq!(detect(b"\x01\xFFGGATCGVA", None), FileFormat::Texture);
    }

    #[test]
    fn test_magic_beats_hint() {
        assert_eq!(detect(b"ODOL\x07\0\0\0", Some("pbo")), FileFormat::OdolMesh);
        assert_eq!(detect(&minimal_pbo_header(), Some("p3d")), FileFormat::Archive);
    }

    #[test]
    fn test_hint_when_magic_inconclusive() {
        let text = b"class CfgVehicles {};";
        assert_eq!(detect(text, Some("cpp")), FileFormat::Config);
        assert_eq!(detect(text, Some(".BIN")), FileFormat::Config);
        assert_eq!(detect(text, Some("rvmat")), FileFormat::Material);
        assert_eq!(detect(text, Some("p3d")), FileFormat::Unknown);
        assert_eq!(detect(text, None), FileFormat::Unknown);
    }

    #[test]
    fn test_short_buffer_is_unknown() {
        assert_eq!(detect(b"", Some("pbo")), FileFormat::Unknown);
        assert_eq!(detect(b"MLO", Some("p3d")), FileFormat::Unknown);
    }

    #[test]
    fn test_extension_hint_case_insensitive() {
        let data = b"not a real header";
        let lower = detect(data, Some("pbo"));
        assert_eq!(lower, FileFormat::Archive);
        assert_eq!(detect(data, Some("PBO")), lower);
        assert_eq!(detect(data, Some("Pbo")), lower);
    }

    #[test]
    fn test_paa_tag_needs_tagg() {
        // 0x4444 alone is just "DD"
        assert_eq!(detect(b"DDxxxxxx", None), FileFormat::Unknown);
    }

    #[test]
    fn test_fold_case() {
        assert_eq!(fold_case("DZ\\Weapons\\Rifle.P3D"), "dz/weapons/rifle.p3d");
        assert_eq!(fold_case("Café"), "café");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a\\b\\Model.P3D").as_deref(), Some("p3d"));
        assert_eq!(extension_of("dir.v2/file").as_deref(), None);
        assert_eq!(extension_of("trailing.").as_deref(), None);
    }

    #[test]
    fn test_file_kind_from_name() {
        assert_eq!(FileKind::from_name("Addons\\Weapons.PBO"), FileKind::Archive);
        assert_eq!(FileKind::from_name("data/rifle_co.Paa"), FileKind::Texture);
        assert_eq!(FileKind::from_name("data/rifle.RVMAT"), FileKind::Material);
        assert_eq!(FileKind::from_name("db\\Types.XML"), FileKind::Xml);
        assert_eq!(FileKind::from_name("readme.txt"), FileKind::Other);
        assert!(FileKind::is_config_name("weapons\\CONFIG.BIN"));
        assert!(!FileKind::is_config_name("weapons\\stringtable.bin"));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("\\dz\\weapons\\rifle.p3d"), "rifle");
        assert_eq!(file_stem("a/b/rifle_co.paa"), "rifle_co");
        assert_eq!(file_stem("noext"), "noext");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }

    /// Every upper/lower spelling of a suffix
    fn case_permutations(s: &str) -> Vec<String> {
        let chars: Vec<char> = s.chars().collect();
        (0..1u32 << chars.len())
            .map(|mask| {
                chars
                    .iter()
                    .enumerate()
                    .map(|(i, c)| if mask & (1 << i) != 0 { c.to_ascii_uppercase() } else { *c })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_every_suffix_permutation_classifies_identically() {
        for (suffix, kind) in FileKind::SUFFIXES {
            for spelling in case_permutations(suffix) {
                let name = format!("Addons\\Data\\file.{}", spelling);
                assert_eq!(FileKind::from_name(&name), *kind, "{}", name);
                assert!(has_suffix(&name, &format!(".{}", suffix)));
                assert_eq!(
                    detect(b"plain text body", Some(spelling.as_str())),
                    detect(b"plain text body", Some(*suffix)),
                );
            }
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_fold_case_idempotent(name in "[a-zA-Z0-9_\\\\/.]{0,40}") {
                let once = fold_case(&name);
                prop_assert_eq!(fold_case(&once), once.clone());
                prop_assert!(!once.contains('\\'));
            }

            #[test]
            fn test_random_suffix_casing(
                idx in 0..FileKind::SUFFIXES.len(),
                mask in any::<u8>(),
                stem in "[a-zA-Z0-9_]{1,12}",
            ) {
                let (suffix, kind) = FileKind::SUFFIXES[idx];
                let spelled: String = suffix
                    .chars()
                    .enumerate()
                    .map(|(i, c)| if mask & (1 << i) != 0 { c.to_ascii_uppercase() } else { c })
                    .collect();
                let name = format!("{}.{}", stem, spelled);
                prop_assert_eq!(FileKind::from_name(&name), kind);
            }

            #[test]
            fn test_detect_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
                let _ = detect(&data, Some("pbo"));
                let _ = detect(&data, None);
            }
        }
    }
}
