// modbreaker-parsers/tests/pbo_tests.rs
//! Integration tests for the PBO archive reader
//!
//! These tests cover:
//! - Extraction of stored and packed entries
//! - Determinism and declared-size guarantees
//! - Nested archives detected by signature regardless of name casing
//! - Hard errors for corrupt tables and out-of-bounds entries

mod common;

use bytes::Bytes;
use proptest::prelude::*;

use common::{build_pbo, packed, stored_pbo};
use modbreaker_parsers::pbo::{ArchiveError, ArchiveOptions, PackingMethod, PboArchive, PboParser};
use modbreaker_parsers::signature::{detect_named, FileFormat, FileKind};
use modbreaker_parsers::{ParseError, Parser};

const RIFLE_CFG: &[u8] = b"class CfgWeapons { class Rifle : Weapon { model = \"\\riflepath\\model.p3d\"; }; };";

fn mixed_archive() -> Vec<u8> {
    let (method, original, packed_cfg) = packed(RIFLE_CFG);
    build_pbo(
        &[("prefix", "riflemod"), ("version", "1.2")],
        &[
            ("config.cpp", method, original, &packed_cfg),
            ("data\\rifle.p3d", 0, 0, b"MLOD\x01\x01\0\0\x01\0\0\0\0\0\0\0"),
            ("data\\rifle_co.paa", 0, 0, &[0x01, 0xFF, b'G', b'G', b'A', b'T']),
        ],
    )
}

#[test]
fn test_extract_stored_and_packed() {
    let archive = PboArchive::open(Bytes::from(mixed_archive())).unwrap();
    assert_eq!(archive.entry_count(), 3);
    assert_eq!(archive.prefix(), Some("riflemod"));

    let config = archive.extract_by_name("CONFIG.CPP").unwrap();
    assert_eq!(&config[..], RIFLE_CFG);
    assert_eq!(archive.get("config.cpp").unwrap().packing, PackingMethod::Packed);

    let mesh = archive.extract_by_name("Data\\Rifle.P3D").unwrap();
    assert_eq!(detect_named(&mesh, "rifle.p3d"), FileFormat::MlodMesh);
}

#[test]
fn test_utf8_entry_names() {
    let name = "модели\\куртка.p3d";
    let data = stored_pbo(&[(name, &b"MLOD"[..]), ("caf\u{e9}.paa", &b"PAA"[..])]);
    let archive = PboArchive::open(Bytes::from(data)).unwrap();

    let entry = archive.get(name).unwrap();
    assert_eq!(entry.name, name);
    assert_eq!(&archive.extract_by_name(name).unwrap()[..], b"MLOD");
    assert!(archive.get("café.paa").is_some());
}

#[test]
fn test_extracted_length_matches_original_size() {
    let archive = PboArchive::open(Bytes::from(mixed_archive())).unwrap();
    for entry in archive.list_entries() {
        let data = archive.extract(entry).unwrap();
        assert_eq!(data.len() as u64, u64::from(entry.original_size), "{}", entry.name);
    }
}

#[test]
fn test_extract_is_deterministic() {
    let data = Bytes::from(mixed_archive());
    let first = PboArchive::open(data.clone()).unwrap();
    let second = PboArchive::open(data).unwrap();

    for (a, b) in first.list_entries().iter().zip(second.list_entries()) {
        assert_eq!(a, b);
        let x = first.extract(a).unwrap();
        let y = first.extract(a).unwrap();
        let z = second.extract(b).unwrap();
        assert_eq!(x, y);
        assert_eq!(x, z);
    }
}

#[test]
fn test_nested_archives_any_casing() {
    let inner = stored_pbo(&[("a.txt", b"hello")]);
    let outer = stored_pbo(&[
        ("test1.pbo", &inner),
        ("test2.PBO", &inner),
        ("test3.Pbo", &inner),
    ]);

    let archive = PboArchive::open(Bytes::from(outer)).unwrap();
    assert_eq!(archive.entry_count(), 3);
    assert_eq!(archive.find_by_kind(FileKind::Archive).len(), 3);

    for entry in archive.list_entries() {
        let payload = archive.extract(entry).unwrap();
        assert_eq!(detect_named(&payload, &entry.name), FileFormat::Archive);

        let nested = PboArchive::open(payload).unwrap();
        assert_eq!(&nested.extract_by_name("A.TXT").unwrap()[..], b"hello");
    }
}

#[test]
fn test_last_entry_out_of_bounds() {
    let mut data = stored_pbo(&[("one.txt", b"first"), ("two.txt", b"second"), ("three.txt", b"third!")]);
    data.truncate(data.len() - 3);

    let archive = PboArchive::open(Bytes::from(data)).unwrap();
    assert_eq!(&archive.extract_by_name("one.txt").unwrap()[..], b"first");
    assert_eq!(&archive.extract_by_name("two.txt").unwrap()[..], b"second");

    let err = archive.extract_by_name("three.txt").unwrap_err();
    match err {
        ArchiveError::OutOfBounds { name, size, archive_len, offset } => {
            assert_eq!(name, "three.txt");
            assert_eq!(size, 6);
            assert!(offset + size > archive_len);
        }
        other => panic!("expected OutOfBounds, got {other:?}"),
    }
}

#[test]
fn test_invalid_signature() {
    let err = PboArchive::open(Bytes::from_static(b"PK\x03\x04 not a pbo")).unwrap_err();
    assert!(matches!(err, ArchiveError::InvalidSignature { .. }));

    let core: modbreaker_core::Error = err.into();
    assert_eq!(core.stage(), Some(modbreaker_core::Stage::ArchiveHeader));
}

#[test]
fn test_truncated_table() {
    let data = stored_pbo(&[("long_entry_name.txt", b"x")]);
    // Cut inside the first entry record
    let cut = data.len() - 21 - 1 - 10;
    let err = PboArchive::open(Bytes::copy_from_slice(&data[..cut])).unwrap_err();
    assert!(matches!(err, ArchiveError::TruncatedTable { entries_read: 0, .. }));
}

#[test]
fn test_corrupt_packed_entry() {
    let (method, _, packed_cfg) = packed(RIFLE_CFG);
    // Declares more output than the stream holds
    let data = build_pbo(&[], &[("config.cpp", method, RIFLE_CFG.len() as u32 + 50, &packed_cfg)]);
    let archive = PboArchive::open(Bytes::from(data)).unwrap();
    let err = archive.extract_by_name("config.cpp").unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptEntry { .. }));
}

#[test]
fn test_checksum_verification_toggle() {
    let (method, original, mut packed_cfg) = packed(RIFLE_CFG);
    let last = packed_cfg.len() - 1;
    packed_cfg[last] ^= 0xFF;
    let data = Bytes::from(build_pbo(&[], &[("config.cpp", method, original, &packed_cfg)]));

    let strict = PboArchive::open(data.clone()).unwrap();
    assert!(matches!(
        strict.extract_by_name("config.cpp"),
        Err(ArchiveError::CorruptEntry { .. })
    ));

    let lenient = PboArchive::open_with_options(
        data,
        &ArchiveOptions {
            verify_checksums: false,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(&lenient.extract_by_name("config.cpp").unwrap()[..], RIFLE_CFG);
}

#[test]
fn test_unsupported_packing() {
    let data = build_pbo(&[], &[("secret.bin", 0x456e_6372, 4, b"????"), ("plain.txt", 0, 0, b"ok")]);
    let archive = PboArchive::open(Bytes::from(data)).unwrap();

    let entry = archive.get("secret.bin").unwrap();
    assert!(matches!(entry.packing, PackingMethod::Unknown(0x456e_6372)));
    assert!(matches!(
        archive.extract(entry),
        Err(ArchiveError::UnsupportedPacking { method: 0x456e_6372, .. })
    ));
    assert_eq!(&archive.extract_by_name("plain.txt").unwrap()[..], b"ok");
    assert_eq!(archive.statistics().unsupported_count, 1);
}

#[test]
fn test_parser_trait_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Weapons.PBO");
    std::fs::write(&path, mixed_archive()).unwrap();

    let parser = PboParser::new();
    assert!(parser.can_parse("Weapons.PBO", &mixed_archive()[..16]));

    let archive = parser.parse_file(&path).unwrap();
    assert_eq!(archive.entry_count(), 3);

    let missing = parser.parse_file(&dir.path().join("missing.pbo")).unwrap_err();
    assert!(matches!(missing, ParseError::Io(_)));
}

proptest! {
    #[test]
    fn prop_arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        if let Ok(archive) = PboArchive::open(Bytes::from(data)) {
            for entry in archive.list_entries() {
                let _ = archive.extract(entry);
            }
        }
    }

    #[test]
    fn prop_stored_roundtrip(payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 1..6)) {
        let names: Vec<String> = (0..payloads.len()).map(|i| format!("data\\file{i}.bin")).collect();
        let files: Vec<(&str, &[u8])> = names.iter().map(String::as_str).zip(payloads.iter().map(Vec::as_slice)).collect();
        let archive = PboArchive::open(Bytes::from(stored_pbo(&files))).unwrap();

        prop_assert_eq!(archive.entry_count(), payloads.len());
        for (entry, payload) in archive.list_entries().iter().zip(&payloads) {
            prop_assert_eq!(&archive.extract(entry).unwrap()[..], payload.as_slice());
        }
    }
}
