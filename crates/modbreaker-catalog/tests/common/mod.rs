// modbreaker-catalog/tests/common/mod.rs
//! On-disk mod fixtures

#![allow(dead_code)]

use std::path::Path;

use modbreaker_parsers::signature::PBO_MAGIC;

pub fn stored_pbo(prefix: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = PBO_MAGIC.to_vec();
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(b"prefix\0");
    out.extend_from_slice(prefix.as_bytes());
    out.extend_from_slice(&[0, 0]);
    for (name, data) in files {
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        for field in [0u32, 0, 0, 0, data.len() as u32] {
            out.extend_from_slice(&field.to_le_bytes());
        }
    }
    out.extend_from_slice(&[0u8; 21]);
    for (_, data) in files {
        out.extend_from_slice(data);
    }
    out
}

pub const QUAD: [[f32; 3]; 4] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];

/// MLOD with an optional u16 face block
pub fn mlod(vertices: &[[f32; 3]], faces: &[[u16; 3]]) -> Vec<u8> {
    let mut out = b"MLOD".to_vec();
    out.extend_from_slice(&0x101u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&(vertices.len() as u32).to_le_bytes());
    for vertex in vertices {
        for c in vertex {
            out.extend_from_slice(&c.to_le_bytes());
        }
    }
    if !faces.is_empty() {
        out.extend_from_slice(&(faces.len() as u32).to_le_bytes());
        for triangle in faces {
            for index in triangle {
                out.extend_from_slice(&index.to_le_bytes());
            }
        }
    }
    out
}

pub const GEAR_CONFIG: &str = r#"
class CfgPatches
{
    class MyMod_Gear
    {
        units[] = {};
        requiredAddons[] = {"DZ_Data"};
    };
};
class CfgVehicles
{
    class Jacket_Base: Clothing
    {
        scope = 0;
        model = "\mymod\gear\jacket.p3d";
        hiddenSelectionsTextures[] = {"mymod\gear\data\jacket_co.paa"};
    };
    class Jacket_Red: Jacket_Base
    {
        scope = 2;
    };
    class Boots
    {
        model = "\old\path\boots.p3d";
    };
    class Ghost
    {
        model = "\nowhere\ghost.p3d";
    };
    class Broken
    {
        model = "\mymod\gear\broken.p3d";
    };
    class Loop: Loop2 {};
    class Loop2: Loop {};
};
"#;

/// Economy table shipped inside the archive
pub const PACKED_TYPES: &str = r#"<types>
    <type name="Jacket_Base"><nominal>0</nominal><category name="clothes"/></type>
    <type name="Jacket_Red"><nominal>4</nominal><category name="clothes"/></type>
</types>"#;

/// Economy table next to the archives; sorts before the packed one
pub const LOOSE_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes" ?>
<types>
    <type name="jacket_red">
        <nominal>12</nominal>
        <lifetime>14400</lifetime>
        <usage name="Military"/>
    </type>
    <type name="Boots"><nominal>20</nominal><category name="clothes"/></type>
    <type name="Retired_Hat"><nominal>1</nominal></type>
</types>"#;

/// `addons/gear.pbo` with configs, meshes, a texture and an economy
/// table, a second archive that does not open, and loose XML files
pub fn write_mod(root: &Path) {
    let jacket = mlod(&QUAD, &[[0, 1, 2], [0, 2, 3]]);
    let boots = mlod(&QUAD, &[]);
    let orphan = mlod(&QUAD, &[]);
    let gear = stored_pbo(
        "mymod\\gear",
        &[
            ("config.cpp", GEAR_CONFIG.as_bytes()),
            ("jacket.p3d", &jacket),
            ("shoes\\boots.p3d", &boots),
            ("broken.p3d", b"MLOD\x01\x01"),
            ("orphan.p3d", &orphan),
            ("data\\jacket_co.paa", b"paa"),
            ("economy\\types.xml", PACKED_TYPES.as_bytes()),
        ],
    );

    let addons = root.join("addons");
    std::fs::create_dir_all(&addons).unwrap();
    std::fs::write(addons.join("gear.pbo"), gear).unwrap();
    std::fs::write(addons.join("zz_broken.pbo"), b"garbage").unwrap();

    let db = root.join("db");
    std::fs::create_dir_all(&db).unwrap();
    std::fs::write(db.join("types.xml"), LOOSE_TYPES).unwrap();
    std::fs::write(db.join("events.xml"), "<events><event name=\"Hat\"/></events>").unwrap();
    std::fs::write(db.join("zz_types.xml"), "<types><type name=\"Half\"").unwrap();
}
