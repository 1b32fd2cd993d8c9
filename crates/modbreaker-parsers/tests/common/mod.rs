// modbreaker-parsers/tests/common/mod.rs
//! In-memory fixtures shared by the integration tests

#![allow(dead_code)]

use modbreaker_parsers::pbo::PACKING_CPRS;
use modbreaker_parsers::signature::PBO_MAGIC;

/// One archive entry: name, packing method, declared original size, payload
pub type EntrySpec<'a> = (&'a str, u32, u32, &'a [u8]);

pub fn build_pbo(props: &[(&str, &str)], files: &[EntrySpec<'_>]) -> Vec<u8> {
    let mut out = PBO_MAGIC.to_vec();
    out.extend_from_slice(&[0u8; 16]);
    for (key, value) in props {
        out.extend_from_slice(key.as_bytes());
        out.push(0);
        out.extend_from_slice(value.as_bytes());
        out.push(0);
    }
    out.push(0);

    for (name, packing, original, payload) in files {
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        for field in [*packing, *original, 0, 1_700_000_000, payload.len() as u32] {
            out.extend_from_slice(&field.to_le_bytes());
        }
    }
    out.extend_from_slice(&[0u8; 21]);

    for (_, _, _, payload) in files {
        out.extend_from_slice(payload);
    }
    out
}

/// Archive of stored entries
pub fn stored_pbo(files: &[(&str, &[u8])]) -> Vec<u8> {
    let specs: Vec<EntrySpec<'_>> = files.iter().map(|(name, data)| (*name, 0, 0, *data)).collect();
    build_pbo(&[("prefix", "test")], &specs)
}

/// LZSS stream made of literal runs only, with the trailing checksum
pub fn pack_literals(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 8 + 5);
    for chunk in data.chunks(8) {
        out.push(((1u16 << chunk.len()) - 1) as u8);
        out.extend_from_slice(chunk);
    }
    let sum = data.iter().fold(0u32, |acc, b| acc.wrapping_add(u32::from(*b)));
    out.extend_from_slice(&sum.to_le_bytes());
    out
}

/// Packed entry layout for `payload`, returned with the packed bytes it borrows
pub fn packed(payload: &[u8]) -> (u32, u32, Vec<u8>) {
    (PACKING_CPRS, payload.len() as u32, pack_literals(payload))
}

pub const QUAD: [[f32; 3]; 4] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];

/// MLOD body: declared vertex count, positions, then an optional face block
pub fn mlod(vertices: &[[f32; 3]], declared: u32, faces: Option<(u32, &[[u16; 3]])>) -> Vec<u8> {
    let mut out = b"MLOD".to_vec();
    out.extend_from_slice(&0x101u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&declared.to_le_bytes());
    for vertex in vertices {
        for c in vertex {
            out.extend_from_slice(&c.to_le_bytes());
        }
    }
    if let Some((count, triangles)) = faces {
        out.extend_from_slice(&count.to_le_bytes());
        for triangle in triangles {
            for index in triangle {
                out.extend_from_slice(&index.to_le_bytes());
            }
        }
    }
    out
}

/// ODOL body with u32 indices, eight bytes of padding before the face count
pub fn odol(vertices: &[[f32; 3]], faces: &[[u32; 3]]) -> Vec<u8> {
    let mut out = b"ODOL".to_vec();
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(&(vertices.len() as u32).to_le_bytes());
    for vertex in vertices {
        for c in vertex {
            out.extend_from_slice(&c.to_le_bytes());
        }
    }
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&(faces.len() as u32).to_le_bytes());
    for triangle in faces {
        for index in triangle {
            out.extend_from_slice(&index.to_le_bytes());
        }
    }
    out
}

/// Class written into a rapified fixture: name, parent, text properties
pub type RapClassSpec<'a> = (&'a str, &'a str, &'a [(&'a str, &'a str)]);

/// Rapified config with one section class holding `classes`
pub fn rapified_section(section: &str, classes: &[RapClassSpec<'_>]) -> Vec<u8> {
    fn asciiz(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(s.as_bytes());
        out.push(0);
    }
    fn patch(out: &mut [u8], slot: usize, value: usize) {
        out[slot..slot + 4].copy_from_slice(&(value as u32).to_le_bytes());
    }

    let mut out = b"\0raP".to_vec();
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    // Root body: one class entry for the section
    asciiz(&mut out, "");
    out.push(1);
    out.push(0);
    asciiz(&mut out, section);
    let section_slot = out.len();
    out.extend_from_slice(&[0; 4]);

    let section_body = out.len();
    patch(&mut out, section_slot, section_body);
    asciiz(&mut out, "");
    out.push(classes.len() as u8);
    let mut slots = Vec::new();
    for (name, _, _) in classes {
        out.push(0);
        asciiz(&mut out, name);
        slots.push(out.len());
        out.extend_from_slice(&[0; 4]);
    }

    for ((_, parent, properties), slot) in classes.iter().zip(slots) {
        let body = out.len();
        patch(&mut out, slot, body);
        asciiz(&mut out, parent);
        out.push(properties.len() as u8);
        for (key, value) in properties.iter() {
            out.extend_from_slice(&[1, 0]);
            asciiz(&mut out, key);
            asciiz(&mut out, value);
        }
    }

    let enum_offset = out.len();
    patch(&mut out, 12, enum_offset);
    out.extend_from_slice(&0u32.to_le_bytes());
    out
}
