// modbreaker-parsers/src/config/rap.rs
//! Rapified (binarized) config decoding
//!
//! ```text
//! header   "\0raP" | u32 0 | u32 8 | u32 enum offset
//! body     asciiz parent | varint entry count | entries...
//! entry    u8 type, then
//!            0 class        asciiz name | u32 body offset
//!            1 value        u8 subtype | asciiz name | value
//!            2 array        asciiz name | array
//!            3 extern       asciiz name
//!            4 delete       asciiz name
//!            5 array +=     u32 flags | asciiz name | array
//! array    varint count | (u8 element type | element)...
//! ```
//!
//! The root body starts right after the header. The decoder builds the
//! whole class tree; any malformed read aborts it with a [`RapError`].
//! Every body is decoded at most once, and the total number of entries is
//! capped, so crafted offsets cannot multiply the work.

use std::collections::HashSet;

use thiserror::Error;
use tracing::trace;

use super::class::{ConfigClass, ConfigSection};
use super::value::{ConfigValue, PropertyMap};
use crate::reader::{decode_name, ByteReader, Underrun};
use crate::signature::RAP_MAGIC;

/// Offset of the root class body
const ROOT_BODY_OFFSET: usize = 16;

/// Entry budget used by [`decode`]
pub const DEFAULT_MAX_ENTRIES: usize = 1_000_000;

/// Why a rapified buffer could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RapError {
    #[error("missing \\0raP signature")]
    BadSignature,

    #[error(transparent)]
    Underrun(#[from] Underrun),

    #[error("class body at offset {offset} revisits an enclosing class")]
    RevisitedOffset { offset: usize },

    #[error("class body at offset {offset} is shared by more than one class")]
    SharedBody { offset: usize },

    #[error("more than {limit} entries")]
    TooManyEntries { limit: usize },

    #[error("class nesting deeper than {max_depth} at offset {offset}")]
    TooDeep { max_depth: usize, offset: usize },

    #[error("unknown entry type {kind} at offset {offset}")]
    UnknownEntry { kind: u8, offset: usize },

    #[error("unknown value type {kind} at offset {offset}")]
    UnknownValue { kind: u8, offset: usize },
}

/// One decoded class with its nested classes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RapClass {
    pub name: String,
    pub parent: Option<String>,
    pub properties: PropertyMap,
    /// Array properties written as `+=`
    pub extended: Vec<String>,
    pub children: Vec<RapClass>,
    /// Names declared `class X;` or `delete X;`
    pub externs: Vec<String>,
    pub deletes: Vec<String>,
}

impl RapClass {
    /// Direct child by name, ignoring case
    pub fn child(&self, name: &str) -> Option<&RapClass> {
        self.children.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Follow a path of child names from this class
    pub fn descend(&self, path: &[&str]) -> Option<&RapClass> {
        path.iter().try_fold(self, |class, name| class.child(name))
    }

    /// Flat class record of this node (children dropped)
    pub fn to_config_class(&self, section: ConfigSection) -> ConfigClass {
        ConfigClass {
            name: self.name.clone(),
            parent: self.parent.clone(),
            properties: self.properties.clone(),
            section,
            extended: self.extended.clone(),
        }
    }
}

/// Whether a buffer carries the rapified signature
pub fn is_rapified(buffer: &[u8]) -> bool {
    buffer.starts_with(RAP_MAGIC)
}

/// Decode a rapified buffer into its root class
pub fn decode(buffer: &[u8], max_depth: usize) -> Result<RapClass, RapError> {
    decode_with_budget(buffer, max_depth, DEFAULT_MAX_ENTRIES)
}

/// Decode with an explicit cap on the entries read across all bodies
pub fn decode_with_budget(buffer: &[u8], max_depth: usize, max_entries: usize) -> Result<RapClass, RapError> {
    if !is_rapified(buffer) {
        return Err(RapError::BadSignature);
    }

    let mut header = ByteReader::at(buffer, 4);
    let _zero = header.read_u32()?;
    let _eight = header.read_u32()?;
    let _enum_offset = header.read_u32()?;

    let mut decoder = Decoder {
        buffer,
        max_depth,
        max_entries,
        entries: 0,
        stack: Vec::new(),
        visited: HashSet::new(),
    };
    decoder.class_body(String::new(), ROOT_BODY_OFFSET)
}

struct Decoder<'a> {
    buffer: &'a [u8],
    max_depth: usize,
    max_entries: usize,
    entries: usize,
    /// Body offsets of the classes being decoded
    stack: Vec<usize>,
    /// Every body offset decoded so far
    visited: HashSet<usize>,
}

impl<'a> Decoder<'a> {
    fn class_body(&mut self, name: String, offset: usize) -> Result<RapClass, RapError> {
        if self.stack.contains(&offset) {
            return Err(RapError::RevisitedOffset { offset });
        }
        if !self.visited.insert(offset) {
            return Err(RapError::SharedBody { offset });
        }
        if self.stack.len() >= self.max_depth {
            return Err(RapError::TooDeep {
                max_depth: self.max_depth,
                offset,
            });
        }

        let mut reader = ByteReader::at(self.buffer, offset);

        let parent = decode_name(reader.read_asciiz()?);
        let count = reader.read_compressed_int()?;

        let mut class = RapClass {
            name,
            parent: (!parent.is_empty()).then_some(parent),
            ..Default::default()
        };

        self.stack.push(offset);
        for _ in 0..count {
            self.entry(&mut reader, &mut class)?;
        }
        self.stack.pop();

        trace!(class = %class.name, offset, entries = count, "decoded class body");
        Ok(class)
    }

    fn entry(&mut self, reader: &mut ByteReader<'a>, class: &mut RapClass) -> Result<(), RapError> {
        self.entries += 1;
        if self.entries > self.max_entries {
            return Err(RapError::TooManyEntries { limit: self.max_entries });
        }

        let at = reader.position();
        let kind = reader.read_u8()?;

        match kind {
            0 => {
                let name = decode_name(reader.read_asciiz()?);
                let body = reader.read_u32()? as usize;
                let child = self.class_body(name, body)?;
                class.children.push(child);
            }
            1 => {
                let subtype = reader.read_u8()?;
                let name = decode_name(reader.read_asciiz()?);
                let value = scalar(reader, subtype)?;
                class.properties.insert(name, value);
            }
            2 => {
                let name = decode_name(reader.read_asciiz()?);
                let value = array(reader, 0, self.max_depth)?;
                class.properties.insert(name, value);
            }
            3 => class.externs.push(decode_name(reader.read_asciiz()?)),
            4 => class.deletes.push(decode_name(reader.read_asciiz()?)),
            5 => {
                let _flags = reader.read_u32()?;
                let name = decode_name(reader.read_asciiz()?);
                let value = array(reader, 0, self.max_depth)?;
                class.extended.push(name.clone());
                class.properties.insert(name, value);
            }
            kind => return Err(RapError::UnknownEntry { kind, offset: at }),
        }
        Ok(())
    }
}

fn scalar(reader: &mut ByteReader<'_>, subtype: u8) -> Result<ConfigValue, RapError> {
    let at = reader.position();
    Ok(match subtype {
        0 => ConfigValue::Text(decode_name(reader.read_asciiz()?)),
        1 => ConfigValue::Float(f64::from(reader.read_f32()?)),
        2 => ConfigValue::Int(i64::from(reader.read_i32()?)),
        4 => ConfigValue::Reference(decode_name(reader.read_asciiz()?)),
        6 => ConfigValue::Int(reader.read_i64()?),
        kind => return Err(RapError::UnknownValue { kind, offset: at }),
    })
}

fn array(reader: &mut ByteReader<'_>, depth: usize, max_depth: usize) -> Result<ConfigValue, RapError> {
    let at = reader.position();
    if depth >= max_depth {
        return Err(RapError::TooDeep { max_depth, offset: at });
    }

    let count = reader.read_compressed_int()? as usize;
    // Every element takes at least two bytes
    if count > reader.remaining() / 2 + 1 {
        return Err(Underrun {
            offset: at,
            needed: count.saturating_mul(2),
            available: reader.remaining(),
        }
        .into());
    }

    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        let kind = reader.read_u8()?;
        let item = match kind {
            3 => array(reader, depth + 1, max_depth)?,
            other => scalar(reader, other)?,
        };
        items.push(item);
    }
    Ok(ConfigValue::Array(items))
}

/// Direct children of every recognised section, in file order
pub fn section_classes(root: &RapClass) -> Vec<ConfigClass> {
    let mut out = Vec::new();
    for container in &root.children {
        if let Some(section) = ConfigSection::from_name(&container.name) {
            out.extend(container.children.iter().map(|c| c.to_config_class(section)));
        }
    }
    out
}

/// Builds rapified buffers for tests
#[cfg(test)]
pub(crate) mod writer {
    /// Entry of a class body under construction
    pub enum Item<'a> {
        Class(&'a str, Body<'a>),
        Text(&'a str, &'a str),
        Int(&'a str, i32),
        Float(&'a str, f32),
        TextArray(&'a str, Vec<&'a str>),
        Extend(&'a str, Vec<&'a str>),
        Extern(&'a str),
    }

    pub struct Body<'a> {
        pub parent: &'a str,
        pub items: Vec<Item<'a>>,
    }

    /// Serialize a root body into a full rapified file
    pub fn build(root: &Body<'_>) -> Vec<u8> {
        let mut out = b"\0raP".to_vec();
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        write_body(&mut out, root);
        let enum_offset = out.len() as u32;
        out[12..16].copy_from_slice(&enum_offset.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out
    }

    fn varint(out: &mut Vec<u8>, mut value: u32) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return;
            }
            out.push(byte | 0x80);
        }
    }

    fn asciiz(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(s.as_bytes());
        out.push(0);
    }

    fn strings(out: &mut Vec<u8>, items: &[&str]) {
        varint(out, items.len() as u32);
        for s in items {
            out.push(0);
            asciiz(out, s);
        }
    }

    fn write_body(out: &mut Vec<u8>, body: &Body<'_>) {
        asciiz(out, body.parent);
        varint(out, body.items.len() as u32);

        // Child bodies go after this body's entries; patch offsets later
        let mut pending = Vec::new();
        for item in &body.items {
            match item {
                Item::Class(name, child) => {
                    out.push(0);
                    asciiz(out, name);
                    pending.push((out.len(), child));
                    out.extend_from_slice(&[0; 4]);
                }
                Item::Text(name, value) => {
                    out.extend_from_slice(&[1, 0]);
                    asciiz(out, name);
                    asciiz(out, value);
                }
                Item::Int(name, value) => {
                    out.extend_from_slice(&[1, 2]);
                    asciiz(out, name);
                    out.extend_from_slice(&value.to_le_bytes());
                }
                Item::Float(name, value) => {
                    out.extend_from_slice(&[1, 1]);
                    asciiz(out, name);
                    out.extend_from_slice(&value.to_le_bytes());
                }
                Item::TextArray(name, values) => {
                    out.push(2);
                    asciiz(out, name);
                    strings(out, values);
                }
                Item::Extend(name, values) => {
                    out.push(5);
                    out.extend_from_slice(&1u32.to_le_bytes());
                    asciiz(out, name);
                    strings(out, values);
                }
                Item::Extern(name) => {
                    out.push(3);
                    asciiz(out, name);
                }
            }
        }

        for (slot, child) in pending {
            let offset = out.len() as u32;
            out[slot..slot + 4].copy_from_slice(&offset.to_le_bytes());
            write_body(out, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::writer::{build, Body, Item};
    use super::*;

    fn weapons_config() -> Vec<u8> {
        build(&Body {
            parent: "",
            items: vec![
                Item::Class(
                    "CfgPatches",
                    Body {
                        parent: "",
                        items: vec![Item::Class("MyWeapons", Body { parent: "", items: vec![] })],
                    },
                ),
                Item::Class(
                    "CfgWeapons",
                    Body {
                        parent: "",
                        items: vec![
                            Item::Extern("Rifle_Base"),
                            Item::Class(
                                "MyRifle",
                                Body {
                                    parent: "Rifle_Base",
                                    items: vec![
                                        Item::Text("model", "\\mymod\\rifle.p3d"),
                                        Item::Int("weight", 3200),
                                        Item::Float("initSpeed", 880.5),
                                        Item::TextArray("hiddenSelectionsTextures", vec!["a_co.paa"]),
                                        Item::Extend("attachments", vec!["optic"]),
                                        Item::Class("Inventory", Body { parent: "", items: vec![] }),
                                    ],
                                },
                            ),
                        ],
                    },
                ),
            ],
        })
    }

    #[test]
    fn test_decode_tree() {
        let root = decode(&weapons_config(), 32).unwrap();
        assert_eq!(root.children.len(), 2);

        let weapons = root.child("cfgweapons").unwrap();
        assert_eq!(weapons.externs, vec!["Rifle_Base".to_string()]);

        let rifle = root.descend(&["CfgWeapons", "MyRifle"]).unwrap();
        assert_eq!(rifle.parent.as_deref(), Some("Rifle_Base"));
        assert_eq!(rifle.properties.get("model"), Some(&ConfigValue::Text("\\mymod\\rifle.p3d".into())));
        assert_eq!(rifle.properties.get("weight"), Some(&ConfigValue::Int(3200)));
        assert_eq!(rifle.properties.get("initSpeed"), Some(&ConfigValue::Float(880.5)));
        assert_eq!(rifle.extended, vec!["attachments".to_string()]);
        assert_eq!(rifle.children.len(), 1);
    }

    #[test]
    fn test_section_classes() {
        let root = decode(&weapons_config(), 32).unwrap();
        let classes = section_classes(&root);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "MyRifle");
        assert_eq!(classes[0].section, ConfigSection::CfgWeapons);
        assert!(classes[0].is_extended("Attachments"));
    }

    #[test]
    fn test_truncated_buffer_fails() {
        let data = weapons_config();
        for cut in [3, 10, 20, data.len() / 2, data.len() - 5] {
            assert!(decode(&data[..cut], 32).is_err(), "cut at {}", cut);
        }
    }

    #[test]
    fn test_self_referencing_body_rejected() {
        // Root with one class entry pointing back at the root body
        let mut data = b"\0raP".to_vec();
        data.extend_from_slice(&[0, 0, 0, 0, 8, 0, 0, 0, 0, 0, 0, 0]);
        data.push(0); // parent ""
        data.push(1); // one entry
        data.push(0); // class
        data.extend_from_slice(b"Loop\0");
        data.extend_from_slice(&16u32.to_le_bytes());

        assert_eq!(decode(&data, 32), Err(RapError::RevisitedOffset { offset: 16 }));
    }

    /// `levels` bodies of `fanout` class entries, each entry pointing at
    /// the single body of the next level
    fn shared_bodies(levels: usize, fanout: usize) -> Vec<u8> {
        let mut data = b"\0raP".to_vec();
        data.extend_from_slice(&[0, 0, 0, 0, 8, 0, 0, 0, 0, 0, 0, 0]);

        let mut slots: Vec<usize> = Vec::new();
        for level in 0..levels {
            let start = data.len() as u32;
            for slot in slots.drain(..) {
                data[slot..slot + 4].copy_from_slice(&start.to_le_bytes());
            }
            data.push(0);
            if level + 1 == levels {
                data.push(0);
                break;
            }
            data.push(fanout as u8);
            for i in 0..fanout {
                data.push(0);
                data.extend_from_slice(format!("C{}_{}\0", level, i).as_bytes());
                slots.push(data.len());
                data.extend_from_slice(&[0; 4]);
            }
        }
        data
    }

    #[test]
    fn test_shared_body_rejected() {
        let data = shared_bodies(7, 10);
        assert!(data.len() < 1024);

        let err = decode(&data, 32).unwrap_err();
        assert!(matches!(err, RapError::SharedBody { .. }), "{:?}", err);
    }

    #[test]
    fn test_distinct_bodies_still_decode() {
        let data = shared_bodies(2, 1);
        let root = decode(&data, 32).unwrap();
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].name, "C0_0");
    }

    #[test]
    fn test_entry_budget() {
        let data = weapons_config();
        assert_eq!(
            decode_with_budget(&data, 32, 3),
            Err(RapError::TooManyEntries { limit: 3 })
        );
        assert!(decode_with_budget(&data, 32, 64).is_ok());
    }

    #[test]
    fn test_depth_limit() {
        let data = weapons_config();
        assert!(matches!(decode(&data, 2), Err(RapError::TooDeep { .. })));
    }

    #[test]
    fn test_unknown_entry_type() {
        let mut data = b"\0raP".to_vec();
        data.extend_from_slice(&[0, 0, 0, 0, 8, 0, 0, 0, 0, 0, 0, 0]);
        data.extend_from_slice(&[0, 1, 9]);
        assert_eq!(decode(&data, 32), Err(RapError::UnknownEntry { kind: 9, offset: 18 }));
    }
}
