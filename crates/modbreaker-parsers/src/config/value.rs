// modbreaker-parsers/src/config/value.rs
//! Config property values and the ordered property map

use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// A property value as written in the config
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Quoted string
    Text(String),
    Int(i64),
    Float(f64),
    /// Unquoted word: macro, constant or bare identifier
    Reference(String),
    Array(Vec<ConfigValue>),
}

impl ConfigValue {
    /// String content of `Text` and `Reference` values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Text(s) | ConfigValue::Reference(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value of `Int` or `Float`
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConfigValue::Int(v) => Some(*v as f64),
            ConfigValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Every quoted string in this value, depth-first
    pub fn strings(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_strings(&mut out);
        out
    }

    fn collect_strings<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ConfigValue::Text(s) => out.push(s),
            ConfigValue::Array(items) => items.iter().for_each(|item| item.collect_strings(out)),
            _ => {}
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Text(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            ConfigValue::Int(v) => write!(f, "{}", v),
            ConfigValue::Float(v) => write!(f, "{}", v),
            ConfigValue::Reference(s) => f.write_str(s),
            ConfigValue::Array(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Properties in declaration order, looked up case-insensitively.
///
/// Config classes rarely hold more than a few dozen properties, so a
/// linear scan beats hashing here and keeps the file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    entries: Vec<(String, ConfigValue)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.position(name).map(|idx| &self.entries[idx].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Insert or replace; a replaced value keeps its original position
    pub fn insert(&mut self, name: impl Into<String>, value: ConfigValue) -> Option<ConfigValue> {
        let name = name.into();
        match self.position(&name) {
            Some(idx) => Some(std::mem::replace(&mut self.entries[idx].1, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Insert only when the name is not present yet
    pub fn insert_missing(&mut self, name: &str, value: &ConfigValue) -> bool {
        if self.contains(name) {
            return false;
        }
        self.entries.push((name.to_string(), value.clone()));
        true
    }

    /// Append array items to an existing array, or insert the array
    pub fn extend_array(&mut self, name: &str, items: &[ConfigValue]) {
        match self.position(name) {
            Some(idx) => match &mut self.entries[idx].1 {
                ConfigValue::Array(existing) => existing.extend_from_slice(items),
                other => *other = ConfigValue::Array(items.to_vec()),
            },
            None => self.entries.push((name.to_string(), ConfigValue::Array(items.to_vec()))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

impl Serialize for PropertyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
