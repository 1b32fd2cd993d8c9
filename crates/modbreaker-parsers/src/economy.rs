// modbreaker-parsers/src/economy.rs
//! Central economy tables (`types.xml`)
//!
//! ```xml
//! <types>
//!     <type name="MyJacket">
//!         <nominal>10</nominal>
//!         <lifetime>14400</lifetime>
//!         <restock>0</restock>
//!         <min>5</min>
//!         <category name="clothes"/>
//!         <usage name="Military"/>
//!         <value name="Tier3"/>
//!     </type>
//! </types>
//! ```
//!
//! Mods ship these next to their PBOs or inside them. Any XML file whose
//! root is `<types>` counts, whatever its name. Missing numbers keep the
//! engine defaults; unparsable ones are ignored.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::text::decode_text;
use crate::traits::{ParseOptions, ParseResult, Parser};

#[derive(Error, Debug)]
pub enum EconomyError {
    #[error("economy file is not readable text")]
    Encoding,

    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("root element is <{root}>, expected <types>")]
    NotTypes { root: String },
}

/// One `<type>` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyItem {
    /// Class name the record spawns
    pub name: String,
    pub nominal: i64,
    /// Seconds before an untouched item despawns
    pub lifetime: i64,
    pub restock: i64,
    pub min: i64,
    pub quant_min: i64,
    pub quant_max: i64,
    pub cost: i64,
    pub categories: Vec<String>,
    pub usages: Vec<String>,
    pub values: Vec<String>,
    pub tags: Vec<String>,
}

impl EconomyItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nominal: 10,
            lifetime: 3600,
            restock: 1800,
            min: 5,
            quant_min: -1,
            quant_max: -1,
            cost: 0,
            categories: Vec::new(),
            usages: Vec::new(),
            values: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn in_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c.eq_ignore_ascii_case(category))
    }
}

/// Items of one or more economy files, looked up by class name ignoring
/// case. A later record for the same name replaces the earlier one.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EconomyTable {
    items: Vec<EconomyItem>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl EconomyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EconomyItem> {
        self.items.iter()
    }

    pub fn get(&self, name: &str) -> Option<&EconomyItem> {
        self.index.get(&name.to_ascii_lowercase()).map(|idx| &self.items[*idx])
    }

    pub fn insert(&mut self, item: EconomyItem) {
        let key = item.name.to_ascii_lowercase();
        match self.index.get(&key) {
            Some(idx) => self.items[*idx] = item,
            None => {
                self.index.insert(key, self.items.len());
                self.items.push(item);
            }
        }
    }

    /// Add every item of `other`, replacing same-named ones
    pub fn extend(&mut self, other: EconomyTable) {
        for item in other.items {
            self.insert(item);
        }
    }

    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a EconomyItem> + 'a {
        self.items.iter().filter(move |item| item.in_category(category))
    }
}

/// Text of a list element: the `name` attribute, else the element text
fn list_value(node: roxmltree::Node<'_, '_>) -> Option<String> {
    node.attribute("name")
        .or_else(|| node.text())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn number(node: roxmltree::Node<'_, '_>) -> Option<i64> {
    node.text()?.trim().parse().ok()
}

fn read_item(node: roxmltree::Node<'_, '_>, name: &str) -> EconomyItem {
    let mut item = EconomyItem::new(name);

    for child in node.children().filter(|n| n.is_element()) {
        let tag = child.tag_name().name().to_ascii_lowercase();
        let field = match tag.as_str() {
            "nominal" => &mut item.nominal,
            "lifetime" => &mut item.lifetime,
            "restock" => &mut item.restock,
            "min" => &mut item.min,
            "quantmin" => &mut item.quant_min,
            "quantmax" => &mut item.quant_max,
            "cost" => &mut item.cost,
            list => {
                let target = match list {
                    "category" => &mut item.categories,
                    "usage" => &mut item.usages,
                    "value" => &mut item.values,
                    "tag" => &mut item.tags,
                    _ => continue,
                };
                if let Some(value) = list_value(child) {
                    target.push(value);
                }
                continue;
            }
        };
        match number(child) {
            Some(value) => *field = value,
            None => trace!(item = name, tag = %tag, "ignoring non-numeric economy value"),
        }
    }
    item
}

/// Read one economy file
pub fn read_types(buffer: &[u8]) -> Result<EconomyTable, EconomyError> {
    let decoded = decode_text(buffer, 0.01).ok_or(EconomyError::Encoding)?;
    let text = decoded.text.trim_start_matches('\u{feff}');
    let doc = roxmltree::Document::parse(text)?;

    let root = doc.root_element();
    if !root.tag_name().name().eq_ignore_ascii_case("types") {
        return Err(EconomyError::NotTypes {
            root: root.tag_name().name().to_string(),
        });
    }

    let mut table = EconomyTable::new();
    for node in root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case("type"))
    {
        match node.attribute("name").filter(|n| !n.trim().is_empty()) {
            Some(name) => table.insert(read_item(node, name.trim())),
            None => trace!("skipping <type> without a name"),
        }
    }

    debug!(items = table.len(), "read economy table");
    Ok(table)
}

/// Parser for `types.xml` economy tables
#[derive(Debug, Clone, Copy, Default)]
pub struct TypesXmlParser;

impl TypesXmlParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for TypesXmlParser {
    type Output = EconomyTable;

    fn extensions(&self) -> &[&str] {
        &["xml"]
    }

    fn name(&self) -> &str {
        "Economy Types"
    }

    fn parse_with_options(&self, data: Bytes, _options: &ParseOptions) -> ParseResult<Self::Output> {
        Ok(read_types(&data)?)
    }
}
