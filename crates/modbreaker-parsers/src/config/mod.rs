// modbreaker-parsers/src/config/mod.rs
//! Config Reader (`config.bin` / `config.cpp`)
//!
//! Recovers class declarations, their parents and properties. Reading
//! never fails; it works in two tiers and reports which one produced the
//! result:
//!
//! 1. **Structured**: a rapified buffer is decoded into its full class
//!    tree and the direct children of `CfgVehicles`, `CfgNonAIVehicles`,
//!    `CfgWeapons` and `CfgMagazines` become class records.
//! 2. **Text**: anything else (including a rapified buffer that failed to
//!    decode) is decoded as text and fed through the [`TextMatcher`]s in
//!    order.
//!
//! Both tiers produce a [`ClassHierarchy`]; inheritance is resolved on
//! demand.

mod class;
mod hierarchy;
mod matchers;
pub mod rap;
pub mod text;
mod value;

pub use class::{ConfigClass, ConfigSection};
pub use hierarchy::{ClassHierarchy, ClassId, HierarchyError, ResolvedClass};
pub use matchers::{
    default_matchers, merge_into, DeclarationMatcher, ModelAssignmentMatcher, SectionMatcher, TextMatcher,
};
pub use value::{ConfigValue, PropertyMap};

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::signature::RAP_MAGIC;
use crate::traits::{ParseOptions, ParseResult, Parser};

/// Config reader thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOptions {
    /// Highest share of U+FFFD an encoding may produce and still be used
    pub max_replacement_ratio: f64,
    /// Bytes searched backwards from a `model =` for its class
    pub model_window: usize,
    /// Deepest class or array nesting decoded from a rapified file
    pub max_nesting_depth: usize,
    /// Most entries decoded from one rapified file
    pub max_entries: usize,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            max_replacement_ratio: 0.01,
            model_window: 1000,
            max_nesting_depth: 32,
            max_entries: rap::DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Which tier produced the classes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ConfigTier {
    /// Rapified decode
    Structured,
    /// Text matchers
    Text,
    /// Nothing readable
    #[default]
    None,
}

impl fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigTier::Structured => "structured",
            ConfigTier::Text => "text",
            ConfigTier::None => "none",
        })
    }
}

/// How a config was read
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigDiagnostics {
    pub tier: ConfigTier,
    /// Why the structured decode was abandoned
    pub structured_failure: Option<String>,
    pub structured_classes: usize,
    pub text_classes: usize,
    /// Encoding the text tier used
    pub encoding: Option<String>,
    pub replacement_ratio: Option<f64>,
    /// Classes found by each matcher, before merging
    pub matcher_hits: BTreeMap<String, usize>,
    /// Final class count per section
    pub per_section: BTreeMap<String, usize>,
}

/// Result of reading one config buffer
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigReport {
    pub hierarchy: ClassHierarchy,
    pub diagnostics: ConfigDiagnostics,
}

/// Two-tier config reader
pub struct ConfigReader {
    options: ConfigOptions,
    matchers: Vec<Box<dyn TextMatcher>>,
}

impl Default for ConfigReader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfigReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigReader")
            .field("options", &self.options)
            .field("matchers", &self.matchers.iter().map(|m| m.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl ConfigReader {
    pub fn new() -> Self {
        Self::with_options(ConfigOptions::default())
    }

    pub fn with_options(options: ConfigOptions) -> Self {
        Self {
            options,
            matchers: default_matchers(),
        }
    }

    /// Replace the text matchers; they run in the given order
    pub fn with_matchers(mut self, matchers: Vec<Box<dyn TextMatcher>>) -> Self {
        self.matchers = matchers;
        self
    }

    pub fn options(&self) -> &ConfigOptions {
        &self.options
    }

    /// Read a config with this reader's options
    pub fn read(&self, buffer: &[u8]) -> ConfigReport {
        self.read_with(buffer, &self.options)
    }

    /// Read a config. Never fails: unreadable input yields an empty
    /// hierarchy and diagnostics saying why.
    pub fn read_with(&self, buffer: &[u8], options: &ConfigOptions) -> ConfigReport {
        let mut diagnostics = ConfigDiagnostics::default();

        if buffer.iter().all(|b| *b == 0) {
            debug!(len = buffer.len(), "config empty");
            return ConfigReport {
                hierarchy: ClassHierarchy::new(),
                diagnostics,
            };
        }

        if rap::is_rapified(buffer) {
            match rap::decode_with_budget(buffer, options.max_nesting_depth, options.max_entries) {
                Ok(root) => {
                    let classes = rap::section_classes(&root);
                    diagnostics.tier = ConfigTier::Structured;
                    diagnostics.structured_classes = classes.len();
                    return finish(classes, diagnostics);
                }
                Err(e) => {
                    debug!(error = %e, "rapified decode failed; falling back to text");
                    diagnostics.structured_failure = Some(e.to_string());
                }
            }
        }

        let Some(decoded) = text::decode_text(buffer, options.max_replacement_ratio) else {
            debug!("no encoding produced readable text");
            return finish(Vec::new(), diagnostics);
        };
        diagnostics.encoding = Some(decoded.encoding.to_string());
        diagnostics.replacement_ratio = Some(decoded.replacement_ratio);

        let mut classes = Vec::new();
        for matcher in &self.matchers {
            let found = matcher.find(&decoded.text, options);
            diagnostics.matcher_hits.insert(matcher.name().to_string(), found.len());
            merge_into(&mut classes, found);
        }

        diagnostics.tier = ConfigTier::Text;
        diagnostics.text_classes = classes.len();
        finish(classes, diagnostics)
    }
}

fn finish(classes: Vec<ConfigClass>, mut diagnostics: ConfigDiagnostics) -> ConfigReport {
    let hierarchy = ClassHierarchy::from_classes(classes);
    diagnostics.per_section = hierarchy
        .section_counts()
        .into_iter()
        .map(|(section, count)| (section.to_string(), count))
        .collect();

    debug!(
        tier = %diagnostics.tier,
        classes = hierarchy.len(),
        encoding = ?diagnostics.encoding,
        "read config"
    );
    ConfigReport { hierarchy, diagnostics }
}

impl Parser for ConfigReader {
    type Output = ConfigReport;

    fn extensions(&self) -> &[&str] {
        &["bin", "cpp", "hpp"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(RAP_MAGIC)
    }

    fn name(&self) -> &str {
        "Config Reader"
    }

    fn parse_with_options(&self, data: Bytes, options: &ParseOptions) -> ParseResult<Self::Output> {
        Ok(self.read_with(&data, &options.config))
    }
}

#[cfg(test)]
mod tests {
    use super::rap::writer::{build, Body, Item};
    use super::*;

    #[test]
    fn test_empty_and_zero_input() {
        let reader = ConfigReader::new();
        for input in [&[][..], &[0u8; 64][..]] {
            let report = reader.read(input);
            assert!(report.hierarchy.is_empty());
            assert_eq!(report.diagnostics.tier, ConfigTier::None);
        }
    }

    #[test]
    fn test_structured_tier() {
        let data = build(&Body {
            parent: "",
            items: vec![Item::Class(
                "CfgVehicles",
                Body {
                    parent: "",
                    items: vec![
                        Item::Class("Base", Body { parent: "", items: vec![Item::Text("model", "\\b.p3d")] }),
                        Item::Class("Derived", Body { parent: "Base", items: vec![] }),
                    ],
                },
            )],
        });

        let report = ConfigReader::new().read(&data);
        assert_eq!(report.diagnostics.tier, ConfigTier::Structured);
        assert_eq!(report.diagnostics.structured_classes, 2);
        assert_eq!(report.diagnostics.per_section.get("CfgVehicles"), Some(&2));

        let h = &report.hierarchy;
        let derived = h.find("derived").unwrap();
        assert_eq!(h.model_path(derived).unwrap().as_deref(), Some("\\b.p3d"));
    }

    #[test]
    fn test_broken_rapified_falls_back_to_text() {
        let mut data = b"\0raP\0\0\0\0\x08\0\0\0\0\0\0\0".to_vec();
        data.extend_from_slice(b"\xFF\xFF\xFF\xFF\xFF garbage class Lost { model = \"lost.p3d\"; };");
        let report = ConfigReader::new().read(&data);
        assert!(report.diagnostics.structured_failure.is_some());
        assert_eq!(report.diagnostics.tier, ConfigTier::Text);
        assert!(report.hierarchy.find("Lost").is_some());
    }

    #[test]
    fn test_text_tier_merges_matchers() {
        let text = "class CfgVehicles { class Jacket : Clothing { model = \"\\j.p3d\"; }; };\nclass Loose { scope = 1; };";
        let report = ConfigReader::new().read(text.as_bytes());
        let d = &report.diagnostics;
        assert_eq!(d.tier, ConfigTier::Text);
        assert_eq!(d.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(d.matcher_hits.get("section"), Some(&1));
        assert_eq!(d.matcher_hits.get("declaration"), Some(&1));
        assert_eq!(d.matcher_hits.get("model"), Some(&1));

        let h = &report.hierarchy;
        assert_eq!(h.len(), 2);
        let jacket = h.get(h.find("Jacket").unwrap()).unwrap();
        assert_eq!(jacket.section, ConfigSection::CfgVehicles);
        assert_eq!(jacket.parent.as_deref(), Some("Clothing"));
    }

    #[test]
    fn test_text_tier_ignores_nested_and_container_classes() {
        let text = r#"
class CfgPatches { class MyMod { units[] = {}; }; };
class CfgVehicles
{
    class Jacket
    {
        model = "\mymod\jacket.p3d";
        class DamageSystem { class GlobalHealth { class Health { hitpoints = 100; }; }; };
    };
};
"#;
        let report = ConfigReader::new().read(text.as_bytes());
        let h = &report.hierarchy;
        let names: Vec<_> = h.iter().map(|(_, c)| (c.name.as_str(), c.section)).collect();
        assert_eq!(names, vec![("Jacket", ConfigSection::CfgVehicles)]);
        assert_eq!(report.diagnostics.per_section.get("Unscoped"), None);
    }

    #[test]
    fn test_shared_bodies_fall_back_without_blowup() {
        // Two root entries pointing at one body
        let mut data = b"\0raP".to_vec();
        data.extend_from_slice(&[0, 0, 0, 0, 8, 0, 0, 0, 0, 0, 0, 0]);
        data.extend_from_slice(&[0, 2]);
        let first = data.len() + 2 * (1 + 2 + 4);
        for name in [b"A\0", b"B\0"] {
            data.push(0);
            data.extend_from_slice(name);
            data.extend_from_slice(&(first as u32).to_le_bytes());
        }
        data.extend_from_slice(&[0, 0]);

        let report = ConfigReader::new().read(&data);
        assert!(report
            .diagnostics
            .structured_failure
            .as_deref()
            .is_some_and(|e| e.contains("shared")));
        assert_ne!(report.diagnostics.tier, ConfigTier::Structured);
    }

    #[test]
    fn test_custom_matchers() {
        let reader = ConfigReader::new().with_matchers(vec![Box::new(ModelAssignmentMatcher)]);
        let report = reader.read(b"class A { model = \"a.p3d\"; };");
        assert_eq!(report.diagnostics.matcher_hits.len(), 1);
        assert_eq!(report.hierarchy.len(), 1);
    }
}
