// modbreaker-parsers/src/config/class.rs
//! Class records recovered from a config

use std::fmt;

use serde::Serialize;

use super::value::{ConfigValue, PropertyMap};

/// Top-level container a class was declared in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ConfigSection {
    CfgVehicles,
    CfgNonAIVehicles,
    CfgWeapons,
    CfgMagazines,
    /// Found outside any recognised section
    Unscoped,
}

impl ConfigSection {
    /// Sections whose direct children become class records
    pub const RECOGNIZED: [ConfigSection; 4] = [
        ConfigSection::CfgVehicles,
        ConfigSection::CfgNonAIVehicles,
        ConfigSection::CfgWeapons,
        ConfigSection::CfgMagazines,
    ];

    /// Section by container class name, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        Self::RECOGNIZED
            .into_iter()
            .find(|section| section.as_str().eq_ignore_ascii_case(name))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigSection::CfgVehicles => "CfgVehicles",
            ConfigSection::CfgNonAIVehicles => "CfgNonAIVehicles",
            ConfigSection::CfgWeapons => "CfgWeapons",
            ConfigSection::CfgMagazines => "CfgMagazines",
            ConfigSection::Unscoped => "Unscoped",
        }
    }
}

impl fmt::Display for ConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One class declaration with its own (not inherited) properties
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigClass {
    pub name: String,
    /// Parent class name as written
    pub parent: Option<String>,
    pub properties: PropertyMap,
    pub section: ConfigSection,
    /// Array properties declared with `+=`, appended to the inherited value
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extended: Vec<String>,
}

impl ConfigClass {
    pub fn new(name: impl Into<String>, section: ConfigSection) -> Self {
        Self {
            name: name.into(),
            parent: None,
            properties: PropertyMap::new(),
            section,
            extended: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: ConfigValue) -> Self {
        self.properties.insert(name, value);
        self
    }

    /// Whether `name` extends rather than replaces the inherited array
    pub fn is_extended(&self, name: &str) -> bool {
        self.extended.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Fill parent, section and properties that are still missing from
    /// `other`; nothing already set is overwritten
    pub fn fill_gaps(&mut self, other: &ConfigClass) -> usize {
        let mut filled = 0;
        if self.parent.is_none() && other.parent.is_some() {
            self.parent = other.parent.clone();
            filled += 1;
        }
        if self.section == ConfigSection::Unscoped && other.section != ConfigSection::Unscoped {
            self.section = other.section;
            filled += 1;
        }
        for (name, value) in other.properties.iter() {
            if self.properties.insert_missing(name, value) {
                if other.is_extended(name) {
                    self.extended.push(name.to_string());
                }
                filled += 1;
            }
        }
        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_from_name() {
        assert_eq!(ConfigSection::from_name("cfgvehicles"), Some(ConfigSection::CfgVehicles));
        assert_eq!(ConfigSection::from_name("CfgNonAIVehicles"), Some(ConfigSection::CfgNonAIVehicles));
        assert_eq!(ConfigSection::from_name("CfgPatches"), None);
        assert_eq!(ConfigSection::from_name("Unscoped"), None);
    }

    #[test]
    fn test_fill_gaps_keeps_existing() {
        let mut first = ConfigClass::new("Rifle", ConfigSection::CfgWeapons)
            .with_property("model", ConfigValue::Text("\\a\\rifle.p3d".into()));
        let later = ConfigClass::new("rifle", ConfigSection::Unscoped)
            .with_parent("Weapon")
            .with_property("model", ConfigValue::Text("\\b\\other.p3d".into()))
            .with_property("weight", ConfigValue::Int(3200));

        assert_eq!(first.fill_gaps(&later), 2);
        assert_eq!(first.parent.as_deref(), Some("Weapon"));
        assert_eq!(first.section, ConfigSection::CfgWeapons);
        assert_eq!(first.properties.get("model").and_then(|v| v.as_str()), Some("\\a\\rifle.p3d"));
        assert_eq!(first.properties.get("weight").and_then(|v| v.as_int()), Some(3200));
    }
}
