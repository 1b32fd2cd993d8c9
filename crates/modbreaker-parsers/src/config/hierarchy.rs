// modbreaker-parsers/src/config/hierarchy.rs
//! Class arena with lazily resolved inheritance
//!
//! Classes are stored once and addressed by [`ClassId`]. Parent links are
//! resolved to ids when the arena is built; inherited properties are only
//! computed on request, walking the chain with a visited set so a cyclic
//! chain is reported instead of looping.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

use super::class::{ConfigClass, ConfigSection};
use super::value::{ConfigValue, PropertyMap};
use crate::signature::fold_case;

/// Index of a class in a [`ClassHierarchy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClassId(pub usize);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("inheritance cycle through class {class}")]
    Cycle { class: String },

    #[error("no class with id {0}")]
    UnknownId(usize),
}

impl From<HierarchyError> for modbreaker_core::Error {
    fn from(err: HierarchyError) -> Self {
        match err {
            HierarchyError::Cycle { class } => modbreaker_core::Error::InheritanceCycle { class },
            other => modbreaker_core::Error::invalid_data(other.to_string()),
        }
    }
}

/// Effective view of one class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedClass {
    /// Own properties over inherited ones
    pub properties: PropertyMap,
    /// The class itself, then each resolved ancestor
    pub chain: Vec<ClassId>,
    /// Name of the first ancestor that is not in this hierarchy
    pub unresolved_parent: Option<String>,
}

/// All classes recovered from one or more configs
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassHierarchy {
    classes: Vec<ConfigClass>,
    #[serde(skip)]
    parents: Vec<Option<ClassId>>,
    #[serde(skip)]
    index: HashMap<String, Vec<ClassId>>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the arena and link parents
    pub fn from_classes(classes: Vec<ConfigClass>) -> Self {
        let mut hierarchy = Self::new();
        hierarchy.extend(classes);
        hierarchy
    }

    /// Add classes and re-link every parent, so a class added later can
    /// satisfy a parent reference made earlier
    pub fn extend(&mut self, classes: impl IntoIterator<Item = ConfigClass>) {
        for class in classes {
            let id = ClassId(self.classes.len());
            self.index.entry(fold_case(&class.name)).or_default().push(id);
            self.classes.push(class);
        }
        self.link_parents();
    }

    /// Parent candidates with the same name: same section first, then
    /// declaration order. A class never parents itself.
    fn link_parents(&mut self) {
        self.parents = (0..self.classes.len())
            .map(|idx| {
                let class = &self.classes[idx];
                let candidates = self.index.get(&fold_case(class.parent.as_deref()?))?;
                candidates
                    .iter()
                    .filter(|id| id.0 != idx)
                    .find(|id| self.classes[id.0].section == class.section)
                    .or_else(|| candidates.iter().find(|id| id.0 != idx))
                    .copied()
            })
            .collect();
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn get(&self, id: ClassId) -> Option<&ConfigClass> {
        self.classes.get(id.0)
    }

    /// Take the classes back out, in insertion order
    pub fn into_classes(self) -> Vec<ConfigClass> {
        self.classes
    }

    /// All classes with their ids, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &ConfigClass)> {
        self.classes.iter().enumerate().map(|(i, c)| (ClassId(i), c))
    }

    /// First class with this name, ignoring case
    pub fn find(&self, name: &str) -> Option<ClassId> {
        self.find_all(name).first().copied()
    }

    /// Every class with this name, ignoring case
    pub fn find_all(&self, name: &str) -> &[ClassId] {
        self.index.get(&fold_case(name)).map_or(&[], Vec::as_slice)
    }

    pub fn find_in_section(&self, name: &str, section: ConfigSection) -> Option<ClassId> {
        self.find_all(name)
            .iter()
            .copied()
            .find(|id| self.classes[id.0].section == section)
    }

    /// Resolved parent, `None` for roots and external parents
    pub fn parent_of(&self, id: ClassId) -> Option<ClassId> {
        self.parents.get(id.0).copied().flatten()
    }

    /// Classes whose resolved parent is `id`
    pub fn children_of(&self, id: ClassId) -> Vec<ClassId> {
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, p)| **p == Some(id))
            .map(|(i, _)| ClassId(i))
            .collect()
    }

    /// The class and its resolved ancestors, nearest first
    pub fn chain(&self, id: ClassId) -> Result<Vec<ClassId>, HierarchyError> {
        if id.0 >= self.classes.len() {
            return Err(HierarchyError::UnknownId(id.0));
        }

        let mut chain = vec![id];
        let mut visited = HashSet::from([id]);
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            if !visited.insert(parent) {
                return Err(HierarchyError::Cycle {
                    class: self.classes[parent.0].name.clone(),
                });
            }
            chain.push(parent);
            current = parent;
        }
        Ok(chain)
    }

    /// Own properties merged over everything inherited
    pub fn effective_properties(&self, id: ClassId) -> Result<ResolvedClass, HierarchyError> {
        let chain = self.chain(id)?;

        let mut properties = PropertyMap::new();
        for ancestor in chain.iter().rev() {
            let class = &self.classes[ancestor.0];
            for (name, value) in class.properties.iter() {
                match value {
                    ConfigValue::Array(items) if class.is_extended(name) => properties.extend_array(name, items),
                    _ => {
                        properties.insert(name, value.clone());
                    }
                }
            }
        }

        let unresolved_parent = chain
            .last()
            .and_then(|top| self.classes[top.0].parent.clone());

        Ok(ResolvedClass {
            properties,
            chain,
            unresolved_parent,
        })
    }

    /// One effective property, stopping at the nearest class that sets it
    pub fn effective_property(&self, id: ClassId, name: &str) -> Result<Option<ConfigValue>, HierarchyError> {
        for ancestor in self.chain(id)? {
            let class = &self.classes[ancestor.0];
            if let Some(value) = class.properties.get(name) {
                if class.is_extended(name) {
                    // Appended arrays need the whole chain
                    return Ok(self.effective_properties(id)?.properties.get(name).cloned());
                }
                return Ok(Some(value.clone()));
            }
        }
        Ok(None)
    }

    /// Effective `model` property, the key meshes are joined on
    pub fn model_path(&self, id: ClassId) -> Result<Option<String>, HierarchyError> {
        Ok(self
            .effective_property(id, "model")?
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.trim().is_empty()))
    }

    /// Class count per section
    pub fn section_counts(&self) -> HashMap<ConfigSection, usize> {
        let mut counts = HashMap::new();
        for class in &self.classes {
            *counts.entry(class.section).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> ConfigValue {
        ConfigValue::Text(s.to_string())
    }

    fn sample() -> ClassHierarchy {
        ClassHierarchy::from_classes(vec![
            ConfigClass::new("Weapon_Base", ConfigSection::CfgWeapons)
                .with_property("model", text("\\base.p3d"))
                .with_property("weight", ConfigValue::Int(1000))
                .with_property("attachments", ConfigValue::Array(vec![text("sling")])),
            ConfigClass::new("Rifle", ConfigSection::CfgWeapons)
                .with_parent("weapon_base")
                .with_property("weight", ConfigValue::Int(3200)),
            {
                let mut c = ConfigClass::new("ScopedRifle", ConfigSection::CfgWeapons)
                    .with_parent("Rifle")
                    .with_property("model", text("\\scoped.p3d"))
                    .with_property("attachments", ConfigValue::Array(vec![text("optic")]));
                c.extended.push("attachments".into());
                c
            },
            ConfigClass::new("Orphan", ConfigSection::CfgVehicles).with_parent("Inventory_Base"),
        ])
    }

    #[test]
    fn test_inheritance() {
        let h = sample();
        let rifle = h.find("RIFLE").unwrap();
        let resolved = h.effective_properties(rifle).unwrap();

        assert_eq!(resolved.properties.get("weight"), Some(&ConfigValue::Int(3200)));
        assert_eq!(h.model_path(rifle).unwrap().as_deref(), Some("\\base.p3d"));
        assert_eq!(resolved.chain.len(), 2);
        assert_eq!(resolved.unresolved_parent, None);
        assert_eq!(h.children_of(h.find("Weapon_Base").unwrap()), vec![rifle]);
    }

    #[test]
    fn test_extended_array_appends() {
        let h = sample();
        let scoped = h.find("ScopedRifle").unwrap();
        let attachments = h.effective_property(scoped, "attachments").unwrap().unwrap();
        assert_eq!(attachments.strings(), vec!["sling", "optic"]);
        assert_eq!(h.model_path(scoped).unwrap().as_deref(), Some("\\scoped.p3d"));
    }

    #[test]
    fn test_external_parent_reported() {
        let h = sample();
        let orphan = h.find("orphan").unwrap();
        assert_eq!(h.parent_of(orphan), None);
        let resolved = h.effective_properties(orphan).unwrap();
        assert_eq!(resolved.unresolved_parent.as_deref(), Some("Inventory_Base"));
        assert_eq!(h.model_path(orphan).unwrap(), None);
    }

    #[test]
    fn test_cycle_detected_lazily() {
        let h = ClassHierarchy::from_classes(vec![
            ConfigClass::new("A", ConfigSection::Unscoped).with_parent("B"),
            ConfigClass::new("B", ConfigSection::Unscoped).with_parent("A"),
            ConfigClass::new("C", ConfigSection::Unscoped).with_property("model", text("c.p3d")),
        ]);
        assert_eq!(h.len(), 3);

        let a = h.find("A").unwrap();
        assert!(matches!(h.effective_properties(a), Err(HierarchyError::Cycle { .. })));
        assert!(matches!(h.model_path(a), Err(HierarchyError::Cycle { .. })));

        // Unrelated classes still resolve
        let c = h.find("C").unwrap();
        assert_eq!(h.model_path(c).unwrap().as_deref(), Some("c.p3d"));
    }

    #[test]
    fn test_same_section_parent_preferred() {
        let h = ClassHierarchy::from_classes(vec![
            ConfigClass::new("Base", ConfigSection::CfgVehicles).with_property("kind", text("vehicle")),
            ConfigClass::new("Base", ConfigSection::CfgWeapons).with_property("kind", text("weapon")),
            ConfigClass::new("Gun", ConfigSection::CfgWeapons).with_parent("Base"),
        ]);
        let gun = h.find("Gun").unwrap();
        let kind = h.effective_property(gun, "kind").unwrap();
        assert_eq!(kind, Some(text("weapon")));
        assert_eq!(h.find_all("base").len(), 2);
        assert!(h.find_in_section("base", ConfigSection::CfgVehicles).is_some());
    }

    #[test]
    fn test_self_parent_is_not_a_cycle() {
        let h = ClassHierarchy::from_classes(vec![ConfigClass::new("Loop", ConfigSection::Unscoped).with_parent("loop")]);
        let id = h.find("Loop").unwrap();
        assert_eq!(h.parent_of(id), None);
        assert!(h.effective_properties(id).is_ok());
    }
}
