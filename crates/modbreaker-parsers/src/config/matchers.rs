// modbreaker-parsers/src/config/matchers.rs
//! Text matchers used when a config cannot be decoded structurally
//!
//! Each matcher is a stateless pass over the decoded text. The reader runs
//! them in order and merges their output: the first matcher to supply a
//! class wins and later ones only fill its gaps.

use once_cell::sync::Lazy;
use regex::Regex;

use super::class::{ConfigClass, ConfigSection};
use super::text::{class_decl_at, parse_body, top_level_classes, ClassDecl};
use super::value::ConfigValue;
use super::ConfigOptions;

static SECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bclass\s+(\w+)\s*(?::\s*\w+\s*)?\{").expect("section pattern"));

static CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bclass\s+\w+").expect("class pattern"));

static MODEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bmodel\s*=\s*["']([^"'\r\n]+\.p3d)["']"#).expect("model pattern"));

/// One pass that recovers class records from config text
pub trait TextMatcher: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &'static str;

    /// Classes found in `text`, in file order
    fn find(&self, text: &str, options: &ConfigOptions) -> Vec<ConfigClass>;
}

/// Top-level blocks that group classes rather than declare one
/// (`CfgPatches`, `CfgMods`, the recognised sections)
fn is_container(name: &str) -> bool {
    ConfigSection::from_name(name).is_some() || name.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("cfg"))
}

/// Record for a brace-delimited class declaration
fn class_from_decl(text: &str, decl: &ClassDecl, section: ConfigSection) -> ConfigClass {
    let mut class = ConfigClass::new(decl.name.clone(), section);
    class.parent = decl.parent.clone();
    if let Some(body) = &decl.body {
        let parsed = parse_body(text, body.clone());
        class.properties = parsed.properties;
        class.extended = parsed.extended;
    }
    class
}

/// Direct children of recognised section blocks (`class CfgVehicles {...}`)
#[derive(Debug, Clone)]
pub struct SectionMatcher {
    pub sections: Vec<ConfigSection>,
}

impl Default for SectionMatcher {
    fn default() -> Self {
        Self {
            sections: ConfigSection::RECOGNIZED.to_vec(),
        }
    }
}

impl TextMatcher for SectionMatcher {
    fn name(&self) -> &'static str {
        "section"
    }

    fn find(&self, text: &str, _options: &ConfigOptions) -> Vec<ConfigClass> {
        let mut out = Vec::new();

        for caps in SECTION_RE.captures_iter(text) {
            let Some(section) = ConfigSection::from_name(&caps[1]).filter(|s| self.sections.contains(s)) else {
                continue;
            };
            let Some(start) = caps.get(0).map(|m| m.start()) else {
                continue;
            };
            let Some(container) = class_decl_at(text, start) else {
                continue;
            };
            let Some(body) = container.body else {
                continue;
            };

            for decl in parse_body(text, body).classes {
                // `class Base;` inside a section only names an external class
                if decl.body.is_some() {
                    out.push(class_from_decl(text, &decl, section));
                }
            }
        }
        out
    }
}

/// Top-level `class Name : Parent { ... }` blocks outside any container,
/// for configs that declare items without a section
#[derive(Debug, Clone, Default)]
pub struct DeclarationMatcher;

impl TextMatcher for DeclarationMatcher {
    fn name(&self) -> &'static str {
        "declaration"
    }

    fn find(&self, text: &str, _options: &ConfigOptions) -> Vec<ConfigClass> {
        top_level_classes(text)
            .into_iter()
            .filter_map(|start| class_decl_at(text, start))
            .filter(|decl| decl.body.is_some() && !is_container(&decl.name))
            .map(|decl| class_from_decl(text, &decl, ConfigSection::Unscoped))
            .collect()
    }
}

/// `model = "...p3d"` assignments tied to the class whose body holds
/// them; where braces no longer line up, the nearest preceding class name
/// is used
#[derive(Debug, Clone, Default)]
pub struct ModelAssignmentMatcher;

impl TextMatcher for ModelAssignmentMatcher {
    fn name(&self) -> &'static str {
        "model"
    }

    fn find(&self, text: &str, options: &ConfigOptions) -> Vec<ConfigClass> {
        let mut out = Vec::new();

        for caps in MODEL_RE.captures_iter(text) {
            let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
                continue;
            };

            let mut window_start = whole.start().saturating_sub(options.model_window);
            while !text.is_char_boundary(window_start) {
                window_start += 1;
            }
            let Some(class_name) = owner(text, window_start, whole.start()) else {
                continue;
            };
            if is_container(class_name) {
                continue;
            }

            out.push(
                ConfigClass::new(class_name, ConfigSection::Unscoped)
                    .with_property("model", ConfigValue::Text(path.as_str().to_string())),
            );
        }
        out
    }
}

/// Name of the class owning the assignment at `at`, searching back from
/// `at` to `window_start`. Classes that close before `at` are nested
/// siblings and skipped; a declaration that cannot be read claims it.
fn owner(text: &str, window_start: usize, at: usize) -> Option<&str> {
    let window = &text[window_start..at];
    let hits: Vec<_> = CLASS_RE.find_iter(window).collect();

    hits.into_iter().rev().find_map(|m| {
        let name = m.as_str().split_whitespace().nth(1)?;
        match class_decl_at(text, window_start + m.start()) {
            Some(decl) => decl.body.filter(|body| body.contains(&at)).map(|_| name),
            None => Some(name),
        }
    })
}

/// Matchers in priority order
pub fn default_matchers() -> Vec<Box<dyn TextMatcher>> {
    vec![
        Box::new(SectionMatcher::default()),
        Box::new(DeclarationMatcher),
        Box::new(ModelAssignmentMatcher),
    ]
}

/// Merge one matcher's output into the classes of earlier matchers.
///
/// A class already supplied by an earlier matcher only has its gaps
/// filled. A sectioned class matches an earlier one of the same name in
/// its own section, else an unscoped one; an unscoped class matches the
/// first of that name in any section. Same-named classes within `found`
/// stay separate. Returns how many classes were new.
pub fn merge_into(classes: &mut Vec<ConfigClass>, found: Vec<ConfigClass>) -> usize {
    let earlier = classes.len();
    let mut added = 0;
    for class in found {
        let named = |c: &ConfigClass, section: Option<ConfigSection>| {
            c.name.eq_ignore_ascii_case(&class.name) && section.map_or(true, |s| c.section == s)
        };
        let slot = match class.section {
            ConfigSection::Unscoped => classes[..earlier].iter().position(|c| named(c, None)),
            section => classes[..earlier]
                .iter()
                .position(|c| named(c, Some(section)))
                .or_else(|| {
                    classes[..earlier]
                        .iter()
                        .position(|c| named(c, Some(ConfigSection::Unscoped)))
                }),
        };

        match slot {
            Some(idx) => {
                classes[idx].fill_gaps(&class);
            }
            None => {
                classes.push(class);
                added += 1;
            }
        }
    }
    added
}
