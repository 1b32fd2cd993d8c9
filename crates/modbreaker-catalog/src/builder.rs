// modbreaker-catalog/src/builder.rs
//! Catalog construction
//!
//! Configs, economy tables and meshes are decoded in parallel; the merge,
//! the join and the final ordering are sequential, so a build is
//! deterministic regardless of thread count.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use modbreaker_core::{Error, Result};
use modbreaker_parsers::config::{ClassHierarchy, ClassId, ConfigClass, ConfigReader, ConfigSection};
use modbreaker_parsers::economy::{read_types, EconomyError, EconomyTable};
use modbreaker_parsers::log_parse_error;
use modbreaker_parsers::logging::{instrument_parse, log_progress};
use modbreaker_parsers::p3d::{parse_mesh, MeshRecord};
use modbreaker_parsers::signature::{extension_of, file_stem, fold_case, FileKind};
use modbreaker_parsers::{ParseError, ParseOptions};
use modbreaker_vfs::path::{parent_path, path_key};
use modbreaker_vfs::{merge_references, SidecarResolver, VfsNode, VfsTree};

use crate::diagnostics::{CatalogDiagnostics, CatalogFailure};
use crate::entry::{CatalogEntry, JoinMethod, MeshSummary};

/// What goes into a catalog
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Keep full vertex and triangle data on each entry
    pub include_geometry: bool,
    pub resolve_sidecars: bool,
    /// Skip classes without a `model`
    pub only_with_model: bool,
    /// Sections to keep; empty keeps all
    pub sections: Vec<ConfigSection>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            include_geometry: false,
            resolve_sidecars: true,
            only_with_model: false,
            sections: Vec::new(),
        }
    }
}

/// Entries sorted by section, then name, then source config
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
    pub diagnostics: CatalogDiagnostics,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// First entry with this class name, ignoring case
    pub fn find(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name().eq_ignore_ascii_case(name))
    }

    pub fn in_section(&self, section: ConfigSection) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(move |e| e.section() == section)
    }
}

/// Mounted meshes by folded path and by folded stem
struct MeshIndex<'a> {
    nodes: Vec<&'a VfsNode>,
    by_key: HashMap<String, usize>,
    by_stem: HashMap<String, Vec<usize>>,
}

enum MeshLookup {
    Found(usize, JoinMethod),
    Ambiguous,
    Missing,
}

impl<'a> MeshIndex<'a> {
    fn new(files: &'a [VfsNode]) -> Self {
        let nodes: Vec<_> = files.iter().filter(|n| n.kind() == FileKind::Mesh).collect();
        let mut by_key = HashMap::with_capacity(nodes.len());
        let mut by_stem: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, node) in nodes.iter().enumerate() {
            by_key.insert(path_key(&node.path), idx);
            by_stem.entry(fold_case(file_stem(&node.path))).or_default().push(idx);
        }

        Self { nodes, by_key, by_stem }
    }

    fn path(&self, idx: usize) -> Option<&str> {
        self.nodes.get(idx).map(|n| n.path.as_str())
    }

    /// Models may omit the `.p3d` suffix
    fn lookup(&self, model: &str) -> MeshLookup {
        let mut key = path_key(model);
        if extension_of(&key).is_none() {
            key.push_str(".p3d");
        }

        if let Some(&idx) = self.by_key.get(&key) {
            return MeshLookup::Found(idx, JoinMethod::Path);
        }

        match self.by_stem.get(&fold_case(file_stem(&key))).map(Vec::as_slice) {
            Some([idx]) => MeshLookup::Found(*idx, JoinMethod::Stem),
            Some([_, _, ..]) => MeshLookup::Ambiguous,
            _ => MeshLookup::Missing,
        }
    }
}

/// One class with its join outcome
struct Join {
    id: ClassId,
    model: Option<String>,
    mesh: Option<usize>,
    method: JoinMethod,
}

struct ParsedMesh {
    summary: MeshSummary,
    record: Arc<MeshRecord>,
}

/// Runs the whole pipeline over a [`VfsTree`]
#[derive(Debug, Clone, Default)]
pub struct CatalogBuilder {
    options: ParseOptions,
    catalog: CatalogOptions,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_catalog_options(mut self, catalog: CatalogOptions) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Mount a mod folder and catalog it. Only a missing folder is an error;
    /// archives that fail to open are listed in the diagnostics.
    pub fn build_folder(&self, folder: &Path) -> Result<Catalog> {
        let tree = VfsTree::new();
        let summary = tree.mount_folder(folder, &self.options)?;

        let mut catalog = self.build(&tree);
        catalog.diagnostics.archives = summary.archives + summary.nested_archives;
        catalog.diagnostics.failures.extend(
            summary
                .failed
                .into_iter()
                .map(|(subject, message)| CatalogFailure { subject, stage: None, message }),
        );
        Ok(catalog)
    }

    /// Catalog one PBO and the archives nested in it
    pub fn build_archive(&self, archive: &Path) -> Result<Catalog> {
        let tree = VfsTree::new();
        let nested = tree.mount_archive_file(archive, &self.options)?;

        let mut catalog = self.build(&tree);
        catalog.diagnostics.archives = 1 + nested;
        Ok(catalog)
    }

    /// Catalog everything mounted in `tree`. Per-input hard errors are
    /// recorded in the diagnostics; the build itself cannot fail.
    pub fn build(&self, tree: &VfsTree) -> Catalog {
        instrument_parse("catalog", || {
            let files = tree.files();
            let mut diagnostics = CatalogDiagnostics::default();

            let configs = select_configs(&files);
            debug!(files = files.len(), configs = configs.len(), "catalog inputs");

            let (hierarchy, sources) = self.read_configs(tree, &configs, &mut diagnostics);
            diagnostics.classes = hierarchy.len();

            let economy = read_economy(tree, &select_economy(&files), &mut diagnostics);
            diagnostics.economy_items = economy.len();
            diagnostics.unmatched_economy = economy
                .iter()
                .filter(|item| hierarchy.find(&item.name).is_none())
                .map(|item| item.name.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let index = MeshIndex::new(&files);
            let joins = self.join(&hierarchy, &index, &mut diagnostics);
            let meshes = self.parse_meshes(tree, &index, &joins, &mut diagnostics);

            let resolver = SidecarResolver::with_options(self.options.config.clone());
            let built: Vec<_> = joins
                .par_iter()
                .filter_map(|join| self.entry(tree, &resolver, &hierarchy, &sources, &index, &meshes, &economy, join))
                .collect();

            let mut entries = Vec::with_capacity(built.len());
            for (entry, failure) in built {
                diagnostics.sidecars += entry.sidecars.len();
                diagnostics.failures.extend(failure);
                entries.push(entry);
            }
            entries.sort_by(|a, b| {
                a.section()
                    .cmp(&b.section())
                    .then_with(|| fold_case(a.name()).cmp(&fold_case(b.name())))
                    .then_with(|| a.source.cmp(&b.source))
            });

            info!(
                entries = entries.len(),
                meshes = diagnostics.meshes_parsed,
                failures = diagnostics.failures.len(),
                "catalog built"
            );
            Catalog { entries, diagnostics }
        })
    }

    /// Decode every config and merge the classes into one hierarchy, in
    /// config path order. Returns the source path of each class by id.
    fn read_configs(
        &self,
        tree: &VfsTree,
        configs: &[String],
        diagnostics: &mut CatalogDiagnostics,
    ) -> (ClassHierarchy, Vec<String>) {
        let reports: Vec<_> = configs
            .par_iter()
            .map(|path| {
                let reader = ConfigReader::with_options(self.options.config.clone());
                let report = tree.read_file(path).map(|data| reader.read(&data));
                (path, report)
            })
            .collect();

        let mut classes: Vec<ConfigClass> = Vec::new();
        let mut sources = Vec::new();
        for (path, report) in reports {
            match report {
                Ok(report) => {
                    *diagnostics
                        .config_tiers
                        .entry(report.diagnostics.tier.to_string())
                        .or_default() += 1;
                    if let Some(reason) = &report.diagnostics.structured_failure {
                        debug!(config = %path, reason = %reason, "config read as text");
                    }
                    for class in report.hierarchy.into_classes() {
                        sources.push(path.clone());
                        classes.push(class);
                    }
                }
                Err(e) => {
                    warn!(config = %path, error = %e, "config unreadable");
                    diagnostics.record(path.as_str(), &Error::from(e));
                }
            }
        }

        (ClassHierarchy::from_classes(classes), sources)
    }

    fn join(&self, hierarchy: &ClassHierarchy, index: &MeshIndex<'_>, diagnostics: &mut CatalogDiagnostics) -> Vec<Join> {
        let mut unmatched = BTreeSet::new();
        let mut ambiguous = BTreeSet::new();
        let mut joins = Vec::new();

        for (id, class) in hierarchy.iter() {
            if !self.catalog.sections.is_empty() && !self.catalog.sections.contains(&class.section) {
                continue;
            }

            // A cyclic chain is reported when the entry resolves its properties
            let model = hierarchy.model_path(id).ok().flatten();
            let (mesh, method) = match &model {
                None if self.catalog.only_with_model => continue,
                None => (None, JoinMethod::NoModel),
                Some(model) => match index.lookup(model) {
                    MeshLookup::Found(idx, method) => (Some(idx), method),
                    MeshLookup::Ambiguous => {
                        ambiguous.insert(model.clone());
                        unmatched.insert(model.clone());
                        (None, JoinMethod::Unmatched)
                    }
                    MeshLookup::Missing => {
                        unmatched.insert(model.clone());
                        (None, JoinMethod::Unmatched)
                    }
                },
            };

            match method {
                JoinMethod::Path => diagnostics.joined_by_path += 1,
                JoinMethod::Stem => diagnostics.joined_by_stem += 1,
                _ => {}
            }
            joins.push(Join { id, model, mesh, method });
        }

        diagnostics.unmatched_models = unmatched.into_iter().collect();
        diagnostics.ambiguous_models = ambiguous.into_iter().collect();
        joins
    }

    /// Parse each joined mesh once; meshes nothing joined to are only listed
    fn parse_meshes(
        &self,
        tree: &VfsTree,
        index: &MeshIndex<'_>,
        joins: &[Join],
        diagnostics: &mut CatalogDiagnostics,
    ) -> HashMap<usize, ParsedMesh> {
        let referenced: BTreeSet<usize> = joins.iter().filter_map(|j| j.mesh).collect();

        let parsed: Vec<_> = referenced
            .par_iter()
            .filter_map(|&idx| {
                let path = index.path(idx)?;
                let result = tree
                    .read_file(path)
                    .map_err(Error::from)
                    .and_then(|data| parse_mesh(&data, &self.options.mesh).map_err(Error::from));
                Some((idx, path, result))
            })
            .collect();

        let mut meshes = HashMap::with_capacity(parsed.len());
        let mut validity: BTreeMap<String, usize> = BTreeMap::new();
        let total = parsed.len();
        for (done, (idx, path, result)) in parsed.into_iter().enumerate() {
            log_progress("parse meshes", done + 1, total);
            match result {
                Ok((record, mesh_diagnostics)) => {
                    *validity.entry(record.validity.to_string()).or_default() += 1;
                    let summary = MeshSummary::new(path, &record, &mesh_diagnostics);
                    meshes.insert(idx, ParsedMesh { summary, record: Arc::new(record) });
                }
                Err(e) => {
                    log_parse_error!("p3d", path, e);
                    diagnostics.record(path, &e);
                }
            }
        }

        diagnostics.meshes_parsed = meshes.len();
        diagnostics.mesh_validity = validity;
        diagnostics.orphan_meshes = (0..index.nodes.len())
            .filter(|idx| !referenced.contains(idx))
            .filter_map(|idx| index.path(idx).map(str::to_string))
            .collect();
        meshes
    }

    #[allow(clippy::too_many_arguments)]
    fn entry(
        &self,
        tree: &VfsTree,
        resolver: &SidecarResolver,
        hierarchy: &ClassHierarchy,
        sources: &[String],
        index: &MeshIndex<'_>,
        meshes: &HashMap<usize, ParsedMesh>,
        economy: &EconomyTable,
        join: &Join,
    ) -> Option<(CatalogEntry, Option<CatalogFailure>)> {
        let class = hierarchy.get(join.id)?;

        let (properties, failure) = match hierarchy.effective_properties(join.id) {
            Ok(resolved) => (resolved.properties, None),
            Err(e) => (class.properties.clone(), Some(CatalogFailure::new(&class.name, &Error::from(e)))),
        };

        let parsed = join.mesh.and_then(|idx| meshes.get(&idx));

        let sidecars = if self.catalog.resolve_sidecars {
            let base = join
                .mesh
                .and_then(|idx| index.path(idx))
                .map(str::to_string)
                .or_else(|| join.model.clone());
            let mut sets = Vec::with_capacity(2);
            if let Some(base) = base {
                sets.push(resolver.resolve(tree, &base));
            }
            sets.push(resolver.resolve_selections(tree, &properties, &class.name));
            merge_references(sets)
        } else {
            Vec::new()
        };

        let entry = CatalogEntry {
            class: class.clone(),
            source: sources.get(join.id.0).cloned().unwrap_or_default(),
            properties,
            model: join.model.clone(),
            join: join.method,
            mesh: parsed.map(|m| m.summary.clone()),
            geometry: parsed
                .filter(|_| self.catalog.include_geometry)
                .map(|m| Arc::clone(&m.record)),
            sidecars,
            economy: economy.get(&class.name).cloned(),
        };
        Some((entry, failure))
    }
}

/// One config per directory: `config.bin` over `config.cpp` over
/// `config.hpp`. Sorted by path.
fn select_configs(files: &[VfsNode]) -> Vec<String> {
    fn rank(node: &VfsNode) -> u8 {
        match node.extension() {
            Some("bin") => 0,
            Some("cpp") => 1,
            _ => 2,
        }
    }

    let mut by_dir: BTreeMap<String, &VfsNode> = BTreeMap::new();
    for node in files.iter().filter(|n| FileKind::is_config_name(&n.name)) {
        let dir = path_key(&parent_path(&node.path).unwrap_or_default());
        by_dir
            .entry(dir)
            .and_modify(|kept| {
                if rank(node) < rank(kept) {
                    *kept = node;
                }
            })
            .or_insert(node);
    }

    let mut paths: Vec<_> = by_dir.into_values().map(|n| n.path.clone()).collect();
    paths.sort_by_key(|p| path_key(p));
    paths
}

/// Every XML file, sorted by path; later tables override earlier ones
fn select_economy(files: &[VfsNode]) -> Vec<String> {
    let mut paths: Vec<_> = files
        .iter()
        .filter(|n| n.kind() == FileKind::Xml)
        .map(|n| n.path.clone())
        .collect();
    paths.sort_by_key(|p| path_key(p));
    paths
}

/// Read every economy table and merge them in path order. XML files
/// that are not `<types>` tables are skipped quietly.
fn read_economy(tree: &VfsTree, paths: &[String], diagnostics: &mut CatalogDiagnostics) -> EconomyTable {
    let tables: Vec<_> = paths
        .par_iter()
        .map(|path| {
            let table = tree
                .read_file(path)
                .map_err(Error::from)
                .map(|data| read_types(&data));
            (path, table)
        })
        .collect();

    let mut economy = EconomyTable::new();
    for (path, table) in tables {
        match table {
            Ok(Ok(table)) => {
                debug!(file = %path, items = table.len(), "economy table");
                diagnostics.economy_files += 1;
                economy.extend(table);
            }
            Ok(Err(EconomyError::NotTypes { root })) => {
                debug!(file = %path, root = %root, "not an economy table");
            }
            Ok(Err(e)) => {
                log_parse_error!("types.xml", path, e);
                diagnostics.record(path.as_str(), &Error::from(ParseError::from(e)));
            }
            Err(e) => {
                warn!(file = %path, error = %e, "economy file unreadable");
                diagnostics.record(path.as_str(), &e);
            }
        }
    }
    economy
}
