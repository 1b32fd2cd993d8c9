// modbreaker-catalog/src/diagnostics.rs
//! What a catalog build saw, degraded and skipped

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use modbreaker_core::{Error, Stage};

/// A hard error tied to one input; the build carried on without it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogFailure {
    /// VFS path, archive path or class name
    pub subject: String,
    pub stage: Option<Stage>,
    pub message: String,
}

impl CatalogFailure {
    pub fn new(subject: impl Into<String>, error: &Error) -> Self {
        Self {
            subject: subject.into(),
            stage: error.stage(),
            message: error.to_string(),
        }
    }
}

/// Counts and failures of one catalog build
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogDiagnostics {
    /// Archives mounted, nested ones included
    pub archives: usize,
    /// Configs read, by tier used
    pub config_tiers: BTreeMap<String, usize>,
    pub classes: usize,
    pub meshes_parsed: usize,
    /// Parsed meshes by validity
    pub mesh_validity: BTreeMap<String, usize>,
    pub joined_by_path: usize,
    pub joined_by_stem: usize,
    /// Models that name no mounted mesh
    pub unmatched_models: Vec<String>,
    /// Models whose stem fits several mounted meshes
    pub ambiguous_models: Vec<String>,
    /// Meshes no class refers to
    pub orphan_meshes: Vec<String>,
    pub sidecars: usize,
    /// `types.xml` tables read
    pub economy_files: usize,
    pub economy_items: usize,
    /// Economy items naming no class
    pub unmatched_economy: Vec<String>,
    pub failures: Vec<CatalogFailure>,
}

impl CatalogDiagnostics {
    pub fn record(&mut self, subject: impl Into<String>, error: &Error) {
        self.failures.push(CatalogFailure::new(subject, error));
    }

    pub fn configs_read(&self) -> usize {
        self.config_tiers.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for CatalogDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "archives:        {}", self.archives)?;
        write!(f, "configs:         {}", self.configs_read())?;
        for (tier, count) in &self.config_tiers {
            write!(f, " {tier}={count}")?;
        }
        writeln!(f)?;
        writeln!(f, "classes:         {}", self.classes)?;
        write!(f, "meshes:          {}", self.meshes_parsed)?;
        for (validity, count) in &self.mesh_validity {
            write!(f, " {validity}={count}")?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "joined:          {} by path, {} by stem, {} unmatched, {} ambiguous",
            self.joined_by_path,
            self.joined_by_stem,
            self.unmatched_models.len(),
            self.ambiguous_models.len()
        )?;
        writeln!(f, "orphan meshes:   {}", self.orphan_meshes.len())?;
        writeln!(f, "sidecars:        {}", self.sidecars)?;
        writeln!(
            f,
            "economy:         {} items in {} files, {} unmatched",
            self.economy_items,
            self.economy_files,
            self.unmatched_economy.len()
        )?;
        write!(f, "failures:        {}", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.subject, failure.message)?;
        }
        Ok(())
    }
}
