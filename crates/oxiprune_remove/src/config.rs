use anyhow::{Result, anyhow};
use clap::Parser;
use log::{debug, info};
use oxiprune_core::{
    JS_EXTENSIONS, ProjectConfig, ResolveContext, TS_EXTENSIONS, normalize_path,
    read_project_config,
};
use std::path::PathBuf;

use crate::remover::RemovalOptions;

/// Base directory used when neither the CLI nor `oxiprune.json` names one
pub const DEFAULT_BASE_DIR: &str = "src";

/// Audit directory used when neither the CLI nor `oxiprune.json` names one
pub const DEFAULT_AUDIT_DIR: &str = ".oxiprune/audits";

#[derive(Debug, Clone, Parser)]
#[command(name = "remove")]
#[command(about = "Delete files or directories and remove every import of them")]
pub struct Config {
    /// Files or directories to delete
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Root directory of the project (defaults to git root)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Directory scanned for importers, relative to the root (defaults to "src")
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Specifier prefix that stands for the base directory, e.g. "src" or "@"
    #[arg(long = "root-alias")]
    pub root_aliases: Vec<String>,

    /// Also scan JavaScript files for imports
    #[arg(long)]
    pub include_js: bool,

    /// Report what would be removed without modifying anything
    #[arg(long)]
    pub dry_run: bool,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Directory for the audit file (defaults to <root>/.oxiprune/audits)
    #[arg(long)]
    pub audit_dir: Option<PathBuf>,

    /// Do not write an audit file
    #[arg(long)]
    pub no_audit: bool,

    #[clap(skip)]
    pub project: ProjectConfig,
}

impl Config {
    /// Resolves the root directory and merges `oxiprune.json` into unset options
    pub fn initialize(&mut self) -> Result<()> {
        let root = if let Some(r) = self.root.take() {
            debug!("Using provided root directory: {:?}", r);
            normalize_path(&r)
        } else {
            debug!("No root provided, searching for git root");
            oxiprune_core::find_git_root()?
        };
        info!("Using root directory: {}", root.display());

        self.project = read_project_config(&root)?;

        let base_dir = self
            .base_dir
            .take()
            .or_else(|| self.project.base_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR));
        self.base_dir = Some(normalize_path(&root.join(base_dir)));
        debug!("Using base directory: {:?}", self.base_dir);

        for alias in &self.project.root_aliases {
            if !self.root_aliases.contains(alias) {
                self.root_aliases.push(alias.clone());
            }
        }
        self.include_js |= self.project.include_js.unwrap_or(false);
        if self.audit_dir.is_none() {
            self.audit_dir = self.project.audit_dir.clone();
        }

        self.root = Some(root);
        Ok(())
    }

    /// Get the root directory, returning an error if not initialized
    pub fn root(&self) -> Result<&PathBuf> {
        self.root
            .as_ref()
            .ok_or_else(|| anyhow!("Config not initialized - call initialize() first"))
    }

    pub fn resolve_context(&self) -> Result<ResolveContext> {
        let root = self.root()?.clone();
        let base_dir = self
            .base_dir
            .clone()
            .ok_or_else(|| anyhow!("Config not initialized - call initialize() first"))?;
        Ok(ResolveContext::new(root, base_dir).with_root_aliases(self.root_aliases.clone()))
    }

    pub fn extensions(&self) -> Vec<&'static str> {
        let mut extensions = TS_EXTENSIONS.to_vec();
        if self.include_js {
            extensions.extend_from_slice(JS_EXTENSIONS);
        }
        extensions
    }

    pub fn removal_options(&self) -> RemovalOptions {
        RemovalOptions { dry_run: self.dry_run, extensions: self.extensions() }
    }

    /// Where to persist the audit, or `None` for dry runs and `--no-audit`
    pub fn audit_dir(&self) -> Result<Option<PathBuf>> {
        if self.no_audit || self.dry_run {
            return Ok(None);
        }
        let root = self.root()?;
        let dir = self.audit_dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_DIR));
        Ok(Some(root.join(dir)))
    }
}
