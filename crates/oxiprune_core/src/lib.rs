//! Core utilities for oxiprune.
//!
//! This crate provides the building blocks of import-aware file removal in
//! JavaScript/TypeScript projects:
//! - Resolving relative and root-aliased module specifiers to files
//! - Walking directory targets
//! - Loading a project into editable source files and listing their imports
//! - Configuration utilities (git root finding, `oxiprune.json` reading)

mod config;
mod constants;
mod parser;
mod project;
mod resolver;
mod types;
mod walker;

// Re-export public API
pub use config::{
    PROJECT_CONFIG_FILE, ProjectConfig, ResolveContext, find_git_root, find_git_root_from,
    read_project_config,
};
pub use constants::{
    INDEX_STEM, JS_EXTENSIONS, RESOLVE_EXTENSIONS, TS_EXTENSIONS, strip_source_extension,
};
pub use parser::parse_imports;
pub use project::{LoadFailure, ProjectIndex, SourceFile};
pub use resolver::{
    is_relative_request, normalize_file_path, normalize_path, request_base, resolve,
};
pub use types::{DeclKind, ImportDecl};
pub use walker::list_files_recursive;
