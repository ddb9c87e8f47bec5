//! Import-aware removal of files and directories from JavaScript/TypeScript
//! projects.
//!
//! Every import or re-export declaration that resolves into the removed set is
//! deleted from its importer, each modified importer is saved once, and then
//! the targets themselves are deleted. The run is summarized in an
//! [`AuditResult`] that can be printed and persisted as JSON.
//!
//! # Examples
//!
//! ```no_run
//! use oxiprune_remove::{RemovalOptions, ResolveContext, collect_targets, remove_and_delete};
//! use std::io::{BufWriter, Write};
//! use std::path::PathBuf;
//!
//! # fn main() -> anyhow::Result<()> {
//! let root = PathBuf::from("/path/to/project");
//! let ctx = ResolveContext::new(&root, root.join("src")).with_root_aliases(["@"]);
//!
//! let targets = collect_targets(&[root.join("src/legacy")], &root)?;
//! let audit = remove_and_delete(&targets, &ctx, &RemovalOptions::default())?;
//!
//! let mut stdout = BufWriter::new(std::io::stdout());
//! oxiprune_remove::print_audit(&mut stdout, &audit)?;
//! stdout.flush()?;
//! # Ok(())
//! # }
//! ```

mod audit;
mod config;
mod plan;
mod remover;
mod reporter;
mod targets;
mod types;

// Re-export public API
pub use audit::{audit_file_name, read_audit, write_audit};
pub use config::{Config, DEFAULT_AUDIT_DIR, DEFAULT_BASE_DIR};
pub use oxiprune_core::ResolveContext;
pub use plan::{FilesToRemove, request_basename};
pub use remover::{RemovalOptions, remove_and_delete};
pub use reporter::{print_audit, print_targets};
pub use targets::{collect_targets, normalize_targets};
pub use types::{
    AuditResult, Failure, FailureStage, ImportEdge, RemovalRecord, RemovedFrom, TargetKind,
    TargetSpec,
};
