use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    File,
    Directory,
}

/// A file or directory selected for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub kind: TargetKind,
    pub path: PathBuf,
}

impl TargetSpec {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self { kind: TargetKind::File, path: path.into() }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self { kind: TargetKind::Directory, path: path.into() }
    }
}

/// One declaration found in an importer, paired with where it resolves.
#[derive(Debug, Clone)]
pub struct ImportEdge {
    pub importer: PathBuf,
    pub request: String,
    pub resolved: Option<PathBuf>,
    pub imported_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedFrom {
    pub importer: PathBuf,
    pub imported_names: Vec<String>,
    /// Declarations removed from `importer`; side-effect imports add no names
    pub declarations: usize,
}

/// Every importer that lost a declaration referencing `removed_target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalRecord {
    pub removed_target: PathBuf,
    pub removed_from: Vec<RemovedFrom>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Parse,
    Save,
    Delete,
}

/// A per-file problem that was logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub path: PathBuf,
    pub stage: FailureStage,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub created_at: DateTime<Utc>,
    pub dry_run: bool,
    pub targets: Vec<TargetSpec>,
    /// Sorted by target path; importers sorted by importer path
    pub records: Vec<RemovalRecord>,
    pub files_scanned: usize,
    pub files_modified: usize,
    pub deleted_targets: Vec<PathBuf>,
    /// Targets already absent when deletion ran
    pub missing_targets: Vec<PathBuf>,
    pub failures: Vec<Failure>,
}

impl AuditResult {
    /// Number of import and re-export declarations removed across all importers
    pub fn import_removals(&self) -> usize {
        self.records.iter().flat_map(|r| &r.removed_from).map(|f| f.declarations).sum()
    }
}
