use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::types::AuditResult;

/// `removal-audit-20240501T101502.123Z.json`, sortable by creation time.
pub fn audit_file_name(created_at: &DateTime<Utc>) -> String {
    format!("removal-audit-{}.json", created_at.format("%Y%m%dT%H%M%S%.3fZ"))
}

/// Writes `audit` as pretty JSON into `dir`, creating it if needed.
pub fn write_audit(dir: &Path, audit: &AuditResult) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create audit directory {}", dir.display()))?;

    let path = dir.join(audit_file_name(&audit.created_at));
    let json = serde_json::to_string_pretty(audit).context("Failed to serialize audit")?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Wrote audit to {}", path.display());
    Ok(path)
}

pub fn read_audit(path: &Path) -> Result<AuditResult> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse audit {}", path.display()))
}
