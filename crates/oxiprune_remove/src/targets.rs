use anyhow::{Result, bail};
use log::{debug, warn};
use oxiprune_core::normalize_file_path;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::types::{TargetKind, TargetSpec};

/// Turns user-supplied paths into the fixed target set for one run.
///
/// Relative paths are taken from the current directory. The parent directory is
/// canonicalized but the final component is kept, so a symlink given as a
/// target names the link itself rather than what it points at.
pub fn collect_targets(paths: &[PathBuf], root: &Path) -> Result<Vec<TargetSpec>> {
    let mut targets = Vec::with_capacity(paths.len());

    for raw in paths {
        let path = normalize_file_path(raw);
        if path == root {
            bail!("Refusing to remove the project root {}", root.display());
        }
        if !path.starts_with(root) {
            bail!("Target {} is outside the project root {}", path.display(), root.display());
        }

        let kind = match fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_dir() => TargetKind::Directory,
            Ok(_) => TargetKind::File,
            Err(e) => {
                warn!("Target {} does not exist ({}), treating it as a file", path.display(), e);
                TargetKind::File
            }
        };
        debug!("Target {} ({:?})", path.display(), kind);
        targets.push(TargetSpec { kind, path });
    }

    Ok(normalize_targets(targets))
}

/// Sorts targets, drops duplicates and drops anything inside a directory target.
pub fn normalize_targets(mut targets: Vec<TargetSpec>) -> Vec<TargetSpec> {
    targets.sort_by(|a, b| a.path.cmp(&b.path));
    targets.dedup_by(|a, b| a.path == b.path);

    let mut kept: Vec<TargetSpec> = Vec::with_capacity(targets.len());
    for target in targets {
        // Sorted order puts a directory before everything below it
        let covered = kept.iter().any(|k| {
            k.kind == TargetKind::Directory && target.path.starts_with(&k.path)
        });
        if covered {
            debug!("Dropping {} (inside another directory target)", target.path.display());
            continue;
        }
        kept.push(target);
    }
    kept
}
