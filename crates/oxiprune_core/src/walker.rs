use anyhow::{Context, Result};
use log::{debug, trace, warn};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Lists every regular file below `dir`.
///
/// Traversal uses an explicit stack of pending directories, so depth is bounded
/// by heap rather than call stack. Symbolic links are neither followed nor
/// returned: a link inside a deleted directory disappears with it, and links
/// can never send the walk around a cycle. Sibling order is unspecified.
pub fn list_files_recursive(dir: &Path) -> Result<Vec<PathBuf>> {
    debug!("Listing files under {}", dir.display());
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    let mut is_root = true;

    while let Some(current) = stack.pop() {
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(e) if is_root => {
                return Err(e).with_context(|| format!("Failed to read {}", current.display()));
            }
            Err(e) => {
                warn!("Skipping unreadable directory {}: {}", current.display(), e);
                continue;
            }
        };
        is_root = false;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", current.display(), e);
                    continue;
                }
            };
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            let path = entry.path();
            if file_type.is_symlink() {
                trace!("Not following symlink: {}", path.display());
            } else if file_type.is_dir() {
                trace!("Adding to stack: {}", path.display());
                stack.push(path);
            } else if file_type.is_file() {
                files.push(path);
            }
        }
    }

    debug!("Found {} files under {}", files.len(), dir.display());
    Ok(files)
}
