use dashmap::DashMap;
use log::{debug, trace};
use path_clean::clean;
use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::{
    config::ResolveContext,
    constants::{INDEX_STEM, RESOLVE_EXTENSIONS, strip_source_extension},
};

/// Normalizes a path for identity comparisons.
///
/// Existing paths are canonicalized (symlinks and `..` resolved). Paths that no
/// longer exist are made absolute against the current directory and cleaned
/// lexically, so a target deleted by an earlier run still has a stable key.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            env::current_dir().map(|cwd| cwd.join(path)).unwrap_or_else(|_| path.to_path_buf())
        };
        clean(absolute)
    })
}

/// Normalizes a file path without resolving the file itself.
///
/// Only the parent directory goes through [`normalize_path`]; the final
/// component is kept, so a symlinked file is identified by its own path rather
/// than by the file it points at.
pub fn normalize_file_path(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
            normalize_path(parent).join(name)
        }
        _ => normalize_path(path),
    }
}

pub fn is_relative_request(request: &str) -> bool {
    request == "." || request == ".." || request.starts_with("./") || request.starts_with("../")
}

/// Maps a specifier to the unresolved absolute path it points at.
///
/// Only relative specifiers and configured root aliases are handled; anything
/// else (bare package names, absolute paths, unknown aliases) yields `None`.
pub fn request_base(ctx: &ResolveContext, from_file: &Path, request: &str) -> Option<PathBuf> {
    if is_relative_request(request) {
        let dir = from_file.parent().unwrap_or(&ctx.base_dir);
        return Some(clean(dir.join(request)));
    }

    for alias in &ctx.root_aliases {
        if request == alias {
            trace!("Matched root alias '{}' for request '{}'", alias, request);
            return Some(clean(&ctx.base_dir));
        }
        if let Some(rest) = request.strip_prefix(alias.as_str())
            && let Some(rest) = rest.strip_prefix('/')
        {
            trace!("Matched root alias '{}' for request '{}'", alias, request);
            return Some(clean(ctx.base_dir.join(rest)));
        }
    }

    None
}

pub fn resolve(
    ctx: &ResolveContext,
    from_file: &Path,
    request: &str,
    cache: &DashMap<(PathBuf, String), Option<PathBuf>>,
) -> Option<PathBuf> {
    let key = (from_file.to_path_buf(), request.to_string());
    if let Some(v) = cache.get(&key) {
        trace!("Cache hit for resolve: '{}' from {}", request, from_file.display());
        return v.clone();
    }
    trace!("Resolving: '{}' from {}", request, from_file.display());

    let resolved = match request_base(ctx, from_file, request) {
        Some(base) => {
            // `.`, `..` and `./dir/` can only name a directory
            let directory_only = request == "." || request == ".." || request.ends_with('/');
            let result = resolve_file(&base, directory_only);
            if result.is_some() {
                trace!("Resolved '{}' to {:?}", request, result);
            } else {
                trace!("Failed to resolve '{}'", request);
            }
            result
        }
        None => {
            trace!("Skipping non-relative request: '{}'", request);
            None
        }
    };

    cache.insert(key, resolved.clone());
    if resolved.is_some() {
        debug!("Successfully resolved '{}' from {}", request, from_file.display());
    }
    resolved
}

fn resolve_file(base: &Path, directory_only: bool) -> Option<PathBuf> {
    let stripped = strip_extension(base);

    if !directory_only {
        if let Some(found) = probe_extensions(&stripped) {
            return Some(found);
        }
        // Non-source files such as `./styles.css` are only reachable as written
        if stripped.as_path() == base && base.is_file() {
            return Some(normalize_file_path(base));
        }
    }

    probe_extensions(&stripped.join(INDEX_STEM))
}

fn strip_extension(path: &Path) -> PathBuf {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => {
            let stem = strip_source_extension(name);
            if stem.len() == name.len() { path.to_path_buf() } else { path.with_file_name(stem) }
        }
        None => path.to_path_buf(),
    }
}

fn probe_extensions(base: &Path) -> Option<PathBuf> {
    for ext in RESOLVE_EXTENSIONS {
        let mut candidate = OsString::from(base.as_os_str());
        candidate.push(".");
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        trace!("Probing {}", candidate.display());
        if candidate.is_file() {
            return Some(normalize_file_path(&candidate));
        }
    }
    None
}
