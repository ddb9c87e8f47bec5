use anyhow::{Context, Result, bail};
use ignore::WalkBuilder;
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use std::{
    collections::BTreeSet,
    ffi::OsStr,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    constants::SKIPPED_DIRS,
    parser::parse_imports,
    resolver::{normalize_file_path, normalize_path},
    types::ImportDecl,
};

/// A loaded source file with pending, not yet persisted, declaration removals.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    source: String,
    imports: Vec<ImportDecl>,
    removed: BTreeSet<usize>,
}

impl SourceFile {
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(normalize_file_path(path), source)
    }

    /// Builds a file from text already in memory. `path` is taken as given.
    pub fn parse(path: PathBuf, source: String) -> Result<Self> {
        let imports = parse_imports(&path, &source)?;
        Ok(Self { path, source, imports, removed: BTreeSet::new() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declarations in source order, including ones already marked for removal.
    pub fn imports(&self) -> &[ImportDecl] {
        &self.imports
    }

    /// Marks the declaration at `index` for removal.
    ///
    /// Returns `false` when the index is out of range or already marked, so a
    /// declaration can never be removed twice.
    pub fn remove_import(&mut self, index: usize) -> bool {
        if index >= self.imports.len() {
            return false;
        }
        self.removed.insert(index)
    }

    pub fn is_dirty(&self) -> bool {
        !self.removed.is_empty()
    }

    pub fn pending_removals(&self) -> usize {
        self.removed.len()
    }

    /// The file text with every marked declaration spliced out.
    pub fn render(&self) -> String {
        let mut ranges: Vec<(usize, usize)> = self
            .removed
            .iter()
            .map(|&i| {
                let decl = &self.imports[i];
                removal_range(&self.source, decl.start as usize, decl.end as usize)
            })
            .collect();
        ranges.sort_unstable();

        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }

        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for (start, end) in merged {
            let (start, end) = emptied_line_range(&self.source, start, end);
            if start > cursor {
                out.push_str(&self.source[cursor..start]);
            }
            cursor = cursor.max(end);
        }
        out.push_str(&self.source[cursor..]);
        out
    }

    /// Persists pending removals in a single write.
    ///
    /// Returns `Ok(false)` without touching storage when nothing is pending.
    /// After a successful save the file reflects the new text and has no
    /// pending removals, so a second call is a no-op.
    pub fn save(&mut self) -> Result<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }

        let rendered = self.render();
        write_atomically(&self.path, rendered.as_bytes())?;
        debug!("Saved {} ({} declarations removed)", self.path.display(), self.removed.len());

        self.imports = match parse_imports(&self.path, &rendered) {
            Ok(imports) => imports,
            Err(e) => {
                warn!("Could not re-read declarations of {}: {}", self.path.display(), e);
                Vec::new()
            }
        };
        self.source = rendered;
        self.removed.clear();
        Ok(true)
    }
}

/// Byte range to delete for a declaration spanning `start..end`.
///
/// A trailing `;` is always taken along. A declaration alone on its line(s)
/// takes its indentation and line terminator with it; otherwise only the
/// declaration and the blanks separating it from the neighbouring code go.
fn removal_range(source: &str, start: usize, end: usize) -> (usize, usize) {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let is_blank = |b: u8| b == b' ' || b == b'\t';

    let mut end = end.min(len);
    let mut cursor = end;
    while cursor < len && is_blank(bytes[cursor]) {
        cursor += 1;
    }
    if cursor < len && bytes[cursor] == b';' {
        end = cursor + 1;
        cursor = end;
        while cursor < len && is_blank(bytes[cursor]) {
            cursor += 1;
        }
    }

    let mut line_start = start;
    while line_start > 0 && is_blank(bytes[line_start - 1]) {
        line_start -= 1;
    }

    let starts_line = line_start == 0 || bytes[line_start - 1] == b'\n';
    let ends_line = cursor == len
        || bytes[cursor] == b'\n'
        || (bytes[cursor] == b'\r' && bytes.get(cursor + 1) == Some(&b'\n'));

    match (starts_line, ends_line) {
        (true, true) => {
            let mut line_end = cursor;
            if line_end < len && bytes[line_end] == b'\r' {
                line_end += 1;
            }
            if line_end < len && bytes[line_end] == b'\n' {
                line_end += 1;
            }
            (line_start, line_end)
        }
        (true, false) => (start, cursor),
        (false, _) => (line_start, end),
    }
}

/// Widens a merged removal to its whole line when nothing but blanks would be
/// left on it, e.g. after removing every declaration of
/// `import a from './a'; import b from './b';`.
fn emptied_line_range(source: &str, start: usize, end: usize) -> (usize, usize) {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let is_blank = |b: u8| b == b' ' || b == b'\t';

    if end > start && bytes[end - 1] == b'\n' {
        return (start, end);
    }

    let mut line_start = start;
    while line_start > 0 && is_blank(bytes[line_start - 1]) {
        line_start -= 1;
    }
    if line_start > 0 && bytes[line_start - 1] != b'\n' {
        return (start, end);
    }

    let mut line_end = end;
    while line_end < len && is_blank(bytes[line_end]) {
        line_end += 1;
    }
    if line_end == len {
        return (line_start, len);
    }
    if bytes[line_end] == b'\r' && bytes.get(line_end + 1) == Some(&b'\n') {
        (line_start, line_end + 2)
    } else if bytes[line_end] == b'\n' {
        (line_start, line_end + 1)
    } else {
        (start, end)
    }
}

/// Replaces `path` with `content` via a temp file in the same directory, so a
/// crash mid-write never leaves a truncated source file behind.
fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().and_then(OsStr::to_str).unwrap_or("file");
    let temp_path = parent.join(format!(".{}.oxiprune.tmp", file_name));

    let write = || -> Result<()> {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        file.sync_all().with_context(|| format!("Failed to sync {}", temp_path.display()))?;
        if let Ok(meta) = fs::metadata(path) {
            fs::set_permissions(&temp_path, meta.permissions()).with_context(|| {
                format!("Failed to copy permissions to {}", temp_path.display())
            })?;
        }
        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    };

    write().inspect_err(|_| {
        let _ = fs::remove_file(&temp_path);
    })
}

/// A project file that could not be loaded and is left untouched.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Every source file under the base directory, sorted by normalized path.
#[derive(Debug)]
pub struct ProjectIndex {
    base_dir: PathBuf,
    files: Vec<SourceFile>,
    failures: Vec<LoadFailure>,
}

impl ProjectIndex {
    /// Loads and parses every file below `base_dir` whose extension is in
    /// `extensions`. Unparseable files are recorded as failures, not errors; a
    /// missing base directory is an error.
    pub fn load(base_dir: &Path, extensions: &[&str]) -> Result<Self> {
        if !base_dir.is_dir() {
            bail!("Base directory {} does not exist or is not a directory", base_dir.display());
        }
        let base_dir = normalize_path(base_dir);
        info!("Loading project files from {}", base_dir.display());

        let paths = collect_source_files(&base_dir, extensions);
        debug!("Parsing {} project files in parallel", paths.len());

        let (loaded, failed): (Vec<_>, Vec<_>) = paths
            .par_iter()
            .map(|p| {
                SourceFile::load(p)
                    .map_err(|e| LoadFailure { path: p.clone(), reason: format!("{:#}", e) })
            })
            .partition(|r| r.is_ok());

        let mut files: Vec<SourceFile> = loaded.into_iter().filter_map(Result::ok).collect();
        let failures: Vec<LoadFailure> = failed.into_iter().filter_map(Result::err).collect();
        for failure in &failures {
            warn!("Skipping {}: {}", failure.path.display(), failure.reason);
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        info!("Loaded {} project files ({} skipped)", files.len(), failures.len());
        Ok(Self { base_dir, files, failures })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut [SourceFile] {
        &mut self.files
    }

    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Looks a file up by its normalized absolute path.
    pub fn get(&self, path: &Path) -> Option<&SourceFile> {
        self.files.binary_search_by(|f| f.path.as_path().cmp(path)).ok().map(|i| &self.files[i])
    }

    /// Drops every file for which `keep` returns false.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&SourceFile) -> bool,
    {
        self.files.retain(keep);
    }
}

fn collect_source_files(base_dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    debug!("Walking directory tree from: {}", base_dir.display());
    let mut files: Vec<PathBuf> = Vec::new();
    let walker = WalkBuilder::new(base_dir)
        .hidden(false)
        .ignore(true)
        .git_ignore(true)
        .filter_entry(|e| {
            e.file_name().to_str().is_none_or(|name| !SKIPPED_DIRS.contains(&name))
        })
        .build();

    for res in walker {
        let dent = match res {
            Ok(dent) => dent,
            Err(e) => {
                warn!("Error walking {}: {}", base_dir.display(), e);
                continue;
            }
        };
        if !dent.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let p = dent.path();
        if let Some(ext) = p.extension().and_then(|e| e.to_str())
            && extensions.contains(&ext)
        {
            trace!("Found project file: {}", p.display());
            files.push(p.to_path_buf());
        }
    }

    debug!("Collected {} project files", files.len());
    files
}
