use anyhow::Result;
use chrono::Utc;
use dashmap::DashMap;
use log::{debug, info, trace, warn};
use oxiprune_core::{ProjectIndex, ResolveContext, SourceFile, TS_EXTENSIONS, resolve};
use rayon::prelude::*;
use std::{
    collections::BTreeMap,
    fs, io,
    path::PathBuf,
};

use crate::{
    plan::{FilesToRemove, request_basename},
    types::{
        AuditResult, Failure, FailureStage, ImportEdge, RemovalRecord, RemovedFrom, TargetSpec,
    },
};

#[derive(Debug, Clone)]
pub struct RemovalOptions {
    /// Match and report, but neither save importers nor delete targets
    pub dry_run: bool,
    /// Extensions of the project files scanned for imports
    pub extensions: Vec<&'static str>,
}

impl Default for RemovalOptions {
    fn default() -> Self {
        Self { dry_run: false, extensions: TS_EXTENSIONS.to_vec() }
    }
}

/// What happened to one importer during the parallel phase.
struct FileOutcome {
    importer: PathBuf,
    edges: Vec<ImportEdge>,
    save_error: Option<String>,
}

/// Removes every import of `targets` from the project, then deletes the targets.
///
/// Each importer is saved at most once and targets are deleted only after all
/// saves have run. Per-file problems end up in `AuditResult::failures`; only
/// a project that cannot be loaded at all is an error.
pub fn remove_and_delete(
    targets: &[TargetSpec],
    ctx: &ResolveContext,
    options: &RemovalOptions,
) -> Result<AuditResult> {
    info!("Removing {} targets (dry run: {})", targets.len(), options.dry_run);

    let plan = FilesToRemove::from_targets(targets)?;

    let mut index = ProjectIndex::load(&ctx.base_dir, &options.extensions)?;
    let mut failures: Vec<Failure> = index
        .failures()
        .iter()
        .map(|f| Failure {
            path: f.path.clone(),
            stage: FailureStage::Parse,
            message: f.reason.clone(),
        })
        .collect();

    // A file being deleted is never edited
    index.retain(|f| !plan.contains(f.path()));
    let files_scanned = index.len();
    if index.is_empty() {
        info!("No files left to scan under {}", index.base_dir().display());
    }
    debug!("Scanning {} importers", files_scanned);

    let cache: DashMap<(PathBuf, String), Option<PathBuf>> = DashMap::new();
    let outcomes: Vec<FileOutcome> = index
        .files_mut()
        .par_iter_mut()
        .map(|file| process_file(file, &plan, ctx, &cache, options.dry_run))
        .collect();

    let mut by_target: BTreeMap<PathBuf, BTreeMap<PathBuf, RemovedFrom>> = BTreeMap::new();
    let mut files_modified = 0;
    for outcome in outcomes {
        if outcome.edges.is_empty() {
            continue;
        }
        if let Some(message) = outcome.save_error {
            warn!("Failed to save {}: {}", outcome.importer.display(), message);
            failures.push(Failure { path: outcome.importer, stage: FailureStage::Save, message });
            continue;
        }
        files_modified += 1;
        for edge in outcome.edges {
            let Some(target) = edge.resolved else {
                continue;
            };
            debug!("Removed '{}' from {}", edge.request, edge.importer.display());
            let removed = by_target
                .entry(target)
                .or_default()
                .entry(edge.importer.clone())
                .or_insert_with(|| RemovedFrom {
                    importer: edge.importer,
                    imported_names: Vec::new(),
                    declarations: 0,
                });
            removed.imported_names.extend(edge.imported_names);
            removed.declarations += 1;
        }
    }

    let records: Vec<RemovalRecord> = by_target
        .into_iter()
        .map(|(removed_target, importers)| RemovalRecord {
            removed_target,
            removed_from: importers.into_values().collect(),
        })
        .collect();

    let (deleted_targets, missing_targets) = if options.dry_run {
        (Vec::new(), Vec::new())
    } else {
        delete_targets(targets, &mut failures)
    };

    info!(
        "Removed {} import declarations from {} files, deleted {} targets",
        records.iter().flat_map(|r| &r.removed_from).map(|f| f.declarations).sum::<usize>(),
        files_modified,
        deleted_targets.len()
    );

    Ok(AuditResult {
        created_at: Utc::now(),
        dry_run: options.dry_run,
        targets: targets.to_vec(),
        records,
        files_scanned,
        files_modified,
        deleted_targets,
        missing_targets,
        failures,
    })
}

fn process_file(
    file: &mut SourceFile,
    plan: &FilesToRemove,
    ctx: &ResolveContext,
    cache: &DashMap<(PathBuf, String), Option<PathBuf>>,
    dry_run: bool,
) -> FileOutcome {
    let importer = file.path().to_path_buf();
    let mut edges = Vec::new();
    let mut matched = Vec::new();

    for (index, decl) in file.imports().iter().enumerate() {
        let Some(name) = request_basename(ctx, &importer, &decl.request) else {
            continue;
        };
        if !plan.might_match(&name) {
            continue;
        }

        let resolved = resolve(ctx, &importer, &decl.request, cache);
        match &resolved {
            Some(path) if plan.contains(path) => {
                debug!("{} imports removed file {}", importer.display(), path.display());
            }
            _ => {
                trace!("'{}' in {} does not reach a target", decl.request, importer.display());
                continue;
            }
        }

        edges.push(ImportEdge {
            importer: importer.clone(),
            request: decl.request.clone(),
            resolved,
            imported_names: decl.imported_names(),
        });
        matched.push(index);
    }

    for index in matched {
        file.remove_import(index);
    }

    let save_error = if dry_run {
        None
    } else {
        file.save().err().map(|e| format!("{:#}", e))
    };

    FileOutcome { importer, edges, save_error }
}

/// Deletes each target, recording anything already gone or that fails.
fn delete_targets(
    targets: &[TargetSpec],
    failures: &mut Vec<Failure>,
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut deleted = Vec::new();
    let mut missing = Vec::new();

    for target in targets {
        match delete_target(target) {
            Ok(()) => {
                debug!("Deleted {}", target.path.display());
                deleted.push(target.path.clone());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Target {} is already gone, skipping", target.path.display());
                missing.push(target.path.clone());
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", target.path.display(), e);
                failures.push(Failure {
                    path: target.path.clone(),
                    stage: FailureStage::Delete,
                    message: e.to_string(),
                });
            }
        }
    }

    (deleted, missing)
}

fn delete_target(target: &TargetSpec) -> io::Result<()> {
    let meta = fs::symlink_metadata(&target.path)?;
    if meta.is_dir() {
        fs::remove_dir_all(&target.path)
    } else {
        fs::remove_file(&target.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, path: &str, content: &str) -> PathBuf {
        let file_path = dir.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn setup() -> (TempDir, PathBuf, ResolveContext) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let src = root.join("src");
        fs::create_dir_all(&src).unwrap();
        let ctx = ResolveContext::new(&root, &src);
        (temp_dir, root, ctx)
    }

    fn run(targets: &[TargetSpec], ctx: &ResolveContext) -> AuditResult {
        remove_and_delete(targets, ctx, &RemovalOptions::default()).unwrap()
    }

    #[test]
    fn test_remove_single_file_target() {
        let (_temp_dir, root, ctx) = setup();
        let app = create_test_file(
            &root,
            "src/app.ts",
            "import { doThing } from './utils/helper';\nimport { x } from './x';\n\ndoThing(x);\n",
        );
        let helper = create_test_file(&root, "src/utils/helper.ts", "export const doThing = 1;\n");
        create_test_file(&root, "src/x.ts", "export const x = 1;\n");

        let audit = run(&[TargetSpec::file(&helper)], &ctx);

        assert_eq!(
            fs::read_to_string(&app).unwrap(),
            "import { x } from './x';\n\ndoThing(x);\n"
        );
        assert!(!helper.exists());
        assert_eq!(audit.records.len(), 1);
        assert_eq!(audit.records[0].removed_target, helper);
        assert_eq!(
            audit.records[0].removed_from,
            vec![RemovedFrom {
                importer: app,
                imported_names: vec!["doThing".to_string()],
                declarations: 1,
            }]
        );
        assert_eq!(audit.deleted_targets, vec![helper]);
        assert_eq!(audit.files_modified, 1);
        assert!(audit.failures.is_empty());
    }

    #[test]
    fn test_remove_directory_target_with_index() {
        let (_temp_dir, root, ctx) = setup();
        let feature_index = create_test_file(&root, "src/feature/index.ts", "export const a = 1;\n");
        let feature_other = create_test_file(&root, "src/feature/other.ts", "export const b = 1;\n");
        let x = create_test_file(&root, "src/x.ts", "import { a } from './feature';\nexport {};\n");
        let y = create_test_file(
            &root,
            "src/y.ts",
            "import { b } from './feature/other';\nexport {};\n",
        );

        let audit = run(&[TargetSpec::directory(root.join("src/feature"))], &ctx);

        assert_eq!(fs::read_to_string(&x).unwrap(), "export {};\n");
        assert_eq!(fs::read_to_string(&y).unwrap(), "export {};\n");
        assert!(!root.join("src/feature").exists());

        assert_eq!(audit.records.len(), 2);
        assert_eq!(audit.records[0].removed_target, feature_index);
        assert_eq!(audit.records[0].removed_from[0].importer, x);
        assert_eq!(audit.records[1].removed_target, feature_other);
        assert_eq!(audit.records[1].removed_from[0].importer, y);
    }

    #[test]
    fn test_remove_resolves_tsx_when_ts_missing() {
        let (_temp_dir, root, ctx) = setup();
        let widget = create_test_file(&root, "src/widget.tsx", "export const Widget = 1;\n");
        let page = create_test_file(&root, "src/page.ts", "import { Widget } from './widget';\n");

        let audit = run(&[TargetSpec::file(&widget)], &ctx);

        assert_eq!(fs::read_to_string(&page).unwrap(), "");
        assert!(!widget.exists());
        assert_eq!(audit.records[0].removed_target, widget);
    }

    #[test]
    fn test_unrelated_files_are_byte_identical() {
        let (_temp_dir, root, ctx) = setup();
        let helper = create_test_file(&root, "src/helper.ts", "export const h = 1;\n");
        let content = "import React from 'react';\r\nimport { y } from './y';   \n\n// keep\n";
        let untouched = create_test_file(&root, "src/untouched.ts", content);
        create_test_file(&root, "src/y.ts", "export const y = 1;\n");

        run(&[TargetSpec::file(&helper)], &ctx);

        assert_eq!(fs::read_to_string(&untouched).unwrap(), content);
    }

    #[test]
    fn test_multiple_declarations_removed_in_one_save() {
        let (_temp_dir, root, ctx) = setup();
        let a = create_test_file(&root, "src/lib/a.ts", "export const a = 1;\n");
        let b = create_test_file(&root, "src/lib/b.ts", "export const b = 1;\n");
        let app = create_test_file(
            &root,
            "src/app.ts",
            "import { a } from './lib/a';\nimport './lib/b';\nimport type { T } from './lib/a';\nimport { k } from './k';\nexport * from './lib/b';\n",
        );
        create_test_file(&root, "src/k.ts", "export const k = 1;\n");

        let audit = run(&[TargetSpec::file(&a), TargetSpec::file(&b)], &ctx);

        let content = fs::read_to_string(&app).unwrap();
        assert_eq!(content, "import { k } from './k';\n");
        assert_eq!(SourceFile::load(&app).unwrap().imports().len(), 1);
        assert_eq!(audit.files_modified, 1);
        assert_eq!(audit.import_removals(), 4);
        assert_eq!(audit.records[0].removed_from[0].declarations, 2);

        let for_a = &audit.records[0];
        assert_eq!(for_a.removed_target, a);
        assert_eq!(for_a.removed_from[0].imported_names, vec!["a".to_string(), "T".to_string()]);
        let for_b = &audit.records[1];
        assert_eq!(for_b.removed_from[0].imported_names, vec!["*".to_string()]);
    }

    #[test]
    fn test_basename_collision_is_not_removed() {
        let (_temp_dir, root, ctx) = setup();
        let target = create_test_file(&root, "src/utils/helper.ts", "export const a = 1;\n");
        create_test_file(&root, "src/other/helper.ts", "export const b = 1;\n");
        let content = "import { a } from './utils/helper';\nimport { b } from './other/helper';\n";
        let app = create_test_file(&root, "src/app.ts", content);

        run(&[TargetSpec::file(&target)], &ctx);

        assert_eq!(fs::read_to_string(&app).unwrap(), "import { b } from './other/helper';\n");
        assert!(root.join("src/other/helper.ts").exists());
    }

    #[test]
    fn test_rerun_with_missing_target_continues() {
        let (_temp_dir, root, ctx) = setup();
        let gone = root.join("src/gone.ts");
        let present = create_test_file(&root, "src/present.ts", "export const p = 1;\n");
        let app = create_test_file(
            &root,
            "src/app.ts",
            "import { g } from './gone';\nimport { p } from './present';\n",
        );

        let audit = run(&[TargetSpec::file(&gone), TargetSpec::file(&present)], &ctx);

        // An unresolvable import of the missing file stays as it is
        assert_eq!(fs::read_to_string(&app).unwrap(), "import { g } from './gone';\n");
        assert!(!present.exists());
        assert_eq!(audit.missing_targets, vec![gone]);
        assert_eq!(audit.deleted_targets, vec![present]);
        assert!(audit.failures.is_empty());
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let (_temp_dir, root, ctx) = setup();
        let helper = create_test_file(&root, "src/helper.ts", "export const h = 1;\n");
        let content = "import { h } from './helper';\n";
        let app = create_test_file(&root, "src/app.ts", content);

        let options = RemovalOptions { dry_run: true, ..Default::default() };
        let audit = remove_and_delete(&[TargetSpec::file(&helper)], &ctx, &options).unwrap();

        assert!(audit.dry_run);
        assert_eq!(audit.records.len(), 1);
        assert!(audit.deleted_targets.is_empty());
        assert_eq!(fs::read_to_string(&app).unwrap(), content);
        assert!(helper.exists());
    }

    #[test]
    fn test_root_alias_import_is_removed() {
        let (_temp_dir, root, ctx) = setup();
        let ctx = ctx.with_root_aliases(["@"]);
        let helper = create_test_file(&root, "src/utils/helper.ts", "export const h = 1;\n");
        let page = create_test_file(
            &root,
            "src/pages/home.ts",
            "import { h } from '@/utils/helper';\nimport { h as h2 } from 'utils/helper';\n",
        );

        let audit = run(&[TargetSpec::file(&helper)], &ctx);

        // Only the configured alias is understood
        assert_eq!(fs::read_to_string(&page).unwrap(), "import { h as h2 } from 'utils/helper';\n");
        assert_eq!(audit.import_removals(), 1);
    }

    #[test]
    fn test_asset_target_is_removed() {
        let (_temp_dir, root, ctx) = setup();
        let css = create_test_file(&root, "src/styles.css", "body {}\n");
        let app = create_test_file(&root, "src/app.tsx", "import './styles.css';\nexport {};\n");

        let audit = run(&[TargetSpec::file(&css)], &ctx);

        assert_eq!(fs::read_to_string(&app).unwrap(), "export {};\n");
        assert!(audit.records[0].removed_from[0].imported_names.is_empty());
    }

    #[test]
    fn test_target_inside_base_dir_is_not_edited() {
        let (_temp_dir, root, ctx) = setup();
        let a = create_test_file(&root, "src/a.ts", "import { b } from './b';\n");
        let b = create_test_file(&root, "src/b.ts", "import { a } from './a';\n");

        let audit = run(&[TargetSpec::file(&a), TargetSpec::file(&b)], &ctx);

        assert_eq!(audit.files_scanned, 0);
        assert!(audit.records.is_empty());
        assert_eq!(audit.deleted_targets.len(), 2);
    }

    #[test]
    fn test_unreadable_file_is_recorded_and_skipped() {
        let (_temp_dir, root, ctx) = setup();
        let helper = create_test_file(&root, "src/helper.ts", "export const h = 1;\n");
        create_test_file(&root, "src/ok.ts", "import { h } from './helper';\n");
        let bad = root.join("src/bad.ts");
        fs::write(&bad, [0xff, 0xfe, 0x00]).unwrap();

        let audit = run(&[TargetSpec::file(&helper)], &ctx);

        assert_eq!(audit.failures.len(), 1);
        assert_eq!(audit.failures[0].path, bad);
        assert_eq!(audit.failures[0].stage, FailureStage::Parse);
        assert_eq!(audit.import_removals(), 1);
        assert_eq!(fs::read(&bad).unwrap(), vec![0xff, 0xfe, 0x00]);
    }

    #[test]
    fn test_missing_base_dir_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let ctx = ResolveContext::new(&root, root.join("nope"));

        assert!(remove_and_delete(&[], &ctx, &RemovalOptions::default()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_target_removes_imports_of_the_link() {
        let (_temp_dir, root, ctx) = setup();
        let real = create_test_file(&root, "src/real.ts", "export const r = 1;\n");
        let link = root.join("src/link.ts");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let app = create_test_file(
            &root,
            "src/app.ts",
            "import { r } from './link';\nimport { r as same } from './real';\nexport {};\n",
        );

        let targets = crate::targets::collect_targets(std::slice::from_ref(&link), &root).unwrap();
        let audit = run(&targets, &ctx);

        assert_eq!(
            fs::read_to_string(&app).unwrap(),
            "import { r as same } from './real';\nexport {};\n"
        );
        assert!(fs::symlink_metadata(&link).is_err());
        assert!(real.exists());
        assert_eq!(audit.records.len(), 1);
        assert_eq!(audit.records[0].removed_target, link);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_and_delete_failures_do_not_stop_the_run() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp_dir, root, ctx) = setup();
        let a = create_test_file(&root, "src/lib/a.ts", "export const a = 1;\n");
        let b = create_test_file(&root, "src/frozen/b.ts", "export const b = 1;\n");
        let locked_content = "import { a } from '../lib/a';\nexport {};\n";
        let locked = create_test_file(&root, "src/locked/x.ts", locked_content);
        let open = create_test_file(
            &root,
            "src/y.ts",
            "import { a } from './lib/a';\nimport { b } from './frozen/b';\nexport {};\n",
        );

        let read_only = [root.join("src/locked"), root.join("src/frozen")];
        let set_mode = |mode: u32| {
            for dir in &read_only {
                fs::set_permissions(dir, fs::Permissions::from_mode(mode)).unwrap();
            }
        };
        set_mode(0o555);

        // Permission bits are not enforced for privileged users
        if fs::write(root.join("src/locked/.write-check"), "").is_ok() {
            set_mode(0o755);
            return;
        }

        let audit = run(&[TargetSpec::file(&a), TargetSpec::file(&b)], &ctx);
        set_mode(0o755);

        assert_eq!(fs::read_to_string(&open).unwrap(), "export {};\n");
        assert_eq!(fs::read_to_string(&locked).unwrap(), locked_content);
        assert!(!a.exists());
        assert!(b.exists());
        assert_eq!(audit.deleted_targets, vec![a.clone()]);

        assert_eq!(audit.failures.len(), 2);
        assert!(audit.failures.iter().any(|f| f.path == locked && f.stage == FailureStage::Save));
        assert!(audit.failures.iter().any(|f| f.path == b && f.stage == FailureStage::Delete));

        // Only the importer that was actually rewritten is reported
        assert_eq!(audit.files_modified, 1);
        assert!(audit.records.iter().flat_map(|r| &r.removed_from).all(|f| f.importer == open));
    }
}
