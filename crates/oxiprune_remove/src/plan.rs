use anyhow::Result;
use log::{debug, warn};
use oxiprune_core::{
    INDEX_STEM, ResolveContext, list_files_recursive, request_base, strip_source_extension,
};
use std::{
    collections::{BTreeSet, HashSet},
    path::{Path, PathBuf},
};

use crate::types::{TargetKind, TargetSpec};

/// The files a run deletes, in the two forms matching needs.
///
/// `import_names` is only a pre-filter; a declaration is removed only when its
/// resolved path is in `file_paths`.
#[derive(Debug, Default, Clone)]
pub struct FilesToRemove {
    pub import_names: HashSet<String>,
    pub file_paths: BTreeSet<PathBuf>,
}

impl FilesToRemove {
    pub fn from_targets(targets: &[TargetSpec]) -> Result<Self> {
        let mut plan = Self::default();

        for target in targets {
            match target.kind {
                TargetKind::File => plan.add_file(&target.path),
                TargetKind::Directory => {
                    if !target.path.exists() {
                        warn!("Directory target {} no longer exists", target.path.display());
                        plan.add_file(&target.path);
                        continue;
                    }
                    let files = list_files_recursive(&target.path)?;
                    debug!("Expanded {} into {} files", target.path.display(), files.len());
                    for file in files {
                        plan.add_file(&file);
                    }
                }
            }
        }

        debug!(
            "Removal plan: {} files, {} candidate import names",
            plan.file_paths.len(),
            plan.import_names.len()
        );
        Ok(plan)
    }

    fn add_file(&mut self, path: &Path) {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            let stem = strip_source_extension(name);
            // `import "./utils"` reaches `utils/index.ts` by the directory name
            if stem == INDEX_STEM
                && let Some(dir_name) =
                    path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str())
            {
                self.import_names.insert(dir_name.to_string());
            }
            self.import_names.insert(stem.to_string());
        }
        self.file_paths.insert(path.to_path_buf());
    }

    pub fn might_match(&self, name: &str) -> bool {
        self.import_names.contains(name)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.file_paths.contains(path)
    }
}

/// Terminal name a specifier refers to, with any known source extension stripped.
///
/// `.`, `..` and `./dir/` yield the name of the directory they point at.
pub fn request_basename(ctx: &ResolveContext, from_file: &Path, request: &str) -> Option<String> {
    let base = request_base(ctx, from_file, request)?;
    let name = base.file_name()?.to_str()?;
    Some(strip_source_extension(name).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, path: &str, content: &str) -> PathBuf {
        let file_path = dir.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&file_path, content).unwrap();
        file_path
    }

    #[test]
    fn test_plan_for_file_target() {
        let plan = FilesToRemove::from_targets(&[TargetSpec::file("/p/src/utils/helper.ts")])
            .unwrap();

        assert!(plan.might_match("helper"));
        assert!(!plan.might_match("helper.ts"));
        assert!(plan.contains(Path::new("/p/src/utils/helper.ts")));
        assert!(!plan.contains(Path::new("/p/src/other/helper.ts")));
    }

    #[test]
    fn test_plan_index_file_adds_directory_name() {
        let plan =
            FilesToRemove::from_targets(&[TargetSpec::file("/p/src/utils/index.tsx")]).unwrap();

        assert!(plan.might_match("index"));
        assert!(plan.might_match("utils"));
    }

    #[test]
    fn test_plan_expands_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let index = create_test_file(&root, "utils/index.ts", "");
        let helper = create_test_file(&root, "utils/nested/helper.ts", "");

        let plan = FilesToRemove::from_targets(&[TargetSpec::directory(root.join("utils"))])
            .unwrap();

        assert_eq!(plan.file_paths, BTreeSet::from([index, helper]));
        assert!(plan.might_match("utils"));
        assert!(plan.might_match("index"));
        assert!(plan.might_match("helper"));
    }

    #[test]
    fn test_plan_missing_directory_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let gone = temp_dir.path().join("gone");

        let plan = FilesToRemove::from_targets(&[TargetSpec::directory(&gone)]).unwrap();
        assert!(plan.contains(&gone));
    }

    #[test]
    fn test_plan_keeps_non_source_names() {
        let plan = FilesToRemove::from_targets(&[TargetSpec::file("/p/src/styles.css")]).unwrap();
        assert!(plan.might_match("styles.css"));
    }

    #[test]
    fn test_request_basename() {
        let ctx = ResolveContext::new("/p", "/p/src").with_root_aliases(["@"]);
        let from = Path::new("/p/src/pages/home.ts");

        assert_eq!(request_basename(&ctx, from, "./helper"), Some("helper".to_string()));
        assert_eq!(request_basename(&ctx, from, "../utils/helper.ts"), Some("helper".to_string()));
        assert_eq!(request_basename(&ctx, from, "../utils/"), Some("utils".to_string()));
        assert_eq!(request_basename(&ctx, from, "."), Some("pages".to_string()));
        assert_eq!(request_basename(&ctx, from, ".."), Some("src".to_string()));
        assert_eq!(request_basename(&ctx, from, "@/utils/helper"), Some("helper".to_string()));
        assert_eq!(request_basename(&ctx, from, "./styles.css"), Some("styles.css".to_string()));
        assert_eq!(request_basename(&ctx, from, "react"), None);
    }
}
