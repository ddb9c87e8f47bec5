use anyhow::{Context, Result, anyhow};
use log::{debug, trace};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Name of the optional per-project configuration file, looked up at the project root
pub const PROJECT_CONFIG_FILE: &str = "oxiprune.json";

/// Run-scoped resolution context.
///
/// Built once per run and passed by reference to the resolver and the removal
/// engine. `root_aliases` are specifier prefixes that stand for `base_dir`,
/// e.g. with alias `src` the specifier `src/utils/a` resolves like
/// `<base_dir>/utils/a`.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub root: PathBuf,
    pub base_dir: PathBuf,
    pub root_aliases: Vec<String>,
}

impl ResolveContext {
    pub fn new(root: impl Into<PathBuf>, base_dir: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), base_dir: base_dir.into(), root_aliases: Vec::new() }
    }

    pub fn with_root_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.root_aliases = aliases
            .into_iter()
            .map(|a| {
                let a: String = a.into();
                a.trim_end_matches('/').to_string()
            })
            .filter(|a| !a.is_empty())
            .collect();
        self
    }
}

/// Settings read from `oxiprune.json`. Every field is optional; CLI flags win.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    pub base_dir: Option<PathBuf>,
    pub root_aliases: Vec<String>,
    pub include_js: Option<bool>,
    pub audit_dir: Option<PathBuf>,
}

pub fn find_git_root() -> Result<PathBuf> {
    let current_dir = env::current_dir()?;
    find_git_root_from(&current_dir)
}

pub fn find_git_root_from(start: &Path) -> Result<PathBuf> {
    debug!("Searching for git root");
    let mut current_dir = start.to_path_buf();
    trace!("Starting search from: {:?}", current_dir);

    loop {
        let git_dir = current_dir.join(".git");
        trace!("Checking for .git at: {:?}", git_dir);
        if git_dir.exists() {
            debug!("Found git root at: {:?}", current_dir);
            return Ok(current_dir);
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => {
                debug!("Could not find .git directory in any parent folder");
                return Err(anyhow!("Could not find .git directory in any parent folder"));
            }
        }
    }
}

/// Reads `oxiprune.json` from `root`.
///
/// A missing file yields the default config. A file that exists but cannot be
/// read or parsed is an error.
pub fn read_project_config(root: &Path) -> Result<ProjectConfig> {
    let path = root.join(PROJECT_CONFIG_FILE);
    if !path.exists() {
        debug!("No {} found at {}", PROJECT_CONFIG_FILE, root.display());
        return Ok(ProjectConfig::default());
    }

    debug!("Reading project config from {}", path.display());
    let content =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;

    // Strip comments (simple approach - removes // comments)
    let content_no_comments: String = content
        .lines()
        .map(|line| if let Some(idx) = line.find("//") { &line[..idx] } else { line })
        .collect::<Vec<_>>()
        .join("\n");

    let config: ProjectConfig = serde_json::from_str(&content_no_comments)
        .with_context(|| format!("Invalid {}", path.display()))?;
    trace!("Loaded project config: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, path: &str, content: &str) -> PathBuf {
        let file_path = dir.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    #[test]
    fn test_find_git_root_from_subdir() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".git")).unwrap();
        let subdir = root.join("src").join("components");
        fs::create_dir_all(&subdir).unwrap();

        let git_root = find_git_root_from(&subdir).unwrap();
        assert_eq!(git_root, root.to_path_buf());
    }

    #[test]
    fn test_find_git_root_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("nested").join("deep");
        fs::create_dir_all(&subdir).unwrap();

        // No .git anywhere below the temp dir; the search may still find one
        // above it on a developer machine, but never inside it.
        if let Ok(found) = find_git_root_from(&subdir) {
            assert!(!found.starts_with(temp_dir.path()));
        }
    }

    #[test]
    fn test_read_project_config_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = read_project_config(temp_dir.path()).unwrap();
        assert!(config.base_dir.is_none());
        assert!(config.root_aliases.is_empty());
        assert!(config.include_js.is_none());
    }

    #[test]
    fn test_read_project_config_fields() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(
            root,
            PROJECT_CONFIG_FILE,
            r#"
{
  // where the sources live
  "baseDir": "app/src",
  "rootAliases": ["src", "@"],
  "includeJs": true,
  "auditDir": ".audits"
}
"#,
        );

        let config = read_project_config(root).unwrap();
        assert_eq!(config.base_dir, Some(PathBuf::from("app/src")));
        assert_eq!(config.root_aliases, vec!["src".to_string(), "@".to_string()]);
        assert_eq!(config.include_js, Some(true));
        assert_eq!(config.audit_dir, Some(PathBuf::from(".audits")));
    }

    #[test]
    fn test_read_project_config_invalid_json_is_error() {
        let temp_dir = TempDir::new().unwrap();
        create_test_file(temp_dir.path(), PROJECT_CONFIG_FILE, "{ \"baseDir\": ");
        assert!(read_project_config(temp_dir.path()).is_err());
    }

    #[test]
    fn test_resolve_context_trims_aliases() {
        let ctx = ResolveContext::new("/p", "/p/src").with_root_aliases(["src/", "@", ""]);
        assert_eq!(ctx.root_aliases, vec!["src".to_string(), "@".to_string()]);
    }
}
