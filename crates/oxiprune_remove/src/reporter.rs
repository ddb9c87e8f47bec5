use std::{
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};

use colored::Colorize;
use log::{debug, trace};

use crate::types::{AuditResult, FailureStage, TargetKind, TargetSpec};

/// Relativize an absolute path to the current working directory for clickable links
fn relativize_to_cwd(path: &Path) -> String {
    let cwd = match env::current_dir() {
        Ok(cwd) => cwd,
        Err(_) => {
            debug!("Failed to get current directory");
            return path.display().to_string();
        }
    };

    match make_relative(path, &cwd) {
        Some(rel_path) => {
            let result = rel_path.to_string_lossy().to_string();
            trace!("Relativized {:?} to '{}'", path, result);
            result
        }
        None => {
            trace!("Could not relativize {:?}, using original", path);
            path.display().to_string()
        }
    }
}

/// Create a relative path from `base` to `target`
fn make_relative(target: &Path, base: &Path) -> Option<PathBuf> {
    use std::path::Component;

    let mut target_components = target.components();
    let mut base_components = base.components();

    let mut common_prefix_len = 0;
    let mut target_parts = Vec::new();
    let mut base_parts = Vec::new();

    // Find common prefix
    loop {
        match (target_components.next(), base_components.next()) {
            (Some(t), Some(b)) if t == b => {
                common_prefix_len += 1;
            }
            (Some(t), Some(b)) => {
                target_parts.push(t);
                base_parts.push(b);
                break;
            }
            (Some(t), None) => {
                target_parts.push(t);
                break;
            }
            (None, Some(b)) => {
                // target is an ancestor of base
                base_parts.push(b);
                break;
            }
            (None, None) => {
                return Some(PathBuf::from("."));
            }
        }
    }

    target_parts.extend(target_components);
    base_parts.extend(base_components);

    if common_prefix_len == 0 {
        return None;
    }

    // "../" for each remaining base component, then the remaining target components
    let mut result = PathBuf::new();
    for _ in &base_parts {
        result.push("..");
    }
    for component in target_parts {
        match component {
            Component::Normal(p) => result.push(p),
            Component::CurDir => {}
            Component::ParentDir => result.push(".."),
            Component::RootDir | Component::Prefix(_) => {}
        }
    }

    if result.as_os_str().is_empty() { Some(PathBuf::from(".")) } else { Some(result) }
}

fn display_names(names: &[String]) -> String {
    if names.is_empty() { "(side effect)".to_string() } else { format!("{{ {} }}", names.join(", ")) }
}

fn display_target(target: &TargetSpec) -> String {
    let path = relativize_to_cwd(&target.path);
    match target.kind {
        TargetKind::Directory => format!("{}/", path),
        TargetKind::File => path,
    }
}

/// Lists the targets about to be removed, before the user confirms.
pub fn print_targets<W: Write>(writer: &mut W, targets: &[TargetSpec]) -> io::Result<()> {
    writeln!(
        writer,
        "{} {} targets selected for removal:",
        "●".bright_blue(),
        targets.len().to_string().cyan()
    )?;
    for target in targets {
        writeln!(writer, "  {} {}", "-".dimmed(), display_target(target).red())?;
    }
    writer.flush()?;
    Ok(())
}

/// Prints the removed declarations grouped by removed file, then a summary.
pub fn print_audit<W: Write>(writer: &mut W, audit: &AuditResult) -> io::Result<()> {
    debug!("Printing audit with {} records", audit.records.len());

    if audit.dry_run {
        writeln!(writer, "{} Dry run, nothing was modified\n", "ℹ".bright_blue().bold())?;
    }

    if audit.records.is_empty() {
        writeln!(writer, "{} No imports of the removed files found", "✓".green().bold())?;
    }

    for record in &audit.records {
        writeln!(writer, "{}", relativize_to_cwd(&record.removed_target).bright_white().bold())?;

        for (idx, removed) in record.removed_from.iter().enumerate() {
            let is_last = idx == record.removed_from.len() - 1;
            let prefix = if is_last { "└──" } else { "├──" };
            writeln!(
                writer,
                "{}  {} {}",
                prefix.dimmed(),
                relativize_to_cwd(&removed.importer).blue(),
                display_names(&removed.imported_names).dimmed()
            )?;
        }
        writeln!(writer)?;
    }

    print_summary(writer, audit)?;

    writer.flush()?;
    Ok(())
}

fn print_summary<W: Write>(writer: &mut W, audit: &AuditResult) -> io::Result<()> {
    writeln!(writer, "{}", "─".repeat(60).dimmed())?;
    writeln!(writer, "{}", "Summary".bold())?;
    writeln!(writer, "  Files scanned: {}", audit.files_scanned.to_string().cyan())?;
    writeln!(
        writer,
        "  Imports removed: {} from {} files",
        audit.import_removals().to_string().yellow().bold(),
        audit.files_modified.to_string().yellow()
    )?;
    writeln!(writer, "  Targets deleted: {}", audit.deleted_targets.len().to_string().red().bold())?;

    if !audit.missing_targets.is_empty() {
        writeln!(writer, "  Already missing:")?;
        for path in &audit.missing_targets {
            writeln!(writer, "    {}", relativize_to_cwd(path).dimmed())?;
        }
    }

    if !audit.failures.is_empty() {
        writeln!(
            writer,
            "  {} {} failures:",
            "⚠".yellow().bold(),
            audit.failures.len().to_string().red().bold()
        )?;
        for failure in &audit.failures {
            let stage = match failure.stage {
                FailureStage::Parse => "parse",
                FailureStage::Save => "save",
                FailureStage::Delete => "delete",
            };
            writeln!(
                writer,
                "    [{}] {} - {}",
                stage.red(),
                relativize_to_cwd(&failure.path).blue(),
                failure.message
            )?;
        }
    }

    Ok(())
}
