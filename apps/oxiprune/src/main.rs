use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{debug, info};
use oxiprune_remove::{AuditResult, Config};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "oxiprune")]
#[command(about = "Remove files from codebases together with every import of them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Delete files or directories and remove every import of them
    Remove(Config),

    /// Print a previously written removal audit
    ShowAudit {
        /// Path to a removal-audit-*.json file
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    // stdio is blocked by LineWriter, use a BufWriter to reduce syscalls.
    // See https://github.com/rust-lang/rust/issues/60673
    let mut stdout = BufWriter::new(io::stdout());

    let cli = Cli::parse();
    debug!("Parsed CLI arguments: {:?}", cli.command);

    match cli.command {
        Commands::Remove(mut cfg) => {
            cfg.initialize()?;
            let root = cfg.root()?.clone();
            let ctx = cfg.resolve_context()?;
            debug!(
                "Config: root={:?}, base_dir={:?}, aliases={:?}",
                root, ctx.base_dir, ctx.root_aliases
            );

            let targets = oxiprune_remove::collect_targets(&cfg.paths, &root)?;
            oxiprune_remove::print_targets(&mut stdout, &targets)?;

            if !cfg.yes && !cfg.dry_run && !confirm(&mut stdout)? {
                writeln!(stdout, "{} Aborted, nothing was removed.", "✗".red().bold())?;
                stdout.flush()?;
                return Ok(());
            }

            let start = Instant::now();
            let num_threads = rayon::current_num_threads();
            info!("Running removal of {} targets (using {} threads)", targets.len(), num_threads);

            let audit = oxiprune_remove::remove_and_delete(&targets, &ctx, &cfg.removal_options())?;
            let elapsed_ms = start.elapsed().as_millis();

            writeln!(stdout)?;
            oxiprune_remove::print_audit(&mut stdout, &audit)?;

            if let Some(dir) = cfg.audit_dir()? {
                let path = oxiprune_remove::write_audit(&dir, &audit)?;
                writeln!(stdout, "\n{} Audit written to {}", "●".bright_blue(), path.display())?;
            }

            writeln!(
                stdout,
                "\n{} Finished in {}ms on {} files (using {} threads).",
                "●".bright_blue(),
                elapsed_ms.to_string().cyan(),
                audit.files_scanned.to_string().cyan(),
                num_threads.to_string().cyan()
            )?;
            stdout.flush()?;

            exit_on_failures(&audit);
            Ok(())
        }
        Commands::ShowAudit { path } => {
            let audit = oxiprune_remove::read_audit(&path)?;
            writeln!(
                stdout,
                "{} Removal of {} targets at {}\n",
                "●".bright_blue(),
                audit.targets.len().to_string().cyan(),
                audit.created_at.to_rfc3339().cyan()
            )?;
            oxiprune_remove::print_audit(&mut stdout, &audit)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn confirm<W: Write>(writer: &mut W) -> Result<bool> {
    write!(writer, "\nProceed? [y/N] ")?;
    writer.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

fn exit_on_failures(audit: &AuditResult) {
    if !audit.failures.is_empty() {
        // Non-zero exit to fail CI
        std::process::exit(1);
    }
}
