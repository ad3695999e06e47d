//! User-facing reporting.
//!
//! Everything the binary prints goes through [`OutputFormatter`]. Diagnostics
//! go through the `log` facade instead, so `DIRSORT_LOG` never changes what
//! the report looks like.

use crate::executor::{ExecuteError, Outcome, SortResult};
use crate::history::{Transaction, TransactionKind, UndoReport};
use crate::operation::{FileEntry, Operation, OperationKind, count_by_kind};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Formats a byte count with a binary unit, e.g. `1.5 KB`.
///
/// ```
/// use dirsort::output::human_size;
/// assert_eq!(human_size(512), "512 B");
/// assert_eq!(human_size(1536), "1.5 KB");
/// ```
pub fn human_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, SIZE_UNITS[0])
    } else {
        format!("{:.1} {}", value, SIZE_UNITS[unit])
    }
}

/// `path` relative to `root` when possible.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// One-line description of what an operation does, with paths relative to its root.
pub fn describe_operation(op: &Operation) -> String {
    let root = op.entry.root_dir.as_path();
    let source = display_path(op.source(), root);
    match (op.kind, &op.destination) {
        (OperationKind::Move, Some(destination)) => {
            format!(
                "{} -> {} ({})",
                source,
                display_path(destination, root),
                human_size(op.size)
            )
        }
        (OperationKind::Move, None) => format!("{} -> ? ({})", source, human_size(op.size)),
        (OperationKind::Delete, _) => format!("delete {} ({})", source, human_size(op.size)),
        (OperationKind::Skip, _) => source,
    }
}

/// One line per failed operation, numbered in batch order.
pub fn failure_lines(result: &SortResult) -> Vec<String> {
    result
        .errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("{}. {}", i + 1, e))
        .collect()
}

/// A tagged report line for an executed operation.
pub fn operation_line(op: &Operation, outcome: &Result<Outcome, ExecuteError>) -> String {
    let description = describe_operation(op);
    match outcome {
        Ok(Outcome::Applied) => format!("{} {}", "[OK]".green(), description),
        Ok(Outcome::DryRun) => format!("{} {}", "[DRY]".yellow(), description),
        Ok(Outcome::Blocked) => format!("{} {} (blacklisted)", "[SKIP]".dimmed(), description),
        Ok(Outcome::Unchanged) => format!("{} {} (unchanged)", "[SKIP]".dimmed(), description),
        Ok(Outcome::Skipped) => format!("{} {}", "[SKIP]".dimmed(), description),
        Err(e) => format!("{} {}: {}", "[ERR]".red(), description, e),
    }
}

pub struct OutputFormatter;

impl OutputFormatter {
    pub fn success(message: &str) {
        println!("{} {}", "[OK]".green(), message);
    }

    pub fn error(message: &str) {
        eprintln!("{} {}", "[ERR]".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "[WARN]".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Progress bar for a batch of `total` operations.
    ///
    /// Falls back to indicatif's default style if the template is rejected.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        match ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            Ok(style) => pb.set_style(style.progress_chars("█▓░")),
            Err(e) => log::debug!("progress bar template rejected: {}", e),
        }
        pb
    }

    /// Prints the proposed plan grouped by destination folder.
    pub fn plan_summary(root: &Path, operations: &[Operation]) {
        let (moves, deletes, skips) = count_by_kind(operations);
        Self::header("PLAN");

        let mut folders: BTreeMap<String, usize> = BTreeMap::new();
        for op in operations {
            if let (OperationKind::Move, Some(destination)) = (op.kind, &op.destination)
                && let Some(parent) = destination.parent()
            {
                let folder = display_path(parent, root);
                let folder = if folder.is_empty() { ".".to_string() } else { folder };
                *folders.entry(folder).or_insert(0) += 1;
            }
        }

        if !folders.is_empty() {
            let width = folders.keys().map(String::len).max().unwrap_or(0).max(6);
            println!("{:<width$} | {}", "Folder".bold(), "Files".bold(), width = width);
            println!("{}", "-".repeat(width + 10));
            for (folder, count) in &folders {
                println!(
                    "{:<width$} | {}",
                    folder,
                    count.to_string().green(),
                    width = width
                );
            }
            println!("{}", "-".repeat(width + 10));
        }

        println!(
            "{} to move, {} to delete, {} unchanged",
            moves.to_string().green(),
            deletes.to_string().red(),
            skips
        );
    }

    /// Prints the totals of an executed batch.
    pub fn result_summary(result: &SortResult, dry_run: bool) {
        Self::header("SUMMARY");
        if dry_run {
            Self::dry_run_notice("No files were modified.");
        }
        println!(
            "Moved: {}  Deleted: {}  Skipped: {}  Errors: {}",
            result.moved.to_string().green(),
            result.deleted.to_string().red(),
            result.skipped,
            if result.errors.is_empty() {
                "0".normal()
            } else {
                result.errors.len().to_string().red().bold()
            }
        );
        for line in failure_lines(result) {
            Self::error(&line);
        }
    }

    pub fn undo_report(report: &UndoReport) {
        Self::header("UNDO");
        println!(
            "Restored: {}  Failed: {}",
            report.restored.to_string().green(),
            report.failed.len()
        );
        for failure in &report.failed {
            Self::error(&failure.to_string());
        }
    }

    pub fn history_table(transactions: &[Transaction]) {
        if transactions.is_empty() {
            Self::info("No history recorded yet.");
            return;
        }

        Self::header("HISTORY");
        println!(
            "{:<22} | {:<6} | {:>5} | {}",
            "Id".bold(),
            "Type".bold(),
            "Ops".bold(),
            "Directory".bold()
        );
        println!("{}", "-".repeat(60));
        for transaction in transactions {
            let kind = match transaction.kind {
                TransactionKind::Action => "action".normal(),
                TransactionKind::Undo => "undo".yellow(),
            };
            let root = transaction
                .root_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!(
                "{:<22} | {:<6} | {:>5} | {}",
                transaction.id,
                kind,
                transaction.operations.len(),
                root
            );
        }
    }

    pub fn largest_files(root: &Path, entries: &[FileEntry]) {
        Self::header("LARGEST FILES");
        for (rank, entry) in entries.iter().enumerate() {
            println!(
                "{:>3}. {:>10}  {}",
                rank + 1,
                human_size(entry.size).green(),
                display_path(&entry.source_path, root)
            );
        }
    }
}
