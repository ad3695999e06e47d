//! Applies planned operations to the filesystem.
//!
//! The executor is the only component that mutates files during a run. It
//! enforces the blacklist and dry-run mode, creates destination folders on
//! demand, refuses to overwrite existing files, and remembers every move it
//! applied so the batch can be journaled and later reverted.

use crate::operation::{Operation, OperationKind};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Per-operation failures. These never abort the rest of a batch.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to delete {}: {source}", path.display())]
    DeleteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),
    #[error("move of {} has no destination", .0.display())]
    MissingDestination(PathBuf),
}

/// Why an operation did or did not change the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Suppressed by dry-run mode.
    DryRun,
    /// The source folder is blacklisted.
    Blocked,
    /// Source and destination are the same path.
    Unchanged,
    /// A `Skip` operation.
    Skipped,
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        self == Outcome::Applied
    }
}

/// Aggregate counts for one run.
#[derive(Debug, Default)]
pub struct SortResult {
    pub moved: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub errors: Vec<ExecuteError>,
}

impl SortResult {
    pub fn record(&mut self, op: &Operation, result: Result<Outcome, ExecuteError>) {
        match result {
            Ok(Outcome::Applied) => match op.kind {
                OperationKind::Move => self.moved += 1,
                OperationKind::Delete => self.deleted += 1,
                OperationKind::Skip => self.skipped += 1,
            },
            Ok(_) => self.skipped += 1,
            Err(e) => self.errors.push(e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Executor {
    dry_run: bool,
    blacklist: Vec<String>,
    applied: Vec<Operation>,
}

impl Executor {
    pub fn new(dry_run: bool, blacklist: Vec<String>) -> Self {
        Self {
            dry_run,
            blacklist,
            applied: Vec::new(),
        }
    }

    /// Moves applied so far, in application order.
    pub fn applied(&self) -> &[Operation] {
        &self.applied
    }

    pub fn into_applied(self) -> Vec<Operation> {
        self.applied
    }

    /// Applies one operation. Returns whether the filesystem changed.
    pub fn execute(&mut self, op: &Operation) -> Result<bool, ExecuteError> {
        self.apply(op).map(Outcome::is_applied)
    }

    /// Applies one operation and reports why it did or did not take effect.
    pub fn apply(&mut self, op: &Operation) -> Result<Outcome, ExecuteError> {
        if self.dry_run {
            return Ok(if op.is_skip() {
                Outcome::Skipped
            } else {
                Outcome::DryRun
            });
        }

        match op.kind {
            OperationKind::Skip => Ok(Outcome::Skipped),
            OperationKind::Delete => {
                fs::remove_file(op.source()).map_err(|e| ExecuteError::DeleteFailed {
                    path: op.source().to_path_buf(),
                    source: e,
                })?;
                log::info!("deleted {}", op.source().display());
                Ok(Outcome::Applied)
            }
            OperationKind::Move => {
                let destination = op
                    .destination
                    .as_deref()
                    .ok_or_else(|| ExecuteError::MissingDestination(op.source().to_path_buf()))?;

                if destination == op.source() {
                    return Ok(Outcome::Unchanged);
                }
                if self.is_blacklisted(op.source()) {
                    log::debug!("blacklisted source, leaving {}", op.source().display());
                    return Ok(Outcome::Blocked);
                }

                move_file(op.source(), destination)?;
                self.applied.push(op.clone());
                Ok(Outcome::Applied)
            }
        }
    }

    /// Applies every operation, continuing past failures.
    ///
    /// `report` is called after each operation with its outcome.
    pub fn execute_all<F>(&mut self, operations: &[Operation], mut report: F) -> SortResult
    where
        F: FnMut(&Operation, &Result<Outcome, ExecuteError>),
    {
        let mut result = SortResult::default();
        for op in operations {
            let outcome = self.apply(op);
            if let Err(e) = &outcome {
                log::warn!("{}", e);
            }
            report(op, &outcome);
            result.record(op, outcome);
        }
        result
    }

    /// Moves a previously applied operation back to its source.
    ///
    /// Ignores dry-run mode and the blacklist. Recreates the original parent
    /// directory when it was removed by a cleanup pass.
    pub fn revert_execute(&self, op: &Operation) -> Result<(), ExecuteError> {
        if op.kind != OperationKind::Move {
            return Ok(());
        }
        let reversed = op.reversed();
        let destination = reversed
            .destination
            .as_deref()
            .ok_or_else(|| ExecuteError::MissingDestination(reversed.source().to_path_buf()))?;
        move_file(reversed.source(), destination)
    }

    fn is_blacklisted(&self, source: &Path) -> bool {
        source
            .parent()
            .and_then(|dir| dir.file_name())
            .is_some_and(|name| self.blacklist.iter().any(|b| name == b.as_str()))
    }
}

fn move_file(from: &Path, to: &Path) -> Result<(), ExecuteError> {
    if to.exists() {
        return Err(ExecuteError::DestinationExists(to.to_path_buf()));
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| ExecuteError::DirectoryCreationFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::rename(from, to).map_err(|e| ExecuteError::MoveFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    })?;
    log::debug!("moved {} -> {}", from.display(), to.display());
    Ok(())
}
