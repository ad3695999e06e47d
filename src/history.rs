//! Append-only transaction journal and undo.
//!
//! Every applied batch is written as one JSON line. Undoing a batch never
//! edits its record: the reversal is appended as a new `Undo` transaction
//! with the same operations, which also blocks a second undo of that batch.

use crate::config::{self, ConfigError};
use crate::executor::{ExecuteError, Executor};
use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the journal inside the installation directory.
pub const HISTORY_FILE_NAME: &str = "history";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to write history file {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read history file {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid history record on line {line}: {reason}")]
    InvalidFormat { line: usize, reason: String },
    #[error("no history for directory {}", .0.display())]
    NoHistory(PathBuf),
    #[error("last operation in {} was already undone", .0.display())]
    AlreadyUndone(PathBuf),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Action,
    Undo,
}

/// One applied batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub kind: TransactionKind,
    pub timestamp: String,
    pub operations: Vec<Operation>,
}

impl Transaction {
    pub fn new(kind: TransactionKind, operations: Vec<Operation>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: now.format("%Y%m%d%H%M%S%f").to_string(),
            kind,
            timestamp: now.to_rfc3339(),
            operations,
        }
    }

    /// Root directory of the batch, taken from its first operation.
    pub fn root_dir(&self) -> Option<&Path> {
        self.operations.first().map(|op| op.entry.root_dir.as_path())
    }
}

/// The journal file.
#[derive(Debug, Clone)]
pub struct TransactionLog {
    path: PathBuf,
}

impl TransactionLog {
    /// A journal at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.dirsort/history`.
    pub fn default_location() -> Result<Self, HistoryError> {
        Ok(Self::at(config::app_dir()?.join(HISTORY_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one transaction as a single JSON line.
    pub fn record(&self, transaction: &Transaction) -> Result<(), HistoryError> {
        let write_failed = |source| HistoryError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        let mut line = serde_json::to_string(transaction).map_err(|e| {
            write_failed(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_failed)?;
        file.write_all(line.as_bytes()).map_err(write_failed)?;

        log::info!(
            "recorded {:?} transaction {} with {} operations",
            transaction.kind,
            transaction.id,
            transaction.operations.len()
        );
        Ok(())
    }

    /// Every transaction, oldest first. A missing journal is empty.
    pub fn list(&self) -> Result<Vec<Transaction>, HistoryError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(HistoryError::ReadFailed {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| parse_line(index, line))
            .collect()
    }

    /// The most recent transaction whose root is `root`, scanning backwards.
    pub fn last_for_root(&self, root: &Path) -> Result<Option<Transaction>, HistoryError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(HistoryError::ReadFailed {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        let lines: Vec<&str> = content.lines().collect();
        for (index, line) in lines.iter().enumerate().rev() {
            if line.trim().is_empty() {
                continue;
            }
            let transaction = parse_line(index, line)?;
            if transaction.root_dir() == Some(root) {
                return Ok(Some(transaction));
            }
        }
        Ok(None)
    }
}

fn parse_line(index: usize, line: &str) -> Result<Transaction, HistoryError> {
    serde_json::from_str(line).map_err(|e| HistoryError::InvalidFormat {
        line: index + 1,
        reason: e.to_string(),
    })
}

/// What an undo restored.
#[derive(Debug)]
pub struct UndoReport {
    pub transaction: Transaction,
    pub restored: usize,
    pub failed: Vec<ExecuteError>,
}

impl UndoReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Reverts the most recent batch applied to `root`.
///
/// Operations are reverted newest first. Individual failures are collected in
/// the report; the `Undo` transaction is recorded regardless so the same batch
/// is never reverted twice.
pub fn undo(log: &TransactionLog, root: &Path) -> Result<UndoReport, HistoryError> {
    let last = log
        .last_for_root(root)?
        .ok_or_else(|| HistoryError::NoHistory(root.to_path_buf()))?;
    if last.kind == TransactionKind::Undo {
        return Err(HistoryError::AlreadyUndone(root.to_path_buf()));
    }

    let executor = Executor::default();
    let mut restored = 0;
    let mut failed = Vec::new();
    for op in last.operations.iter().rev() {
        match executor.revert_execute(op) {
            Ok(()) => restored += 1,
            Err(e) => {
                log::warn!("undo: {}", e);
                failed.push(e);
            }
        }
    }

    let transaction = Transaction::new(TransactionKind::Undo, last.operations);
    log.record(&transaction)?;

    Ok(UndoReport {
        transaction,
        restored,
        failed,
    })
}
