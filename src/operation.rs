//! Plan building blocks shared by the planner, the sorters and the executor.
//!
//! A [`FileEntry`] is a snapshot of a file taken while walking the target
//! directory. Sorters turn entries into [`Operation`]s, which the executor
//! applies and the history log persists.
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// A file discovered while walking a root directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// The directory the walk started from.
    pub root_dir: PathBuf,
    /// Absolute path of the file.
    pub source_path: PathBuf,
    /// Size in bytes at walk time.
    pub size: u64,
}

impl FileEntry {
    pub fn new(root_dir: impl Into<PathBuf>, source_path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            root_dir: root_dir.into(),
            source_path: source_path.into(),
            size,
        }
    }

    /// The final path component, lossily converted.
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// The final path component as stored on disk, for building destinations.
    pub fn os_file_name(&self) -> &OsStr {
        self.source_path.file_name().unwrap_or_default()
    }

    /// The directory containing the file.
    pub fn parent_dir(&self) -> &Path {
        self.source_path.parent().unwrap_or(&self.root_dir)
    }
}

/// What should happen to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Move,
    Delete,
    Skip,
}

/// One proposed (or applied) action on a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub entry: FileEntry,
    /// Only set for moves.
    pub destination: Option<PathBuf>,
    pub size: u64,
}

impl Operation {
    pub fn move_to(entry: FileEntry, destination: impl Into<PathBuf>) -> Self {
        let size = entry.size;
        Self {
            kind: OperationKind::Move,
            entry,
            destination: Some(destination.into()),
            size,
        }
    }

    pub fn delete(entry: FileEntry) -> Self {
        let size = entry.size;
        Self {
            kind: OperationKind::Delete,
            entry,
            destination: None,
            size,
        }
    }

    pub fn skip(entry: FileEntry) -> Self {
        let size = entry.size;
        Self {
            kind: OperationKind::Skip,
            entry,
            destination: None,
            size,
        }
    }

    pub fn source(&self) -> &Path {
        &self.entry.source_path
    }

    pub fn is_skip(&self) -> bool {
        self.kind == OperationKind::Skip
    }

    /// Returns the same move with source and destination exchanged.
    ///
    /// Non-move operations are returned unchanged.
    pub fn reversed(&self) -> Self {
        match (&self.kind, &self.destination) {
            (OperationKind::Move, Some(destination)) => {
                let entry = FileEntry {
                    root_dir: self.entry.root_dir.clone(),
                    source_path: destination.clone(),
                    size: self.entry.size,
                };
                Self {
                    kind: OperationKind::Move,
                    entry,
                    destination: Some(self.entry.source_path.clone()),
                    size: self.size,
                }
            }
            _ => self.clone(),
        }
    }
}

/// Counts operations by kind: `(moves, deletes, skips)`.
pub fn count_by_kind(operations: &[Operation]) -> (usize, usize, usize) {
    operations
        .iter()
        .fold((0, 0, 0), |(m, d, s), op| match op.kind {
            OperationKind::Move => (m + 1, d, s),
            OperationKind::Delete => (m, d + 1, s),
            OperationKind::Skip => (m, d, s + 1),
        })
}
