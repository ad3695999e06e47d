//! Empty-directory sweep run after a batch or an undo.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Metadata file that does not keep a directory alive.
pub const OS_MARKER_FILE: &str = ".DS_Store";

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("failed to remove {}: {source}", path.display())]
    RemoveFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Removes every directory under `root` that is empty or holds only the OS
/// marker file. Returns the number of directories removed.
///
/// Directories are visited deepest first, so a chain of folders that only
/// contained each other disappears in one pass. Hidden directories and the
/// root itself are never touched.
pub fn clean_empty_dirs(root: &Path) -> Result<usize, CleanupError> {
    if !root.is_dir() {
        return Ok(0);
    }

    let mut dirs = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'))
    {
        let entry = entry?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }

    let mut removed = 0;
    for dir in dirs.iter().rev() {
        if remove_if_empty(dir)? {
            removed += 1;
        }
    }

    if removed > 0 {
        log::info!("removed {} empty directories under {}", removed, root.display());
    }
    Ok(removed)
}

fn remove_if_empty(dir: &Path) -> Result<bool, CleanupError> {
    let remove_failed = |source| CleanupError::RemoveFailed {
        path: dir.to_path_buf(),
        source,
    };

    let mut marker = None;
    for child in fs::read_dir(dir).map_err(remove_failed)? {
        let child = child.map_err(remove_failed)?;
        if child.file_name() == OS_MARKER_FILE && marker.is_none() {
            marker = Some(child.path());
        } else {
            return Ok(false);
        }
    }

    if let Some(marker) = marker {
        fs::remove_file(&marker).map_err(remove_failed)?;
    }
    fs::remove_dir(dir).map_err(remove_failed)?;
    log::debug!("removed empty directory {}", dir.display());
    Ok(true)
}
