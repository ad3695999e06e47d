//! Directory walking and plan construction.
//!
//! Planning only reads metadata. Nothing under the root is modified until the
//! resulting operations are handed to the executor.

use crate::operation::{FileEntry, Operation};
use crate::sorter::{SortError, Sorter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),
    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Sort(#[from] SortError),
    #[error("{sorter} sorter returned {operations} operations for {entries} files")]
    IncompletePlan {
        sorter: &'static str,
        entries: usize,
        operations: usize,
    },
}

/// Which files the walk makes visible to a sorter.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Maximum number of directories between the root and a file.
    /// `Some(0)` only looks at the root itself; `None` is unlimited.
    pub max_depth: Option<usize>,
}

impl WalkOptions {
    pub fn with_max_depth(max_depth: Option<usize>) -> Self {
        Self { max_depth }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Walks `root` in file-name order and snapshots every visible file.
///
/// Directories, anything below a dot-prefixed path segment, and files deeper
/// than the depth limit are left out.
pub fn collect_entries(root: &Path, options: &WalkOptions) -> Result<Vec<FileEntry>, PlanError> {
    if !root.is_dir() {
        return Err(PlanError::InvalidRoot(root.to_path_buf()));
    }

    let mut walker = WalkDir::new(root).sort_by_file_name();
    if let Some(depth) = options.max_depth {
        walker = walker.max_depth(depth + 1);
    }

    let mut entries = Vec::new();
    for entry in walker
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
    {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        // The journal can only hold UTF-8 paths.
        if entry.path().to_str().is_none() {
            log::warn!("skipping {}: path is not valid UTF-8", entry.path().display());
            continue;
        }
        let size = entry.metadata()?.len();
        entries.push(FileEntry::new(root, entry.path(), size));
    }

    log::debug!("found {} files under {}", entries.len(), root.display());
    Ok(entries)
}

/// Builds the plan for `root` with `sorter`, without touching the filesystem.
pub fn plan<S: Sorter + ?Sized>(
    root: &Path,
    sorter: &S,
    options: &WalkOptions,
) -> Result<Vec<Operation>, PlanError> {
    let entries = collect_entries(root, options)?;
    let operations = sorter.decide(&entries)?;

    if operations.len() != entries.len() {
        return Err(PlanError::IncompletePlan {
            sorter: sorter.name(),
            entries: entries.len(),
            operations: operations.len(),
        });
    }

    log::info!(
        "{} sorter planned {} operations for {}",
        sorter.name(),
        operations.len(),
        root.display()
    );
    Ok(operations)
}

/// The `n` biggest visible files, largest first.
pub fn largest_files(
    root: &Path,
    n: usize,
    options: &WalkOptions,
) -> Result<Vec<FileEntry>, PlanError> {
    let mut entries = collect_entries(root, options)?;
    entries.sort_by(|a, b| b.size.cmp(&a.size));
    entries.truncate(n);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::DuplicateFinder;
    use crate::sorter::ExtensionSorter;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn relative_names(root: &Path, entries: &[FileEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| {
                e.source_path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_collect_skips_hidden_and_sorts() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        write(root, "b.txt", "b");
        write(root, "a.txt", "a");
        write(root, ".hidden", "h");
        write(root, ".git/config", "c");
        write(root, "sub/c.txt", "c");

        let entries = collect_entries(root, &WalkOptions::default()).unwrap();
        assert_eq!(
            relative_names(root, &entries),
            vec!["a.txt", "b.txt", "sub/c.txt"]
        );
        assert!(entries.iter().all(|e| e.root_dir == root));
        assert_eq!(entries[0].size, 1);
    }

    #[test]
    fn test_depth_limit_hides_deeper_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        write(root, "top.txt", "1");
        write(root, "one/mid.txt", "2");
        write(root, "one/two/deep.txt", "3");

        let only_root = collect_entries(root, &WalkOptions::with_max_depth(Some(0))).unwrap();
        assert_eq!(relative_names(root, &only_root), vec!["top.txt"]);

        let one_level = collect_entries(root, &WalkOptions::with_max_depth(Some(1))).unwrap();
        assert_eq!(
            relative_names(root, &one_level),
            vec!["one/mid.txt", "top.txt"]
        );

        let all = collect_entries(root, &WalkOptions::default()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_collect_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        write(root, "a.txt", "a");
        fs::write(root.join(OsStr::from_bytes(b"inv\xffoice.pdf")), "pdf").unwrap();

        let entries = collect_entries(root, &WalkOptions::default()).unwrap();
        assert_eq!(relative_names(root, &entries), vec!["a.txt"]);
    }

    #[test]
    fn test_plan_is_pure() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        write(root, "a.txt", "same");
        write(root, "b.txt", "same");
        write(root, "photo.png", "png");

        let first = plan(root, &DuplicateFinder::new(), &WalkOptions::default()).unwrap();
        let second = plan(root, &DuplicateFinder::new(), &WalkOptions::default()).unwrap();
        assert_eq!(first, second);

        let ext_first = plan(root, &ExtensionSorter::new(), &WalkOptions::default()).unwrap();
        let ext_second = plan(root, &ExtensionSorter::new(), &WalkOptions::default()).unwrap();
        assert_eq!(ext_first, ext_second);

        // Nothing moved.
        assert!(root.join("a.txt").exists());
        assert!(!root.join("duplicates").exists());
        assert!(!root.join("images").exists());
    }

    #[test]
    fn test_plan_rejects_missing_root() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let missing = temp_dir.path().join("nope");
        assert!(matches!(
            plan(&missing, &ExtensionSorter::new(), &WalkOptions::default()),
            Err(PlanError::InvalidRoot(_))
        ));
    }

    #[test]
    fn test_largest_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        write(root, "small.txt", "1");
        write(root, "big.txt", "1234567890");
        write(root, "sub/medium.txt", "12345");

        let top = largest_files(root, 2, &WalkOptions::default()).unwrap();
        assert_eq!(relative_names(root, &top), vec!["big.txt", "sub/medium.txt"]);
    }
}
