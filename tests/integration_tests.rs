//! Integration tests for dirsort
//!
//! These tests drive the full pipeline (plan, execute, journal, clean up, undo)
//! against throwaway directory trees.
//!
//! Test categories:
//! 1. Duplicate detection workflows
//! 2. Undo and history
//! 3. Keyword rules and blacklist
//! 4. Dry-run mode and depth limits
//! 5. Cleanup
//! 6. Renaming

use dirsort::cli::{AcceptAll, CliError, RunOptions, run_sort, run_undo};
use dirsort::config::{ConfigModel, ParseOptions};
use dirsort::history::{HistoryError, TransactionKind, TransactionLog};
use dirsort::operation::OperationKind;
use dirsort::planner::WalkOptions;
use dirsort::{ConfigSorter, DuplicateFinder, ExtensionSorter, SortResult, Sorter};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary root directory plus a private history file next to it.
struct TestFixture {
    temp_dir: TempDir,
    root: PathBuf,
    log: TransactionLog,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().join("root");
        fs::create_dir(&root).expect("Failed to create root directory");
        let log = TransactionLog::at(temp_dir.path().join("state").join("history"));
        TestFixture {
            temp_dir,
            root,
            log,
        }
    }

    fn path(&self) -> &Path {
        &self.root
    }

    /// Create a file (and its parent folders) relative to the root.
    fn create_file(&self, rel_path: &str, content: &[u8]) {
        let path = self.path().join(rel_path);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create parent directory");
        fs::write(&path, content).expect("Failed to write file content");
    }

    fn create_text_file(&self, rel_path: &str, content: &str) {
        self.create_file(rel_path, content.as_bytes());
    }

    /// Write a rules file outside the root and load it.
    fn rules(&self, content: &str) -> ConfigModel {
        let path = self.temp_dir.path().join("rules");
        fs::write(&path, content).expect("Failed to write rules");
        ConfigModel::load(&path, &ParseOptions::default()).expect("Failed to load rules")
    }

    fn run(&self, sorter: &dyn Sorter, dry_run: bool, max_depth: Option<usize>) -> SortResult {
        let options = RunOptions {
            dry_run,
            walk: WalkOptions::with_max_depth(max_depth),
        };
        run_sort(self.path(), sorter, &mut AcceptAll, &options, &self.log)
            .expect("sort should succeed")
    }

    fn assert_dir_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_dir(), "Directory should exist: {}", path.display());
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "Path should not exist: {}", path.display());
    }

    /// Every file under the root, relative and sorted.
    fn list_files_recursive(&self) -> Vec<String> {
        let mut files = Vec::new();
        Self::walk_dir(self.path(), self.path(), &mut files);
        files.sort();
        files
    }

    fn walk_dir(root: &Path, dir: &Path, files: &mut Vec<String>) {
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    Self::walk_dir(root, &path, files);
                } else {
                    let rel = path.strip_prefix(root).unwrap();
                    files.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
    }
}

// ============================================================================
// Duplicate Detection
// ============================================================================

#[test]
fn test_duplicates_moved_into_folder() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "hello");
    fixture.create_text_file("b.txt", "hello");
    fixture.create_text_file("c.txt", "world");

    let result = fixture.run(&DuplicateFinder::new(), false, None);

    assert_eq!(result.moved, 1);
    assert_eq!(result.skipped, 2);
    assert!(result.is_success());
    assert_eq!(
        fixture.list_files_recursive(),
        vec!["a.txt", "c.txt", "duplicates/b.txt"]
    );
}

#[test]
fn test_duplicates_across_subfolders_keep_first_in_walk_order() {
    let fixture = TestFixture::new();
    fixture.create_text_file("photos/2023/img.jpg", "same bytes");
    fixture.create_text_file("backup/img.jpg", "same bytes");
    fixture.create_text_file("zzz/img.jpg", "same bytes");

    fixture.run(&DuplicateFinder::new(), false, None);

    assert_eq!(
        fixture.list_files_recursive(),
        vec!["backup/img.jpg", "duplicates/img.jpg", "duplicates/img_v1.jpg"]
    );
    // The emptied folders were swept.
    fixture.assert_not_exists("photos");
    fixture.assert_not_exists("zzz");
}

#[test]
fn test_second_duplicate_run_finds_nothing_new() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "hello");
    fixture.create_text_file("b.txt", "hello");

    fixture.run(&DuplicateFinder::new(), false, None);
    let second = fixture.run(&DuplicateFinder::new(), false, None);

    assert_eq!(second.moved, 0);
    assert_eq!(fixture.log.list().unwrap().len(), 1);
}

#[test]
fn test_nuke_deletes_copies_without_journal() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "hello");
    fixture.create_text_file("b.txt", "hello");
    fixture.create_text_file("c.txt", "hello");

    let result = fixture.run(&DuplicateFinder::nuking(), false, None);

    assert_eq!(result.deleted, 2);
    assert_eq!(fixture.list_files_recursive(), vec!["a.txt"]);
    assert!(fixture.log.list().unwrap().is_empty());
}

// ============================================================================
// Undo and History
// ============================================================================

#[test]
fn test_undo_round_trip() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "hello");
    fixture.create_text_file("b.txt", "hello");
    fixture.create_text_file("c.txt", "world");
    let before = fixture.list_files_recursive();

    fixture.run(&DuplicateFinder::new(), false, None);
    let report = run_undo(fixture.path(), &fixture.log).unwrap();

    assert_eq!(report.restored, 1);
    assert_eq!(fixture.list_files_recursive(), before);
    fixture.assert_not_exists("duplicates");

    let history = fixture.log.list().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, TransactionKind::Action);
    assert_eq!(history[1].kind, TransactionKind::Undo);
    assert_eq!(history[0].operations, history[1].operations);
    assert!(
        history[0]
            .operations
            .iter()
            .all(|op| op.kind == OperationKind::Move)
    );
}

#[test]
fn test_double_undo_is_rejected() {
    let fixture = TestFixture::new();
    fixture.create_text_file("notes.md", "# notes");

    fixture.run(&ExtensionSorter::new(), false, None);
    run_undo(fixture.path(), &fixture.log).unwrap();

    let second = run_undo(fixture.path(), &fixture.log);
    assert!(matches!(
        second,
        Err(CliError::History(HistoryError::AlreadyUndone(_)))
    ));
    fixture.assert_file_exists("notes.md");
}

#[test]
fn test_undo_only_touches_requested_root() {
    let first = TestFixture::new();
    let other_root = first.temp_dir.path().join("other");
    fs::create_dir(&other_root).unwrap();
    fs::write(other_root.join("slides.key"), "k").unwrap();
    first.create_text_file("report.pdf", "pdf");

    first.run(&ExtensionSorter::new(), false, None);
    run_sort(
        &other_root,
        &ExtensionSorter::new(),
        &mut AcceptAll,
        &RunOptions::default(),
        &first.log,
    )
    .unwrap();

    run_undo(first.path(), &first.log).unwrap();

    first.assert_file_exists("report.pdf");
    assert!(other_root.join("slides/slides.key").exists());
    assert_eq!(first.log.list().unwrap().len(), 3);
}

#[test]
fn test_undo_without_history_fails() {
    let fixture = TestFixture::new();
    assert!(matches!(
        run_undo(fixture.path(), &fixture.log),
        Err(CliError::History(HistoryError::NoHistory(_)))
    ));
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_names_are_left_in_place_and_batch_stays_undoable() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "hello");
    let odd = fixture.path().join(OsStr::from_bytes(b"inv\xffoice.pdf"));
    fs::write(&odd, "pdf").expect("Failed to write file content");

    let result = fixture.run(&ExtensionSorter::new(), false, None);
    assert_eq!(result.moved, 1);
    assert!(result.is_success());
    fixture.assert_file_exists("docs/a.txt");
    assert!(odd.is_file());

    let history = fixture.log.list().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].operations.len(), 1);

    let report = run_undo(fixture.path(), &fixture.log).unwrap();
    assert_eq!(report.restored, 1);
    fixture.assert_file_exists("a.txt");
    assert!(odd.is_file());
}

// ============================================================================
// Keyword Rules and Blacklist
// ============================================================================

#[test]
fn test_config_rules_with_wildcard_fallback() {
    let fixture = TestFixture::new();
    fixture.create_text_file("invoice_jan.pdf", "i");
    fixture.create_text_file("receipt_42.png", "r");
    fixture.create_text_file("song.mp3", "s");
    let rules = fixture.rules(
        "// rules\nFinance = invoice, regex(^receipt_[0-9]+)\nOthers = *\nMisc = *\n",
    );

    fixture.run(&ConfigSorter::new(rules), false, None);

    assert_eq!(
        fixture.list_files_recursive(),
        vec![
            "Finance/invoice_jan.pdf",
            "Finance/receipt_42.png",
            "Others/song.mp3"
        ]
    );
}

#[test]
fn test_blacklisted_folder_is_left_alone() {
    let fixture = TestFixture::new();
    fixture.create_text_file("Archive/report_2019.pdf", "old");
    fixture.create_text_file("report_2024.pdf", "new");
    let rules = fixture.rules("Docs = report\n!Archive\n");

    let result = fixture.run(&ConfigSorter::new(rules), false, None);

    assert_eq!(result.moved, 1);
    fixture.assert_file_exists("Archive/report_2019.pdf");
    fixture.assert_file_exists("Docs/report_2024.pdf");
}

#[test]
fn test_extension_sort_is_idempotent() {
    let fixture = TestFixture::new();
    fixture.create_text_file("paper.pdf", "p");
    fixture.create_text_file("clip.mov", "m");
    fixture.create_text_file("unknown.xyz", "?");

    let first = fixture.run(&ExtensionSorter::new(), false, None);
    let second = fixture.run(&ExtensionSorter::new(), false, None);

    assert_eq!(first.moved, 2);
    assert_eq!(second.moved, 0);
    fixture.assert_file_exists("docs/paper.pdf");
    fixture.assert_file_exists("movies/clip.mov");
    fixture.assert_file_exists("unknown.xyz");
    assert_eq!(fixture.log.list().unwrap().len(), 1);
}

// ============================================================================
// Dry Run and Depth
// ============================================================================

#[test]
fn test_dry_run_changes_nothing() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "hello");
    fixture.create_text_file("b.txt", "hello");
    fixture.create_text_file("photo.png", "png");
    let before = fixture.list_files_recursive();

    let result = fixture.run(&DuplicateFinder::new(), true, None);

    assert_eq!(result.moved, 0);
    assert!(result.is_success());
    assert_eq!(fixture.list_files_recursive(), before);
    fixture.assert_not_exists("duplicates");
    assert!(!fixture.log.path().exists());
}

#[test]
fn test_depth_limit_hides_nested_files() {
    let fixture = TestFixture::new();
    fixture.create_text_file("top.txt", "1");
    fixture.create_text_file("inbox/mid.txt", "2");
    fixture.create_text_file("inbox/old/deep.txt", "3");

    fixture.run(&ExtensionSorter::new(), false, Some(1));

    fixture.assert_file_exists("docs/top.txt");
    fixture.assert_file_exists("docs/mid.txt");
    fixture.assert_file_exists("inbox/old/deep.txt");
}

#[test]
fn test_hidden_entries_are_ignored() {
    let fixture = TestFixture::new();
    fixture.create_text_file(".env", "secret");
    fixture.create_text_file(".git/HEAD.txt", "ref");
    fixture.create_text_file("readme.md", "hi");

    fixture.run(&ExtensionSorter::new(), false, None);

    assert_eq!(
        fixture.list_files_recursive(),
        vec![".env", ".git/HEAD.txt", "docs/readme.md"]
    );
}

// ============================================================================
// Cleanup
// ============================================================================

#[test]
fn test_cleanup_cascades_after_sort() {
    let fixture = TestFixture::new();
    fixture.create_text_file("downloads/2024/march/scan.pdf", "s");
    fixture.create_file("downloads/.DS_Store", b"");
    fixture.create_text_file("keep/notes.bin", "n");

    fixture.run(&ExtensionSorter::new(), false, None);

    fixture.assert_file_exists("docs/scan.pdf");
    fixture.assert_not_exists("downloads");
    fixture.assert_dir_exists("keep");
}

#[test]
fn test_undo_recreates_swept_folders() {
    let fixture = TestFixture::new();
    fixture.create_text_file("deep/nested/scan.pdf", "s");

    fixture.run(&ExtensionSorter::new(), false, None);
    fixture.assert_not_exists("deep");

    run_undo(fixture.path(), &fixture.log).unwrap();
    fixture.assert_file_exists("deep/nested/scan.pdf");
    fixture.assert_not_exists("docs");
}

// ============================================================================
// Rename
// ============================================================================

#[cfg(unix)]
#[test]
fn test_rename_with_external_program_repairs_collisions() {
    use dirsort::sorter::{CommandNameSource, RenameSorter};

    let fixture = TestFixture::new();
    fixture.create_text_file("IMG_0001.txt", "a");
    fixture.create_text_file("IMG_0002.txt", "b");
    let source = CommandNameSource::new(
        "sh",
        vec![
            "-c".to_string(),
            r#"cat > /dev/null; echo '["holiday.txt", "holiday.txt"]'"#.to_string(),
        ],
    );

    let result = fixture.run(&RenameSorter::new(source, "rename"), false, None);

    assert_eq!(result.moved, 2);
    assert_eq!(
        fixture.list_files_recursive(),
        vec!["holiday.txt", "holiday_v1.txt"]
    );
    assert_eq!(
        fs::read_to_string(fixture.path().join("holiday_v1.txt")).unwrap(),
        "b"
    );
}
