//! Byte-identical file detection.
//!
//! Candidates are narrowed in three tiers so that only files that still look
//! identical pay for a full read:
//!
//! 1. exact size,
//! 2. SHA-256 of the first [`PARTIAL_HASH_BYTES`] bytes,
//! 3. SHA-256 of the whole file.
//!
//! Within a group of identical files the first one in input order is kept and
//! every later one is moved into `<root>/duplicates` (or deleted in nuke mode).

use crate::operation::{FileEntry, Operation};
use crate::sorter::{SortError, Sorter, unique_name};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Number of leading bytes covered by the partial hash.
pub const PARTIAL_HASH_BYTES: u64 = 4096;
/// Folder, relative to the root, that receives redundant copies.
pub const DUPLICATES_DIR: &str = "duplicates";

/// How many hashes each tier computed during one analysis.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HashStats {
    pub partial_hashes: usize,
    pub full_hashes: usize,
}

/// Operations for a batch plus the hashing work it took.
#[derive(Debug)]
pub struct Analysis {
    pub operations: Vec<Operation>,
    pub stats: HashStats,
}

/// What to do with redundant copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateAction {
    MoveToFolder,
    Delete,
}

/// The duplicate sorter.
#[derive(Debug, Clone)]
pub struct DuplicateFinder {
    action: DuplicateAction,
}

impl Default for DuplicateFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl DuplicateFinder {
    /// Moves redundant copies into the duplicates folder.
    pub fn new() -> Self {
        Self {
            action: DuplicateAction::MoveToFolder,
        }
    }

    /// Deletes redundant copies instead of moving them. Deletions cannot be undone.
    pub fn nuking() -> Self {
        Self {
            action: DuplicateAction::Delete,
        }
    }

    /// Classifies every entry, returning one operation per entry in input order.
    pub fn analyze(&self, entries: &[FileEntry]) -> Result<Analysis, SortError> {
        let mut stats = HashStats::default();
        let mut redundant = vec![false; entries.len()];

        let mut by_size: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        for (index, entry) in entries.iter().enumerate() {
            if is_in_duplicates_dir(entry) {
                continue;
            }
            by_size.entry(entry.size).or_default().push(index);
        }

        for (size, group) in by_size {
            if group.len() < 2 {
                continue;
            }

            let by_partial = group_by(&group, entries, |path| {
                stats.partial_hashes += 1;
                partial_hash(path)
            })?;

            for partial_group in by_partial.into_values() {
                if partial_group.len() < 2 {
                    continue;
                }

                let by_full = group_by(&partial_group, entries, |path| {
                    stats.full_hashes += 1;
                    full_hash(path)
                })?;

                for full_group in by_full.into_values() {
                    log::debug!(
                        "{} identical files of {} bytes, keeping {}",
                        full_group.len(),
                        size,
                        entries[full_group[0]].source_path.display()
                    );
                    for &index in &full_group[1..] {
                        redundant[index] = true;
                    }
                }
            }
        }

        let mut taken: HashSet<String> = entries
            .iter()
            .filter(|entry| is_in_duplicates_dir(entry))
            .map(FileEntry::file_name)
            .collect();

        let operations = entries
            .iter()
            .zip(redundant)
            .map(|(entry, is_redundant)| {
                if !is_redundant {
                    return Operation::skip(entry.clone());
                }
                match self.action {
                    DuplicateAction::Delete => Operation::delete(entry.clone()),
                    DuplicateAction::MoveToFolder => {
                        let name = unique_name(&entry.file_name(), &mut taken);
                        let destination = entry.root_dir.join(DUPLICATES_DIR).join(name);
                        Operation::move_to(entry.clone(), destination)
                    }
                }
            })
            .collect();

        log::info!(
            "duplicate scan of {} files: {} partial hashes, {} full hashes",
            entries.len(),
            stats.partial_hashes,
            stats.full_hashes
        );
        Ok(Analysis { operations, stats })
    }
}

impl Sorter for DuplicateFinder {
    fn name(&self) -> &'static str {
        "duplicates"
    }

    fn decide(&self, entries: &[FileEntry]) -> Result<Vec<Operation>, SortError> {
        self.analyze(entries).map(|analysis| analysis.operations)
    }
}

fn is_in_duplicates_dir(entry: &FileEntry) -> bool {
    entry
        .source_path
        .starts_with(entry.root_dir.join(DUPLICATES_DIR))
}

/// Buckets `indices` by a digest, keeping input order inside each bucket.
fn group_by<F>(
    indices: &[usize],
    entries: &[FileEntry],
    mut digest: F,
) -> Result<HashMap<String, Vec<usize>>, SortError>
where
    F: FnMut(&Path) -> io::Result<String>,
{
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for &index in indices {
        let path = &entries[index].source_path;
        let hash = digest(path).map_err(|e| SortError::Io {
            path: path.clone(),
            source: e,
        })?;
        groups.entry(hash).or_default().push(index);
    }
    Ok(groups)
}

fn partial_hash(path: &Path) -> io::Result<String> {
    let mut buffer = Vec::with_capacity(PARTIAL_HASH_BYTES as usize);
    File::open(path)?
        .take(PARTIAL_HASH_BYTES)
        .read_to_end(&mut buffer)?;
    Ok(format!("{:x}", Sha256::digest(&buffer)))
}

fn full_hash(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(16 * 1024, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 16 * 1024];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
