//! Decision strategies.
//!
//! A [`Sorter`] looks at a whole batch of [`FileEntry`] values and proposes one
//! [`Operation`] per entry, in input order. The planner and executor never
//! need to know which strategy produced a plan.

use crate::config::ConfigModel;
use crate::file_category::FileMapper;
use crate::operation::{FileEntry, Operation};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

/// Errors raised while deciding what to do with a batch.
#[derive(Debug, Error)]
pub enum SortError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("integrity error: sent {sent} files, received {received} names")]
    Integrity { sent: usize, received: usize },
    #[error("invalid replacement name '{0}'")]
    InvalidName(String),
    #[error("name source failed: {0}")]
    NameSource(String),
}

/// Turns a batch of discovered files into proposed operations.
pub trait Sorter {
    /// Short label used in logs and reports.
    fn name(&self) -> &'static str;

    /// Returns exactly one operation per entry, in the same order.
    fn decide(&self, entries: &[FileEntry]) -> Result<Vec<Operation>, SortError>;

    /// Folder names whose files must never be moved.
    fn blacklist(&self) -> &[String] {
        &[]
    }
}

/// Moves files into `docs`, `images`, `movies` or `slides` by extension.
#[derive(Debug, Clone, Default)]
pub struct ExtensionSorter {
    mapper: FileMapper,
}

impl ExtensionSorter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sorter for ExtensionSorter {
    fn name(&self) -> &'static str {
        "extension"
    }

    fn decide(&self, entries: &[FileEntry]) -> Result<Vec<Operation>, SortError> {
        Ok(entries
            .iter()
            .map(|entry| match self.mapper.categorize_path(&entry.source_path) {
                Some(category) => {
                    let destination = entry
                        .root_dir
                        .join(category.dir_name())
                        .join(entry.os_file_name());
                    Operation::move_to(entry.clone(), destination)
                }
                None => Operation::skip(entry.clone()),
            })
            .collect())
    }
}

/// Routes files with the keyword rules of a [`ConfigModel`].
#[derive(Debug, Clone)]
pub struct ConfigSorter {
    config: ConfigModel,
}

impl ConfigSorter {
    pub fn new(config: ConfigModel) -> Self {
        Self { config }
    }
}

impl Sorter for ConfigSorter {
    fn name(&self) -> &'static str {
        "config"
    }

    fn decide(&self, entries: &[FileEntry]) -> Result<Vec<Operation>, SortError> {
        Ok(entries
            .iter()
            .map(|entry| {
                let file_name = entry.file_name();
                match self.config.categorize(&file_name) {
                    Some(folder) => {
                        log::debug!("{} -> {}", file_name, folder);
                        let destination = entry.root_dir.join(folder).join(entry.os_file_name());
                        Operation::move_to(entry.clone(), destination)
                    }
                    None => Operation::skip(entry.clone()),
                }
            })
            .collect())
    }

    fn blacklist(&self) -> &[String] {
        &self.config.blacklist
    }
}

/// Supplies replacement file names for a batch.
///
/// Implementations must return one name per input name, in the same order.
pub trait NameSource {
    fn propose(&self, prompt: &str, names: &[String]) -> Result<Vec<String>, SortError>;
}

/// Asks an external program for new names.
///
/// The program receives the prompt, a newline and a JSON array of names on
/// stdin, and must print a JSON array of the same length on stdout.
#[derive(Debug, Clone)]
pub struct CommandNameSource {
    program: String,
    args: Vec<String>,
}

impl CommandNameSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl NameSource for CommandNameSource {
    fn propose(&self, prompt: &str, names: &[String]) -> Result<Vec<String>, SortError> {
        let payload =
            serde_json::to_string(names).map_err(|e| SortError::NameSource(e.to_string()))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| SortError::NameSource(format!("cannot start {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            writeln!(stdin, "{}\n{}", prompt, payload)
                .map_err(|e| SortError::NameSource(e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| SortError::NameSource(e.to_string()))?;
        if !output.status.success() {
            return Err(SortError::NameSource(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(raw.trim()).map_err(|e| {
            SortError::NameSource(format!("could not parse response: {}. Raw output: {}", e, raw))
        })
    }
}

/// Renames files in place using names from a [`NameSource`].
pub struct RenameSorter<S: NameSource> {
    source: S,
    prompt: String,
}

impl<S: NameSource> RenameSorter<S> {
    pub fn new(source: S, prompt: impl Into<String>) -> Self {
        Self {
            source,
            prompt: prompt.into(),
        }
    }
}

impl<S: NameSource> Sorter for RenameSorter<S> {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn decide(&self, entries: &[FileEntry]) -> Result<Vec<Operation>, SortError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let names: Vec<String> = entries.iter().map(FileEntry::file_name).collect();
        let proposed = self.source.propose(&self.prompt, &names)?;
        if proposed.len() != names.len() {
            return Err(SortError::Integrity {
                sent: names.len(),
                received: proposed.len(),
            });
        }

        let mut taken: HashMap<PathBuf, HashSet<String>> = HashMap::new();
        let mut operations = Vec::with_capacity(entries.len());

        for ((entry, original), proposal) in entries.iter().zip(&names).zip(proposed) {
            let proposal = proposal.trim();
            let wanted = if proposal.is_empty() {
                original.as_str()
            } else {
                proposal
            };
            if !is_plain_file_name(wanted) {
                return Err(SortError::InvalidName(wanted.to_string()));
            }

            let dir = entry.parent_dir().to_path_buf();
            let name = unique_name(wanted, taken.entry(dir.clone()).or_default());
            let destination = dir.join(name);

            operations.push(Operation::move_to(entry.clone(), destination));
        }

        Ok(operations)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let path = Path::new(name);
    name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && path.file_name().is_some_and(|n| n == name)
}

/// Returns `name`, or `name` with `_v1`, `_v2`, … inserted before the
/// extension if it is already in `taken`. The result is added to `taken`.
pub fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = format!("{}_v{}{}", stem, counter, ext);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}
