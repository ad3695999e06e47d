//! dirsort - sort, deduplicate and rename the files of a directory tree
//!
//! A run walks a root directory, lets a [`Sorter`] decide one [`Operation`]
//! per file, applies the plan with the [`Executor`], journals the applied
//! moves in a [`TransactionLog`] so they can be undone, and finally sweeps
//! folders left empty.

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod executor;
pub mod file_category;
pub mod history;
pub mod operation;
pub mod output;
pub mod planner;
pub mod sorter;

pub use cleanup::{CleanupError, clean_empty_dirs};
pub use config::{ConfigError, ConfigModel, Matcher, ParseOptions, Rule};
pub use duplicates::{Analysis, DuplicateFinder, HashStats};
pub use executor::{ExecuteError, Executor, Outcome, SortResult};
pub use file_category::{Category, FileMapper};
pub use history::{HistoryError, Transaction, TransactionKind, TransactionLog, UndoReport, undo};
pub use operation::{FileEntry, Operation, OperationKind};
pub use planner::{PlanError, WalkOptions, collect_entries, largest_files, plan};
pub use sorter::{
    CommandNameSource, ConfigSorter, ExtensionSorter, NameSource, RenameSorter, SortError, Sorter,
};

pub use cli::{Command, run_cli};
