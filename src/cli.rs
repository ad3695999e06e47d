//! Command orchestration for dirsort.
//!
//! Wires the library pieces into the user-facing pipeline:
//! plan, review, execute, journal, clean up. `main.rs` only parses arguments
//! into a [`Command`] and hands it to [`run_cli`].

use crate::cleanup::{self, CleanupError};
use crate::config::{self, ConfigError, ConfigModel, ParseOptions, PROMPT_FILE_NAME};
use crate::duplicates::DuplicateFinder;
use crate::executor::{Executor, SortResult};
use crate::history::{self, HistoryError, Transaction, TransactionKind, TransactionLog, UndoReport};
use crate::operation::{Operation, OperationKind};
use crate::output::{OutputFormatter, operation_line};
use crate::planner::{self, PlanError, WalkOptions};
use crate::sorter::{
    CommandNameSource, ConfigSorter, ExtensionSorter, RenameSorter, SortError, Sorter,
};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prompt sent to the rename program when no prompt file exists.
pub const DEFAULT_PROMPT: &str = "You will receive a JSON array of file names. \
Reply with a JSON array of the same length containing a clearer, consistent \
name for each file. Keep every file extension unchanged.";

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Sort(#[from] SortError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Cleanup(#[from] CleanupError),
    #[error("failed to read confirmation: {0}")]
    Input(#[from] io::Error),
    #[error("aborted, no files were changed")]
    Aborted,
    #[error("{0} operations failed")]
    OperationsFailed(usize),
}

/// Lets the user approve or trim a plan before it is executed.
pub trait Review {
    /// Returns the operations to execute, or [`CliError::Aborted`].
    fn review(&mut self, operations: Vec<Operation>) -> Result<Vec<Operation>, CliError>;
}

/// Approves every plan unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl Review for AcceptAll {
    fn review(&mut self, operations: Vec<Operation>) -> Result<Vec<Operation>, CliError> {
        Ok(operations)
    }
}

/// A `[y/N]` gate read from `input`.
pub struct ConfirmPrompt<R> {
    input: R,
}

impl<R: BufRead> ConfirmPrompt<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl ConfirmPrompt<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> Review for ConfirmPrompt<R> {
    fn review(&mut self, operations: Vec<Operation>) -> Result<Vec<Operation>, CliError> {
        let pending = operations.iter().filter(|op| !op.is_skip()).count();
        print!("Apply {} operations? [y/N] ", pending);
        io::stdout().flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => Ok(operations),
            _ => Err(CliError::Aborted),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub walk: WalkOptions,
}

/// Which sorter a `sort` command runs.
#[derive(Debug, Clone)]
pub enum Strategy {
    Extension,
    Config {
        path: Option<PathBuf>,
        inline: Option<String>,
    },
    Duplicates {
        nuke: bool,
    },
    Rename {
        program: String,
        args: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub enum ConfigAction {
    Add { folder: String, keywords: Vec<String> },
    Remove { folder: String },
    List,
    Path,
}

#[derive(Debug, Clone)]
pub enum Command {
    Sort {
        root: PathBuf,
        strategy: Strategy,
        options: RunOptions,
        assume_yes: bool,
    },
    Undo {
        root: PathBuf,
    },
    History,
    Largest {
        root: PathBuf,
        count: usize,
        walk: WalkOptions,
    },
    Config {
        root: PathBuf,
        path: Option<PathBuf>,
        action: ConfigAction,
    },
    Init {
        root: PathBuf,
    },
}

/// Runs one command against the journal at `log`.
///
/// # Examples
///
/// ```no_run
/// use dirsort::cli::{Command, RunOptions, Strategy, run_cli};
/// use dirsort::history::TransactionLog;
///
/// let command = Command::Sort {
///     root: "/home/user/Downloads".into(),
///     strategy: Strategy::Extension,
///     options: RunOptions { dry_run: true, ..Default::default() },
///     assume_yes: false,
/// };
/// let log = TransactionLog::default_location().unwrap();
/// if let Err(e) = run_cli(command, &log) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(command: Command, log: &TransactionLog) -> Result<(), CliError> {
    match command {
        Command::Sort {
            root,
            strategy,
            options,
            assume_yes,
        } => {
            let sorter = build_sorter(&root, strategy)?;
            let result = if assume_yes || options.dry_run {
                run_sort(&root, sorter.as_ref(), &mut AcceptAll, &options, log)?
            } else {
                run_sort(&root, sorter.as_ref(), &mut ConfirmPrompt::stdin(), &options, log)?
            };
            if result.is_success() {
                Ok(())
            } else {
                Err(CliError::OperationsFailed(result.errors.len()))
            }
        }
        Command::Undo { root } => {
            let report = run_undo(&root, log)?;
            if report.is_complete_success() {
                Ok(())
            } else {
                Err(CliError::OperationsFailed(report.failed.len()))
            }
        }
        Command::History => show_history(log),
        Command::Largest { root, count, walk } => show_largest(&root, count, &walk),
        Command::Config { root, path, action } => run_config(&root, path.as_deref(), action),
        Command::Init { root } => {
            let local = config::init_local(&root, &config::app_dir()?)?;
            OutputFormatter::success(&format!("Initialized {}", local.display()));
            Ok(())
        }
    }
}

/// Instantiates the sorter for `strategy`, loading rules or prompts for `root`.
pub fn build_sorter(root: &Path, strategy: Strategy) -> Result<Box<dyn Sorter>, CliError> {
    let sorter: Box<dyn Sorter> = match strategy {
        Strategy::Extension => Box::new(ExtensionSorter::new()),
        Strategy::Config {
            inline: Some(expression),
            ..
        } => Box::new(ConfigSorter::new(ConfigModel::from_inline(&expression)?)),
        Strategy::Config { path, inline: None } => {
            let path = config::resolve_config_path(root, path.as_deref())?;
            log::info!("using rules from {}", path.display());
            Box::new(ConfigSorter::new(ConfigModel::load(
                &path,
                &ParseOptions::default(),
            )?))
        }
        Strategy::Duplicates { nuke: false } => Box::new(DuplicateFinder::new()),
        Strategy::Duplicates { nuke: true } => Box::new(DuplicateFinder::nuking()),
        Strategy::Rename { program, args } => Box::new(RenameSorter::new(
            CommandNameSource::new(program, args),
            load_prompt(root)?,
        )),
    };
    Ok(sorter)
}

/// Plans, reviews, executes and journals one batch, then sweeps empty folders.
pub fn run_sort(
    root: &Path,
    sorter: &dyn Sorter,
    review: &mut dyn Review,
    options: &RunOptions,
    log: &TransactionLog,
) -> Result<SortResult, CliError> {
    if options.dry_run {
        OutputFormatter::dry_run_notice(&format!("Analyzing {}", root.display()));
    } else {
        OutputFormatter::info(&format!("Sorting {} by {}", root.display(), sorter.name()));
    }

    let operations = planner::plan(root, sorter, &options.walk)?;
    if operations.iter().all(Operation::is_skip) {
        OutputFormatter::success("Nothing to do.");
        return Ok(SortResult {
            skipped: operations.len(),
            ..SortResult::default()
        });
    }

    OutputFormatter::plan_summary(root, &operations);
    if !options.dry_run && operations.iter().any(|op| op.kind == OperationKind::Delete) {
        OutputFormatter::warning("Deleted files are not journaled and cannot be undone.");
    }
    let operations = review.review(operations)?;

    let mut executor = Executor::new(options.dry_run, sorter.blacklist().to_vec());
    let pb = OutputFormatter::create_progress_bar(operations.len() as u64);
    let result = executor.execute_all(&operations, |op, outcome| {
        if !op.is_skip() {
            pb.println(operation_line(op, outcome));
        }
        pb.inc(1);
    });
    pb.finish_and_clear();

    if !options.dry_run {
        let applied = executor.into_applied();
        if !applied.is_empty() {
            log.record(&Transaction::new(TransactionKind::Action, applied))?;
        }
        let removed = cleanup::clean_empty_dirs(root)?;
        log::debug!("cleanup removed {} directories", removed);
    }

    OutputFormatter::result_summary(&result, options.dry_run);
    Ok(result)
}

/// Reverts the last batch applied to `root`, then sweeps the folders it created.
pub fn run_undo(root: &Path, log: &TransactionLog) -> Result<UndoReport, CliError> {
    OutputFormatter::info(&format!("Undoing last operation in {}", root.display()));
    let report = history::undo(log, root)?;
    cleanup::clean_empty_dirs(root)?;
    OutputFormatter::undo_report(&report);
    Ok(report)
}

pub fn show_history(log: &TransactionLog) -> Result<(), CliError> {
    OutputFormatter::history_table(&log.list()?);
    Ok(())
}

pub fn show_largest(root: &Path, count: usize, walk: &WalkOptions) -> Result<(), CliError> {
    let entries = planner::largest_files(root, count, walk)?;
    OutputFormatter::largest_files(root, &entries);
    Ok(())
}

fn run_config(root: &Path, explicit: Option<&Path>, action: ConfigAction) -> Result<(), CliError> {
    let path = config::resolve_config_path(root, explicit)?;
    match action {
        ConfigAction::Add { folder, keywords } => {
            let line = config::add_rule(&path, &folder, &keywords)?;
            OutputFormatter::success(&format!("Added '{}' to {}", line, path.display()));
        }
        ConfigAction::Remove { folder } => {
            config::remove_rule(&path, &folder)?;
            OutputFormatter::success(&format!("Removed '{}' from {}", folder, path.display()));
        }
        ConfigAction::List => {
            let model = ConfigModel::load(&path, &ParseOptions::default())?;
            OutputFormatter::header(&path.display().to_string());
            for line in model.describe() {
                OutputFormatter::plain(&line);
            }
        }
        ConfigAction::Path => OutputFormatter::plain(&path.display().to_string()),
    }
    Ok(())
}

/// Rename prompt for `root`: the local prompt file, then the global one,
/// then [`DEFAULT_PROMPT`].
pub fn load_prompt(root: &Path) -> Result<String, CliError> {
    let mut candidates = vec![root.join(config::APP_DIR_NAME).join(PROMPT_FILE_NAME)];
    match config::app_dir() {
        Ok(dir) => candidates.push(dir.join(PROMPT_FILE_NAME)),
        Err(e) => log::debug!("skipping global prompt: {}", e),
    }

    for candidate in candidates {
        if candidate.is_file() {
            let prompt = fs::read_to_string(&candidate).map_err(|e| ConfigError::Io {
                path: candidate.clone(),
                source: e,
            })?;
            if !prompt.trim().is_empty() {
                return Ok(prompt.trim().to_string());
            }
        }
    }
    Ok(DEFAULT_PROMPT.to_string())
}
