use clap::{Args, Parser, Subcommand};
use dirsort::cli::{Command, ConfigAction, RunOptions, Strategy, run_cli};
use dirsort::history::TransactionLog;
use dirsort::output::OutputFormatter;
use dirsort::planner::WalkOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "dirsort", version, about)]
struct Cli {
    /// Show what would happen without touching any file
    #[arg(long, global = true)]
    dry_run: bool,

    /// Apply the plan without asking for confirmation
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Only look this many folders deep. Depth counts the folders between the
    /// directory and a file, so 0 means only files directly inside it
    #[arg(long, global = true)]
    depth: Option<usize>,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(Args)]
struct Target {
    /// Directory to operate on
    #[arg(default_value = ".")]
    dir: PathBuf,
}

#[derive(Subcommand)]
enum SubCommand {
    /// Sort files into folders using keyword rules
    Sort {
        #[command(flatten)]
        target: Target,
        /// Rules file to use instead of the local or global one
        #[arg(long)]
        config: Option<PathBuf>,
        /// One-off rules, e.g. "Finance = invoice, bill"
        #[arg(long, conflicts_with = "config")]
        inline: Option<String>,
    },
    /// Sort files into folders by file type
    Ext {
        #[command(flatten)]
        target: Target,
    },
    /// Move byte-identical copies into a duplicates folder
    Duplicates {
        #[command(flatten)]
        target: Target,
        /// Delete the copies instead. This cannot be undone
        #[arg(long)]
        nuke: bool,
    },
    /// Rename files using names produced by an external program
    Rename {
        #[command(flatten)]
        target: Target,
        /// Program that reads the prompt and a JSON array on stdin
        #[arg(long)]
        command: String,
        /// Arguments passed to the program
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Revert the last operation in a directory
    Undo {
        #[command(flatten)]
        target: Target,
    },
    /// List recorded operations
    History,
    /// Show the biggest files in a directory
    Largest {
        #[command(flatten)]
        target: Target,
        /// Number of files to list
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Manage keyword rules
    Config {
        /// Directory whose local rules take precedence
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Rules file to edit instead of the local or global one
        #[arg(long)]
        file: Option<PathBuf>,
        #[command(subcommand)]
        action: ConfigSubCommand,
    },
    /// Create a local .dirsort folder seeded from the global settings
    Init {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Subcommand)]
enum ConfigSubCommand {
    /// Append a rule: FOLDER KEYWORD...
    Add {
        folder: String,
        #[arg(required = true)]
        keywords: Vec<String>,
    },
    /// Remove the rule and blacklist entry for a folder
    Remove { folder: String },
    /// Print the active rules
    List,
    /// Print the path of the active rules file
    Path,
}

fn absolute(dir: &Path) -> PathBuf {
    dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("DIRSORT_LOG", "warn")).init();

    let cli = Cli::parse();
    let walk = WalkOptions::with_max_depth(cli.depth);
    let options = RunOptions {
        dry_run: cli.dry_run,
        walk,
    };
    let sort = |target: Target, strategy: Strategy| Command::Sort {
        root: absolute(&target.dir),
        strategy,
        options,
        assume_yes: cli.yes,
    };

    let command = match cli.command {
        SubCommand::Sort {
            target,
            config,
            inline,
        } => sort(target, Strategy::Config { path: config, inline }),
        SubCommand::Ext { target } => sort(target, Strategy::Extension),
        SubCommand::Duplicates { target, nuke } => sort(target, Strategy::Duplicates { nuke }),
        SubCommand::Rename {
            target,
            command,
            args,
        } => sort(
            target,
            Strategy::Rename {
                program: command,
                args,
            },
        ),
        SubCommand::Undo { target } => Command::Undo {
            root: absolute(&target.dir),
        },
        SubCommand::History => Command::History,
        SubCommand::Largest { target, count } => Command::Largest {
            root: absolute(&target.dir),
            count,
            walk,
        },
        SubCommand::Config { dir, file, action } => Command::Config {
            root: absolute(&dir),
            path: file,
            action: match action {
                ConfigSubCommand::Add { folder, keywords } => ConfigAction::Add { folder, keywords },
                ConfigSubCommand::Remove { folder } => ConfigAction::Remove { folder },
                ConfigSubCommand::List => ConfigAction::List,
                ConfigSubCommand::Path => ConfigAction::Path,
            },
        },
        SubCommand::Init { target } => Command::Init {
            root: absolute(&target.dir),
        },
    };

    let log = match TransactionLog::default_location() {
        Ok(log) => log,
        Err(e) => {
            OutputFormatter::error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    match run_cli(command, &log) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
