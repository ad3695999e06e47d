//! Folder-routing rules and their line-oriented configuration file.
//!
//! Each non-comment line of the file is either a blacklist entry or a rule:
//!
//! ```text
//! // comments start with the configured marker
//! !Archive
//! Finance = invoice, bill, regex(^receipt_\d+)
//! Others = *
//! ```
//!
//! Rules are compiled once into [`ConfigModel`]; regex keywords are validated
//! at load time so a bad pattern never surfaces while files are being sorted.

use regex::Regex;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-installation and per-directory settings folder.
pub const APP_DIR_NAME: &str = ".dirsort";
/// File name of the rules file inside [`APP_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config";
/// File name of the rename prompt template inside [`APP_DIR_NAME`].
pub const PROMPT_FILE_NAME: &str = "prompt";

const DEFAULT_COMMENT_MARKER: &str = "//";

const CONFIG_TEMPLATE: &str = "// Config file for dirsort
//
// Each line defines where matching files are moved.
// Format: folderName = keyword1, keyword2, regex(pattern)
//
// - keywords are matched as substrings of the file name
// - regex(pattern) matches when the pattern is found anywhere in the name;
//   anchor it with ^ and $ to match the whole name
// - * matches every file that no other keyword matched
// - !folderName protects files inside folderName from being moved
// - lines starting with // are ignored
//
// Example:
// Finance = invoice, bill, regex(^receipt_[0-9]+)
// Music = track, song
// Study = notes, book
// !Archive
// Others = *
";

/// Errors raised while loading or editing rule configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot determine home directory")]
    MissingHomeDir,
    #[error("config file created at {}, please add rules to it", .0.display())]
    TemplateCreated(PathBuf),
    #[error("no rules found in {}", .0.display())]
    NoRules(PathBuf),
    #[error("malformed config line {line}: '{content}'")]
    MalformedLine { line: usize, content: String },
    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    #[error("no rule found for folder: {0}")]
    RuleNotFound(String),
    #[error("directory already initialized: {}", .0.display())]
    AlreadyInitialized(PathBuf),
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A single keyword of a rule, resolved once when the config is loaded.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Matches when the file name contains the text.
    Literal(String),
    /// Matches when the pattern is found anywhere in the file name.
    Regex(Regex),
    /// `*`: fallback for names no explicit keyword matched.
    Wildcard,
}

impl Matcher {
    /// Parses one trimmed keyword.
    pub fn parse(keyword: &str) -> Result<Self, ConfigError> {
        if keyword == "*" {
            return Ok(Self::Wildcard);
        }
        if let Some(pattern) = keyword
            .strip_prefix("regex(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Regex::new(pattern)
                .map(Self::Regex)
                .map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                });
        }
        Ok(Self::Literal(keyword.to_string()))
    }

    /// Whether this matcher explicitly matches `filename`. Wildcards never do.
    pub fn is_match(&self, filename: &str) -> bool {
        match self {
            Self::Literal(text) => filename.contains(text.as_str()),
            Self::Regex(regex) => regex.is_match(filename),
            Self::Wildcard => false,
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => write!(f, "{}", text),
            Self::Regex(regex) => write!(f, "regex({})", regex.as_str()),
            Self::Wildcard => write!(f, "*"),
        }
    }
}

/// A target folder and the keywords routing files into it.
#[derive(Debug, Clone)]
pub struct Rule {
    pub folder: String,
    pub matchers: Vec<Matcher>,
}

/// Options controlling how config text is parsed.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub comment_marker: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            comment_marker: DEFAULT_COMMENT_MARKER.to_string(),
        }
    }
}

/// The loaded rule set. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct ConfigModel {
    pub rules: Vec<Rule>,
    pub blacklist: Vec<String>,
}

impl ConfigModel {
    /// Loads the rules file at `path`.
    ///
    /// A missing file is replaced by a documented template and reported as
    /// [`ConfigError::TemplateCreated`]; a file without rules is
    /// [`ConfigError::NoRules`].
    pub fn load(path: &Path, options: &ParseOptions) -> Result<Self, ConfigError> {
        if !path.exists() {
            write_template(path)?;
            return Err(ConfigError::TemplateCreated(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let model = Self::parse_str(&content, options)?;
        if model.rules.is_empty() {
            return Err(ConfigError::NoRules(path.to_path_buf()));
        }
        log::debug!(
            "loaded {} rules and {} blacklist entries from {}",
            model.rules.len(),
            model.blacklist.len(),
            path.display()
        );
        Ok(model)
    }

    /// Parses config text. Does not require any rules to be present.
    pub fn parse_str(content: &str, options: &ParseOptions) -> Result<Self, ConfigError> {
        let mut model = Self::default();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(options.comment_marker.as_str()) {
                continue;
            }

            if let Some(name) = line.strip_prefix('!') {
                let name = name.trim();
                if name.is_empty() {
                    return Err(ConfigError::MalformedLine {
                        line: index + 1,
                        content: raw.to_string(),
                    });
                }
                model.blacklist.push(name.to_string());
                continue;
            }

            let rule = parse_rule(line).map_err(|e| match e {
                ConfigError::MalformedLine { .. } => ConfigError::MalformedLine {
                    line: index + 1,
                    content: raw.to_string(),
                },
                other => other,
            })?;
            model.rules.push(rule);
        }

        Ok(model)
    }

    /// Builds a one-rule model from a `folder = keywords` expression.
    pub fn from_inline(expression: &str) -> Result<Self, ConfigError> {
        let rule = parse_rule(expression.trim())?;
        Ok(Self {
            rules: vec![rule],
            blacklist: Vec::new(),
        })
    }

    /// Returns the folder `filename` belongs to, or `None` to leave it alone.
    ///
    /// The first explicit match in declaration order wins. The first wildcard
    /// rule only applies when nothing else matched.
    pub fn categorize(&self, filename: &str) -> Option<&str> {
        let mut fallback: Option<&str> = None;

        for rule in &self.rules {
            for matcher in &rule.matchers {
                if matches!(matcher, Matcher::Wildcard) {
                    fallback.get_or_insert(rule.folder.as_str());
                    continue;
                }
                if matcher.is_match(filename) {
                    return Some(rule.folder.as_str());
                }
            }
        }

        fallback
    }

    /// Renders the rule set back into `folder = matchers` lines followed by
    /// the blacklist.
    pub fn describe(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .rules
            .iter()
            .map(|rule| {
                let matchers: Vec<String> = rule.matchers.iter().map(|m| m.to_string()).collect();
                format!("{} = {}", rule.folder, matchers.join(", "))
            })
            .collect();
        lines.extend(self.blacklist.iter().map(|name| format!("!{}", name)));
        lines
    }
}

fn parse_rule(line: &str) -> Result<Rule, ConfigError> {
    let malformed = || ConfigError::MalformedLine {
        line: 1,
        content: line.to_string(),
    };

    let (folder, keywords) = line.split_once('=').ok_or_else(malformed)?;
    let folder = folder.trim();
    if folder.is_empty() {
        return Err(malformed());
    }

    let matchers = split_keywords(keywords)
        .into_iter()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(Matcher::parse)
        .collect::<Result<Vec<_>, _>>()?;
    if matchers.is_empty() {
        return Err(malformed());
    }

    Ok(Rule {
        folder: folder.to_string(),
        matchers,
    })
}

/// Splits on commas outside parentheses so `regex(a{1,3})` stays whole.
fn split_keywords(keywords: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in keywords.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&keywords[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&keywords[start..]);
    parts
}

fn write_template(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
    }
    fs::write(path, CONFIG_TEMPLATE).map_err(|e| ConfigError::io(path, e))?;
    log::info!("created config template at {}", path.display());
    Ok(())
}

/// `~/.dirsort`.
pub fn app_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(APP_DIR_NAME))
        .ok_or(ConfigError::MissingHomeDir)
}

/// Picks the rules file for a run on `root`.
///
/// An explicit path wins, then `<root>/.dirsort/config`, then the global
/// `~/.dirsort/config`.
pub fn resolve_config_path(root: &Path, explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let local = root.join(APP_DIR_NAME).join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Ok(local);
    }

    Ok(app_dir()?.join(CONFIG_FILE_NAME))
}

/// Appends `folder = k1, k2` to the rules file, creating it if needed.
pub fn add_rule(path: &Path, folder: &str, keywords: &[String]) -> Result<String, ConfigError> {
    let keywords: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    let line = format!("{} = {}", folder.trim(), keywords.join(", "));
    // Validate before touching the file.
    parse_rule(&line)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ConfigError::io(path, e))?;
    writeln!(file, "{}", line).map_err(|e| ConfigError::io(path, e))?;
    Ok(line)
}

/// Removes the rule and blacklist lines for `folder`.
pub fn remove_rule(path: &Path, folder: &str) -> Result<(), ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    let folder = folder.trim();

    let mut found = false;
    let kept: Vec<&str> = content
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            let is_rule = trimmed
                .split_once('=')
                .is_some_and(|(name, _)| name.trim() == folder);
            let is_blacklist = trimmed
                .strip_prefix('!')
                .is_some_and(|name| name.trim() == folder);
            if is_rule || is_blacklist {
                found = true;
                return false;
            }
            true
        })
        .collect();

    if !found {
        return Err(ConfigError::RuleNotFound(folder.to_string()));
    }

    let mut output = kept.join("\n");
    output.push('\n');
    fs::write(path, output).map_err(|e| ConfigError::io(path, e))
}

/// Creates `<root>/.dirsort/` seeded from the files in `global_dir`.
///
/// Files missing from `global_dir` are skipped, except the config which
/// falls back to the template.
pub fn init_local(root: &Path, global_dir: &Path) -> Result<PathBuf, ConfigError> {
    let local_dir = root.join(APP_DIR_NAME);
    if local_dir.exists() {
        return Err(ConfigError::AlreadyInitialized(local_dir));
    }
    fs::create_dir(&local_dir).map_err(|e| ConfigError::io(&local_dir, e))?;

    let global_config = global_dir.join(CONFIG_FILE_NAME);
    let local_config = local_dir.join(CONFIG_FILE_NAME);
    if global_config.is_file() {
        fs::copy(&global_config, &local_config).map_err(|e| ConfigError::io(&global_config, e))?;
    } else {
        write_template(&local_config)?;
    }

    let global_prompt = global_dir.join(PROMPT_FILE_NAME);
    if global_prompt.is_file() {
        let local_prompt = local_dir.join(PROMPT_FILE_NAME);
        fs::copy(&global_prompt, &local_prompt).map_err(|e| ConfigError::io(&global_prompt, e))?;
    }

    Ok(local_dir)
}
