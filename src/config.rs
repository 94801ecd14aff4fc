//! Tool configuration and project selection.
//!
//! The configuration is a TOML file describing where mail comes from, how
//! change links are built, and which projects exist:
//!
//! ```toml
//! from = "changelog@domain.com"
//! subject = "Android changes for {revisions}"
//! link_base = "https://android.googlesource.com"
//! root = "/src/aosp"
//!
//! [[project]]
//! name = "platform/bootable/recovery"
//! path = "bootable/recovery"
//! ```

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;

pub const DEFAULT_LINK_BASE: &str = "https://android.googlesource.com";

/// Settings read from the configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sender address for digest mails
    pub from: String,

    /// Subject line; `{revisions}` is replaced by the revision range
    pub subject: String,

    /// Base URL for project and commit links
    pub link_base: String,

    /// Mail submission command; the recipient is appended after `--`
    pub sendmail: Vec<String>,

    /// Number of projects queried concurrently
    pub jobs: usize,

    /// Directory project paths are relative to
    pub root: PathBuf,

    /// Known projects, in the order they are reported
    #[serde(rename = "project")]
    pub projects: Vec<ProjectEntry>,
}

/// A project as declared in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectEntry {
    /// Remote name, used in links
    pub name: String,

    /// Checkout path, used for display and subscription matching
    pub path: String,
}

/// A project selected for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    pub name: String,
    pub path: String,
    pub worktree: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            from: "changelog@localhost".to_string(),
            subject: "Changes for {revisions}".to_string(),
            link_base: DEFAULT_LINK_BASE.to_string(),
            sendmail: vec!["sendmail".to_string(), "-oi".to_string()],
            jobs: 4,
            root: PathBuf::from("."),
            projects: Vec::new(),
        }
    }
}

impl Config {
    /// Parse a configuration from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|e| Error::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Load a configuration file, falling back to defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, Error> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// The subject line for a run over `revisions`.
    pub fn subject_for(&self, revisions: &str) -> String {
        self.subject.replace("{revisions}", revisions)
    }

    fn descriptor(&self, entry: &ProjectEntry) -> ProjectDescriptor {
        ProjectDescriptor {
            name: entry.name.clone(),
            path: entry.path.clone(),
            worktree: self.root.join(&entry.path),
        }
    }
}

/// Pick the projects to report on.
///
/// With no arguments every configured project is used. Otherwise each
/// argument names a project by name or path; with `regex` each argument is a
/// pattern matched against both. The result keeps a stable order: argument
/// order for literal names, configuration order for patterns.
pub fn select_projects(
    config: &Config,
    args: &[String],
    regex: bool,
) -> Result<Vec<ProjectDescriptor>, Error> {
    if args.is_empty() {
        return Ok(config.projects.iter().map(|p| config.descriptor(p)).collect());
    }

    if regex {
        let patterns = args
            .iter()
            .map(|arg| {
                Regex::new(arg).map_err(|e| Error::InvalidPattern {
                    pattern: arg.clone(),
                    source: e,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        return Ok(config
            .projects
            .iter()
            .filter(|p| {
                patterns
                    .iter()
                    .any(|re| re.is_match(&p.name) || re.is_match(&p.path))
            })
            .map(|p| config.descriptor(p))
            .collect());
    }

    let mut selected: Vec<ProjectDescriptor> = Vec::new();
    for arg in args {
        let wanted = arg.trim_end_matches('/');
        let entry = config
            .projects
            .iter()
            .find(|p| p.name == wanted || p.path == wanted)
            .ok_or_else(|| Error::UnknownProject(arg.clone()))?;
        let descriptor = config.descriptor(entry);
        if !selected.contains(&descriptor) {
            selected.push(descriptor);
        }
    }
    Ok(selected)
}

/// Errors from loading configuration or selecting projects.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config file '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}'")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("project '{0}' not found")]
    UnknownProject(String),

    #[error("invalid project pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
