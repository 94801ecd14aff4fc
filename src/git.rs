//! Git log queries.

use std::process::Command;

use crate::config::ProjectDescriptor;

/// Raw result of a change query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutput {
    /// Exit status; 0 means success
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl QueryOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Produces the formatted change history of one project.
///
/// An `Err` means the query could not be run at all; a query that ran and
/// failed is an `Ok` with a non-zero status.
pub trait ChangeQuery: Send + Sync {
    fn query(&self, project: &ProjectDescriptor, revisions: &str) -> Result<QueryOutput, Error>;
}

/// Runs `git log` in each project's worktree, one HTML list item per commit.
pub struct GitLog {
    link_base: String,
}

impl GitLog {
    pub fn new(link_base: impl Into<String>) -> Self {
        let link_base: String = link_base.into();
        Self {
            link_base: link_base.trim_end_matches('/').to_string(),
        }
    }

    /// The `git log` arguments used for `project`.
    pub fn args(&self, project: &ProjectDescriptor, revisions: &str) -> Vec<String> {
        let format = format!(
            "--pretty=format:<li><a href=\"{}/{}/+/%h\">%h : </a>%s</li>",
            self.link_base, project.name
        );
        vec![
            "log".to_string(),
            "--abbrev-commit".to_string(),
            "--no-merges".to_string(),
            format,
            revisions.to_string(),
        ]
    }
}

impl ChangeQuery for GitLog {
    fn query(&self, project: &ProjectDescriptor, revisions: &str) -> Result<QueryOutput, Error> {
        let output = Command::new("git")
            .args(self.args(project, revisions))
            .current_dir(&project.worktree)
            .output()
            .map_err(|e| Error::Exec(format!("git log in {}: {e}", project.worktree.display())))?;

        Ok(QueryOutput {
            // Killed by a signal: no code, still a failure
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Errors from git operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to execute: {0}")]
    Exec(String),
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn project() -> ProjectDescriptor {
        ProjectDescriptor {
            name: "platform/bootable/recovery".to_string(),
            path: "bootable/recovery".to_string(),
            worktree: PathBuf::from("bootable/recovery"),
        }
    }

    #[test]
    fn log_format_links_each_commit() {
        let git = GitLog::new("https://android.googlesource.com/");
        let args = git.args(&project(), "v1..v2");
        assert_eq!(
            args,
            [
                "log",
                "--abbrev-commit",
                "--no-merges",
                "--pretty=format:<li><a href=\"https://android.googlesource.com/platform/bootable/recovery/+/%h\">%h : </a>%s</li>",
                "v1..v2",
            ]
        );
    }

    #[test]
    fn missing_worktree_is_an_exec_error() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectDescriptor {
            worktree: dir.path().join("does/not/exist"),
            ..project()
        };
        let err = GitLog::new("https://x").query(&project, "HEAD").unwrap_err();
        assert!(matches!(err, Error::Exec(_)));
    }
}
