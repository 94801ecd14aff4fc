//! Per-project change collection.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::config::ProjectDescriptor;
use crate::git::ChangeQuery;

/// What a change query produced for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The query succeeded; `block` is the formatted history, possibly empty
    Changes { block: String, is_empty: bool },

    /// The query failed; `error` is its diagnostic output
    Failure { error: String },
}

impl ChangeOutcome {
    /// The change block, if this outcome contributes anything to digests.
    pub fn block(&self) -> Option<&str> {
        match self {
            ChangeOutcome::Changes {
                block,
                is_empty: false,
            } => Some(block),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ChangeOutcome::Failure { .. })
    }
}

/// Query one project and classify the result.
///
/// Failures are reported to diagnostics and returned; they never abort the run.
pub fn collect(
    project: &ProjectDescriptor,
    revisions: &str,
    query: &dyn ChangeQuery,
) -> ChangeOutcome {
    let outcome = match query.query(project, revisions) {
        Ok(output) if output.success() => {
            let is_empty = output.stdout.is_empty();
            ChangeOutcome::Changes {
                block: output.stdout,
                is_empty,
            }
        }
        Ok(output) => ChangeOutcome::Failure {
            error: output.stderr,
        },
        Err(e) => ChangeOutcome::Failure {
            error: e.to_string(),
        },
    };

    match &outcome {
        ChangeOutcome::Failure { error } => {
            tracing::warn!(project = %project.path, "{}", error.trim_end());
        }
        ChangeOutcome::Changes { is_empty: true, .. } => {
            tracing::debug!(project = %project.path, "no changes");
        }
        ChangeOutcome::Changes { .. } => {
            tracing::debug!(project = %project.path, "collected changes");
        }
    }

    outcome
}

/// Query every project with at most `jobs` queries in flight.
///
/// Outcomes come back in the same order as `projects`.
pub async fn collect_all(
    projects: &[ProjectDescriptor],
    revisions: &str,
    query: Arc<dyn ChangeQuery>,
    jobs: usize,
) -> Vec<ChangeOutcome> {
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));

    let handles = projects.iter().cloned().map(|project| {
        let semaphore = Arc::clone(&semaphore);
        let query = Arc::clone(&query);
        let revisions = revisions.to_string();
        tokio::spawn(async move {
            let permit = semaphore.acquire_owned().await.ok();
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                collect(&project, &revisions, query.as_ref())
            })
            .await
        })
    });

    join_all(handles)
        .await
        .into_iter()
        .zip(projects)
        .map(|(joined, project)| match joined {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) | Err(e) => {
                tracing::error!(project = %project.path, "change query task failed: {e}");
                ChangeOutcome::Failure {
                    error: format!("change query task failed: {e}"),
                }
            }
        })
        .collect()
}
