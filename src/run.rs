//! Drive one changelog run: collect, aggregate, dispatch.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crossterm::style::Stylize;

use crate::collect::{ChangeOutcome, collect_all};
use crate::config::ProjectDescriptor;
use crate::digest::{DigestAggregator, project_header};
use crate::dispatch::{DispatchReport, dispatch};
use crate::git::ChangeQuery;
use crate::subscriptions::{self, SubscriptionIndex};
use crate::transport::Transport;

/// What to do when no subscribers list is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoSubscribers {
    /// Print every project's changes to stdout
    #[default]
    Print,

    /// Do nothing with the collected changes
    Skip,
}

/// Settings for a single run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Revision range handed to the change query
    pub revisions: String,

    /// Subscribers list; `None` means nobody gets mail
    pub subscribers: Option<PathBuf>,

    pub no_subscribers: NoSubscribers,

    pub from: String,
    pub subject: String,
    pub link_base: String,

    /// Concurrent change queries
    pub jobs: usize,
}

/// What a run did.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Projects with non-empty changes
    pub changed_projects: usize,

    /// Projects whose change query failed
    pub failed_projects: usize,

    pub dispatch: DispatchReport,
}

impl RunSummary {
    /// Failed mail addresses; the run's exit signal.
    pub fn failures(&self) -> usize {
        self.dispatch.failures()
    }
}

/// Run the changelog over `projects`.
///
/// The only fatal error is an unusable subscribers list. Query and delivery
/// failures are reported and counted.
pub async fn run(
    config: &RunConfig,
    projects: &[ProjectDescriptor],
    query: Arc<dyn ChangeQuery>,
    transport: Arc<dyn Transport>,
) -> Result<RunSummary, Error> {
    let index = config
        .subscribers
        .as_deref()
        .map(SubscriptionIndex::load)
        .transpose()?;

    tracing::info!(
        projects = projects.len(),
        revisions = %config.revisions,
        "collecting changes"
    );
    let outcomes = collect_all(projects, &config.revisions, query, config.jobs).await;

    let mut summary = RunSummary {
        changed_projects: outcomes.iter().filter(|o| o.block().is_some()).count(),
        failed_projects: outcomes.iter().filter(|o| o.is_failure()).count(),
        ..RunSummary::default()
    };

    // The changelog is echoed whenever it is mailed, and instead of mailing
    // unless told to skip
    if index.is_some() || config.no_subscribers == NoSubscribers::Print {
        let mut stdout = io::stdout().lock();
        if let Err(e) = write_changes(&mut stdout, projects, &outcomes, &config.link_base) {
            tracing::warn!("failed to print changelog: {e}");
        }
    }

    let Some(index) = index else {
        return Ok(summary);
    };

    let mut aggregator = DigestAggregator::new(&index, config.link_base.as_str());
    for (project, outcome) in projects.iter().zip(&outcomes) {
        aggregator.fold(project, outcome);
    }
    let digests = aggregator.finish();

    summary.dispatch = dispatch(&digests, &config.from, &config.subject, transport).await;
    Ok(summary)
}

/// Write every project that has changes: bold header, then its block.
fn write_changes(
    out: &mut impl Write,
    projects: &[ProjectDescriptor],
    outcomes: &[ChangeOutcome],
    link_base: &str,
) -> io::Result<()> {
    for (project, outcome) in projects.iter().zip(outcomes) {
        if let Some(block) = outcome.block() {
            writeln!(out, "{}", project_header(project, link_base).bold())?;
            writeln!(out, "{block}")?;
        }
    }
    out.flush()
}

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Subscriptions(#[from] subscriptions::Error),
}
