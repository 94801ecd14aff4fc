//! Per-recipient digests.
//!
//! Each project with changes is folded into the digest of every recipient
//! subscribed to it, directly or through the wildcard. Entries keep the
//! order in which projects were folded.

use std::collections::BTreeMap;

use crate::collect::ChangeOutcome;
use crate::config::ProjectDescriptor;
use crate::subscriptions::SubscriptionIndex;

/// One project's section of a digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub header: String,
    pub block: String,
}

/// The changes destined for one recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientDigest {
    entries: Vec<DigestEntry>,
}

impl RecipientDigest {
    pub fn entries(&self) -> &[DigestEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the digest as an HTML message body.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|entry| format!("{}</br>\n{}</br>\n", entry.header, entry.block))
            .collect()
    }
}

/// All digests of a run, keyed by recipient.
pub type Digests = BTreeMap<String, RecipientDigest>;

/// Builds the section header for a project.
pub fn project_header(project: &ProjectDescriptor, link_base: &str) -> String {
    format!(
        "<h2>Project: <a href='{}/{}'>{}</a></h2>",
        link_base.trim_end_matches('/'),
        project.name,
        project.path
    )
}

/// Accumulates digests across a run.
pub struct DigestAggregator<'a> {
    index: &'a SubscriptionIndex,
    link_base: String,
    digests: Digests,
}

impl<'a> DigestAggregator<'a> {
    pub fn new(index: &'a SubscriptionIndex, link_base: impl Into<String>) -> Self {
        Self {
            index,
            link_base: link_base.into(),
            digests: Digests::new(),
        }
    }

    /// Fold one project's outcome into the subscribed recipients' digests.
    ///
    /// Failed and empty outcomes are ignored. Returns how many digests grew.
    pub fn fold(&mut self, project: &ProjectDescriptor, outcome: &ChangeOutcome) -> usize {
        let Some(block) = outcome.block() else {
            return 0;
        };

        let recipients = self.index.recipients_for(&project.path);
        if recipients.is_empty() {
            tracing::debug!(project = %project.path, "no subscribers");
            return 0;
        }

        let header = project_header(project, &self.link_base);
        for recipient in &recipients {
            self.digests
                .entry(recipient.to_string())
                .or_default()
                .entries
                .push(DigestEntry {
                    header: header.clone(),
                    block: block.to_string(),
                });
        }

        recipients.len()
    }

    pub fn digests(&self) -> &Digests {
        &self.digests
    }

    pub fn finish(self) -> Digests {
        self.digests
    }
}
