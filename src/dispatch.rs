//! Send each recipient their digest and count what failed.

use std::collections::BTreeSet;
use std::sync::Arc;

use crossterm::style::Stylize;
use futures::future::join_all;

use crate::digest::Digests;
use crate::transport::{Message, Transport};

/// What happened to one recipient's mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Accepted for every addressee
    Sent,

    /// The transport refused these addresses
    Rejected(BTreeSet<String>),

    /// Nothing could be submitted
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientReport {
    pub recipient: String,
    pub delivery: Delivery,
}

impl RecipientReport {
    /// Failed addresses for this submission; a transport error counts as one.
    pub fn failures(&self) -> usize {
        match &self.delivery {
            Delivery::Sent => 0,
            Delivery::Rejected(addresses) => addresses.len(),
            Delivery::Error(_) => 1,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failures() == 0
    }
}

/// Outcome of dispatching all digests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub recipients: Vec<RecipientReport>,
}

impl DispatchReport {
    /// Total failed addresses across all submissions.
    pub fn failures(&self) -> usize {
        self.recipients.iter().map(RecipientReport::failures).sum()
    }
}

/// Mail every non-empty digest through `transport`.
///
/// Submissions run concurrently; the report lists recipients in address order.
pub async fn dispatch(
    digests: &Digests,
    from: &str,
    subject: &str,
    transport: Arc<dyn Transport>,
) -> DispatchReport {
    let messages: Vec<Message> = digests
        .iter()
        .filter(|(_, digest)| !digest.is_empty())
        .map(|(recipient, digest)| Message {
            from: from.to_string(),
            to: recipient.clone(),
            subject: subject.to_string(),
            body: digest.render(),
        })
        .collect();

    let handles = messages.into_iter().map(|message| {
        let transport = Arc::clone(&transport);
        tokio::task::spawn_blocking(move || {
            let delivery = match transport.send(&message) {
                Ok(rejected) if rejected.is_empty() => Delivery::Sent,
                Ok(rejected) => Delivery::Rejected(rejected),
                Err(e) => Delivery::Error(e.to_string()),
            };
            RecipientReport {
                recipient: message.to,
                delivery,
            }
        })
    });

    let mut report = DispatchReport::default();
    let recipients = digests
        .iter()
        .filter(|(_, digest)| !digest.is_empty())
        .map(|(recipient, _)| recipient);

    for (joined, recipient) in join_all(handles).await.into_iter().zip(recipients) {
        let entry = joined.unwrap_or_else(|e| RecipientReport {
            recipient: recipient.clone(),
            delivery: Delivery::Error(format!("send task failed: {e}")),
        });

        match &entry.delivery {
            Delivery::Sent => {
                println!("Sending email to {} ... {}", entry.recipient, "OK".green());
            }
            Delivery::Rejected(addresses) => {
                println!("Sending email to {} ... {}", entry.recipient, "FAILED".red());
                tracing::warn!(recipient = %entry.recipient, ?addresses, "recipients refused");
            }
            Delivery::Error(message) => {
                println!("Sending email to {} ... {}", entry.recipient, "FAILED".red());
                tracing::warn!(recipient = %entry.recipient, "{message}");
            }
        }

        report.recipients.push(entry);
    }

    report
}
