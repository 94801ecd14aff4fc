//! Changelog: mail per-project change digests to their subscribers.
//!
//! For every selected project the git log over a revision range is collected,
//! folded into the digest of each recipient subscribed to that project (or to
//! `all`), and each digest is mailed as one HTML message. The number of
//! addresses that could not be reached is the run's outcome.
//!
//! # Architecture
//!
//! - **Subscriptions**: invert the subscribers list into a project index
//! - **Collect**: run the change query for each project
//! - **Digest**: fold change blocks into per-recipient digests
//! - **Dispatch**: mail the digests and count failures
//! - **Run**: tie the above together for one invocation

pub mod collect;
pub mod config;
pub mod digest;
pub mod dispatch;
pub mod git;
pub mod run;
pub mod subscriptions;
pub mod transport;

pub use collect::{ChangeOutcome, collect, collect_all};
pub use config::{Config, ProjectDescriptor, select_projects};
pub use digest::{DigestAggregator, Digests, RecipientDigest};
pub use dispatch::{Delivery, DispatchReport, dispatch};
pub use git::{ChangeQuery, GitLog, QueryOutput};
pub use run::{NoSubscribers, RunConfig, RunSummary, run};
pub use subscriptions::{SubscriptionIndex, WILDCARD};
pub use transport::{Message, Sendmail, Transport};
