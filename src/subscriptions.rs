//! Subscribers list: who wants to hear about which project.
//!
//! The list maps a recipient address to the projects they follow:
//!
//! ```json
//! {
//!     "user1@domain.com": ["bootable/recovery", "docs/source.android.com"],
//!     "user2@domain.com": ["all"]
//! }
//! ```
//!
//! It is inverted once at startup into a [`SubscriptionIndex`] keyed by
//! project. The reserved project `all` subscribes a recipient to everything.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Project identifier that matches every project.
pub const WILDCARD: &str = "all";

/// Recipient → projects, as written in the subscribers list.
pub type SubscriptionDeclaration = BTreeMap<String, Vec<String>>;

/// Project → recipients subscribed to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionIndex {
    by_project: BTreeMap<String, BTreeSet<String>>,
}

impl SubscriptionIndex {
    /// Invert a declaration into a per-project index.
    ///
    /// Listing the same project twice for one recipient is harmless.
    pub fn build(declaration: &SubscriptionDeclaration) -> Result<Self, Error> {
        let mut by_project: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (recipient, projects) in declaration {
            if recipient.trim().is_empty() {
                return Err(Error::Malformed("empty recipient address".to_string()));
            }
            if recipient.chars().any(char::is_control) {
                return Err(Error::Malformed(format!(
                    "control character in recipient address {recipient:?}"
                )));
            }
            for project in projects {
                if project.trim().is_empty() {
                    return Err(Error::Malformed(format!(
                        "empty project identifier for '{recipient}'"
                    )));
                }
                by_project
                    .entry(project.clone())
                    .or_default()
                    .insert(recipient.clone());
            }
        }

        Ok(Self { by_project })
    }

    /// Parse and index a JSON subscribers list.
    pub fn from_json(content: &str) -> Result<Self, Error> {
        let declaration: SubscriptionDeclaration =
            serde_json::from_str(content).map_err(|e| Error::Malformed(e.to_string()))?;
        Self::build(&declaration)
    }

    /// Parse and index a TOML subscribers list (`"user@x.com" = ["proj"]`).
    pub fn from_toml(content: &str) -> Result<Self, Error> {
        let declaration: SubscriptionDeclaration =
            toml::from_str(content).map_err(|e| Error::Malformed(e.to_string()))?;
        Self::build(&declaration)
    }

    /// Load a subscribers list from disk. `.toml` files are read as TOML,
    /// everything else as JSON.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Read {
            path: path.display().to_string(),
            source: e,
        })?;

        let index = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content)?,
            _ => Self::from_json(&content)?,
        };

        tracing::debug!(
            path = %path.display(),
            projects = index.by_project.len(),
            "loaded subscribers list"
        );
        Ok(index)
    }

    /// Recipients listed for exactly this identifier.
    pub fn lookup(&self, project: &str) -> BTreeSet<&str> {
        self.by_project
            .get(project)
            .map(|recipients| recipients.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Everyone who should hear about `project`: explicit subscribers plus
    /// wildcard subscribers, each once.
    pub fn recipients_for(&self, project: &str) -> BTreeSet<&str> {
        let mut recipients = self.lookup(project);
        recipients.extend(self.lookup(WILDCARD));
        recipients
    }
}

/// Errors from loading a subscribers list.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read subscribers list '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed subscription data: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set<'a>(items: &[&'a str]) -> BTreeSet<&'a str> {
        items.iter().copied().collect()
    }

    #[test]
    fn lookup_returns_exactly_the_listing_recipients() {
        let index = SubscriptionIndex::from_json(
            r#"{
                "a@x.com": ["bootable/recovery", "docs"],
                "b@x.com": ["docs"],
                "c@x.com": ["all"]
            }"#,
        )
        .unwrap();

        assert_eq!(index.lookup("docs"), set(&["a@x.com", "b@x.com"]));
        assert_eq!(index.lookup("bootable/recovery"), set(&["a@x.com"]));
        assert_eq!(index.lookup(WILDCARD), set(&["c@x.com"]));
        assert!(index.lookup("frameworks/base").is_empty());
    }

    #[test]
    fn recipients_for_merges_wildcard() {
        let index =
            SubscriptionIndex::from_json(r#"{"a@x.com": ["p1"], "b@x.com": ["all"]}"#).unwrap();

        assert_eq!(index.recipients_for("p1"), set(&["a@x.com", "b@x.com"]));
        assert_eq!(index.recipients_for("p2"), set(&["b@x.com"]));
    }

    #[test]
    fn duplicate_listings_collapse() {
        let index = SubscriptionIndex::from_json(r#"{"a@x.com": ["p1", "p1", "all"]}"#).unwrap();
        assert_eq!(index.recipients_for("p1"), set(&["a@x.com"]));
    }

    #[test]
    fn wrong_shape_is_malformed() {
        for content in [
            r#"["a@x.com"]"#,
            r#"{"a@x.com": "p1"}"#,
            r#"{"a@x.com": [1, 2]}"#,
            r#"{"a@x.com": ["p1"]"#,
        ] {
            let err = SubscriptionIndex::from_json(content).unwrap_err();
            assert!(matches!(err, Error::Malformed(_)), "{content}: {err:?}");
        }
    }

    #[test]
    fn empty_identifiers_are_malformed() {
        assert!(matches!(
            SubscriptionIndex::from_json(r#"{"": ["p1"]}"#),
            Err(Error::Malformed(_))
        ));
        assert!(matches!(
            SubscriptionIndex::from_json(r#"{"a@x.com": [""]}"#),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn control_characters_in_addresses_are_malformed() {
        let err = SubscriptionIndex::from_json(r#"{"a@x.com\r\nBcc: evil@x.com": ["all"]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn toml_lists_are_accepted() {
        let index = SubscriptionIndex::from_toml(
            r#"
            "a@x.com" = ["p1"]
            "b@x.com" = ["all"]
            "#,
        )
        .unwrap();
        assert_eq!(index.recipients_for("p1"), set(&["a@x.com", "b@x.com"]));
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json = dir.path().join("subscribers.json");
        std::fs::write(&json, r#"{"a@x.com": ["p1"]}"#).unwrap();
        assert_eq!(
            SubscriptionIndex::load(&json).unwrap().lookup("p1"),
            set(&["a@x.com"])
        );

        let toml = dir.path().join("subscribers.toml");
        std::fs::write(&toml, "\"a@x.com\" = [\"p2\"]\n").unwrap();
        assert_eq!(
            SubscriptionIndex::load(&toml).unwrap().lookup("p2"),
            set(&["a@x.com"])
        );

        let missing = dir.path().join("nope.json");
        assert!(matches!(
            SubscriptionIndex::load(&missing),
            Err(Error::Read { .. })
        ));
    }
}
