//! Incremental repository scanner
//!
//! A scan lists the tags a repository publishes, subtracts the tags already
//! recorded in the ledger, and fetches the profile definition for each
//! remaining tag in ascending version order.
//!
//! Results are buffered locally and only returned when every fetch succeeded.
//! A failed or abandoned scan therefore leaves nothing to undo: the caller
//! keeps its previous ledger and retries the whole repository next cycle.

mod definition;
mod error;
#[cfg(feature = "transport")]
mod http;
mod transport;

pub use definition::{DefinitionMetadata, DefinitionSpec, ProfileDefinition, PROFILE_FILE};
pub use error::{ScanError, TransportError};
#[cfg(feature = "transport")]
pub use http::HttpTransport;
pub use transport::RepositoryTransport;

#[cfg(test)]
pub use transport::MockTransport;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::CatalogEntry;
use crate::version;

/// Reference to a secret holding repository credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub name: String,
}

/// A repository declared on a catalog source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// Repository location, e.g. `https://github.com/org/profiles`
    pub url: String,

    /// Credentials for private repositories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretRef>,
}

impl Repository {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            secret_ref: None,
        }
    }
}

/// Raw secret data as returned by a secret lookup
pub type SecretPayload = BTreeMap<String, String>;

/// HTTP basic credentials for a repository
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    /// Read `username` and `password` keys from a secret payload
    pub fn from_payload(payload: &SecretPayload) -> Option<Self> {
        Some(Self {
            username: payload.get("username")?.clone(),
            password: payload.get("password")?.clone(),
        })
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of a successful scan
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanOutcome {
    /// Entries for newly processed tags, oldest version first
    pub entries: Vec<CatalogEntry>,

    /// Previously scanned tags plus every tag processed by this scan
    pub scanned_tags: BTreeSet<String>,
}

impl ScanOutcome {
    /// Tags processed by this scan only
    pub fn new_tags(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| e.tag())
    }
}

/// Scans repositories for unprocessed profile versions
pub struct RepositoryScanner<T> {
    transport: T,
}

impl<T: RepositoryTransport> RepositoryScanner<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Scan `repository` for tags not in `already_scanned`
    ///
    /// Entries are attributed to catalog `source`. Any transport failure
    /// aborts the whole scan.
    pub async fn scan(
        &self,
        source: &str,
        repository: &str,
        credential: Option<&Credential>,
        already_scanned: &BTreeSet<String>,
    ) -> Result<ScanOutcome, ScanError> {
        let published = self
            .transport
            .list_tags(repository, credential)
            .await
            .map_err(|source| ScanError::ListTags {
                repository: repository.to_string(),
                source,
            })?;

        let mut to_process: Vec<String> = published
            .into_iter()
            .filter(|tag| !already_scanned.contains(tag))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        version::sort_tags(&mut to_process);

        if to_process.is_empty() {
            debug!("No new tags in {} via {}", repository, self.transport.name());
            return Ok(ScanOutcome {
                entries: Vec::new(),
                scanned_tags: already_scanned.clone(),
            });
        }

        info!(
            "Scanning {} new tags in {}: {:?}",
            to_process.len(),
            repository,
            to_process
        );

        let mut entries = Vec::with_capacity(to_process.len());
        for tag in &to_process {
            let profile = self
                .transport
                .fetch_definition(repository, tag, credential)
                .await
                .and_then(ProfileDefinition::into_description)
                .map_err(|source| ScanError::FetchDefinition {
                    repository: repository.to_string(),
                    tag: tag.clone(),
                    source,
                })?;

            debug!("Found profile '{}' at {}@{}", profile.name, repository, tag);
            entries.push(CatalogEntry::tagged(source, profile, tag.clone()));
        }

        let mut scanned_tags = already_scanned.clone();
        scanned_tags.extend(to_process);

        Ok(ScanOutcome {
            entries,
            scanned_tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REPO: &str = "https://github.com/weaveworks/nginx-profile";

    fn tags(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_scan_empty_ledger() {
        let scanner = RepositoryScanner::new(MockTransport::with_profile(
            "nginx",
            &["v0.1.1", "v0.1.0"],
        ));

        let outcome = scanner.scan("catalog", REPO, None, &BTreeSet::new()).await.unwrap();

        let found: Vec<(&str, Option<&str>, &str)> = outcome
            .entries
            .iter()
            .map(|e| (e.catalog_source.as_str(), e.tag(), e.name()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("catalog", Some("v0.1.0"), "nginx"),
                ("catalog", Some("v0.1.1"), "nginx"),
            ]
        );
        assert_eq!(outcome.scanned_tags, tags(&["v0.1.0", "v0.1.1"]));
    }

    #[tokio::test]
    async fn test_rescan_with_updated_ledger_is_noop() {
        let scanner = RepositoryScanner::new(MockTransport::with_profile(
            "nginx",
            &["v0.1.0", "v0.1.1"],
        ));

        let first = scanner.scan("catalog", REPO, None, &BTreeSet::new()).await.unwrap();
        let second = scanner
            .scan("catalog", REPO, None, &first.scanned_tags)
            .await
            .unwrap();

        assert!(second.entries.is_empty());
        assert_eq!(second.scanned_tags, first.scanned_tags);
        assert_eq!(scanner.transport().fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_only_unscanned_tags_are_fetched() {
        let scanner = RepositoryScanner::new(MockTransport::with_profile(
            "nginx",
            &["v0.1.0", "v0.2.0", "v0.10.0"],
        ));

        let outcome = scanner
            .scan("catalog", REPO, None, &tags(&["v0.1.0", "v9.9.9"]))
            .await
            .unwrap();

        let new_tags: Vec<&str> = outcome.new_tags().collect();
        assert_eq!(new_tags, vec!["v0.2.0", "v0.10.0"]);
        assert_eq!(
            outcome.scanned_tags,
            tags(&["v0.1.0", "v0.2.0", "v0.10.0", "v9.9.9"])
        );
        assert_eq!(scanner.transport().fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_repository_without_tags() {
        let scanner = RepositoryScanner::new(MockTransport::default());

        let outcome = scanner.scan("catalog", REPO, None, &BTreeSet::new()).await.unwrap();

        assert_eq!(outcome, ScanOutcome::default());
        assert_eq!(scanner.transport().fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_aborts_scan() {
        let transport = MockTransport::with_profile("nginx", &["v0.1.0", "v0.3.0"]);
        transport.publish_broken_tag("v0.2.0");
        let scanner = RepositoryScanner::new(transport);

        let err = scanner
            .scan("catalog", REPO, None, &BTreeSet::new())
            .await
            .unwrap_err();

        match err {
            ScanError::FetchDefinition { tag, .. } => assert_eq!(tag, "v0.2.0"),
            other => panic!("unexpected error: {other}"),
        }
        // v0.3.0 sorts after the broken tag and is never attempted
        assert_eq!(scanner.transport().fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_malformed_definition_aborts_scan() {
        let scanner = RepositoryScanner::new(
            MockTransport::with_profile("nginx", &["v0.1.0"]).with_nameless_tag("v0.2.0"),
        );

        let err = scanner
            .scan("catalog", REPO, None, &BTreeSet::new())
            .await
            .unwrap_err();

        match err {
            ScanError::FetchDefinition {
                tag,
                source: TransportError::MalformedDefinition { .. },
                ..
            } => assert_eq!(tag, "v0.2.0"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_failed_listing() {
        let scanner = RepositoryScanner::new(MockTransport::failing_list());

        let err = scanner
            .scan("catalog", REPO, None, &BTreeSet::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::ListTags { .. }));
        assert_eq!(err.repository(), REPO);
    }

    #[test]
    fn test_credential_from_payload() {
        let mut payload = SecretPayload::new();
        payload.insert("username".to_string(), "bot".to_string());
        assert!(Credential::from_payload(&payload).is_none());

        payload.insert("password".to_string(), "hunter2".to_string());
        let credential = Credential::from_payload(&payload).unwrap();
        assert_eq!(credential.username, "bot");
        assert!(!format!("{credential:?}").contains("hunter2"));
    }
}
