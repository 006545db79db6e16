//! Scan ledger - which tags have already been processed per repository
//!
//! The ledger is the persisted status of a scanned catalog source. It is handed
//! to the scanner by value each cycle and only ever grows: a tag recorded here
//! is never fetched again for that repository.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tags already processed for one repository
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedRepository {
    /// Repository URL, as declared on the catalog source
    pub url: String,

    /// Version tags already scanned
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// Scan state for every repository of a catalog source
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanLedger {
    #[serde(default)]
    pub repositories: Vec<ScannedRepository>,
}

impl ScanLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags already scanned for `url` (empty for an unknown repository)
    pub fn scanned_tags(&self, url: &str) -> BTreeSet<String> {
        self.repositories
            .iter()
            .find(|r| r.url == url)
            .map(|r| r.tags.clone())
            .unwrap_or_default()
    }

    /// Record `tags` as scanned for `url`
    pub fn merge<I>(&mut self, url: &str, tags: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.repositories = merge_scanned_tags(&self.repositories, url, tags);
    }

    /// Total number of recorded tags across repositories
    pub fn tag_count(&self) -> usize {
        self.repositories.iter().map(|r| r.tags.len()).sum()
    }
}

/// Merge newly scanned tags into ledger rows
///
/// Creates the row for `url` if missing, otherwise unions the tag sets.
/// Applying the same merge twice yields the same rows.
pub fn merge_scanned_tags<I>(
    rows: &[ScannedRepository],
    url: &str,
    tags: I,
) -> Vec<ScannedRepository>
where
    I: IntoIterator<Item = String>,
{
    let mut merged = rows.to_vec();

    match merged.iter_mut().find(|r| r.url == url) {
        Some(row) => row.tags.extend(tags),
        None => merged.push(ScannedRepository {
            url: url.to_string(),
            tags: tags.into_iter().collect(),
        }),
    }

    merged
}
