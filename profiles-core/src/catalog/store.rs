//! In-memory catalog store
//!
//! Entries are partitioned by catalog source. Every public operation takes the
//! lock exactly once, so readers only ever observe the state before or after a
//! write, never a write in progress.

use std::collections::{BTreeMap, HashSet};

use tokio::sync::RwLock;
use tracing::debug;

use super::{CatalogEntry, ProfileDescription};
use crate::version;

/// How a catalog source is populated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Population {
    /// The whole membership is re-declared on every update
    Declared,
    /// Entries accumulate from repeated repository scans
    Scanned,
}

impl Population {
    /// Merge `incoming` into `existing` under this population's rule
    ///
    /// `Declared` discards what was there before; `Scanned` keeps it. In both
    /// cases an entry whose `(name, tag)` is already present is skipped.
    /// Returns the number of entries added.
    pub fn merge(self, existing: &mut Vec<CatalogEntry>, incoming: Vec<CatalogEntry>) -> usize {
        if self == Population::Declared {
            existing.clear();
        }

        let mut seen: HashSet<(String, Option<String>)> = existing
            .iter()
            .map(|e| (e.name().to_string(), e.tag.clone()))
            .collect();

        let before = existing.len();
        for entry in incoming {
            if seen.insert((entry.name().to_string(), entry.tag.clone())) {
                existing.push(entry);
            }
        }
        existing.len() - before
    }
}

#[derive(Debug)]
struct Partition {
    population: Population,
    entries: Vec<CatalogEntry>,
}

/// Concurrent index of profile entries keyed by (source, name, tag)
#[derive(Debug, Default)]
pub struct Catalog {
    sources: RwLock<BTreeMap<String, Partition>>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every entry of `source` with the given untagged profiles
    pub async fn add_or_replace<I>(&self, source: &str, descriptions: I)
    where
        I: IntoIterator<Item = ProfileDescription>,
    {
        let entries: Vec<CatalogEntry> = descriptions
            .into_iter()
            .map(|profile| CatalogEntry::new(source, profile))
            .collect();

        let mut sources = self.sources.write().await;
        let count = Self::apply(&mut sources, source, Population::Declared, entries);
        debug!("Replaced catalog source '{}' with {} profiles", source, count);
    }

    /// Add scanned entries to `source`, skipping any `(name, tag)` already present
    ///
    /// A source previously populated by `add_or_replace` loses its declared
    /// entries first. Returns the number of entries actually added.
    pub async fn append<I>(&self, source: &str, entries: I) -> usize
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let entries: Vec<CatalogEntry> = entries
            .into_iter()
            .map(|mut entry| {
                entry.catalog_source = source.to_string();
                entry
            })
            .collect();

        let mut sources = self.sources.write().await;
        let added = Self::apply(&mut sources, source, Population::Scanned, entries);
        debug!("Appended {} entries to catalog source '{}'", added, source);
        added
    }

    fn apply(
        sources: &mut BTreeMap<String, Partition>,
        source: &str,
        population: Population,
        entries: Vec<CatalogEntry>,
    ) -> usize {
        let partition = sources
            .entry(source.to_string())
            .or_insert_with(|| Partition {
                population,
                entries: Vec::new(),
            });
        // The two modes never share a partition
        if partition.population != population {
            partition.entries.clear();
            partition.population = population;
        }
        population.merge(&mut partition.entries, entries)
    }

    /// Drop every entry of `source`; unknown sources are ignored
    pub async fn remove(&self, source: &str) {
        let removed = self.sources.write().await.remove(source);
        if let Some(partition) = removed {
            debug!(
                "Removed catalog source '{}' ({} entries)",
                source,
                partition.entries.len()
            );
        }
    }

    /// All entries whose name contains `query` (case-sensitive)
    ///
    /// Results are ordered by source name, then insertion order.
    pub async fn search(&self, query: &str) -> Vec<CatalogEntry> {
        let sources = self.sources.read().await;
        sources
            .values()
            .flat_map(|partition| partition.entries.iter())
            .filter(|entry| entry.name().contains(query))
            .cloned()
            .collect()
    }

    /// Every entry across all sources
    pub async fn search_all(&self) -> Vec<CatalogEntry> {
        self.search("").await
    }

    /// The untagged entry for `(source, name)`
    pub async fn get(&self, source: &str, name: &str) -> Option<CatalogEntry> {
        self.find(source, name, None).await
    }

    /// The entry for `(source, name)` with exactly this version tag
    pub async fn get_with_version(
        &self,
        source: &str,
        name: &str,
        version: &str,
    ) -> Option<CatalogEntry> {
        self.find(source, name, Some(version)).await
    }

    async fn find(&self, source: &str, name: &str, tag: Option<&str>) -> Option<CatalogEntry> {
        let sources = self.sources.read().await;
        sources
            .get(source)?
            .entries
            .iter()
            .find(|entry| entry.key() == (name, tag))
            .cloned()
    }

    /// Entries for `(source, name)` strictly newer than `version`, oldest first
    ///
    /// Entries whose tag cannot be parsed are never included.
    pub async fn greater_than_version(
        &self,
        source: &str,
        name: &str,
        version: &str,
    ) -> Vec<CatalogEntry> {
        let mut newer: Vec<CatalogEntry> = {
            let sources = self.sources.read().await;
            let Some(partition) = sources.get(source) else {
                return Vec::new();
            };
            partition
                .entries
                .iter()
                .filter(|entry| entry.name() == name)
                .filter(|entry| entry.tag().is_some_and(|tag| version::is_newer(tag, version)))
                .cloned()
                .collect()
        };

        newer.sort_by(|a, b| {
            let (a, b) = (a.tag().unwrap_or_default(), b.tag().unwrap_or_default());
            version::compare(a, b).then_with(|| a.cmp(b))
        });
        newer
    }

    /// Names of all known catalog sources
    pub async fn sources(&self) -> Vec<String> {
        self.sources.read().await.keys().cloned().collect()
    }

    /// How a source is currently populated
    pub async fn population(&self, source: &str) -> Option<Population> {
        self.sources
            .read()
            .await
            .get(source)
            .map(|partition| partition.population)
    }

    /// Total number of entries
    pub async fn len(&self) -> usize {
        self.sources
            .read()
            .await
            .values()
            .map(|partition| partition.entries.len())
            .sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
