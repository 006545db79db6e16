//! Catalog sources - declarations that feed the catalog
//!
//! A catalog source either lists its profiles inline or names repositories
//! to scan for tagged profile definitions, never both. The [`Reconciler`]
//! turns create/update/delete events for sources into catalog writes.

mod reconciler;

pub use reconciler::{ReconcileReport, Reconciler};

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::ProfileDescription;
use crate::scanner::{Repository, ScanError, SecretPayload};

/// Declared state of a catalog source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSourceSpec {
    pub name: String,

    /// Inline profile list, replaced wholesale on every update
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<ProfileDescription>,

    /// Repositories scanned for tagged profile definitions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<Repository>,
}

impl CatalogSourceSpec {
    /// A source declaring its profiles inline
    pub fn declared(name: impl Into<String>, profiles: Vec<ProfileDescription>) -> Self {
        Self {
            name: name.into(),
            profiles,
            repositories: Vec::new(),
        }
    }

    /// A source populated by scanning repositories
    pub fn scanned(name: impl Into<String>, repositories: Vec<Repository>) -> Self {
        Self {
            name: name.into(),
            profiles: Vec::new(),
            repositories,
        }
    }

    pub fn is_scanned(&self) -> bool {
        !self.repositories.is_empty()
    }

    pub fn validate(&self) -> Result<(), SourceError> {
        let invalid = |reason: &str| SourceError::InvalidSpec {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if !self.profiles.is_empty() && !self.repositories.is_empty() {
            return Err(invalid("profiles and repositories are mutually exclusive"));
        }
        if self.profiles.iter().any(|p| p.name.trim().is_empty()) {
            return Err(invalid("profile names must not be empty"));
        }

        let mut urls = HashSet::new();
        for repository in &self.repositories {
            if !urls.insert(repository.url.as_str()) {
                return Err(SourceError::InvalidSpec {
                    name: self.name.clone(),
                    reason: format!("repository {} is listed more than once", repository.url),
                });
            }
        }

        Ok(())
    }
}

/// Lifecycle event for a catalog source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// The source was created or its spec changed
    Applied(CatalogSourceSpec),
    /// The source was deleted
    Deleted(String),
}

impl SourceEvent {
    pub fn source_name(&self) -> &str {
        match self {
            SourceEvent::Applied(spec) => &spec.name,
            SourceEvent::Deleted(name) => name,
        }
    }
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Catalog source '{name}' is invalid: {reason}")]
    InvalidSpec { name: String, reason: String },

    #[error("Secret '{secret}' referenced by {repository} was not found")]
    SecretNotFound { secret: String, repository: String },

    #[error("Secret '{secret}' referenced by {repository} has no username/password")]
    InvalidSecret { secret: String, repository: String },

    #[error(transparent)]
    Scan(#[from] ScanError),
}

impl SourceError {
    /// Repository the failure belongs to, if any
    pub fn repository(&self) -> Option<&str> {
        match self {
            SourceError::InvalidSpec { .. } => None,
            SourceError::SecretNotFound { repository, .. }
            | SourceError::InvalidSecret { repository, .. } => Some(repository),
            SourceError::Scan(e) => Some(e.repository()),
        }
    }
}

/// Looks up secret payloads by name
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Option<SecretPayload>;
}

/// Secrets held in memory, typically loaded from a YAML file
///
/// ```yaml
/// github-creds:
///   username: bot
///   password: ghp_xxx
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StaticSecrets {
    secrets: HashMap<String, SecretPayload>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, payload: SecretPayload) {
        self.secrets.insert(name.into(), payload);
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read secrets: {}", path.display()))?;
        serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse secrets: {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

#[async_trait]
impl SecretResolver for StaticSecrets {
    async fn resolve(&self, name: &str) -> Option<SecretPayload> {
        self.secrets.get(name).cloned()
    }
}
