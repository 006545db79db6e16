//! Shared helpers for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use profiles_core::scanner::{
    Credential, DefinitionMetadata, DefinitionSpec, ProfileDefinition, RepositoryTransport,
    TransportError,
};

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// In-memory git host keyed by repository URL
#[derive(Default)]
pub struct FakeGitHost {
    repositories: Mutex<HashMap<String, HashMap<String, ProfileDefinition>>>,
    fetches: AtomicUsize,
}

impl FakeGitHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `name` at `tag` in `repository`
    pub fn publish(&self, repository: &str, name: &str, tag: &str) {
        let definition = ProfileDefinition {
            api_version: "packages.weave.works/v1alpha1".to_string(),
            kind: "ProfileDefinition".to_string(),
            metadata: DefinitionMetadata {
                name: name.to_string(),
            },
            spec: DefinitionSpec {
                description: format!("{name} {tag}"),
            },
        };

        if let Ok(mut repos) = self.repositories.lock() {
            repos
                .entry(repository.to_string())
                .or_default()
                .insert(tag.to_string(), definition);
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryTransport for FakeGitHost {
    async fn list_tags(
        &self,
        repository: &str,
        _credential: Option<&Credential>,
    ) -> Result<Vec<String>, TransportError> {
        let repos = self.repositories.lock().unwrap();
        repos
            .get(repository)
            .map(|tags| tags.keys().cloned().collect())
            .ok_or_else(|| TransportError::Status {
                url: repository.to_string(),
                status: 404,
            })
    }

    async fn fetch_definition(
        &self,
        repository: &str,
        tag: &str,
        _credential: Option<&Credential>,
    ) -> Result<ProfileDefinition, TransportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let repos = self.repositories.lock().unwrap();
        repos
            .get(repository)
            .and_then(|tags| tags.get(tag))
            .cloned()
            .ok_or_else(|| TransportError::Status {
                url: format!("{repository}/{tag}/profile.yaml"),
                status: 404,
            })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
