//! Repository transport trait - abstraction over where tags and definitions come from
//!
//! This trait allows swapping between transports:
//! - HTTP (git smart-HTTP ref advertisement + raw content host)
//! - Mock (testing)

use async_trait::async_trait;

use super::{Credential, ProfileDefinition, TransportError};

/// Lists tags and fetches profile definitions for a repository
///
/// Implementations do their own timeout handling per request; the scanner
/// never retries.
#[async_trait]
pub trait RepositoryTransport: Send + Sync {
    /// Every version tag currently published by `repository`
    async fn list_tags(
        &self,
        repository: &str,
        credential: Option<&Credential>,
    ) -> Result<Vec<String>, TransportError>;

    /// The profile definition published at `tag`
    async fn fetch_definition(
        &self,
        repository: &str,
        tag: &str,
        credential: Option<&Credential>,
    ) -> Result<ProfileDefinition, TransportError>;

    /// Transport identifier for logging
    fn name(&self) -> &'static str;
}

#[cfg(test)]
pub use mock::MockTransport;
