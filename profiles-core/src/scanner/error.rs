//! Scanner error types

use std::time::Duration;
use thiserror::Error;

/// Failures talking to a repository
#[derive(Error, Debug)]
pub enum TransportError {
    /// The repository location could not be parsed
    #[error("Invalid repository URL: {url}")]
    InvalidUrl { url: String },

    /// No raw-content mapping exists for the repository host
    #[error("Unsupported git provider '{host}' for {url}")]
    UnsupportedProvider { url: String, host: String },

    /// The request never produced a response
    #[error("Request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The server answered with a non-success status
    #[error("Unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    /// The reference advertisement could not be decoded
    #[error("Malformed reference advertisement from {url}: {reason}")]
    Protocol { url: String, reason: String },

    /// The profile definition document is unusable
    #[error("Malformed profile definition: {reason}")]
    MalformedDefinition { reason: String },
}

/// A failed repository scan
///
/// Scans fail as a whole: no entries are reported and the ledger for the
/// repository must be left untouched.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to list tags for {repository}")]
    ListTags {
        repository: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to fetch profile definition for {repository} at tag {tag}")]
    FetchDefinition {
        repository: String,
        tag: String,
        #[source]
        source: TransportError,
    },

    #[error("Scan of {repository} timed out after {after:?}")]
    TimedOut { repository: String, after: Duration },
}

impl ScanError {
    /// Repository the failed scan was for
    pub fn repository(&self) -> &str {
        match self {
            ScanError::ListTags { repository, .. }
            | ScanError::FetchDefinition { repository, .. }
            | ScanError::TimedOut { repository, .. } => repository,
        }
    }
}
