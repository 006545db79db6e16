//! Source reconciliation - applies catalog source events to the catalog
//!
//! Inline sources are written with `add_or_replace`. Scanned sources are
//! scanned one repository at a time; each successful scan is appended to the
//! catalog and merged into the source's ledger. A repository that fails is
//! reported and retried in full on the next reconcile, while the other
//! repositories of the same source still make progress.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{CatalogSourceSpec, SecretResolver, SourceError, SourceEvent};
use crate::catalog::Catalog;
use crate::config::DEFAULT_SCAN_TIMEOUT_SECONDS;
use crate::ledger::ScanLedger;
use crate::scanner::{
    Credential, Repository, RepositoryScanner, RepositoryTransport, ScanError, ScanOutcome,
};

/// Result of reconciling one source event
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub source: String,

    /// Entries added to the catalog (for inline sources, the declared count)
    pub entries_added: usize,

    /// Repositories scanned successfully
    pub repositories_scanned: usize,

    /// Per-repository failures; the rest of the source was still applied
    pub failures: Vec<SourceError>,
}

impl ReconcileReport {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives catalog writes from source events
///
/// Cheap to clone; clones share the catalog, scanner and ledgers.
pub struct Reconciler<T, S> {
    catalog: Arc<Catalog>,
    scanner: Arc<RepositoryScanner<T>>,
    secrets: Arc<S>,
    ledgers: Arc<Mutex<HashMap<String, ScanLedger>>>,
    scan_timeout: Duration,
}

impl<T, S> Clone for Reconciler<T, S> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            scanner: Arc::clone(&self.scanner),
            secrets: Arc::clone(&self.secrets),
            ledgers: Arc::clone(&self.ledgers),
            scan_timeout: self.scan_timeout,
        }
    }
}

impl<T, S> Reconciler<T, S>
where
    T: RepositoryTransport,
    S: SecretResolver,
{
    pub fn new(catalog: Arc<Catalog>, scanner: RepositoryScanner<T>, secrets: S) -> Self {
        Self {
            catalog,
            scanner: Arc::new(scanner),
            secrets: Arc::new(secrets),
            ledgers: Arc::new(Mutex::new(HashMap::new())),
            scan_timeout: Duration::from_secs(DEFAULT_SCAN_TIMEOUT_SECONDS),
        }
    }

    /// Deadline for scanning a single repository
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn scanner(&self) -> &RepositoryScanner<T> {
        &self.scanner
    }

    /// Snapshot of the ledger for `source`
    pub async fn ledger(&self, source: &str) -> Option<ScanLedger> {
        self.ledgers.lock().await.get(source).cloned()
    }

    /// Apply one source event
    ///
    /// Returns an error only when the spec itself is invalid; repository
    /// failures are collected in the report.
    pub async fn reconcile(&self, event: SourceEvent) -> Result<ReconcileReport, SourceError> {
        debug!("Reconciling catalog source '{}'", event.source_name());

        match event {
            SourceEvent::Deleted(name) => {
                self.catalog.remove(&name).await;
                self.ledgers.lock().await.remove(&name);
                info!("Removed catalog source '{}'", name);
                Ok(ReconcileReport::new(&name))
            }
            SourceEvent::Applied(spec) => {
                spec.validate()?;
                if spec.is_scanned() {
                    Ok(self.apply_scanned(&spec).await)
                } else {
                    Ok(self.apply_declared(spec).await)
                }
            }
        }
    }

    /// Reconcile every spec in turn, e.g. on startup or a periodic resync
    pub async fn reconcile_all(
        &self,
        specs: &[CatalogSourceSpec],
    ) -> Vec<Result<ReconcileReport, SourceError>> {
        let mut reports = Vec::with_capacity(specs.len());
        for spec in specs {
            reports.push(self.reconcile(SourceEvent::Applied(spec.clone())).await);
        }
        reports
    }

    async fn apply_declared(&self, spec: CatalogSourceSpec) -> ReconcileReport {
        let mut report = ReconcileReport::new(&spec.name);
        report.entries_added = spec.profiles.len();

        self.catalog.add_or_replace(&spec.name, spec.profiles).await;
        // Scanned entries are gone, so their tags must be fetched again
        self.ledgers.lock().await.remove(&spec.name);

        info!(
            "Applied catalog source '{}' with {} profiles",
            spec.name, report.entries_added
        );
        report
    }

    async fn apply_scanned(&self, spec: &CatalogSourceSpec) -> ReconcileReport {
        let mut report = ReconcileReport::new(&spec.name);

        for repository in &spec.repositories {
            match self.scan_repository(&spec.name, repository).await {
                Ok(outcome) => {
                    let added = self.catalog.append(&spec.name, outcome.entries).await;
                    self.ledgers
                        .lock()
                        .await
                        .entry(spec.name.clone())
                        .or_default()
                        .merge(&repository.url, outcome.scanned_tags);

                    report.entries_added += added;
                    report.repositories_scanned += 1;
                }
                Err(e) => {
                    warn!(
                        "Scan of {} for catalog source '{}' failed: {}",
                        repository.url,
                        spec.name,
                        error_chain(&e)
                    );
                    report.failures.push(e);
                }
            }
        }

        info!(
            "Reconciled catalog source '{}': {} new entries, {}/{} repositories scanned",
            spec.name,
            report.entries_added,
            report.repositories_scanned,
            spec.repositories.len()
        );
        report
    }

    async fn scan_repository(
        &self,
        source: &str,
        repository: &Repository,
    ) -> Result<ScanOutcome, SourceError> {
        let credential = self.resolve_credential(repository).await?;
        let already_scanned = self
            .ledgers
            .lock()
            .await
            .get(source)
            .map(|ledger| ledger.scanned_tags(&repository.url))
            .unwrap_or_default();

        debug!(
            "Scanning {} ({} tags already scanned)",
            repository.url,
            already_scanned.len()
        );

        let scan = self.scanner.scan(
            source,
            &repository.url,
            credential.as_ref(),
            &already_scanned,
        );
        let outcome = tokio::time::timeout(self.scan_timeout, scan)
            .await
            .map_err(|_| ScanError::TimedOut {
                repository: repository.url.clone(),
                after: self.scan_timeout,
            })??;

        Ok(outcome)
    }

    async fn resolve_credential(
        &self,
        repository: &Repository,
    ) -> Result<Option<Credential>, SourceError> {
        let Some(secret_ref) = &repository.secret_ref else {
            return Ok(None);
        };

        let payload = self.secrets.resolve(&secret_ref.name).await.ok_or_else(|| {
            SourceError::SecretNotFound {
                secret: secret_ref.name.clone(),
                repository: repository.url.clone(),
            }
        })?;

        Credential::from_payload(&payload)
            .map(Some)
            .ok_or_else(|| SourceError::InvalidSecret {
                secret: secret_ref.name.clone(),
                repository: repository.url.clone(),
            })
    }
}

/// Render an error with its causes, outermost first
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut cause = error.source();
    while let Some(e) = cause {
        message.push_str(": ");
        message.push_str(&e.to_string());
        cause = e.source();
    }
    message
}
