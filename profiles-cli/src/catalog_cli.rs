//! Catalog query commands
//!
//! `search` and `show` reconcile the configured sources once and query the
//! resulting catalog; `scan` inspects a single repository.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::{error, warn};

use profiles_core::config::HttpConfig;
use profiles_core::scanner::{HttpTransport, RepositoryScanner};
use profiles_core::source::{ReconcileReport, SourceError, StaticSecrets};
use profiles_core::{Catalog, CatalogEntry, Reconciler, ServiceConfig};

pub type HttpReconciler = Reconciler<HttpTransport, StaticSecrets>;

/// Build a reconciler with a fresh catalog for `config`
pub fn build_reconciler(config: &ServiceConfig) -> Result<HttpReconciler> {
    let transport = HttpTransport::new(&config.http)?;
    let secrets = config
        .load_secrets()
        .context("Failed to load repository secrets")?;

    Ok(Reconciler::new(
        Arc::new(Catalog::new()),
        RepositoryScanner::new(transport),
        secrets,
    )
    .with_scan_timeout(config.scan_timeout()))
}

/// Log the outcome of a reconcile pass
pub fn log_reports(results: Vec<Result<ReconcileReport, SourceError>>) {
    for result in results {
        match result {
            Ok(report) => {
                for failure in &report.failures {
                    warn!("Catalog source '{}': {}", report.source, failure);
                }
            }
            Err(e) => error!("{}", e),
        }
    }
}

async fn load_catalog(config_path: &Path) -> Result<Arc<Catalog>> {
    let config = ServiceConfig::load_from_path(config_path)?;
    let reconciler = build_reconciler(&config)?;
    log_reports(reconciler.reconcile_all(&config.sources).await);
    Ok(reconciler.catalog().clone())
}

/// Table row for catalog entries
#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Catalog")]
    catalog: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&CatalogEntry> for EntryRow {
    fn from(entry: &CatalogEntry) -> Self {
        let desc = entry.description();
        let description = if desc.chars().count() > 50 {
            format!("{}...", desc.chars().take(47).collect::<String>())
        } else {
            desc.to_string()
        };

        Self {
            catalog: entry.catalog_source.clone(),
            name: entry.name().to_string(),
            version: entry.tag().unwrap_or("-").to_string(),
            description,
        }
    }
}

fn print_entries(entries: &[CatalogEntry], json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No profiles found.");
        return Ok(());
    }

    println!("Found {} profile(s):\n", entries.len());
    let rows: Vec<EntryRow> = entries.iter().map(EntryRow::from).collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub async fn execute_search(config_path: &Path, query: Option<&str>, json_output: bool) -> Result<()> {
    let catalog = load_catalog(config_path).await?;

    let entries = match query {
        Some(q) => catalog.search(q).await,
        None => catalog.search_all().await,
    };

    print_entries(&entries, json_output)
}

pub async fn execute_show(
    config_path: &Path,
    source: &str,
    profile: &str,
    version: Option<&str>,
    json_output: bool,
) -> Result<()> {
    let catalog = load_catalog(config_path).await?;

    let entry = match version {
        Some(v) => catalog.get_with_version(source, profile, v).await,
        None => catalog.get(source, profile).await,
    };

    let Some(entry) = entry else {
        match version {
            Some(v) => anyhow::bail!("Profile '{profile}' at version '{v}' not found in catalog '{source}'"),
            None => anyhow::bail!("Profile '{profile}' not found in catalog '{source}'"),
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }

    println!("Catalog:     {}", entry.catalog_source);
    println!("Name:        {}", entry.name());
    if let Some(tag) = entry.tag() {
        println!("Version:     {tag}");
    }
    println!("Description: {}", entry.description());

    if let Some(current) = entry.tag() {
        let updates = catalog.greater_than_version(source, profile, current).await;
        if !updates.is_empty() {
            let tags: Vec<&str> = updates.iter().filter_map(|e| e.tag()).collect();
            println!("Updates:     {}", tags.join(", "));
        }
    }

    Ok(())
}

pub async fn execute_scan(url: &str, source: &str, json_output: bool) -> Result<()> {
    let transport = HttpTransport::new(&HttpConfig::default())?;
    let scanner = RepositoryScanner::new(transport);

    let outcome = scanner
        .scan(source, url, None, &BTreeSet::new())
        .await
        .with_context(|| format!("Failed to scan {url}"))?;

    print_entries(&outcome.entries, json_output)
}
