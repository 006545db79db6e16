//! `profiles serve` - periodic reconciliation plus the query API

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use profiles_core::{api, CatalogSourceSpec, ServiceConfig};

use crate::catalog_cli::{build_reconciler, log_reports, HttpReconciler};

pub async fn execute(config_path: &Path, listen: Option<String>) -> Result<()> {
    let config = ServiceConfig::load_from_path(config_path)?;
    let reconciler = build_reconciler(&config)?;
    let catalog = reconciler.catalog().clone();

    info!(
        "Loaded {} catalog source(s) from {}",
        config.sources.len(),
        config_path.display()
    );

    // The API serves a possibly partial catalog while the first pass runs
    let resync = tokio::spawn(resync_loop(
        reconciler,
        config.sources.clone(),
        config.resync_interval(),
    ));

    let addr = listen.unwrap_or_else(|| config.listen.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Serving profile catalog on http://{}", addr);

    axum::serve(listener, api::router(catalog))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    resync.abort();
    info!("Shut down");
    Ok(())
}

async fn resync_loop(reconciler: HttpReconciler, sources: Vec<CatalogSourceSpec>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        debug!("Reconciling {} catalog source(s)", sources.len());
        log_reports(reconciler.reconcile_all(&sources).await);
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; serve until the process is killed
        std::future::pending::<()>().await;
    }
    info!("Received ctrl-c, shutting down");
}
