//! Profiles library exports
//!
//! An in-memory catalog of deployable profiles, fed by declared catalog
//! sources and by incremental scans of tagged git repositories, and served
//! through a read-only HTTP API.

pub mod catalog;
pub mod config;
pub mod ledger;
pub mod scanner;
pub mod source;
pub mod version;

#[cfg(feature = "api")]
pub mod api;

pub use catalog::{Catalog, CatalogEntry, Population, ProfileDescription};
pub use config::ServiceConfig;
pub use ledger::ScanLedger;
pub use source::{CatalogSourceSpec, Reconciler, SourceEvent};
