//! Profile Catalog - concurrent index of profile entries
//!
//! This module holds the in-memory catalog that every other component
//! reads from or writes to.
//!
//! # Overview
//!
//! The catalog:
//! - Partitions entries by catalog source
//! - Replaces a source wholesale when its profile list is re-declared
//! - Accumulates entries for sources populated by repository scans
//! - Answers substring search, exact lookup and "newer than" queries
//!
//! # Architecture
//!
//! ```text
//! Reconciler ──AddOrReplace/Append/Remove──▶ Catalog ◀──Search/Get── API
//!      │                                        ▲
//!      └──▶ RepositoryScanner ──(entries)───────┘
//! ```

mod entry;
mod store;

pub use entry::{CatalogEntry, ProfileDescription};
pub use store::{Catalog, Population};
