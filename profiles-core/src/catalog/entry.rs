//! Profile descriptions and catalog entries
//!
//! Entries serialize as `{"tag":..,"catalog":..,"name":..,"description":..}`,
//! with `tag` left out for unversioned catalogs.

use serde::{Deserialize, Serialize};

/// A named, described profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDescription {
    /// Profile name, unique within a catalog source
    pub name: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,
}

impl ProfileDescription {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A profile bound to its catalog source and optional version tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Version tag, absent for flat unversioned catalogs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Name of the owning catalog source
    #[serde(rename = "catalog")]
    pub catalog_source: String,

    #[serde(flatten)]
    pub profile: ProfileDescription,
}

impl CatalogEntry {
    /// Create an unversioned entry
    pub fn new(catalog_source: impl Into<String>, profile: ProfileDescription) -> Self {
        Self {
            tag: None,
            catalog_source: catalog_source.into(),
            profile,
        }
    }

    /// Create an entry for a specific version tag
    pub fn tagged(
        catalog_source: impl Into<String>,
        profile: ProfileDescription,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            tag: Some(tag.into()),
            catalog_source: catalog_source.into(),
            profile,
        }
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn description(&self) -> &str {
        &self.profile.description
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Identity within a catalog source
    pub(crate) fn key(&self) -> (&str, Option<&str>) {
        (self.name(), self.tag())
    }
}
