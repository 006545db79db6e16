//! Profile definition parsing (profile.yaml)
//!
//! Each tagged version of a profile repository publishes a `profile.yaml`
//! at its root describing the profile.

use serde::{Deserialize, Serialize};

use super::TransportError;
use crate::catalog::ProfileDescription;

/// Name of the definition document at the root of a tagged tree
pub const PROFILE_FILE: &str = "profile.yaml";

/// A profile definition document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDefinition {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    pub metadata: DefinitionMetadata,

    #[serde(default)]
    pub spec: DefinitionSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DefinitionMetadata {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DefinitionSpec {
    #[serde(default)]
    pub description: String,
}

impl ProfileDefinition {
    /// Parse a definition from YAML (JSON is accepted too)
    pub fn from_yaml(content: &str) -> Result<Self, TransportError> {
        serde_yaml_ng::from_str(content).map_err(|e| TransportError::MalformedDefinition {
            reason: e.to_string(),
        })
    }

    /// The catalog description this definition publishes
    pub fn into_description(self) -> Result<ProfileDescription, TransportError> {
        let name = self.metadata.name.trim();
        if name.is_empty() {
            return Err(TransportError::MalformedDefinition {
                reason: "metadata.name is empty".to_string(),
            });
        }

        Ok(ProfileDescription::new(name, self.spec.description))
    }
}
