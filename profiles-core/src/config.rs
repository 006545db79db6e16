//! Service configuration (profiles.yaml)
//!
//! Declares the catalog sources to serve along with listener, scan and HTTP
//! client settings. Every field except `sources` has a default.
//!
//! ```yaml
//! listen: 0.0.0.0:8000
//! resync_interval_seconds: 300
//! scan_timeout_seconds: 120
//! secrets_file: secrets.yaml
//! http:
//!   timeout_seconds: 30
//!   raw_hosts:
//!     github.com: https://raw.githubusercontent.com
//! sources:
//!   - name: weaveworks
//!     repositories:
//!       - url: https://github.com/weaveworks/nginx-profile
//!   - name: local
//!     profiles:
//!       - name: foo
//!         description: bar
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::source::{CatalogSourceSpec, StaticSecrets};

/// Default listen address for the query API
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8000";

/// Default interval between full reconciliations (5 minutes)
pub const DEFAULT_RESYNC_INTERVAL_SECONDS: u64 = 5 * 60;

/// Default deadline for scanning one repository (2 minutes)
pub const DEFAULT_SCAN_TIMEOUT_SECONDS: u64 = 2 * 60;

/// Default per-request HTTP timeout
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_resync_interval() -> u64 {
    DEFAULT_RESYNC_INTERVAL_SECONDS
}

fn default_scan_timeout() -> u64 {
    DEFAULT_SCAN_TIMEOUT_SECONDS
}

fn default_http_timeout() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECONDS
}

fn default_user_agent() -> String {
    concat!("profiles/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_raw_hosts() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "github.com".to_string(),
        "https://raw.githubusercontent.com".to_string(),
    )])
}

/// HTTP client settings for repository scanning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Repository host -> base URL serving raw file contents
    #[serde(default = "default_raw_hosts")]
    pub raw_hosts: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_http_timeout(),
            user_agent: default_user_agent(),
            raw_hosts: default_raw_hosts(),
        }
    }
}

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address the query API binds to
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Seconds between full reconciliations of every source
    #[serde(default = "default_resync_interval")]
    pub resync_interval_seconds: u64,

    /// Deadline for scanning a single repository
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_seconds: u64,

    #[serde(default)]
    pub http: HttpConfig,

    /// YAML file mapping secret names to key/value payloads
    #[serde(default)]
    pub secrets_file: Option<PathBuf>,

    /// Declared catalog sources
    #[serde(default)]
    pub sources: Vec<CatalogSourceSpec>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            resync_interval_seconds: default_resync_interval(),
            scan_timeout_seconds: default_scan_timeout(),
            http: HttpConfig::default(),
            secrets_file: None,
            sources: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// Parse configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml_ng::from_str(content).context("Failed to parse service configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    ///
    /// A relative `secrets_file` is resolved against the config file's directory.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))?;

        if let (Some(secrets), Some(dir)) = (&config.secrets_file, path.parent()) {
            if secrets.is_relative() {
                config.secrets_file = Some(dir.join(secrets));
            }
        }

        Ok(config)
    }

    /// Check source names and timeouts
    pub fn validate(&self) -> Result<()> {
        if self.scan_timeout_seconds == 0 {
            anyhow::bail!("scan_timeout_seconds must be greater than zero");
        }
        if self.http.timeout_seconds == 0 {
            anyhow::bail!("http.timeout_seconds must be greater than zero");
        }
        if self.resync_interval_seconds == 0 {
            anyhow::bail!("resync_interval_seconds must be greater than zero");
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            source.validate()?;
            if !seen.insert(source.name.as_str()) {
                anyhow::bail!("Catalog source '{}' is declared more than once", source.name);
            }
        }

        Ok(())
    }

    /// Load the configured secrets, or an empty set when none are configured
    pub fn load_secrets(&self) -> Result<StaticSecrets> {
        match &self.secrets_file {
            Some(path) => StaticSecrets::load_from_path(path),
            None => Ok(StaticSecrets::default()),
        }
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_seconds)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_seconds)
    }

    /// Look up a declared source by name
    pub fn source(&self, name: &str) -> Option<&CatalogSourceSpec> {
        self.sources.iter().find(|s| s.name == name)
    }
}
