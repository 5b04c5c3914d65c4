//! Loader configuration: API endpoint, bearer token and HTTP timeouts.
//!
//! Values come from an optional YAML file and are then overridden by CLI flags
//! (which themselves may be fed from the environment).

use std::{fs::File, io::Read, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

pub const TOKEN_ENV_VAR: &str = "COHORT_METADATA_TOKEN";
const DEFAULT_BASE_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    pub base_url: String,
    /// Bearer token; normally supplied through the environment instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 120_000,
        }
    }
}

impl LoaderConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let mut file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let mut raw = String::new();
        file.read_to_string(&mut raw)
            .with_context(|| format!("Reading config file {path:?}"))?;
        Self::from_yaml_str(&raw).with_context(|| format!("Parsing config file {path:?}"))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: LoaderConfig = serde_yaml::from_str(raw)?;
        Ok(config)
    }

    /// Applies CLI overrides; `None` keeps the configured value.
    pub fn with_overrides(mut self, base_url: Option<&str>, token: Option<&str>) -> Self {
        if let Some(url) = base_url {
            self.base_url = url.to_string();
        }
        if let Some(token) = token {
            self.token = Some(token.to_string());
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.base_url.trim().is_empty(), "base_url must not be empty");
        ensure!(
            self.base_url.starts_with("http://") || self.base_url.starts_with("https://"),
            "base_url must start with http:// or https:// (got '{}')",
            self.base_url
        );
        ensure!(self.connect_timeout_ms > 0, "connect_timeout_ms must be positive");
        ensure!(self.request_timeout_ms > 0, "request_timeout_ms must be positive");
        Ok(())
    }

    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .with_context(|| format!("No bearer token configured; pass --token or set {TOKEN_ENV_VAR}"))
    }
}
