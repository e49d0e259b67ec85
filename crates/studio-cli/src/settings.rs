//! Binary configuration: the studio configuration plus the backend table

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use studio_core::{DomainConfig, StudioConfig};

/// Where the HTTP generation backend lives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// URL the generation request is POSTed to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the bearer key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Transport-level timeout for one HTTP call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl BackendConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Read the bearer key from the configured environment variable
    ///
    /// # Errors
    /// Fails if a variable is configured but not set
    pub fn api_key(&self) -> Result<Option<String>> {
        match &self.api_key_env {
            Some(var) => std::env::var(var)
                .map(Some)
                .with_context(|| format!("environment variable {var} is not set")),
            None => Ok(None),
        }
    }
}

/// Full contents of the `studio.toml` file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub studio: StudioConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

impl CliConfig {
    /// Parse and validate
    ///
    /// # Errors
    /// Fails on malformed TOML or an inconsistent studio configuration
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("failed to parse config")?;
        config.studio.validate()?;
        Ok(config)
    }

    /// Load from a file, or defaults when no path is given
    ///
    /// # Errors
    /// Fails if the file cannot be read or parsed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            tracing::debug!("No config file given, using defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml_str(&raw).with_context(|| format!("in {}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            domains = config.studio.domains.len(),
            backend = config.backend.endpoint.as_deref().unwrap_or("offline"),
            "Loaded config"
        );
        Ok(config)
    }

    /// Starter configuration printed by `studio config`
    #[must_use]
    pub fn starter() -> Self {
        Self {
            studio: StudioConfig::new().with_domain(
                DomainConfig::default()
                    .with_instructions("Clean, accessible layout with a single accent color.")
                    .with_theme_token("accent", "#4f46e5"),
            ),
            backend: BackendConfig {
                endpoint: Some("http://localhost:8787/generate".to_string()),
                api_key_env: Some("STUDIO_API_KEY".to_string()),
                request_timeout_secs: Some(90),
            },
        }
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Fails if serialization fails
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render config")
    }
}
