//! Studio configuration
//!
//! One generic orchestrator serves every studio surface; what differs between
//! them is data: theme tokens, the instruction template handed to the backend,
//! and which model serves each quality tier. The core never interprets any of
//! those strings.

use crate::error::ConfigError;
use crate::types::QualityTier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Name of the domain used when none is configured
pub const DEFAULT_DOMAIN: &str = "general";

/// Model identifier per quality tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityTierModelMap {
    pub fast: String,
    pub high_quality: String,
}

impl QualityTierModelMap {
    #[inline]
    #[must_use]
    pub fn new(fast: impl Into<String>, high_quality: impl Into<String>) -> Self {
        Self {
            fast: fast.into(),
            high_quality: high_quality.into(),
        }
    }

    /// Model identifier for a tier
    #[inline]
    #[must_use]
    pub fn model_for(&self, tier: QualityTier) -> &str {
        match tier {
            QualityTier::Fast => &self.fast,
            QualityTier::HighQuality => &self.high_quality,
        }
    }
}

impl Default for QualityTierModelMap {
    fn default() -> Self {
        Self::new("ui-gen-fast", "ui-gen-quality")
    }
}

/// Per-studio configuration object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Unique name ("crm", "quiz", ...)
    pub name: String,
    /// Long-form style guidance passed through to the backend verbatim
    #[serde(default)]
    pub instruction_template: String,
    /// Theme tokens for the surrounding UI (accent color, etc.)
    #[serde(default)]
    pub theme_tokens: BTreeMap<String, String>,
    #[serde(default)]
    pub models: QualityTierModelMap,
}

impl DomainConfig {
    /// Create a domain with default models and no template
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction_template: String::new(),
            theme_tokens: BTreeMap::new(),
            models: QualityTierModelMap::default(),
        }
    }

    /// With instruction template
    #[inline]
    #[must_use]
    pub fn with_instructions(mut self, template: impl Into<String>) -> Self {
        self.instruction_template = template.into();
        self
    }

    /// With a theme token
    #[inline]
    #[must_use]
    pub fn with_theme_token(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.theme_tokens.insert(key.into(), value.into());
        self
    }

    /// With model map
    #[inline]
    #[must_use]
    pub fn with_models(mut self, models: QualityTierModelMap) -> Self {
        self.models = models;
        self
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAIN)
    }
}

/// Batch dispatch settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Variants per batch
    pub batch_size: usize,
    /// Unsettled batches kept alive before the oldest superseded one is aborted
    pub max_in_flight_batches: usize,
    /// Per-variant bound; `None` leaves timeouts to the client
    pub variant_timeout_secs: Option<u64>,
}

impl GenerationSettings {
    #[inline]
    #[must_use]
    pub fn variant_timeout(&self) -> Option<Duration> {
        self.variant_timeout_secs.map(Duration::from_secs)
    }

    /// Check bounds
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for a zero batch size, a zero
    /// in-flight bound or a zero timeout
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".to_string()));
        }
        if self.max_in_flight_batches == 0 {
            return Err(ConfigError::Invalid(
                "max_in_flight_batches must be at least 1".to_string(),
            ));
        }
        if self.variant_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "variant_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            batch_size: 3,
            max_in_flight_batches: 3,
            variant_timeout_secs: Some(120),
        }
    }
}

/// Studio configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudioConfig {
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
}

impl StudioConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With batch size
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.generation.batch_size = size;
        self
    }

    /// With in-flight batch bound
    #[inline]
    #[must_use]
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.generation.max_in_flight_batches = max;
        self
    }

    /// With per-variant timeout
    #[inline]
    #[must_use]
    pub fn with_variant_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.generation.variant_timeout_secs = timeout.map(|d| d.as_secs().max(1));
        self
    }

    /// With an additional domain, replacing one of the same name
    #[must_use]
    pub fn with_domain(mut self, domain: DomainConfig) -> Self {
        self.domains.retain(|d| d.name != domain.name);
        self.domains.push(domain);
        self
    }

    /// Parse from TOML and validate
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`]
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`StudioConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(
            path = %path.display(),
            domains = config.domains.len(),
            "Loaded studio config"
        );
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Returns [`ConfigError::Serialize`] if rendering fails
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check cross-field consistency
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] describing the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generation.validate()?;
        let mut seen = HashSet::new();
        for domain in &self.domains {
            if domain.name.trim().is_empty() {
                return Err(ConfigError::Invalid("domain name is empty".to_string()));
            }
            if !seen.insert(domain.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate domain: {}",
                    domain.name
                )));
            }
            if domain.models.fast.trim().is_empty() || domain.models.high_quality.trim().is_empty()
            {
                return Err(ConfigError::Invalid(format!(
                    "domain {} has an empty model identifier",
                    domain.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a domain; the built-in default answers for its own name when
    /// no domains are configured.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownDomain`] if no domain has that name
    pub fn domain(&self, name: &str) -> Result<DomainConfig, ConfigError> {
        if let Some(domain) = self.domains.iter().find(|d| d.name == name) {
            return Ok(domain.clone());
        }
        if self.domains.is_empty() && name == DEFAULT_DOMAIN {
            return Ok(DomainConfig::default());
        }
        Err(ConfigError::UnknownDomain(name.to_string()))
    }

    /// The first configured domain, or the built-in default
    #[must_use]
    pub fn default_domain(&self) -> DomainConfig {
        self.domains.first().cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_is_valid() {
        let config = StudioConfig::new();
        assert_eq!(config.generation.batch_size, 3);
        assert!(config.validate().is_ok());
        assert_eq!(config.default_domain().name, DEFAULT_DOMAIN);
    }

    #[test]
    fn parse_full_config() {
        let raw = r##"
            [generation]
            batch_size = 4
            max_in_flight_batches = 2
            variant_timeout_secs = 60

            [[domains]]
            name = "crm"
            instruction_template = "Dense tables, sidebar navigation."
            theme_tokens = { accent = "#2563eb" }
            models = { fast = "m-fast", high_quality = "m-pro" }

            [[domains]]
            name = "quiz"
        "##;

        let config = StudioConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.generation.batch_size, 4);
        assert_eq!(config.generation.variant_timeout(), Some(Duration::from_secs(60)));

        let crm = config.domain("crm").unwrap();
        assert_eq!(crm.models.model_for(QualityTier::HighQuality), "m-pro");
        assert_eq!(crm.theme_tokens.get("accent").map(String::as_str), Some("#2563eb"));

        let quiz = config.domain("quiz").unwrap();
        assert_eq!(quiz.models, QualityTierModelMap::default());
        assert!(matches!(
            config.domain("general"),
            Err(ConfigError::UnknownDomain(_))
        ));
    }

    #[test]
    fn missing_generation_table_uses_defaults() {
        let config = StudioConfig::from_toml_str("").unwrap();
        assert_eq!(config.generation, GenerationSettings::default());
        assert_eq!(config.domain(DEFAULT_DOMAIN).unwrap(), DomainConfig::default());
    }

    #[test]
    fn validate_rejects_zero_batch() {
        let config = StudioConfig::new().with_batch_size(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn settings_validate_on_their_own() {
        assert!(GenerationSettings::default().validate().is_ok());
        let empty = GenerationSettings {
            batch_size: 0,
            ..GenerationSettings::default()
        };
        assert!(matches!(empty.validate(), Err(ConfigError::Invalid(_))));
        let no_timeout = GenerationSettings {
            variant_timeout_secs: Some(0),
            ..GenerationSettings::default()
        };
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_domains() {
        let mut config = StudioConfig::new().with_domain(DomainConfig::new("crm"));
        config.domains.push(DomainConfig::new("crm"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn with_domain_replaces_same_name() {
        let config = StudioConfig::new()
            .with_domain(DomainConfig::new("crm"))
            .with_domain(DomainConfig::new("crm").with_instructions("v2"));
        assert_eq!(config.domains.len(), 1);
        assert_eq!(config.domain("crm").unwrap().instruction_template, "v2");
    }

    #[test]
    fn toml_roundtrip_preserves_config() {
        let config = StudioConfig::new()
            .with_variant_timeout(Some(Duration::from_secs(30)))
            .with_domain(DomainConfig::new("quiz").with_theme_token("accent", "violet"));
        let rendered = config.to_toml_string().unwrap();
        assert_eq!(StudioConfig::from_toml_str(&rendered).unwrap(), config);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studio.toml");
        std::fs::write(&path, "[generation]\nbatch_size = 2\n").unwrap();

        let config = StudioConfig::load(&path).unwrap();
        assert_eq!(config.generation.batch_size, 2);

        let missing = StudioConfig::load(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
