//! Core types for Studio
//!
//! Defines the identifiers and the immutable input of a generation attempt:
//! - Session, batch and variant identifiers
//! - Quality tiers and reference images
//! - [`RequestDescription`], created once per start or refinement step

use crate::error::Rejection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Unique session identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Ulid);

impl SessionId {
    /// Generate new session ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique batch identifier
///
/// Every in-flight call is tagged with one; results are applied only while
/// it names the active batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Ulid);

impl BatchId {
    /// Generate new batch ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Variant identity: owning batch plus slot index assigned at dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariantId {
    pub batch: BatchId,
    pub slot: usize,
}

impl VariantId {
    #[inline]
    #[must_use]
    pub fn new(batch: BatchId, slot: usize) -> Self {
        Self { batch, slot }
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.batch, self.slot)
    }
}

/// Speed/quality trade-off, mapped to a backend model per domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityTier {
    /// Cheaper, faster model
    #[default]
    Fast,
    /// Slower model with better output
    HighQuality,
}

impl QualityTier {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Fast => "fast",
            QualityTier::HighQuality => "high-quality",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(QualityTier::Fast),
            "high-quality" | "high_quality" | "hq" | "quality" => Ok(QualityTier::HighQuality),
            other => Err(format!("unknown quality tier: {other}")),
        }
    }
}

/// What a reference image is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageRole {
    /// Visual inspiration: match its look, do not embed it
    StyleInspiration,
    /// Asset to embed in the generated UI
    ContentAsset,
}

impl FromStr for ImageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "style" | "style-inspiration" | "inspiration" => Ok(ImageRole::StyleInspiration),
            "asset" | "content" | "content-asset" => Ok(ImageRole::ContentAsset),
            other => Err(format!("unknown image role: {other}")),
        }
    }
}

/// Attached reference image
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceImage {
    pub role: ImageRole,
    /// Location of the image (http(s) or data URI)
    pub url: String,
}

impl ReferenceImage {
    #[inline]
    #[must_use]
    pub fn new(role: ImageRole, url: impl Into<String>) -> Self {
        Self {
            role,
            url: url.into(),
        }
    }
}

/// Optional parameters the backend resolves before generating
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalContext {
    /// Page to fetch and use as source material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_url: Option<String>,
    /// Web search to run for source material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    /// Brand domain to resolve logos/colors from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_domain: Option<String>,
}

impl ExternalContext {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_fetch_url(mut self, url: impl Into<String>) -> Self {
        self.fetch_url = Some(url.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_search_query(mut self, query: impl Into<String>) -> Self {
        self.search_query = Some(query.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_brand_domain(mut self, domain: impl Into<String>) -> Self {
        self.brand_domain = Some(domain.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fetch_url.is_none() && self.search_query.is_none() && self.brand_domain.is_none()
    }
}

/// Immutable input to a generation attempt
///
/// Built once per session start or refinement step. Refinement produces a new
/// value; nothing edits an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestDescription {
    goal: String,
    #[serde(default)]
    tier: QualityTier,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<ReferenceImage>,
    #[serde(default, skip_serializing_if = "ExternalContext::is_empty")]
    context: ExternalContext,
}

impl RequestDescription {
    /// Create new request from a free-text goal
    #[inline]
    #[must_use]
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            tier: QualityTier::default(),
            attachments: Vec::new(),
            context: ExternalContext::default(),
        }
    }

    /// With quality tier
    #[inline]
    #[must_use]
    pub fn with_tier(mut self, tier: QualityTier) -> Self {
        self.tier = tier;
        self
    }

    /// With attached reference image
    #[inline]
    #[must_use]
    pub fn with_attachment(mut self, image: ReferenceImage) -> Self {
        self.attachments.push(image);
        self
    }

    /// With external context parameters
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: ExternalContext) -> Self {
        self.context = context;
        self
    }

    #[inline]
    #[must_use]
    pub fn goal(&self) -> &str {
        &self.goal
    }

    #[inline]
    #[must_use]
    pub fn tier(&self) -> QualityTier {
        self.tier
    }

    #[inline]
    #[must_use]
    pub fn attachments(&self) -> &[ReferenceImage] {
        &self.attachments
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> &ExternalContext {
        &self.context
    }

    /// At least one of goal text or an attached image must be present.
    ///
    /// # Errors
    /// Returns [`Rejection::EmptyRequest`] when both are missing
    pub fn validate(&self) -> Result<(), Rejection> {
        if self.goal.trim().is_empty() && self.attachments.is_empty() {
            return Err(Rejection::EmptyRequest);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_id_generation() {
        assert_ne!(BatchId::new(), BatchId::new());
    }

    #[test]
    fn quality_tier_parse() {
        assert_eq!("fast".parse::<QualityTier>().unwrap(), QualityTier::Fast);
        assert_eq!("HQ".parse::<QualityTier>().unwrap(), QualityTier::HighQuality);
        assert!("turbo".parse::<QualityTier>().is_err());
        assert_eq!(QualityTier::HighQuality.to_string(), "high-quality");
    }

    #[test]
    fn image_role_parse() {
        assert_eq!("style".parse::<ImageRole>().unwrap(), ImageRole::StyleInspiration);
        assert_eq!("asset".parse::<ImageRole>().unwrap(), ImageRole::ContentAsset);
        assert!("logo".parse::<ImageRole>().is_err());
    }

    #[test]
    fn request_builder() {
        let request = RequestDescription::new("build a CRM dashboard")
            .with_tier(QualityTier::HighQuality)
            .with_attachment(ReferenceImage::new(ImageRole::StyleInspiration, "https://img/1.png"))
            .with_context(ExternalContext::new().with_brand_domain("acme.com"));

        assert_eq!(request.goal(), "build a CRM dashboard");
        assert_eq!(request.tier(), QualityTier::HighQuality);
        assert_eq!(request.attachments().len(), 1);
        assert_eq!(request.context().brand_domain.as_deref(), Some("acme.com"));
    }

    #[test]
    fn request_needs_goal_or_image() {
        assert_eq!(
            RequestDescription::new("   ").validate(),
            Err(Rejection::EmptyRequest)
        );
        assert!(RequestDescription::new("build a quiz app").validate().is_ok());
        assert!(RequestDescription::new("")
            .with_attachment(ReferenceImage::new(ImageRole::ContentAsset, "data:image/png;base64,AA"))
            .validate()
            .is_ok());
    }

    #[test]
    fn variant_id_display() {
        let batch = BatchId::new();
        assert_eq!(VariantId::new(batch, 1).to_string(), format!("{batch}#1"));
    }

    #[test]
    fn request_serde_skips_empty_parts() {
        let json = serde_json::to_value(RequestDescription::new("quiz")).unwrap();
        assert_eq!(json["goal"], "quiz");
        assert_eq!(json["tier"], "fast");
        assert!(json.get("attachments").is_none());
        assert!(json.get("context").is_none());
    }
}
