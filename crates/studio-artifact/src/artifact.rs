//! Generated artifact value type
//!
//! A [`GeneratedArtifact`] is what one successful generation call produced:
//! component source text plus optional handles to a live preview and a
//! deployment. The core only needs to know whether those handles exist;
//! rendering and hosting belong to other collaborators.

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Errors related to artifact construction
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Generated source was empty or whitespace only
    #[error("generated source is empty")]
    EmptySource,

    /// Hash does not match the source it claims to address
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        expected: ContentHash,
        actual: ContentHash,
    },
}

/// Opaque reference the sandboxed renderer understands
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviewHandle(String);

impl PreviewHandle {
    #[inline]
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PreviewHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a hosted copy of the artifact lives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentHandle {
    /// Public URL of the deployment
    pub url: String,
    /// Backend-specific deployment identifier, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl DeploymentHandle {
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            id: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Source of one generated UI candidate
///
/// # Invariants
/// - `hash` is always `ContentHash::compute(source)`
/// - `source` is never blank
/// - Immutable after construction; the `with_*` setters consume and return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ArtifactRecord")]
pub struct GeneratedArtifact {
    hash: ContentHash,
    source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preview: Option<PreviewHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deployment: Option<DeploymentHandle>,
}

impl GeneratedArtifact {
    /// Create an artifact from generated source
    ///
    /// # Errors
    /// Returns [`ArtifactError::EmptySource`] if the source is blank
    pub fn new(source: impl Into<String>) -> Result<Self, ArtifactError> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(ArtifactError::EmptySource);
        }
        Ok(Self {
            hash: ContentHash::compute(source.as_bytes()),
            source,
            preview: None,
            deployment: None,
        })
    }

    /// Attach a live-preview handle
    #[inline]
    #[must_use]
    pub fn with_preview(mut self, preview: PreviewHandle) -> Self {
        self.preview = Some(preview);
        self
    }

    /// Attach a deployment handle
    #[inline]
    #[must_use]
    pub fn with_deployment(mut self, deployment: DeploymentHandle) -> Self {
        self.deployment = Some(deployment);
        self
    }

    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    #[inline]
    #[must_use]
    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn deployment(&self) -> Option<&DeploymentHandle> {
        self.deployment.as_ref()
    }

    /// Whether the renderer has something to show.
    ///
    /// A missing handle means "no preview available", not an error.
    #[inline]
    #[must_use]
    pub fn has_preview(&self) -> bool {
        self.preview.is_some()
    }

    /// Recompute the hash and compare
    #[inline]
    #[must_use]
    pub fn verify(&self) -> bool {
        self.hash == ContentHash::compute(self.source.as_bytes())
    }
}

#[derive(Deserialize)]
struct ArtifactRecord {
    hash: ContentHash,
    source: String,
    #[serde(default)]
    preview: Option<PreviewHandle>,
    #[serde(default)]
    deployment: Option<DeploymentHandle>,
}

impl TryFrom<ArtifactRecord> for GeneratedArtifact {
    type Error = ArtifactError;

    fn try_from(record: ArtifactRecord) -> Result<Self, Self::Error> {
        let mut artifact = Self::new(record.source)?;
        if artifact.hash != record.hash {
            return Err(ArtifactError::HashMismatch {
                expected: record.hash,
                actual: artifact.hash,
            });
        }
        artifact.preview = record.preview;
        artifact.deployment = record.deployment;
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_source_is_rejected() {
        assert!(matches!(
            GeneratedArtifact::new("  \n\t"),
            Err(ArtifactError::EmptySource)
        ));
    }

    #[test]
    fn hash_tracks_source() {
        let artifact = GeneratedArtifact::new("<App />").unwrap();
        assert_eq!(artifact.hash(), &ContentHash::compute(b"<App />"));
        assert!(artifact.verify());
    }

    #[test]
    fn handles_are_optional() {
        let bare = GeneratedArtifact::new("<App />").unwrap();
        assert!(!bare.has_preview());
        assert!(bare.deployment().is_none());

        let full = bare
            .with_preview(PreviewHandle::new("sandbox://abc"))
            .with_deployment(DeploymentHandle::new("https://demo.example").with_id("dep_1"));
        assert_eq!(full.preview().map(PreviewHandle::as_str), Some("sandbox://abc"));
        assert_eq!(full.deployment().and_then(|d| d.id.as_deref()), Some("dep_1"));
    }

    #[test]
    fn handles_do_not_change_hash() {
        let bare = GeneratedArtifact::new("<App />").unwrap();
        let with_preview = bare.clone().with_preview(PreviewHandle::new("p"));
        assert_eq!(bare.hash(), with_preview.hash());
    }

    #[test]
    fn deserialize_rejects_tampered_hash() {
        let artifact = GeneratedArtifact::new("<App />").unwrap();
        let mut value = serde_json::to_value(&artifact).unwrap();
        value["source"] = serde_json::Value::String("<Other />".to_string());

        let result: Result<GeneratedArtifact, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }

    #[test]
    fn deserialize_keeps_handles() {
        let artifact = GeneratedArtifact::new("<App />")
            .unwrap()
            .with_preview(PreviewHandle::new("sandbox://1"));
        let json = serde_json::to_string(&artifact).unwrap();
        let decoded: GeneratedArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, artifact);
    }
}
