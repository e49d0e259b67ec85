//! Generation client boundary
//!
//! The backend that turns a request into UI source is an external
//! collaborator. The core only sees one async call per variant that either
//! yields source (with optional preview/deployment handles) or fails.

use crate::error::GenerationError;
use crate::types::{BatchId, RequestDescription};
use async_trait::async_trait;
use std::sync::Arc;
use studio_artifact::{DeploymentHandle, GeneratedArtifact, PreviewHandle};

/// Everything one generation call receives
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Batch the call belongs to
    pub batch: BatchId,
    /// Slot the result will be written to
    pub slot: usize,
    /// Number of slots in the batch
    pub batch_size: usize,
    /// Backend model resolved from the tier and domain
    pub model: String,
    /// Domain instruction template, passed through verbatim
    pub instructions: String,
    pub description: Arc<RequestDescription>,
}

/// Raw payload returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutput {
    pub source: String,
    pub preview: Option<PreviewHandle>,
    pub deployment: Option<DeploymentHandle>,
}

impl GenerationOutput {
    #[inline]
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            preview: None,
            deployment: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_preview(mut self, preview: PreviewHandle) -> Self {
        self.preview = Some(preview);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_deployment(mut self, deployment: DeploymentHandle) -> Self {
        self.deployment = Some(deployment);
        self
    }

    /// Convert into an artifact; a blank source is a failed generation.
    ///
    /// # Errors
    /// Returns [`GenerationError::InvalidArtifact`] if the source is blank
    pub fn into_artifact(self) -> Result<GeneratedArtifact, GenerationError> {
        let mut artifact = GeneratedArtifact::new(self.source)?;
        if let Some(preview) = self.preview {
            artifact = artifact.with_preview(preview);
        }
        if let Some(deployment) = self.deployment {
            artifact = artifact.with_deployment(deployment);
        }
        Ok(artifact)
    }
}

/// Backend that generates one candidate per call
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate one candidate
    ///
    /// # Errors
    /// Any failure is recorded on the variant for `request.slot` only
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError>;
}
