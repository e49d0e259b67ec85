//! Export handoff and artifact library
//!
//! Export is fire-and-forget: the orchestrator hands a succeeded artifact to an
//! [`ArtifactExporter`] and never looks at the result beyond logging it.
//! Saved artifacts live behind the injected [`ArtifactStore`] interface.

use crate::error::ExportError;
use crate::types::VariantId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use studio_artifact::{ContentHash, GeneratedArtifact};

/// Where an exported artifact goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportTarget {
    /// Write the source to a file
    Download,
    /// Open the deployment URL
    OpenDeployment,
    /// Share a link to the deployment or preview
    CopyLink,
    /// Keep in the saved-artifacts library
    SaveToLibrary,
}

impl ExportTarget {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportTarget::Download => "download",
            ExportTarget::OpenDeployment => "open-deployment",
            ExportTarget::CopyLink => "copy-link",
            ExportTarget::SaveToLibrary => "save-to-library",
        }
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "download" | "file" => Ok(ExportTarget::Download),
            "open" | "open-deployment" | "deploy" => Ok(ExportTarget::OpenDeployment),
            "link" | "copy-link" => Ok(ExportTarget::CopyLink),
            "save" | "library" | "save-to-library" => Ok(ExportTarget::SaveToLibrary),
            other => Err(format!("unknown export target: {other}")),
        }
    }
}

/// One export handoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub target: ExportTarget,
    pub variant: VariantId,
    pub artifact: GeneratedArtifact,
}

/// External collaborator that persists, downloads or publishes artifacts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactExporter: Send + Sync {
    /// Hand the artifact over
    ///
    /// # Errors
    /// Failures are logged by the caller and otherwise ignored
    async fn export(&self, request: ExportRequest) -> Result<(), ExportError>;
}

/// Exporter that accepts everything and does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExporter;

#[async_trait]
impl ArtifactExporter for NoopExporter {
    async fn export(&self, request: ExportRequest) -> Result<(), ExportError> {
        tracing::debug!(variant = %request.variant, target = %request.target, "Export discarded");
        Ok(())
    }
}

/// Saved artifact with its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    pub artifact: GeneratedArtifact,
    pub variant: VariantId,
    pub saved_at: DateTime<Utc>,
}

/// Key-value store for saved artifacts, keyed by content hash
pub trait ArtifactStore: Send + Sync {
    /// Store an artifact; saving identical content again replaces the entry
    ///
    /// # Errors
    /// Returns [`ExportError`] if the backing store rejects the write
    fn put(&self, entry: SavedArtifact) -> Result<ContentHash, ExportError>;

    /// Fetch by content hash
    fn get(&self, hash: &ContentHash) -> Option<SavedArtifact>;

    /// Remove by content hash, returning whether it existed
    fn remove(&self, hash: &ContentHash) -> bool;

    /// All saved artifacts, newest first
    fn list(&self) -> Vec<SavedArtifact>;
}

/// In-memory artifact store
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    entries: DashMap<ContentHash, SavedArtifact>,
}

impl InMemoryArtifactStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn put(&self, entry: SavedArtifact) -> Result<ContentHash, ExportError> {
        let hash = *entry.artifact.hash();
        self.entries.insert(hash, entry);
        Ok(hash)
    }

    fn get(&self, hash: &ContentHash) -> Option<SavedArtifact> {
        self.entries.get(hash).map(|entry| entry.clone())
    }

    fn remove(&self, hash: &ContentHash) -> bool {
        self.entries.remove(hash).is_some()
    }

    fn list(&self) -> Vec<SavedArtifact> {
        let mut all: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        all
    }
}

/// Saves `SaveToLibrary` exports into a store and passes every other target
/// to an inner exporter.
pub struct LibraryExporter {
    store: Arc<dyn ArtifactStore>,
    inner: Arc<dyn ArtifactExporter>,
}

impl LibraryExporter {
    #[must_use]
    pub fn new(store: Arc<dyn ArtifactStore>, inner: Arc<dyn ArtifactExporter>) -> Self {
        Self { store, inner }
    }

    /// Library backed by a store, with no other targets handled
    #[must_use]
    pub fn library_only(store: Arc<dyn ArtifactStore>) -> Self {
        Self::new(store, Arc::new(NoopExporter))
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }
}

impl fmt::Debug for LibraryExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryExporter").finish_non_exhaustive()
    }
}

#[async_trait]
impl ArtifactExporter for LibraryExporter {
    async fn export(&self, request: ExportRequest) -> Result<(), ExportError> {
        if request.target != ExportTarget::SaveToLibrary {
            return self.inner.export(request).await;
        }
        let hash = self.store.put(SavedArtifact {
            artifact: request.artifact,
            variant: request.variant,
            saved_at: Utc::now(),
        })?;
        tracing::info!(variant = %request.variant, hash = %hash.short(), "Saved artifact to library");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BatchId;

    fn request(target: ExportTarget, source: &str) -> ExportRequest {
        ExportRequest {
            target,
            variant: VariantId::new(BatchId::new(), 0),
            artifact: GeneratedArtifact::new(source).unwrap(),
        }
    }

    #[test]
    fn export_target_parse() {
        assert_eq!("save".parse::<ExportTarget>().unwrap(), ExportTarget::SaveToLibrary);
        assert_eq!("Download".parse::<ExportTarget>().unwrap(), ExportTarget::Download);
        assert!("print".parse::<ExportTarget>().is_err());
        assert_eq!(ExportTarget::CopyLink.to_string(), "copy-link");
    }

    #[test]
    fn store_deduplicates_by_content() {
        let store = InMemoryArtifactStore::new();
        let a = request(ExportTarget::SaveToLibrary, "<Crm />");
        let hash = store
            .put(SavedArtifact {
                artifact: a.artifact.clone(),
                variant: a.variant,
                saved_at: Utc::now(),
            })
            .unwrap();
        store
            .put(SavedArtifact {
                artifact: a.artifact.clone(),
                variant: a.variant,
                saved_at: Utc::now(),
            })
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&hash).unwrap().artifact, a.artifact);
        assert!(store.remove(&hash));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn library_exporter_saves_only_library_target() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let mut inner = MockArtifactExporter::new();
        inner
            .expect_export()
            .withf(|req| req.target == ExportTarget::Download)
            .times(1)
            .returning(|_| Ok(()));

        let exporter = LibraryExporter::new(store.clone(), Arc::new(inner));
        exporter
            .export(request(ExportTarget::SaveToLibrary, "<Quiz />"))
            .await
            .unwrap();
        exporter
            .export(request(ExportTarget::Download, "<Quiz />"))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0].artifact.source(), "<Quiz />");
    }

    #[tokio::test]
    async fn library_exporter_propagates_inner_failure() {
        let mut inner = MockArtifactExporter::new();
        inner
            .expect_export()
            .returning(|_| Err(ExportError::Unavailable("no deployment".to_string())));

        let exporter = LibraryExporter::new(Arc::new(InMemoryArtifactStore::new()), Arc::new(inner));
        let err = exporter
            .export(request(ExportTarget::OpenDeployment, "<A/>"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Unavailable(_)));
    }
}
