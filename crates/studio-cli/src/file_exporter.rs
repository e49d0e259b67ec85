//! Filesystem export target

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use studio_core::{ArtifactExporter, ExportError, ExportRequest, ExportTarget};

const LIBRARY_DIR: &str = "library";

/// Writes artifacts under a directory.
///
/// `Download` writes the source next to the other downloads, `SaveToLibrary`
/// writes it under `library/`. Link targets only log the URL.
#[derive(Debug, Clone)]
pub struct FileExporter {
    root: PathBuf,
}

impl FileExporter {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a `Download` or `SaveToLibrary` export is written to
    #[must_use]
    pub fn path_for(&self, request: &ExportRequest) -> PathBuf {
        let name = format!(
            "variant-{}-{}.tsx",
            request.variant.slot + 1,
            request.artifact.hash().short()
        );
        match request.target {
            ExportTarget::SaveToLibrary => self.root.join(LIBRARY_DIR).join(name),
            _ => self.root.join(name),
        }
    }

    /// Written file for `request`, if the export actually produced one
    #[must_use]
    pub fn written(&self, request: &ExportRequest) -> Option<PathBuf> {
        let path = self.path_for(request);
        path.is_file().then_some(path)
    }

    async fn write(&self, request: &ExportRequest) -> Result<PathBuf, ExportError> {
        let path = self.path_for(request);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, request.artifact.source()).await?;
        Ok(path)
    }
}

#[async_trait]
impl ArtifactExporter for FileExporter {
    async fn export(&self, request: ExportRequest) -> Result<(), ExportError> {
        match request.target {
            ExportTarget::Download | ExportTarget::SaveToLibrary => {
                let path = self.write(&request).await?;
                tracing::info!(variant = %request.variant, path = %path.display(), "Artifact written");
            }
            ExportTarget::OpenDeployment => {
                let deployment = request
                    .artifact
                    .deployment()
                    .ok_or_else(|| ExportError::Unavailable("artifact has no deployment".to_string()))?;
                tracing::info!(variant = %request.variant, url = %deployment.url, "Deployment URL");
            }
            ExportTarget::CopyLink => {
                let link = request
                    .artifact
                    .deployment()
                    .map(|d| d.url.clone())
                    .or_else(|| request.artifact.preview().map(|p| p.as_str().to_string()))
                    .ok_or_else(|| ExportError::Unavailable("artifact has no link".to_string()))?;
                tracing::info!(variant = %request.variant, %link, "Share link");
            }
        }
        Ok(())
    }
}
