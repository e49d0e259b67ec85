//! Placeholder generation for demos without a backend

use async_trait::async_trait;
use std::time::Duration;
use studio_artifact::PreviewHandle;
use studio_core::{GenerationClient, GenerationError, GenerationOutput, GenerationRequest};

const TITLE_LIMIT: usize = 60;

/// Deterministic client: the same request and slot always yield the same
/// component.
#[derive(Debug, Clone, Default)]
pub struct OfflineGenerationClient {
    latency: Duration,
}

impl OfflineGenerationClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated latency; slot `i` waits `(i + 1) * latency`
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

fn title_for(goal: &str) -> String {
    let first = goal.lines().find(|l| !l.trim().is_empty()).unwrap_or("Untitled");
    first
        .trim()
        .chars()
        .take(TITLE_LIMIT)
        .filter(|c| !matches!(c, '<' | '>' | '{' | '}'))
        .collect()
}

/// Placeholder component source for one slot
#[must_use]
pub fn placeholder_source(request: &GenerationRequest) -> String {
    let variant = request.slot + 1;
    let title = title_for(request.description.goal());
    format!(
        "export default function Variant{variant}() {{\n  \
         return (\n    \
         <main data-model=\"{model}\" data-variant=\"{variant}\">\n      \
         <h1>{title}</h1>\n      \
         <p>Offline placeholder {variant} of {total}</p>\n    \
         </main>\n  \
         );\n}}\n",
        model = request.model,
        total = request.batch_size,
    )
}

#[async_trait]
impl GenerationClient for OfflineGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        if !self.latency.is_zero() {
            let factor = u32::try_from(request.slot + 1).unwrap_or(u32::MAX);
            tokio::time::sleep(self.latency.saturating_mul(factor)).await;
        }
        Ok(GenerationOutput::new(placeholder_source(request))
            .with_preview(PreviewHandle::new(format!("offline://{}/{}", request.batch, request.slot))))
    }
}
