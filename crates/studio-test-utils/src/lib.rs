//! Testing utilities for the studio workspace
//!
//! Scripted generation client, recording exporter and request fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use studio_artifact::PreviewHandle;
use studio_core::{
    ArtifactExporter, BatchId, DomainConfig, ExportError, ExportRequest, GenerationClient,
    GenerationError, GenerationOutput, GenerationRequest, GenerationSettings, ImageRole,
    QualityTier, ReferenceImage, RequestDescription, StudioOrchestrator,
};

/// What one scripted call does after its delay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// Succeed with `<Candidate batch=B slot=S />`, B counting batches from 1
    Succeed,
    /// Succeed with a preview handle attached
    SucceedWithPreview,
    /// Succeed with a whitespace-only source
    Blank,
    Fail(GenerationError),
    Panic,
}

/// One scripted call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub delay: Duration,
    pub result: StepResult,
}

impl Step {
    pub fn ok(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            result: StepResult::Succeed,
        }
    }

    pub fn ok_with_preview(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            result: StepResult::SucceedWithPreview,
        }
    }

    pub fn fail(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            result: StepResult::Fail(GenerationError::Backend(format!("scripted failure after {delay_ms}ms"))),
        }
    }

    pub fn fail_with(delay_ms: u64, error: GenerationError) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            result: StepResult::Fail(error),
        }
    }

    pub fn blank() -> Self {
        Self {
            delay: Duration::ZERO,
            result: StepResult::Blank,
        }
    }

    pub fn panic() -> Self {
        Self {
            delay: Duration::ZERO,
            result: StepResult::Panic,
        }
    }
}

/// Source produced by a succeeding step
pub fn candidate_source(batch_ordinal: usize, slot: usize) -> String {
    format!("<Candidate batch={batch_ordinal} slot={slot} />")
}

/// Generation client driven by per-batch scripts.
///
/// Each new batch id takes the next queued script, indexed by slot. Batches
/// without a script, and slots past the end of one, succeed immediately.
#[derive(Debug, Default)]
pub struct ScriptedGenerationClient {
    queued: Mutex<VecDeque<Vec<Step>>>,
    assigned: Mutex<HashMap<BatchId, (usize, Vec<Step>)>>,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerationClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the script for the next unseen batch
    pub fn with_batch(self, steps: Vec<Step>) -> Self {
        self.push_batch(steps);
        self
    }

    pub fn push_batch(&self, steps: Vec<Step>) {
        self.queued.lock().push_back(steps);
    }

    /// Every request received, in call order
    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Batches seen so far
    pub fn batches_seen(&self) -> usize {
        self.assigned.lock().len()
    }

    fn step_for(&self, request: &GenerationRequest) -> (usize, Step) {
        let mut assigned = self.assigned.lock();
        let next_ordinal = assigned.len() + 1;
        let (ordinal, steps) = assigned.entry(request.batch).or_insert_with(|| {
            let steps = self.queued.lock().pop_front().unwrap_or_default();
            (next_ordinal, steps)
        });
        let step = steps.get(request.slot).cloned().unwrap_or_else(|| Step::ok(0));
        (*ordinal, step)
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        self.calls.lock().push(request.clone());
        let (ordinal, step) = self.step_for(request);
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        match step.result {
            StepResult::Succeed => Ok(GenerationOutput::new(candidate_source(ordinal, request.slot))),
            StepResult::SucceedWithPreview => Ok(GenerationOutput::new(candidate_source(ordinal, request.slot))
                .with_preview(PreviewHandle::new(format!("sandbox://{ordinal}/{}", request.slot)))),
            StepResult::Blank => Ok(GenerationOutput::new("  \n")),
            StepResult::Fail(err) => Err(err),
            StepResult::Panic => panic!("scripted panic in slot {}", request.slot),
        }
    }
}

/// Exporter that records every handoff
#[derive(Debug, Default)]
pub struct RecordingExporter {
    requests: Mutex<Vec<ExportRequest>>,
    fail: bool,
}

impl RecordingExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exporter that records and then fails every handoff
    pub fn failing() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn requests(&self) -> Vec<ExportRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ArtifactExporter for RecordingExporter {
    async fn export(&self, request: ExportRequest) -> Result<(), ExportError> {
        self.requests.lock().push(request);
        if self.fail {
            return Err(ExportError::Failed("scripted export failure".to_string()));
        }
        Ok(())
    }
}

pub fn crm_request() -> RequestDescription {
    RequestDescription::new("build a CRM dashboard").with_tier(QualityTier::Fast)
}

pub fn quiz_request() -> RequestDescription {
    RequestDescription::new("build a quiz app")
        .with_tier(QualityTier::HighQuality)
        .with_attachment(ReferenceImage::new(ImageRole::StyleInspiration, "https://img.example/quiz.png"))
}

pub fn crm_domain() -> DomainConfig {
    DomainConfig::new("crm")
        .with_instructions("Dense data tables, left sidebar, muted palette.")
        .with_theme_token("accent", "#2563eb")
}

/// Orchestrator with default settings over the CRM domain
pub fn setup_studio(client: Arc<ScriptedGenerationClient>, exporter: Arc<RecordingExporter>) -> StudioOrchestrator {
    setup_studio_with(GenerationSettings::default(), client, exporter)
}

pub fn setup_studio_with(
    settings: GenerationSettings,
    client: Arc<ScriptedGenerationClient>,
    exporter: Arc<RecordingExporter>,
) -> StudioOrchestrator {
    StudioOrchestrator::from_parts(settings, crm_domain(), client, exporter)
        .expect("test settings must be valid")
}
