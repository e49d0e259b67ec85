//! Studio orchestrator
//!
//! Owns the session and everything reachable from it:
//! - Builds request descriptions into batches and dispatches them
//! - Applies settled batches, discarding results of superseded ones
//! - Guards selection and refinement
//! - Hands artifacts to the export collaborator
//!
//! `start`, `retry` and `refine` return as soon as the batch is dispatched.
//! Results are observed by driving [`StudioOrchestrator::next_settled`] or
//! [`StudioOrchestrator::settle_active`].

use crate::batch::{BatchPhase, GenerationBatch};
use crate::client::{GenerationClient, GenerationRequest};
use crate::config::{DomainConfig, GenerationSettings, StudioConfig};
use crate::dispatch::{BatchDispatcher, DispatchStats, SettledBatch};
use crate::error::{Rejection, StudioError};
use crate::export::{ArtifactExporter, ExportRequest, ExportTarget};
use crate::refinement::RefinementController;
use crate::session::{Session, SessionStatus, TranscriptEntry};
use crate::types::{BatchId, RequestDescription, VariantId};
use crate::variant::{Variant, VariantStatus};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What happened to a settled batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Batch was active; its variants now carry their outcomes
    Applied { batch: BatchId, phase: BatchPhase },
    /// Batch was superseded or the session reset; results dropped
    Stale(BatchId),
}

impl SettleOutcome {
    #[inline]
    #[must_use]
    pub fn batch(&self) -> BatchId {
        match self {
            SettleOutcome::Applied { batch, .. } | SettleOutcome::Stale(batch) => *batch,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, SettleOutcome::Stale(_))
    }
}

/// Generic studio orchestrator, parameterized by a domain configuration
pub struct StudioOrchestrator {
    settings: GenerationSettings,
    domain: DomainConfig,
    dispatcher: BatchDispatcher,
    exporter: Arc<dyn ArtifactExporter>,
    refiner: RefinementController,
    session: Option<Session>,
}

impl std::fmt::Debug for StudioOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudioOrchestrator")
            .field("settings", &self.settings)
            .field("domain", &self.domain.name)
            .field("dispatcher", &self.dispatcher)
            .field("session", &self.session.as_ref().map(Session::id))
            .finish_non_exhaustive()
    }
}

impl StudioOrchestrator {
    /// Create an orchestrator for a configured domain
    ///
    /// # Errors
    /// Returns [`StudioError::Config`] if the configuration is invalid or the
    /// domain is unknown
    pub fn new(
        config: &StudioConfig,
        domain: &str,
        client: Arc<dyn GenerationClient>,
        exporter: Arc<dyn ArtifactExporter>,
    ) -> Result<Self, StudioError> {
        config.validate()?;
        let domain = config.domain(domain)?;
        Self::from_parts(config.generation, domain, client, exporter)
    }

    /// Create from settings and a single domain
    ///
    /// # Errors
    /// Returns [`StudioError::Config`] if the settings fail
    /// [`GenerationSettings::validate`], e.g. a zero batch size
    pub fn from_parts(
        settings: GenerationSettings,
        domain: DomainConfig,
        client: Arc<dyn GenerationClient>,
        exporter: Arc<dyn ArtifactExporter>,
    ) -> Result<Self, StudioError> {
        settings.validate()?;
        tracing::debug!(
            domain = %domain.name,
            batch_size = settings.batch_size,
            max_in_flight = settings.max_in_flight_batches,
            "Creating studio orchestrator"
        );
        Ok(Self {
            dispatcher: BatchDispatcher::new(client, &settings),
            settings,
            domain,
            exporter,
            refiner: RefinementController::new(),
            session: None,
        })
    }

    #[inline]
    #[must_use]
    pub fn domain(&self) -> &DomainConfig {
        &self.domain
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Batch tasks not yet collected, active or superseded
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.session
            .as_ref()
            .map_or(SessionStatus::Idle, Session::status)
    }

    /// Start a new session and dispatch its first batch.
    ///
    /// An existing session is replaced; its in-flight calls become stale.
    ///
    /// # Errors
    /// - [`Rejection::EmptyRequest`] if the request has neither goal nor image
    /// - [`StudioError::NoRuntime`] outside a Tokio runtime
    pub fn start(&mut self, request: RequestDescription) -> Result<BatchId, StudioError> {
        request.validate()?;
        let batch = self.dispatch(Arc::new(request))?;
        let batch_id = batch.id();

        if let Some(previous) = self.session.take() {
            tracing::info!(session = %previous.id(), "Replacing session");
        }
        let session = Session::new(self.domain.name.clone(), batch);
        tracing::info!(session = %session.id(), domain = %self.domain.name, "Session started");
        self.session = Some(session);
        Ok(batch_id)
    }

    /// Dispatch a fresh batch for the current request, discarding the active
    /// batch and the selection.
    ///
    /// # Errors
    /// - [`Rejection::NoSession`] before `start`
    /// - [`StudioError::NoRuntime`] outside a Tokio runtime
    pub fn retry(&mut self) -> Result<BatchId, StudioError> {
        let request = match &self.session {
            Some(session) => Arc::clone(session.request()),
            None => return Err(Rejection::NoSession.into()),
        };
        let batch = self.dispatch(request)?;
        let batch_id = batch.id();
        if let Some(session) = self.session.as_mut() {
            tracing::info!(session = %session.id(), superseded = %session.batch().id(), "Retrying");
            session.replace_batch(batch);
        }
        Ok(batch_id)
    }

    /// Select a succeeded variant of the active batch.
    ///
    /// # Errors
    /// Returns the guard's [`Rejection`]; the selection is unchanged
    pub fn select(&mut self, id: VariantId) -> Result<(), Rejection> {
        let session = self.session.as_mut().ok_or(Rejection::NoSession)?;
        if let Err(rejection) = session.select(id) {
            tracing::debug!(variant = %id, %rejection, "Selection rejected");
            return Err(rejection);
        }
        tracing::info!(variant = %id, "Variant selected");
        Ok(())
    }

    /// Refine the selected variant with feedback and dispatch the result.
    ///
    /// The refined request replaces the session's request and the transcript
    /// gains one entry.
    ///
    /// # Errors
    /// - [`Rejection::NoSession`], [`Rejection::NothingSelected`] or
    ///   [`Rejection::EmptyFeedback`] when the guard fails
    /// - [`StudioError::NoRuntime`] outside a Tokio runtime
    pub fn refine(&mut self, feedback: &str) -> Result<BatchId, StudioError> {
        let (refined, from) = {
            let session = self.session.as_ref().ok_or(Rejection::NoSession)?;
            let from = session.selected().ok_or(Rejection::NothingSelected)?;
            let artifact = session.selected_artifact().ok_or(Rejection::NothingSelected)?;
            let refined = self
                .refiner
                .refine(artifact, feedback, session.request().tier())?;
            (refined, from)
        };

        let batch = self.dispatch(Arc::new(refined))?;
        let batch_id = batch.id();
        if let Some(session) = self.session.as_mut() {
            session.push_transcript(TranscriptEntry {
                feedback: feedback.to_string(),
                refined_from: from,
                at: Utc::now(),
            });
            session.replace_batch(batch);
            tracing::info!(
                session = %session.id(),
                refined_from = %from,
                steps = session.transcript().len(),
                "Refinement dispatched"
            );
        }
        Ok(batch_id)
    }

    /// Hand a succeeded artifact to the exporter, defaulting to the selected
    /// variant.
    ///
    /// Does nothing and returns `None` when there is no succeeded artifact to
    /// export. Export failures are logged, never returned.
    pub fn export_artifact(
        &self,
        variant: Option<VariantId>,
        target: ExportTarget,
    ) -> Option<JoinHandle<()>> {
        let session = self.session.as_ref()?;
        let id = variant.or_else(|| session.selected())?;
        if session.can_select(id).is_err() {
            tracing::debug!(variant = %id, "Nothing to export");
            return None;
        }
        let artifact = session.batch().get(id)?.artifact()?.clone();
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!(variant = %id, "No runtime for export handoff");
                return None;
            }
        };

        let exporter = Arc::clone(&self.exporter);
        tracing::info!(variant = %id, %target, "Exporting artifact");
        Some(runtime.spawn(async move {
            let request = ExportRequest {
                target,
                variant: id,
                artifact,
            };
            if let Err(err) = exporter.export(request).await {
                tracing::warn!(variant = %id, %target, error = %err, "Export failed");
            }
        }))
    }

    /// Drop the session. In-flight calls are left to finish and discarded.
    pub fn reset(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!(session = %session.id(), "Session reset");
        }
    }

    /// Move the preview cursor forward, wrapping
    pub fn next(&mut self) -> Option<usize> {
        self.session.as_mut().map(Session::next)
    }

    /// Move the preview cursor back, wrapping
    pub fn prev(&mut self) -> Option<usize> {
        self.session.as_mut().map(Session::prev)
    }

    /// Variant under the preview cursor
    #[must_use]
    pub fn current_variant(&self) -> Option<&Variant> {
        self.session.as_ref().and_then(Session::current_variant)
    }

    /// # Errors
    /// Returns the [`Rejection`] `select(id)` would return
    pub fn can_select(&self, id: VariantId) -> Result<(), Rejection> {
        self.session
            .as_ref()
            .ok_or(Rejection::NoSession)?
            .can_select(id)
    }

    /// # Errors
    /// Returns [`Rejection::NoSession`] or [`Rejection::NothingSelected`]
    pub fn can_refine(&self) -> Result<(), Rejection> {
        let session = self.session.as_ref().ok_or(Rejection::NoSession)?;
        session
            .selected_artifact()
            .map(|_| ())
            .ok_or(Rejection::NothingSelected)
    }

    /// # Errors
    /// Returns [`Rejection::NoSession`] before `start`
    pub fn can_retry(&self) -> Result<(), Rejection> {
        self.session.as_ref().map(|_| ()).ok_or(Rejection::NoSession)
    }

    /// Wait for the next settled batch and apply it if still active.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_settled(&mut self) -> Option<SettleOutcome> {
        let settled = self.dispatcher.next_settled().await?;
        Some(self.apply(settled))
    }

    /// Apply an already settled batch without waiting
    pub fn poll_settled(&mut self) -> Option<SettleOutcome> {
        let settled = self.dispatcher.try_next_settled()?;
        Some(self.apply(settled))
    }

    /// Drive settling until the active batch is settled.
    ///
    /// Returns `None` without a session.
    pub async fn settle_active(&mut self) -> Option<BatchPhase> {
        loop {
            let session = self.session.as_ref()?;
            if session.batch().is_settled() {
                return Some(session.batch().phase());
            }
            if self.next_settled().await.is_none() {
                let phase = self.session.as_ref().map(|s| s.batch().phase());
                tracing::error!("Active batch has no outstanding calls but never settled");
                return phase;
            }
        }
    }

    fn apply(&mut self, settled: SettledBatch) -> SettleOutcome {
        let SettledBatch {
            batch,
            outcomes,
            elapsed,
        } = settled;

        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.batch().id() == batch && !s.batch().is_settled())
        else {
            tracing::debug!(%batch, "Discarding stale batch");
            return SettleOutcome::Stale(batch);
        };

        if let Err(err) = session.settle_batch(outcomes) {
            tracing::error!(%batch, error = %err, "Could not apply settled batch");
            return SettleOutcome::Stale(batch);
        }

        let current = session.batch();
        let phase = current.phase();
        let succeeded = current.count(VariantStatus::Succeeded);
        let failed = current.count(VariantStatus::Failed);
        if phase == BatchPhase::AllFailed {
            tracing::error!(%batch, failed, elapsed_ms = elapsed.as_millis(), "Every variant failed");
        } else {
            tracing::info!(
                %batch,
                succeeded,
                failed,
                elapsed_ms = elapsed.as_millis(),
                "Batch settled"
            );
        }
        SettleOutcome::Applied { batch, phase }
    }

    fn dispatch(&mut self, request: Arc<RequestDescription>) -> Result<GenerationBatch, StudioError> {
        let size = self.settings.batch_size;
        let batch = GenerationBatch::new(Arc::clone(&request), size);
        let model = self.domain.models.model_for(request.tier()).to_string();
        let requests = (0..size)
            .map(|slot| GenerationRequest {
                batch: batch.id(),
                slot,
                batch_size: size,
                model: model.clone(),
                instructions: self.domain.instruction_template.clone(),
                description: Arc::clone(&request),
            })
            .collect();

        self.dispatcher.dispatch(batch.id(), requests)?;
        tracing::info!(
            batch = %batch.id(),
            size,
            tier = %request.tier(),
            model = %model,
            "Dispatched batch"
        );
        Ok(batch)
    }
}
