//! Session aggregate
//!
//! One user task from first prompt to reset: the current request, the active
//! batch, the selection, the navigation cursor and the refinement transcript.
//! Only the orchestrator mutates a session.

use crate::batch::{BatchPhase, FailureReport, GenerationBatch};
use crate::error::{Rejection, TransitionError};
use crate::types::{RequestDescription, SessionId, VariantId};
use crate::variant::{Variant, VariantOutcome, VariantStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use studio_artifact::GeneratedArtifact;

/// One refinement step, kept for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Feedback text as entered
    pub feedback: String,
    /// Variant the refinement started from
    pub refined_from: VariantId,
    pub at: DateTime<Utc>,
}

/// User-visible state of the studio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// No session
    Idle,
    /// Active batch has not settled
    Generating,
    /// Active batch settled with at least one success
    Ready { succeeded: usize },
    /// Every variant failed; retry or reset
    AllFailed(FailureReport),
}

impl SessionStatus {
    #[inline]
    #[must_use]
    pub fn is_generating(&self) -> bool {
        matches!(self, SessionStatus::Generating)
    }
}

/// Aggregate root for one user task
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    domain: String,
    request: Arc<RequestDescription>,
    batch: GenerationBatch,
    selected: Option<VariantId>,
    current_index: usize,
    transcript: Vec<TranscriptEntry>,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Create a session around its first batch
    #[must_use]
    pub fn new(domain: impl Into<String>, batch: GenerationBatch) -> Self {
        Self {
            id: SessionId::new(),
            domain: domain.into(),
            request: Arc::clone(batch.request()),
            batch,
            selected: None,
            current_index: 0,
            transcript: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Domain the session was started with
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Current request description
    #[inline]
    #[must_use]
    pub fn request(&self) -> &Arc<RequestDescription> {
        &self.request
    }

    /// Active batch
    #[inline]
    #[must_use]
    pub fn batch(&self) -> &GenerationBatch {
        &self.batch
    }

    #[inline]
    #[must_use]
    pub fn selected(&self) -> Option<VariantId> {
        self.selected
    }

    #[inline]
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[inline]
    #[must_use]
    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match self.batch.phase() {
            BatchPhase::Pending => SessionStatus::Generating,
            BatchPhase::Ready => SessionStatus::Ready {
                succeeded: self.batch.count(VariantStatus::Succeeded),
            },
            BatchPhase::AllFailed => match self.batch.failure_report() {
                Some(report) => SessionStatus::AllFailed(report),
                None => SessionStatus::Generating,
            },
        }
    }

    /// Guard for [`Session::select`]
    ///
    /// # Errors
    /// Returns the [`Rejection`] `select` would return
    pub fn can_select(&self, id: VariantId) -> Result<(), Rejection> {
        if id.batch != self.batch.id() {
            return Err(Rejection::NotInActiveBatch(id));
        }
        let variant = self.batch.get(id).ok_or(Rejection::UnknownVariant(id))?;
        match variant.status() {
            VariantStatus::Succeeded => Ok(()),
            VariantStatus::Pending => Err(Rejection::VariantPending(id)),
            VariantStatus::Failed => Err(Rejection::VariantFailed(id)),
        }
    }

    /// Select a succeeded variant of the active batch; a rejected call
    /// leaves the selection untouched.
    ///
    /// # Errors
    /// See [`Session::can_select`]
    pub fn select(&mut self, id: VariantId) -> Result<(), Rejection> {
        self.can_select(id)?;
        self.selected = Some(id);
        Ok(())
    }

    /// Selected variant, if any
    #[must_use]
    pub fn selected_variant(&self) -> Option<&Variant> {
        self.selected.and_then(|id| self.batch.get(id))
    }

    /// Artifact of the selected variant
    #[must_use]
    pub fn selected_artifact(&self) -> Option<&GeneratedArtifact> {
        self.selected_variant().and_then(Variant::artifact)
    }

    /// Variant under the navigation cursor
    #[must_use]
    pub fn current_variant(&self) -> Option<&Variant> {
        self.batch.variant(self.current_index)
    }

    /// Advance the cursor, wrapping to the first slot
    pub fn next(&mut self) -> usize {
        let len = self.batch.len();
        if len > 0 {
            self.current_index = (self.current_index + 1) % len;
        }
        self.current_index
    }

    /// Move the cursor back, wrapping to the last slot
    pub fn prev(&mut self) -> usize {
        let len = self.batch.len();
        if len > 0 {
            self.current_index = (self.current_index + len - 1) % len;
        }
        self.current_index
    }

    /// Swap in a freshly dispatched batch. Selection clears and the cursor
    /// returns to slot 0; the previous batch is dropped.
    pub(crate) fn replace_batch(&mut self, batch: GenerationBatch) {
        self.request = Arc::clone(batch.request());
        self.batch = batch;
        self.selected = None;
        self.current_index = 0;
    }

    pub(crate) fn push_transcript(&mut self, entry: TranscriptEntry) {
        self.transcript.push(entry);
    }

    pub(crate) fn settle_batch(&mut self, outcomes: Vec<VariantOutcome>) -> Result<(), TransitionError> {
        self.batch.settle(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;

    fn session() -> Session {
        let request = Arc::new(RequestDescription::new("build a CRM dashboard"));
        Session::new("crm", GenerationBatch::new(request, 3))
    }

    fn settle_mixed(session: &mut Session) {
        session
            .settle_batch(vec![
                VariantOutcome::Succeeded(GeneratedArtifact::new("<A/>").unwrap()),
                VariantOutcome::Failed(GenerationError::Backend("x".to_string())),
                VariantOutcome::Succeeded(GeneratedArtifact::new("<C/>").unwrap()),
            ])
            .unwrap();
    }

    #[test]
    fn new_session_is_generating() {
        let session = session();
        assert_eq!(session.status(), SessionStatus::Generating);
        assert!(session.selected().is_none());
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.domain(), "crm");
    }

    #[test]
    fn select_guards() {
        let mut session = session();
        let batch = session.batch().id();

        assert_eq!(
            session.select(VariantId::new(batch, 0)),
            Err(Rejection::VariantPending(VariantId::new(batch, 0)))
        );

        settle_mixed(&mut session);
        assert_eq!(session.status(), SessionStatus::Ready { succeeded: 2 });

        let failed = VariantId::new(batch, 1);
        assert_eq!(session.select(failed), Err(Rejection::VariantFailed(failed)));
        assert!(session.selected().is_none());

        let unknown = VariantId::new(batch, 7);
        assert_eq!(session.select(unknown), Err(Rejection::UnknownVariant(unknown)));

        session.select(VariantId::new(batch, 2)).unwrap();
        assert_eq!(session.selected_artifact().unwrap().source(), "<C/>");
    }

    #[test]
    fn navigation_wraps_both_ways() {
        let mut session = session();
        assert_eq!(session.prev(), 2);
        assert_eq!(session.next(), 0);
        assert_eq!(session.next(), 1);
        assert_eq!(session.next(), 2);
        assert_eq!(session.next(), 0);
        assert_eq!(session.current_variant().unwrap().slot(), 0);
    }

    #[test]
    fn replace_batch_clears_selection_and_cursor() {
        let mut session = session();
        settle_mixed(&mut session);
        let old = session.batch().id();
        session.select(VariantId::new(old, 0)).unwrap();
        session.next();

        let refined = Arc::new(RequestDescription::new("dark mode"));
        session.replace_batch(GenerationBatch::new(Arc::clone(&refined), 3));

        assert!(session.selected().is_none());
        assert_eq!(session.current_index(), 0);
        assert_ne!(session.batch().id(), old);
        assert_eq!(session.request(), &refined);
        assert_eq!(
            session.can_select(VariantId::new(old, 0)),
            Err(Rejection::NotInActiveBatch(VariantId::new(old, 0)))
        );
    }

    #[test]
    fn all_failed_status_carries_report() {
        let mut session = session();
        session
            .settle_batch(vec![
                VariantOutcome::Failed(GenerationError::Transport("reset".to_string())),
                VariantOutcome::Failed(GenerationError::Backend("500".to_string())),
                VariantOutcome::Failed(GenerationError::TimedOut { duration_secs: 120 }),
            ])
            .unwrap();

        match session.status() {
            SessionStatus::AllFailed(report) => {
                assert_eq!(report.errors.len(), 3);
                assert!(report.is_retryable());
            }
            other => panic!("expected AllFailed, got {other:?}"),
        }
    }
}
