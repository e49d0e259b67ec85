//! Generation batches
//!
//! A batch is an ordered, fixed-size set of variants sharing one request and
//! one dispatch timestamp. Its aggregate phase is a pure function of its
//! variants' statuses.

use crate::error::{GenerationError, TransitionError};
use crate::types::{BatchId, RequestDescription, VariantId};
use crate::variant::{Variant, VariantOutcome, VariantStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Aggregate phase of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchPhase {
    /// No success yet and at least one call outstanding
    Pending,
    /// At least one variant succeeded
    Ready,
    /// Every variant settled as a failure
    AllFailed,
}

/// Aggregate phase from variant statuses
///
/// An empty set is `Pending`: nothing has settled.
#[must_use]
pub fn aggregate_phase<I>(statuses: I) -> BatchPhase
where
    I: IntoIterator<Item = VariantStatus>,
{
    let mut any = false;
    let mut any_pending = false;
    for status in statuses {
        any = true;
        match status {
            VariantStatus::Succeeded => return BatchPhase::Ready,
            VariantStatus::Pending => any_pending = true,
            VariantStatus::Failed => {}
        }
    }
    if !any || any_pending {
        BatchPhase::Pending
    } else {
        BatchPhase::AllFailed
    }
}

/// Why a batch produced nothing usable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub batch: BatchId,
    /// Error per slot, in slot order
    pub errors: Vec<(usize, GenerationError)>,
}

impl FailureReport {
    /// Whether a retry has a chance of doing better
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.errors.iter().any(|(_, err)| err.is_retryable())
    }

    /// One line per slot, for display
    #[must_use]
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|(slot, err)| format!("variant {}: {err}", slot + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Fixed-size set of concurrently generated variants
#[derive(Debug, Clone)]
pub struct GenerationBatch {
    id: BatchId,
    request: Arc<RequestDescription>,
    dispatched_at: DateTime<Utc>,
    settled_at: Option<DateTime<Utc>>,
    variants: Vec<Variant>,
}

impl GenerationBatch {
    /// Create a batch of `size` pending variants
    #[must_use]
    pub fn new(request: Arc<RequestDescription>, size: usize) -> Self {
        let id = BatchId::new();
        Self {
            id,
            request,
            dispatched_at: Utc::now(),
            settled_at: None,
            variants: (0..size)
                .map(|slot| Variant::pending(VariantId::new(id, slot)))
                .collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> BatchId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn request(&self) -> &Arc<RequestDescription> {
        &self.request
    }

    #[inline]
    #[must_use]
    pub fn dispatched_at(&self) -> DateTime<Utc> {
        self.dispatched_at
    }

    #[inline]
    #[must_use]
    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.settled_at
    }

    #[inline]
    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Variant by slot index
    #[inline]
    #[must_use]
    pub fn variant(&self, slot: usize) -> Option<&Variant> {
        self.variants.get(slot)
    }

    /// Variant by id; `None` if the id names another batch
    #[inline]
    #[must_use]
    pub fn get(&self, id: VariantId) -> Option<&Variant> {
        if id.batch == self.id {
            self.variants.get(id.slot)
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> BatchPhase {
        aggregate_phase(self.variants.iter().map(Variant::status))
    }

    /// Whether every variant is terminal
    #[inline]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.variants.iter().all(|v| v.status().is_terminal())
    }

    /// Succeeded variants in slot order
    pub fn succeeded(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter().filter(|v| v.is_succeeded())
    }

    #[inline]
    #[must_use]
    pub fn count(&self, status: VariantStatus) -> usize {
        self.variants.iter().filter(|v| v.status() == status).count()
    }

    /// Settle every slot at once; outcome `i` lands in slot `i`.
    ///
    /// Validation happens before any slot is touched, so a rejected call
    /// leaves the batch unchanged.
    ///
    /// # Errors
    /// - [`TransitionError::OutcomeCountMismatch`] if `outcomes.len()` differs from the batch size
    /// - [`TransitionError::IllegalTransition`] if any slot already settled
    pub fn settle(&mut self, outcomes: Vec<VariantOutcome>) -> Result<(), TransitionError> {
        if outcomes.len() != self.variants.len() {
            return Err(TransitionError::OutcomeCountMismatch {
                expected: self.variants.len(),
                actual: outcomes.len(),
            });
        }
        for (variant, outcome) in self.variants.iter().zip(&outcomes) {
            crate::variant::validate_transition(variant.status(), outcome.status())?;
        }
        for (variant, outcome) in self.variants.iter_mut().zip(outcomes) {
            variant.settle(outcome)?;
        }
        self.settled_at = Some(Utc::now());
        Ok(())
    }

    /// Failure report when every variant failed
    #[must_use]
    pub fn failure_report(&self) -> Option<FailureReport> {
        if self.phase() != BatchPhase::AllFailed {
            return None;
        }
        Some(FailureReport {
            batch: self.id,
            errors: self
                .variants
                .iter()
                .filter_map(|v| v.error().map(|err| (v.slot(), err.clone())))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_artifact::GeneratedArtifact;

    fn batch(size: usize) -> GenerationBatch {
        GenerationBatch::new(Arc::new(RequestDescription::new("quiz app")), size)
    }

    fn ok(source: &str) -> VariantOutcome {
        VariantOutcome::Succeeded(GeneratedArtifact::new(source).unwrap())
    }

    fn fail(msg: &str) -> VariantOutcome {
        VariantOutcome::Failed(GenerationError::Backend(msg.to_string()))
    }

    #[test]
    fn new_batch_is_all_pending() {
        let batch = batch(3);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.phase(), BatchPhase::Pending);
        assert_eq!(batch.count(VariantStatus::Pending), 3);
        assert!(!batch.is_settled());
        assert!(batch.settled_at().is_none());
    }

    #[test]
    fn slots_are_assigned_in_order() {
        let batch = batch(3);
        for (i, variant) in batch.variants().iter().enumerate() {
            assert_eq!(variant.slot(), i);
            assert_eq!(variant.id().batch, batch.id());
        }
    }

    #[test]
    fn settle_writes_outcome_i_to_slot_i() {
        let mut batch = batch(3);
        batch.settle(vec![ok("<A/>"), fail("x"), ok("<C/>")]).unwrap();

        assert_eq!(batch.variant(0).unwrap().artifact().unwrap().source(), "<A/>");
        assert_eq!(batch.variant(1).unwrap().status(), VariantStatus::Failed);
        assert_eq!(batch.variant(2).unwrap().artifact().unwrap().source(), "<C/>");
        assert_eq!(batch.phase(), BatchPhase::Ready);
        assert!(batch.is_settled());
        assert!(batch.settled_at().is_some());
    }

    #[test]
    fn settle_rejects_wrong_count() {
        let mut batch = batch(3);
        let err = batch.settle(vec![ok("<A/>")]).unwrap_err();
        assert_eq!(
            err,
            TransitionError::OutcomeCountMismatch {
                expected: 3,
                actual: 1
            }
        );
        assert_eq!(batch.phase(), BatchPhase::Pending);
    }

    #[test]
    fn settle_twice_is_rejected_without_changes() {
        let mut batch = batch(2);
        batch.settle(vec![fail("a"), fail("b")]).unwrap();
        assert!(batch.settle(vec![ok("<A/>"), ok("<B/>")]).is_err());
        assert_eq!(batch.phase(), BatchPhase::AllFailed);
    }

    #[test]
    fn all_failed_produces_report() {
        let mut batch = batch(3);
        batch
            .settle(vec![
                fail("one"),
                VariantOutcome::Failed(GenerationError::Refused("policy".to_string())),
                fail("three"),
            ])
            .unwrap();

        let report = batch.failure_report().unwrap();
        assert_eq!(report.batch, batch.id());
        assert_eq!(report.errors.len(), 3);
        assert!(report.is_retryable());
        assert!(report.summary().contains("variant 2: request refused: policy"));
    }

    #[test]
    fn ready_batch_has_no_failure_report() {
        let mut batch = batch(2);
        batch.settle(vec![fail("a"), ok("<B/>")]).unwrap();
        assert!(batch.failure_report().is_none());
        assert_eq!(batch.succeeded().count(), 1);
    }

    #[test]
    fn get_checks_batch_identity() {
        let batch = batch(3);
        let foreign = VariantId::new(BatchId::new(), 0);
        assert!(batch.get(foreign).is_none());
        assert!(batch.get(VariantId::new(batch.id(), 2)).is_some());
        assert!(batch.get(VariantId::new(batch.id(), 3)).is_none());
    }

    #[test]
    fn aggregate_phase_rules() {
        use VariantStatus::*;
        assert_eq!(aggregate_phase(Vec::<VariantStatus>::new()), BatchPhase::Pending);
        assert_eq!(aggregate_phase([Pending, Pending]), BatchPhase::Pending);
        assert_eq!(aggregate_phase([Failed, Pending]), BatchPhase::Pending);
        assert_eq!(aggregate_phase([Failed, Succeeded]), BatchPhase::Ready);
        assert_eq!(aggregate_phase([Pending, Succeeded]), BatchPhase::Ready);
        assert_eq!(aggregate_phase([Failed, Failed, Failed]), BatchPhase::AllFailed);
    }
}
