//! Variant state machine
//!
//! `Pending -> Succeeded` or `Pending -> Failed`. Nothing is reversible and
//! nothing skips `Pending`: a variant is born pending when its batch is
//! dispatched and settles exactly once.

use crate::error::{GenerationError, TransitionError};
use crate::types::VariantId;
use serde::{Deserialize, Serialize};
use studio_artifact::GeneratedArtifact;

/// Status of a variant, without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantStatus {
    Pending,
    Succeeded,
    Failed,
}

impl VariantStatus {
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VariantStatus::Pending)
    }
}

/// States reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: VariantStatus) -> &'static [VariantStatus] {
    use VariantStatus::*;
    match from {
        Pending => &[Succeeded, Failed],
        Succeeded | Failed => &[],
    }
}

/// Validates a variant state transition.
///
/// # Errors
/// Returns [`TransitionError::IllegalTransition`] for anything other than
/// settling a pending variant
pub fn validate_transition(from: VariantStatus, to: VariantStatus) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError::IllegalTransition { from, to })
    }
}

/// Terminal result of one generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantOutcome {
    Succeeded(GeneratedArtifact),
    Failed(GenerationError),
}

impl VariantOutcome {
    #[inline]
    #[must_use]
    pub fn status(&self) -> VariantStatus {
        match self {
            VariantOutcome::Succeeded(_) => VariantStatus::Succeeded,
            VariantOutcome::Failed(_) => VariantStatus::Failed,
        }
    }
}

impl From<Result<GeneratedArtifact, GenerationError>> for VariantOutcome {
    fn from(result: Result<GeneratedArtifact, GenerationError>) -> Self {
        match result {
            Ok(artifact) => VariantOutcome::Succeeded(artifact),
            Err(err) => VariantOutcome::Failed(err),
        }
    }
}

/// One candidate generation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    id: VariantId,
    outcome: Option<VariantOutcome>,
}

impl Variant {
    /// Create a pending variant
    #[inline]
    #[must_use]
    pub fn pending(id: VariantId) -> Self {
        Self { id, outcome: None }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> VariantId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn slot(&self) -> usize {
        self.id.slot
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> VariantStatus {
        self.outcome
            .as_ref()
            .map_or(VariantStatus::Pending, VariantOutcome::status)
    }

    #[inline]
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.status() == VariantStatus::Succeeded
    }

    /// Artifact, if the variant succeeded
    #[inline]
    #[must_use]
    pub fn artifact(&self) -> Option<&GeneratedArtifact> {
        match &self.outcome {
            Some(VariantOutcome::Succeeded(artifact)) => Some(artifact),
            _ => None,
        }
    }

    /// Error, if the variant failed
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&GenerationError> {
        match &self.outcome {
            Some(VariantOutcome::Failed(err)) => Some(err),
            _ => None,
        }
    }

    /// Settle the variant with its terminal outcome
    ///
    /// # Errors
    /// Returns [`TransitionError::IllegalTransition`] if already settled
    pub fn settle(&mut self, outcome: VariantOutcome) -> Result<(), TransitionError> {
        validate_transition(self.status(), outcome.status())?;
        self.outcome = Some(outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BatchId;

    fn pending() -> Variant {
        Variant::pending(VariantId::new(BatchId::new(), 0))
    }

    #[test]
    fn pending_settles_to_success() {
        let mut variant = pending();
        let artifact = GeneratedArtifact::new("<App />").unwrap();
        variant
            .settle(VariantOutcome::Succeeded(artifact.clone()))
            .unwrap();

        assert_eq!(variant.status(), VariantStatus::Succeeded);
        assert_eq!(variant.artifact(), Some(&artifact));
        assert!(variant.error().is_none());
    }

    #[test]
    fn pending_settles_to_failure() {
        let mut variant = pending();
        variant
            .settle(VariantOutcome::Failed(GenerationError::Backend("502".to_string())))
            .unwrap();

        assert_eq!(variant.status(), VariantStatus::Failed);
        assert!(variant.artifact().is_none());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut variant = pending();
        variant
            .settle(VariantOutcome::Failed(GenerationError::Backend("x".to_string())))
            .unwrap();

        let err = variant
            .settle(VariantOutcome::Succeeded(GeneratedArtifact::new("<App />").unwrap()))
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::IllegalTransition {
                from: VariantStatus::Failed,
                to: VariantStatus::Succeeded,
            }
        );
        assert_eq!(variant.status(), VariantStatus::Failed);
    }

    #[test]
    fn nothing_returns_to_pending() {
        for from in [VariantStatus::Pending, VariantStatus::Succeeded, VariantStatus::Failed] {
            assert!(validate_transition(from, VariantStatus::Pending).is_err());
        }
    }

    #[test]
    fn outcome_from_result() {
        let ok: VariantOutcome = Ok(GeneratedArtifact::new("<A/>").unwrap()).into();
        let err: VariantOutcome = Err(GenerationError::Transport("reset".to_string())).into();
        assert_eq!(ok.status(), VariantStatus::Succeeded);
        assert_eq!(err.status(), VariantStatus::Failed);
    }
}
