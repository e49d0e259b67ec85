//! Error types for Studio Core
//!
//! Failures are contained at the smallest scope that keeps the session useful:
//! - [`GenerationError`]: one variant failed, recorded on that variant only
//! - [`Rejection`]: a guarded precondition did not hold, state is unchanged
//! - [`StudioError`]: an operation could not be carried out at all
//! - [`TransitionError`]: the variant/batch state machine was misused
//! - [`ExportError`]: the export collaborator failed (logged, never surfaced)
//! - [`ConfigError`]: configuration could not be loaded or is inconsistent

use crate::types::VariantId;
use crate::variant::VariantStatus;
use std::path::PathBuf;

/// Operation-level error
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    /// Precondition did not hold; nothing changed
    #[error("operation rejected: {0}")]
    Rejected(#[from] Rejection),

    /// Configuration problem (unknown domain, invalid settings)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dispatch needs a Tokio runtime to spawn generation calls on
    #[error("no async runtime available to dispatch generation")]
    NoRuntime,
}

impl StudioError {
    /// Check if error is a guarded precondition rather than a fault
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Guarded precondition violations
///
/// Callers are expected to disable the triggering affordance instead of
/// surfacing these; the orchestrator's `can_*` queries return them directly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// No session has been started
    #[error("no active session")]
    NoSession,

    /// Request has neither a goal nor an attached image
    #[error("request needs a goal or an attached image")]
    EmptyRequest,

    /// Variant id names a batch that is not the active one
    #[error("variant {0} does not belong to the active batch")]
    NotInActiveBatch(VariantId),

    /// Slot index is outside the active batch
    #[error("variant {0} does not exist")]
    UnknownVariant(VariantId),

    /// Variant has not settled yet
    #[error("variant {0} is still pending")]
    VariantPending(VariantId),

    /// Variant settled as a failure
    #[error("variant {0} failed")]
    VariantFailed(VariantId),

    /// Refinement requires a selected variant
    #[error("no variant is selected")]
    NothingSelected,

    /// Refinement requires feedback text
    #[error("feedback text is empty")]
    EmptyFeedback,
}

/// Per-variant generation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Backend answered with an error
    #[error("backend error: {0}")]
    Backend(String),

    /// Backend refused the request (policy, quota, malformed input)
    #[error("request refused: {0}")]
    Refused(String),

    /// Backend could not be reached
    #[error("transport error: {0}")]
    Transport(String),

    /// Call did not answer within the configured bound
    #[error("generation timed out after {duration_secs}s")]
    TimedOut { duration_secs: u64 },

    /// Backend answered but the payload is unusable
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    /// Client implementation panicked while generating
    #[error("generation call panicked: {0}")]
    Panicked(String),
}

impl GenerationError {
    /// Check if a fresh attempt may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Backend(_) | Self::Transport(_) | Self::TimedOut { .. } | Self::InvalidArtifact(_)
        )
    }
}

impl From<studio_artifact::ArtifactError> for GenerationError {
    fn from(err: studio_artifact::ArtifactError) -> Self {
        Self::InvalidArtifact(err.to_string())
    }
}

/// Variant/batch state machine misuse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Transition not allowed from the current state
    #[error("illegal variant transition: {from:?} -> {to:?}")]
    IllegalTransition {
        from: VariantStatus,
        to: VariantStatus,
    },

    /// Settle called with the wrong number of outcomes
    #[error("expected {expected} outcomes, got {actual}")]
    OutcomeCountMismatch { expected: usize, actual: usize },
}

/// Export collaborator failure
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Target cannot handle this artifact (e.g. no deployment to open)
    #[error("export target unavailable: {0}")]
    Unavailable(String),

    /// Filesystem failure while writing the artifact
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other collaborator failure
    #[error("export failed: {0}")]
    Failed(String),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be rendered back to TOML
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Values are individually valid but inconsistent
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Requested domain is not configured
    #[error("unknown domain: {0}")]
    UnknownDomain(String),
}
