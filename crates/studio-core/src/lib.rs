//! Studio Core - multi-variant generation orchestrator
//!
//! Turns one request into a batch of concurrently generated candidates, lets
//! the user pick one, and regenerates from feedback:
//! - Dispatches N generation calls at once and settles them as one update
//! - Isolates failures per variant; a batch with no success is recoverable
//! - Discards late results from superseded batches
//! - Builds refinement requests deterministically from artifact and feedback
//!
//! # Example
//!
//! ```rust,ignore
//! use studio_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(client: Arc<dyn GenerationClient>) -> Result<(), StudioError> {
//! let mut studio = StudioOrchestrator::new(
//!     &StudioConfig::new(),
//!     DEFAULT_DOMAIN,
//!     client,
//!     Arc::new(NoopExporter),
//! )?;
//!
//! let batch = studio.start(RequestDescription::new("build a CRM dashboard"))?;
//! if studio.settle_active().await == Some(BatchPhase::Ready) {
//!     studio.select(VariantId::new(batch, 0))?;
//!     studio.refine("make it dark mode")?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod batch;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod orchestrator;
pub mod refinement;
pub mod session;
pub mod types;
pub mod variant;

pub use batch::{aggregate_phase, BatchPhase, FailureReport, GenerationBatch};
pub use client::{GenerationClient, GenerationOutput, GenerationRequest};
pub use config::{DomainConfig, GenerationSettings, QualityTierModelMap, StudioConfig, DEFAULT_DOMAIN};
pub use dispatch::{BatchDispatcher, DispatchStats, SettledBatch};
pub use error::{ConfigError, ExportError, GenerationError, Rejection, StudioError, TransitionError};
pub use export::{
    ArtifactExporter, ArtifactStore, ExportRequest, ExportTarget, InMemoryArtifactStore,
    LibraryExporter, NoopExporter, SavedArtifact,
};
pub use orchestrator::{SettleOutcome, StudioOrchestrator};
pub use refinement::RefinementController;
pub use session::{Session, SessionStatus, TranscriptEntry};
pub use types::{
    BatchId, ExternalContext, ImageRole, QualityTier, ReferenceImage, RequestDescription,
    SessionId, VariantId,
};
pub use variant::{Variant, VariantOutcome, VariantStatus};

pub use studio_artifact::{ContentHash, DeploymentHandle, GeneratedArtifact, PreviewHandle};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Studio Core
    pub use crate::{
        ArtifactExporter, BatchPhase, DomainConfig, ExportTarget, GeneratedArtifact,
        GenerationClient, GenerationError, GenerationOutput, GenerationRequest, NoopExporter,
        QualityTier, Rejection, RequestDescription, SessionStatus, StudioConfig, StudioError,
        StudioOrchestrator, VariantId, VariantStatus, DEFAULT_DOMAIN,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn status() -> impl Strategy<Value = VariantStatus> {
        prop_oneof![
            Just(VariantStatus::Pending),
            Just(VariantStatus::Succeeded),
            Just(VariantStatus::Failed),
        ]
    }

    proptest! {
        #[test]
        fn prop_any_success_means_ready(statuses in proptest::collection::vec(status(), 1..8)) {
            let phase = aggregate_phase(statuses.iter().copied());
            let any_success = statuses.contains(&VariantStatus::Succeeded);
            prop_assert_eq!(phase == BatchPhase::Ready, any_success);
        }

        #[test]
        fn prop_all_failed_only_when_every_slot_failed(statuses in proptest::collection::vec(status(), 1..8)) {
            let phase = aggregate_phase(statuses.iter().copied());
            let all_failed = statuses.iter().all(|s| *s == VariantStatus::Failed);
            prop_assert_eq!(phase == BatchPhase::AllFailed, all_failed);
        }
    }
}
