//! Refinement controller
//!
//! Builds the next [`RequestDescription`] from a prior artifact and free-text
//! feedback. The backend treats refinement as "regenerate with more context",
//! so this is prompt construction only: the artifact is embedded verbatim and
//! never inspected.

use crate::error::Rejection;
use crate::types::{QualityTier, RequestDescription};
use studio_artifact::GeneratedArtifact;

const PREAMBLE: &str = "Refine the existing UI component below.";
const PRESERVE_INSTRUCTION: &str = "Produce a new version of this component. Preserve everything \
that works and change only what the feedback asks for. Return the complete component source.";

/// Pure request builder for refinement steps
#[derive(Debug, Clone, Copy, Default)]
pub struct RefinementController;

impl RefinementController {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Build the refined request.
    ///
    /// The result depends only on the arguments. Attachments and external
    /// context of the previous request are not carried over: the artifact
    /// already reflects them.
    ///
    /// # Errors
    /// Returns [`Rejection::EmptyFeedback`] if `feedback` is blank
    pub fn refine(
        &self,
        artifact: &GeneratedArtifact,
        feedback: &str,
        tier: QualityTier,
    ) -> Result<RequestDescription, Rejection> {
        if feedback.trim().is_empty() {
            return Err(Rejection::EmptyFeedback);
        }
        let goal = format!(
            "{PREAMBLE}\n\n\
             Current component:\n```\n{source}\n```\n\n\
             Feedback:\n{feedback}\n\n\
             {PRESERVE_INSTRUCTION}",
            source = artifact.source(),
        );
        Ok(RequestDescription::new(goal).with_tier(tier))
    }
}
