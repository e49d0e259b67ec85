//! Argument parsing helpers and terminal output for the `studio` binary

use anyhow::{bail, Context, Result};
use std::fmt::Write as _;
use studio_core::{
    BatchPhase, GenerationBatch, ImageRole, ReferenceImage, SessionStatus, VariantId, VariantStatus,
};

/// Parse `role:location`, e.g. `style:https://img.example/a.png`
///
/// # Errors
/// Fails on a missing separator, an unknown role or an empty location
pub fn parse_image(raw: &str) -> Result<ReferenceImage> {
    let (role, location) = raw
        .split_once(':')
        .with_context(|| format!("expected <role>:<location>, got {raw:?}"))?;
    let role: ImageRole = role.parse().map_err(anyhow::Error::msg)?;
    if location.trim().is_empty() {
        bail!("image location is empty in {raw:?}");
    }
    Ok(ReferenceImage::new(role, location.trim()))
}

/// Variant to carry forward: the requested 1-based slot, else the first success
///
/// # Errors
/// Fails when the requested slot is out of range or nothing succeeded
pub fn pick_variant(batch: &GenerationBatch, requested: Option<usize>) -> Result<VariantId> {
    if let Some(slot) = requested {
        let index = slot.checked_sub(1).context("slots are numbered from 1")?;
        let variant = batch
            .variant(index)
            .with_context(|| format!("slot {slot} does not exist in a batch of {}", batch.len()))?;
        return Ok(variant.id());
    }
    batch
        .succeeded()
        .next()
        .map(studio_core::Variant::id)
        .context("no variant succeeded")
}

/// One line per slot plus a status line
#[must_use]
pub fn summarize(batch: &GenerationBatch, status: &SessionStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "batch {} ({} variants)", batch.id(), batch.len());
    for variant in batch.variants() {
        let slot = variant.slot() + 1;
        let line = match variant.status() {
            VariantStatus::Pending => format!("  [{slot}] pending"),
            VariantStatus::Succeeded => {
                let preview = variant
                    .artifact()
                    .and_then(|a| a.preview())
                    .map_or_else(|| "no preview available".to_string(), |p| p.as_str().to_string());
                let lines = variant.artifact().map_or(0, |a| a.source().lines().count());
                format!("  [{slot}] ok, {lines} lines, {preview}")
            }
            VariantStatus::Failed => {
                let err = variant.error().map(ToString::to_string).unwrap_or_default();
                format!("  [{slot}] failed: {err}")
            }
        };
        let _ = writeln!(out, "{line}");
    }
    let status_line = match status {
        SessionStatus::Idle => "idle".to_string(),
        SessionStatus::Generating => "generating".to_string(),
        SessionStatus::Ready { succeeded } => format!("ready: {succeeded} usable"),
        SessionStatus::AllFailed(report) if report.is_retryable() => {
            "all variants failed; retry may help".to_string()
        }
        SessionStatus::AllFailed(_) => "all variants failed".to_string(),
    };
    let _ = writeln!(out, "{status_line}");
    out
}

/// Whether the phase allows going on
#[must_use]
pub fn is_usable(phase: Option<BatchPhase>) -> bool {
    phase == Some(BatchPhase::Ready)
}
