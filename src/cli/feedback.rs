//! Delta feedback command
//!
//! Records one feedback signal against a playbook delta and reports the
//! recomputed confidence. Malformed ids fail parsing before the store is
//! opened; unknown ids are an error rather than a silent no-op.

use metis_core::{
    error::{MetisError, Result},
    types::{DeltaId, FeedbackSignal},
};
use std::path::PathBuf;

use super::helpers::{open_playbook, open_store};

/// Parse the user-facing signal name.
pub fn parse_signal(s: &str) -> Result<FeedbackSignal> {
    match s {
        "helpful" => Ok(FeedbackSignal::Helpful),
        "not-helpful" | "not_helpful" => Ok(FeedbackSignal::NotHelpful),
        "human" | "human-confirmed" => Ok(FeedbackSignal::HumanConfirmed),
        other => Err(anyhow::anyhow!(
            "unknown feedback signal '{other}' (expected helpful, not-helpful or human)"
        )
        .into()),
    }
}

/// Handle the feedback command.
pub fn handle(delta_id: String, signal: String, global_store: Option<PathBuf>) -> Result<()> {
    let signal = parse_signal(&signal)?;
    let id = DeltaId::from_string(&delta_id)?;
    let (store, config) = open_store(global_store)?;
    let (playbook, _corpus) = open_playbook(&store, &config);

    let confidence = playbook.with_deltas_mut(|deltas| {
        let delta = deltas
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| MetisError::DeltaNotFound(delta_id.clone()))?;
        delta.record_feedback(signal);
        Ok(delta.confidence)
    })?;

    println!(
        "Recorded {} for {}: confidence now {:.2}",
        signal, delta_id, confidence
    );
    Ok(())
}
