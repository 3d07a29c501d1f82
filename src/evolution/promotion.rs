//! Candidate promotion pass.
//!
//! Candidates whose confidence has reached the promotion threshold
//! graduate from the staging store into the active playbook. A graduating
//! candidate that matches an existing delta merges into it instead of
//! duplicating the lesson; either way one markdown fragment is produced
//! for downstream doc sync. Candidates below the threshold stay staged.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::LearningConfig;
use crate::dedup;
use crate::error::Result;
use crate::render;
use crate::schema;
use crate::store::{PatternCorpus, Playbook};
use crate::types::DeltaId;

/// Markdown output for one promoted (or merge-refreshed) delta.
#[derive(Debug, Clone)]
pub struct PromotedFragment {
    pub delta_id: DeltaId,
    pub markdown: String,
}

#[derive(Debug)]
pub struct PromotionReport {
    /// Candidates examined.
    pub scanned: usize,
    /// Candidates that became new deltas.
    pub promoted: usize,
    /// Candidates that merged into an existing delta.
    pub merged: usize,
    pub fragments: Vec<PromotedFragment>,
    pub duration: Duration,
}

/// Promote every candidate at or above the promotion threshold.
///
/// Runs as one critical section over both stores: a promoted candidate
/// must leave staging in the same write that adds its delta.
pub fn promote_ready(
    playbook: &Playbook,
    corpus: &PatternCorpus,
    config: &LearningConfig,
) -> Result<PromotionReport> {
    let start = Instant::now();
    let similarity = config.dedup.similarity_threshold;

    playbook.with_records_mut(|deltas, candidates| {
        let scanned = candidates.len();
        let mut promoted = 0;
        let mut merged = 0;
        let mut fragments = Vec::new();
        let mut staged = Vec::with_capacity(candidates.len());

        for candidate in candidates.drain(..) {
            if !schema::is_promotable(candidate.metadata.confidence) {
                staged.push(candidate);
                continue;
            }

            let delta = candidate.to_delta();
            let violations = schema::delta_violations(&delta);
            if !violations.is_empty() {
                // Content that cannot satisfy the delta schema stays
                // staged where a human can still see and fix it.
                warn!(
                    id = %candidate.id,
                    violations = violations.join("; "),
                    "candidate ready but not expressible as a delta"
                );
                staged.push(candidate);
                continue;
            }

            if let Err(e) = corpus.remove(&candidate.id.to_string()) {
                warn!(id = %candidate.id, error = %e, "could not drop promoted candidate from corpus");
            }

            match deltas
                .iter_mut()
                .find(|d| dedup::same_lesson(d, &delta, similarity))
            {
                Some(existing) => {
                    dedup::merge_deltas(existing, &delta);
                    merged += 1;
                    info!(
                        candidate = %candidate.id,
                        delta = %existing.id,
                        "promoted candidate merged into existing delta"
                    );
                    fragments.push(PromotedFragment {
                        delta_id: existing.id,
                        markdown: render::delta_fragment(existing),
                    });
                }
                None => {
                    promoted += 1;
                    info!(
                        candidate = %candidate.id,
                        delta = %delta.id,
                        confidence = delta.confidence,
                        "candidate promoted to delta"
                    );
                    fragments.push(PromotedFragment {
                        delta_id: delta.id,
                        markdown: render::delta_fragment(&delta),
                    });
                    deltas.push(delta);
                }
            }
        }

        *candidates = staged;
        Ok(PromotionReport {
            scanned,
            promoted,
            merged,
            fragments,
            duration: start.elapsed(),
        })
    })
}
