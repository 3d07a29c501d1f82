//! Age-gated pruning and archival pass.
//!
//! A record is pruned only when both gates open: it is older than the
//! staleness window AND its recomputed success rate sits under the floor.
//! Confidence stored on disk is never rewritten by age; staleness is
//! purely structural, so a reliable old lesson survives forever.
//!
//! Removal is verified-write-then-delete: the record is appended to the
//! dated archive file, the archive is read back, and only a record whose
//! copy parses out of the archive is removed from the live store. A
//! record that cannot be proven archived stays live.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{LearningConfig, LifecycleConfig};
use crate::error::Result;
use crate::store::{self, PatternCorpus, Playbook};
use crate::types::{Delta, LearnedRecord, PatternCandidate};

#[derive(Debug)]
pub struct PruneReport {
    pub scanned_deltas: usize,
    pub archived_deltas: usize,
    pub scanned_candidates: usize,
    pub archived_candidates: usize,
    /// Dated archive file written this pass, when anything was pruned.
    pub archive_path: Option<PathBuf>,
    pub duration: Duration,
}

fn delta_is_stale(delta: &Delta, lifecycle: &LifecycleConfig) -> bool {
    delta.age_days() > lifecycle.prune_age_days
        && delta.feedback.confidence() < lifecycle.prune_success_rate
}

fn candidate_is_stale(candidate: &PatternCandidate, lifecycle: &LifecycleConfig) -> bool {
    let age_days = (Utc::now() - candidate.metadata.first_seen).num_days();
    age_days > lifecycle.prune_age_days
        && candidate.feedback_view().confidence() < lifecycle.prune_success_rate
}

/// Archive and remove every record past both gates.
pub fn prune_stale(
    playbook: &Playbook,
    corpus: &PatternCorpus,
    config: &LearningConfig,
) -> Result<PruneReport> {
    let start = Instant::now();
    let lifecycle = config.lifecycle.clone();
    let archive_dir = playbook.store().archive_dir();

    playbook.with_records_mut(|deltas, candidates| {
        let scanned_deltas = deltas.len();
        let scanned_candidates = candidates.len();

        let stale_deltas: Vec<Delta> = deltas
            .iter()
            .filter(|d| delta_is_stale(d, &lifecycle))
            .cloned()
            .collect();
        let stale_candidates: Vec<PatternCandidate> = candidates
            .iter()
            .filter(|c| candidate_is_stale(c, &lifecycle))
            .cloned()
            .collect();

        if stale_deltas.is_empty() && stale_candidates.is_empty() {
            debug!(scanned_deltas, scanned_candidates, "nothing stale to prune");
            return Ok(PruneReport {
                scanned_deltas,
                archived_deltas: 0,
                scanned_candidates,
                archived_candidates: 0,
                archive_path: None,
                duration: start.elapsed(),
            });
        }

        let archive_path = archive_dir.join(format!("{}.json", Utc::now().format("%Y-%m-%d")));
        let mut archive: Vec<LearnedRecord> = store::read_json_or_default(&archive_path);
        archive.extend(stale_deltas.iter().cloned().map(LearnedRecord::Delta));
        archive.extend(
            stale_candidates
                .iter()
                .cloned()
                .map(LearnedRecord::Candidate),
        );
        store::atomic_write_json(&archive_path, &archive)?;

        // Read the archive back; only ids provably on disk may be
        // removed from the live store.
        let verified: HashSet<String> = store::read_json_opt::<Vec<LearnedRecord>>(&archive_path)
            .map(|records| records.iter().map(LearnedRecord::id_string).collect())
            .unwrap_or_default();

        let mut archived_deltas = 0;
        deltas.retain(|d| {
            if !delta_is_stale(d, &lifecycle) {
                return true;
            }
            if verified.contains(&d.id.to_string()) {
                info!(
                    id = %d.id,
                    age_days = d.age_days(),
                    rate = d.feedback.confidence(),
                    "archived stale delta"
                );
                archived_deltas += 1;
                false
            } else {
                warn!(id = %d.id, "stale delta missing from archive readback, keeping live");
                true
            }
        });

        let mut archived_candidates = 0;
        candidates.retain(|c| {
            if !candidate_is_stale(c, &lifecycle) {
                return true;
            }
            if verified.contains(&c.id.to_string()) {
                info!(id = %c.id, "archived stale candidate");
                if let Err(e) = corpus.remove(&c.id.to_string()) {
                    warn!(id = %c.id, error = %e, "could not drop archived candidate from corpus");
                }
                archived_candidates += 1;
                false
            } else {
                warn!(id = %c.id, "stale candidate missing from archive readback, keeping live");
                true
            }
        });

        Ok(PruneReport {
            scanned_deltas,
            archived_deltas,
            scanned_candidates,
            archived_candidates,
            archive_path: Some(archive_path),
            duration: start.elapsed(),
        })
    })
}
