// Evolution module - record lifecycle passes
//
// Runs the maintenance the playbook needs to stay trustworthy over time:
// promotion graduates proven candidates into active deltas, and pruning
// archives records that grew old without earning their keep. Both passes
// run inline from the `evolve` command; there is no background scheduler.
//
// Components:
// - promotion: threshold-gated candidate -> delta graduation + fragments
// - pruning: age-and-rate-gated archival with verified removal

pub mod promotion;
pub mod pruning;

pub use promotion::{promote_ready, PromotedFragment, PromotionReport};
pub use pruning::{prune_stale, PruneReport};

use crate::config::LearningConfig;
use crate::error::Result;
use crate::store::{PatternCorpus, Playbook};

/// Combined output of one `evolve` run.
#[derive(Debug)]
pub struct EvolutionReport {
    pub promotion: PromotionReport,
    pub pruning: PruneReport,
}

/// Run promotion then pruning. Promotion goes first so a candidate that
/// just crossed the threshold is never pruned for staging-store age.
pub fn run_evolution(
    playbook: &Playbook,
    corpus: &PatternCorpus,
    config: &LearningConfig,
) -> Result<EvolutionReport> {
    let promotion = promote_ready(playbook, corpus, config)?;
    let pruning = prune_stale(playbook, corpus, config)?;
    Ok(EvolutionReport { promotion, pruning })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockConfig;
    use crate::store::Store;
    use crate::types::{
        PatternCandidate, PatternCategory, PatternContent, PatternId, PatternKind,
        PatternMetadata, PatternSource, TriggerSpec,
    };
    use chrono::{Duration as ChronoDuration, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_old_but_ready_candidate_promotes_instead_of_pruning() {
        let dir = TempDir::new().unwrap();
        let store = Store::at(dir.path().join(".metis"));
        store.init().unwrap();
        let corpus = PatternCorpus::open(&store);
        let playbook = Playbook::open(store, LockConfig::default());

        // Ancient candidate, but its confidence clears the promotion
        // threshold; promotion must win the race against pruning.
        let mut metadata = PatternMetadata::new(PatternSource::ExplicitTeach, 1.0);
        metadata.first_seen = Utc::now() - ChronoDuration::days(200);
        let candidate = PatternCandidate {
            id: PatternId::new(),
            category: PatternCategory::General,
            kind: PatternKind::Explicit,
            trigger: TriggerSpec {
                keywords: vec![],
                file_patterns: vec![],
                context: Some("when touching the payments service".into()),
            },
            content: PatternContent {
                wrong: Some("calling the gateway without an idempotency key".into()),
                right: Some("always send an idempotency key with gateway calls".into()),
                rationale: None,
            },
            metadata,
            tags: vec![],
        };

        playbook
            .with_candidates_mut(|c| {
                c.push(candidate);
                Ok(())
            })
            .unwrap();

        let report = run_evolution(&playbook, &corpus, &LearningConfig::default()).unwrap();
        assert_eq!(report.promotion.promoted, 1);
        assert_eq!(report.pruning.archived_candidates, 0);
        assert_eq!(playbook.read_deltas().len(), 1);
    }
}
