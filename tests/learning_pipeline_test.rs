//! End-to-end integration test for the learning loop
//!
//! Drives the full path through the public API: observed invocations
//! become events, repeated failures become staged candidates,
//! confirmations push a candidate over the promotion threshold, and the
//! promoted lesson ranks into an injection block for a matching context.

mod common;

use common::{observe_failure, observe_success, test_playbook, test_store};
use metis_core::{
    dedup,
    events::{group_for_patterns, AnalysisState, EventLog},
    extract::candidates_from_groups,
    evolution::run_evolution,
    inject::{build_injection, UsageContext},
    store::PatternCorpus,
    types::{FeedbackSignal, LearnedRecord},
};

#[test]
fn test_failures_become_promoted_lesson_and_inject() {
    let (_dir, store, config) = test_store();
    let log = EventLog::new(store.root());

    // Three identical failures cross the default occurrence gate; the
    // lone success on another tool does not.
    for i in 0..3 {
        observe_failure(
            &log,
            "edit",
            &format!("src/api/handler_{i}.rs"),
            "syntax error: unexpected token",
        );
    }
    observe_success(&log, "fmt", "src/api/mod.rs");

    // Analysis pass, the way the learn command runs it.
    let mut state = AnalysisState::load(store.root());
    let events = log.read_since(state.watermark, config.analysis.max_events_per_run);
    assert_eq!(events.len(), 4);

    let groups = group_for_patterns(&events, config.analysis.min_occurrences);
    let mut extracted = candidates_from_groups(&groups);
    assert_eq!(extracted.len(), 1, "only the failure group qualifies");

    let playbook = test_playbook(&store, &config);
    let corpus = PatternCorpus::open(&store);
    let staged_id = extracted[0].id.to_string();
    playbook
        .with_candidates_mut(|candidates| {
            let candidate = extracted.remove(0);
            corpus.write(&candidate)?;
            candidates.push(candidate);
            Ok(())
        })
        .unwrap();

    // The watermark moves past the consumed events.
    let max = events.iter().map(|e| e.timestamp).max().unwrap();
    state.advance(max);
    state.save(store.root()).unwrap();
    assert!(log.read_since(state.watermark, 100).is_empty());

    // Freshly mined candidates are nowhere near promotable.
    let report = run_evolution(&playbook, &corpus, &config).unwrap();
    assert_eq!(report.promotion.promoted, 0);
    assert_eq!(playbook.read_candidates().len(), 1);

    // Three confirmations with no conflicts drive confidence to 1.0.
    playbook
        .with_candidates_mut(|candidates| {
            for _ in 0..3 {
                candidates[0].record_confirmation();
            }
            Ok(())
        })
        .unwrap();

    let report = run_evolution(&playbook, &corpus, &config).unwrap();
    assert_eq!(report.promotion.promoted, 1);
    assert_eq!(report.promotion.fragments.len(), 1);
    assert_eq!(report.pruning.archived_deltas, 0);

    // Promotion cleared staging everywhere: candidates.json, the YAML
    // corpus and its index.
    assert!(playbook.read_candidates().is_empty());
    assert!(!corpus.load_all().iter().any(|c| c.id.to_string() == staged_id));

    let deltas = playbook.read_deltas();
    assert_eq!(deltas.len(), 1);
    assert!(deltas[0].confidence >= 0.80);
    assert!(deltas[0].problem.contains("edit"));

    // The promoted lesson ranks into an injection for a matching context.
    let records: Vec<LearnedRecord> = playbook
        .read_deltas()
        .into_iter()
        .map(LearnedRecord::Delta)
        .collect();
    let ctx = UsageContext {
        file_path: Some("src/api/users.rs".to_string()),
        prompt: Some("edit the user handler".to_string()),
        tags: vec![],
    };
    let block = build_injection(records, &ctx, &config.injection, None);
    assert_eq!(block.entries.len(), 1);
    assert!(block.text.contains("edit"));
    assert!(block.tokens_used <= block.token_budget);
}

#[test]
fn test_repeated_analysis_merges_instead_of_stacking() {
    let (_dir, store, config) = test_store();
    let log = EventLog::new(store.root());
    let playbook = test_playbook(&store, &config);
    let corpus = PatternCorpus::open(&store);

    // Two analysis passes over the same failure shape. The second batch
    // must merge into the staged candidate, not duplicate it.
    let mut state = AnalysisState::load(store.root());
    for pass in 0..2 {
        for i in 0..3 {
            observe_failure(
                &log,
                "bash",
                &format!("scripts/deploy_{pass}_{i}.sh"),
                "connection refused by registry",
            );
        }
        let events = log.read_since(state.watermark, config.analysis.max_events_per_run);
        let groups = group_for_patterns(&events, config.analysis.min_occurrences);
        let mut extracted = candidates_from_groups(&groups);
        assert_eq!(extracted.len(), 1);

        playbook
            .with_candidates_mut(|candidates| {
                let incoming = extracted.remove(0);
                match candidates
                    .iter_mut()
                    .find(|c| dedup::same_candidate(c, &incoming, config.dedup.similarity_threshold))
                {
                    Some(existing) => {
                        dedup::merge_candidates(existing, &incoming);
                        corpus.write(existing)?;
                    }
                    None => {
                        corpus.write(&incoming)?;
                        candidates.push(incoming);
                    }
                }
                Ok(())
            })
            .unwrap();

        let max = events.iter().map(|e| e.timestamp).max().unwrap();
        state.advance(max);
        state.save(store.root()).unwrap();
    }

    let candidates = playbook.read_candidates();
    assert_eq!(candidates.len(), 1, "second pass merged, not stacked");
    assert_eq!(candidates[0].metadata.occurrences, 6);
    // The merge recorded a confirmation.
    assert_eq!(candidates[0].metadata.confirmations, 1);
    assert_eq!(corpus.len(), 1);
}

#[test]
fn test_feedback_moves_confidence_and_pruning_respects_it() {
    let (_dir, store, config) = test_store();
    let playbook = test_playbook(&store, &config);

    // Seed one promoted lesson, backdated well past the age gate.
    let delta_id = playbook
        .with_deltas_mut(|deltas| {
            let mut delta = metis_core::types::Delta::new(
                "Tests hit the live payments API",
                "Point the test environment at the local stub server",
                "when running the integration suite",
                0.85,
            );
            delta.created = chrono::Utc::now() - chrono::Duration::days(120);
            let id = delta.id.to_string();
            deltas.push(delta);
            Ok(id)
        })
        .unwrap();

    // helpful, helpful, human, not-helpful: (2 + 3) / (2 + 3 + 1)
    playbook
        .with_deltas_mut(|deltas| {
            let delta = deltas
                .iter_mut()
                .find(|d| d.id.to_string() == delta_id)
                .unwrap();
            delta.record_feedback(FeedbackSignal::Helpful);
            delta.record_feedback(FeedbackSignal::Helpful);
            delta.record_feedback(FeedbackSignal::HumanConfirmed);
            delta.record_feedback(FeedbackSignal::NotHelpful);
            Ok(())
        })
        .unwrap();

    let deltas = playbook.read_deltas();
    assert!((deltas[0].confidence - 5.0 / 6.0).abs() < 1e-6);

    // A lesson with feedback this good is never pruned regardless of age.
    let corpus = PatternCorpus::open(&store);
    let report = run_evolution(&playbook, &corpus, &config).unwrap();
    assert_eq!(report.pruning.archived_deltas, 0);
    assert_eq!(playbook.read_deltas().len(), 1);
}
