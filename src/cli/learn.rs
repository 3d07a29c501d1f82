//! Learning analysis command
//!
//! Consumes the event log from the saved watermark, mines failure groups
//! into pattern candidates, and optionally scores one prompt for
//! corrective intent. New candidates land in the staging store and the
//! YAML corpus in the same critical section.

use metis_core::{
    dedup,
    detect::{CorrectionDetector, PromptContext},
    error::Result,
    events::{group_for_patterns, AnalysisState, EventLog, ToolEvent},
    extract::{candidate_from_correction, candidates_from_groups},
    types::PatternCandidate,
};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::helpers::{open_playbook, open_store};

/// Handle the learn command.
pub fn handle(
    prompt: Option<String>,
    active_file: Option<String>,
    recent_edit: bool,
    global_store: Option<PathBuf>,
) -> Result<()> {
    let (store, config) = open_store(global_store)?;
    store.init()?;

    // Event mining: everything after the watermark, capped per run.
    let mut state = AnalysisState::load(store.root());
    let log = EventLog::new(store.root());
    let events = log.read_since(state.watermark, config.analysis.max_events_per_run);
    let groups = group_for_patterns(&events, config.analysis.min_occurrences);
    let mut incoming = candidates_from_groups(&groups);

    debug!(
        events = events.len(),
        groups = groups.len(),
        candidates = incoming.len(),
        "event analysis pass"
    );

    // Prompt analysis, when the caller passed one.
    let mut correction_found = false;
    if let Some(prompt) = &prompt {
        let context = PromptContext {
            recent_edit,
            active_file: active_file.clone(),
        };
        let mut detection = CorrectionDetector::new().detect(prompt, &context);
        // The configured threshold overrides the detector's built-in one.
        detection.is_correction =
            detection.explicit_teach || detection.score >= config.analysis.detection_threshold;
        debug!(
            score = detection.score,
            correction = detection.is_correction,
            "prompt scored"
        );
        if let Some(candidate) = candidate_from_correction(prompt, &detection, &context) {
            correction_found = true;
            incoming.push(candidate);
        }
    }

    if incoming.is_empty() {
        advance_watermark(&mut state, &events, store.root())?;
        println!(
            "Analyzed {} events in {} groups: nothing new to learn",
            events.len(),
            groups.len()
        );
        return Ok(());
    }

    // Stage the new candidates, merging near-duplicates instead of
    // stacking them. Corpus writes happen inside the same lock so the
    // YAML mirror never drifts from candidates.json.
    let (playbook, corpus) = open_playbook(&store, &config);
    let threshold = config.dedup.similarity_threshold;
    let (fresh, merged) = playbook.with_candidates_mut(|candidates| {
        let mut fresh = 0usize;
        let mut merged = 0usize;
        for candidate in incoming.drain(..) {
            match find_duplicate(candidates, &candidate, threshold) {
                Some(index) => {
                    dedup::merge_candidates(&mut candidates[index], &candidate);
                    corpus.write(&candidates[index])?;
                    merged += 1;
                }
                None => {
                    corpus.write(&candidate)?;
                    candidates.push(candidate);
                    fresh += 1;
                }
            }
        }
        Ok((fresh, merged))
    })?;

    advance_watermark(&mut state, &events, store.root())?;

    println!(
        "Analyzed {} events in {} groups: {} new candidates, {} merged",
        events.len(),
        groups.len(),
        fresh,
        merged
    );
    if correction_found {
        println!("Prompt registered as a correction");
    }
    Ok(())
}

fn find_duplicate(
    candidates: &[PatternCandidate],
    incoming: &PatternCandidate,
    threshold: f32,
) -> Option<usize> {
    candidates
        .iter()
        .position(|existing| dedup::same_candidate(existing, incoming, threshold))
}

/// Move the cursor past the consumed events and persist it. Runs even
/// when nothing was learned; analyzed means analyzed.
fn advance_watermark(
    state: &mut AnalysisState,
    events: &[ToolEvent],
    store_root: &Path,
) -> Result<()> {
    if let Some(max) = events.iter().map(|e| e.timestamp).max() {
        state.advance(max);
        state.save(store_root)?;
    }
    Ok(())
}
