//! Near-duplicate detection and merging.
//!
//! Similarity is Jaccard over lowercase token sets. Two records are the
//! same lesson only when problem, condition AND solution all clear the
//! threshold; one complaint with two different fixes stays two records.
//! Merges keep the existing record's text and identity (first writer wins)
//! and fold the incoming record's evidence into it.

use std::collections::HashSet;

use chrono::Utc;

use crate::schema::MAX_SOURCE_EVENTS;
use crate::types::{Delta, PatternCandidate};

/// Default per-field similarity gate. Config can override per call site.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;

fn token_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of two strings in `[0.0, 1.0]`.
///
/// Texts identical after trimming and lowercasing score 1.0 before any
/// tokenization, so two empty strings are identical rather than dissimilar.
/// Otherwise, if either token set is empty the score is 0.0.
pub fn similarity(a: &str, b: &str) -> f32 {
    let a_norm = a.trim().to_lowercase();
    let b_norm = b.trim().to_lowercase();
    if a_norm == b_norm {
        return 1.0;
    }

    let set_a = token_set(&a_norm);
    let set_b = token_set(&b_norm);
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f32 / union as f32
}

/// Whether two deltas express the same lesson: every field of the triple
/// must clear the threshold independently.
pub fn same_lesson(a: &Delta, b: &Delta, threshold: f32) -> bool {
    similarity(&a.problem, &b.problem) >= threshold
        && similarity(&a.condition, &b.condition) >= threshold
        && similarity(&a.solution, &b.solution) >= threshold
}

/// Fold `incoming` into `existing`.
///
/// Counts are summed under the clamp and confidence recomputed from the
/// merged tallies; with no feedback on either side the higher creation
/// confidence survives instead of collapsing to zero. `last_helpful` is
/// refreshed to the merge instant. Source events take roughly half from
/// each side up to the cap. Text, id and `created` stay with `existing`.
pub fn merge_deltas(existing: &mut Delta, incoming: &Delta) {
    let merged = existing.feedback.merged_with(&incoming.feedback);
    existing.confidence = if merged.weighted_total() == 0 {
        existing.confidence.max(incoming.confidence)
    } else {
        merged.confidence()
    };
    existing.feedback = merged;
    existing.last_helpful = Utc::now();
    existing.source_events =
        merge_source_events(&existing.source_events, &incoming.source_events);
}

fn merge_source_events(existing: &[String], incoming: &[String]) -> Vec<String> {
    let half = MAX_SOURCE_EVENTS / 2;
    let mut merged: Vec<String> = Vec::with_capacity(MAX_SOURCE_EVENTS);

    for id in existing.iter().take(half) {
        if !merged.contains(id) {
            merged.push(id.clone());
        }
    }
    for id in incoming {
        if merged.len() >= MAX_SOURCE_EVENTS {
            break;
        }
        if !merged.contains(id) {
            merged.push(id.clone());
        }
    }
    // Backfill with the rest of the existing side if the incoming side was
    // short.
    for id in existing.iter().skip(half) {
        if merged.len() >= MAX_SOURCE_EVENTS {
            break;
        }
        if !merged.contains(id) {
            merged.push(id.clone());
        }
    }
    merged
}

/// Whether two candidates describe the same pattern: same category and
/// kind, with the lesson text clearing the similarity gate.
///
/// The lesson text comes from `action_text`, so wrong-only candidates
/// compare by their avoidance phrasing rather than an absent right field.
pub fn same_candidate(a: &PatternCandidate, b: &PatternCandidate, threshold: f32) -> bool {
    a.category == b.category
        && a.kind == b.kind
        && similarity(&a.content.action_text(), &b.content.action_text()) >= threshold
}

/// Fold a re-observed candidate into its existing record: evidence
/// accumulates, the repeat observation counts as one confirmation, and
/// the trigger unions file patterns and related files.
pub fn merge_candidates(existing: &mut PatternCandidate, incoming: &PatternCandidate) {
    existing.metadata.occurrences = existing
        .metadata
        .occurrences
        .saturating_add(incoming.metadata.occurrences);
    for pattern in &incoming.trigger.file_patterns {
        if !existing.trigger.file_patterns.contains(pattern) {
            existing.trigger.file_patterns.push(pattern.clone());
        }
    }
    for file in &incoming.metadata.related_files {
        if !existing.metadata.related_files.contains(file)
            && existing.metadata.related_files.len() < MAX_SOURCE_EVENTS
        {
            existing.metadata.related_files.push(file.clone());
        }
    }
    existing.record_confirmation();
}
