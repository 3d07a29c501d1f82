//! Record validation and the confidence formula.
//!
//! Everything that decides whether a record is well-formed, how feedback
//! turns into a score, and when a score is good enough for promotion lives
//! here, so the playbook, the corpus, and the evolution jobs all agree.

use serde::{Deserialize, Serialize};

use crate::error::{MetisError, Result};
use crate::types::{Delta, PatternCandidate};

/// Human feedback counts this many times more than agent feedback.
pub const HUMAN_FEEDBACK_WEIGHT: u32 = 3;

/// Ceiling on each feedback counter. Keeps a single record from
/// accumulating unbounded history and lets old signals age out of the
/// ratio faster.
pub const MAX_FEEDBACK_COUNT: u32 = 100;

/// Confidence at or above which a record is eligible for promotion.
pub const PROMOTION_THRESHOLD: f32 = 0.80;

/// Cap on the `source_events` list carried by a delta.
pub const MAX_SOURCE_EVENTS: usize = 10;

/// Confidence assumed for a record whose file carries none. Deliberately
/// above the 0.4 injection floor so brand-new or hand-authored records
/// stay eligible for injection until real feedback arrives.
pub const DEFAULT_RANKING_CONFIDENCE: f32 = 0.5;

/// serde default hook for confidence fields.
pub fn default_ranking_confidence() -> f32 {
    DEFAULT_RANKING_CONFIDENCE
}

/// Length bounds for the delta triple, in characters.
pub const PROBLEM_MIN_LEN: usize = 10;
pub const PROBLEM_MAX_LEN: usize = 200;
pub const SOLUTION_MIN_LEN: usize = 10;
pub const SOLUTION_MAX_LEN: usize = 500;
pub const CONDITION_MIN_LEN: usize = 5;
pub const CONDITION_MAX_LEN: usize = 100;

/// Clamp a feedback counter to [`MAX_FEEDBACK_COUNT`].
pub fn clamp_count(count: u32) -> u32 {
    count.min(MAX_FEEDBACK_COUNT)
}

/// Feedback tallies for a learned record.
///
/// Serialized flat (the playbook embeds this with `#[serde(flatten)]`), so
/// the field names here are the on-disk field names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackCounts {
    /// Agent-reported successes.
    #[serde(default)]
    pub helpful_count: u32,
    /// Agent-reported failures or rejections.
    #[serde(default)]
    pub not_helpful_count: u32,
    /// Explicit human confirmations.
    #[serde(default)]
    pub human_feedback_count: u32,
}

impl FeedbackCounts {
    /// Weighted success ratio in `[0.0, 1.0]`.
    ///
    /// `(helpful + W*human) / (helpful + W*human + not_helpful)` with
    /// `W = HUMAN_FEEDBACK_WEIGHT`. Zero total feedback yields 0.0, not a
    /// division error: a record nobody has vouched for has earned nothing.
    ///
    /// Each counter passes through [`clamp_count`] before entering the
    /// formula. Stored counts past the ceiling (hand-edited files, old
    /// store versions) score as the ceiling.
    pub fn confidence(&self) -> f32 {
        let helpful = clamp_count(self.helpful_count);
        let not_helpful = clamp_count(self.not_helpful_count);
        let human = clamp_count(self.human_feedback_count);
        let positive = helpful + HUMAN_FEEDBACK_WEIGHT * human;
        let denominator = positive + not_helpful;
        if denominator == 0 {
            return 0.0;
        }
        positive as f32 / denominator as f32
    }

    /// Sum two tallies, clamping each counter independently.
    pub fn merged_with(&self, other: &FeedbackCounts) -> FeedbackCounts {
        FeedbackCounts {
            helpful_count: clamp_count(self.helpful_count.saturating_add(other.helpful_count)),
            not_helpful_count: clamp_count(
                self.not_helpful_count.saturating_add(other.not_helpful_count),
            ),
            human_feedback_count: clamp_count(
                self.human_feedback_count
                    .saturating_add(other.human_feedback_count),
            ),
        }
    }

    /// Total signals received, with human feedback weighted. Counters are
    /// clamped the same way [`Self::confidence`] clamps them.
    pub fn weighted_total(&self) -> u32 {
        clamp_count(self.helpful_count)
            + HUMAN_FEEDBACK_WEIGHT * clamp_count(self.human_feedback_count)
            + clamp_count(self.not_helpful_count)
    }
}

/// Whether a confidence score clears the promotion bar.
///
/// The comparison is inclusive: exactly [`PROMOTION_THRESHOLD`] promotes.
pub fn is_promotable(confidence: f32) -> bool {
    confidence >= PROMOTION_THRESHOLD
}

fn check_len(violations: &mut Vec<String>, field: &str, value: &str, min: usize, max: usize) {
    let len = value.chars().count();
    if len < min {
        violations.push(format!("{field} too short: {len} chars, minimum {min}"));
    } else if len > max {
        violations.push(format!("{field} too long: {len} chars, maximum {max}"));
    }
}

/// Collect every schema violation in a delta. Empty means valid.
pub fn delta_violations(delta: &Delta) -> Vec<String> {
    let mut violations = Vec::new();
    check_len(
        &mut violations,
        "problem",
        &delta.problem,
        PROBLEM_MIN_LEN,
        PROBLEM_MAX_LEN,
    );
    check_len(
        &mut violations,
        "solution",
        &delta.solution,
        SOLUTION_MIN_LEN,
        SOLUTION_MAX_LEN,
    );
    check_len(
        &mut violations,
        "condition",
        &delta.condition,
        CONDITION_MIN_LEN,
        CONDITION_MAX_LEN,
    );
    if !(0.0..=1.0).contains(&delta.confidence) || delta.confidence.is_nan() {
        violations.push(format!(
            "confidence out of range: {} not in [0.0, 1.0]",
            delta.confidence
        ));
    }
    if delta.source_events.len() > MAX_SOURCE_EVENTS {
        violations.push(format!(
            "source_events over cap: {} entries, maximum {MAX_SOURCE_EVENTS}",
            delta.source_events.len()
        ));
    }
    violations
}

/// Validate a delta, reporting every violation at once.
pub fn validate_delta(delta: &Delta) -> Result<()> {
    let violations = delta_violations(delta);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(MetisError::InvalidRecord { violations })
    }
}

fn blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Collect every schema violation in a pattern candidate.
pub fn candidate_violations(candidate: &PatternCandidate) -> Vec<String> {
    let mut violations = Vec::new();
    let content = &candidate.content;
    if blank(&content.wrong) && blank(&content.right) && blank(&content.rationale) {
        violations.push("content has no wrong, right or rationale".to_string());
    }
    if !(0.0..=1.0).contains(&candidate.metadata.confidence)
        || candidate.metadata.confidence.is_nan()
    {
        violations.push(format!(
            "confidence out of range: {} not in [0.0, 1.0]",
            candidate.metadata.confidence
        ));
    }
    if candidate.metadata.occurrences == 0 {
        violations.push("occurrences is zero".to_string());
    }
    violations
}

/// Validate a pattern candidate.
pub fn validate_candidate(candidate: &PatternCandidate) -> Result<()> {
    let violations = candidate_violations(candidate);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(MetisError::InvalidRecord { violations })
    }
}
