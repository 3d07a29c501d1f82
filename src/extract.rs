//! Lesson extraction.
//!
//! Turns aggregated event groups and detected corrections into pattern
//! candidates with schema-safe text. This is a background path: anything
//! that cannot be extracted cleanly is dropped with a debug log, never an
//! error into the interactive session.

use tracing::debug;

use crate::classify::ErrorType;
use crate::detect::{DetectionResult, PromptContext, Signal};
use crate::events::PatternGroup;
use crate::schema::{self, CONDITION_MAX_LEN, PROBLEM_MAX_LEN, SOLUTION_MAX_LEN};
use crate::types::{
    PatternCandidate, PatternCategory, PatternContent, PatternId, PatternKind, PatternMetadata,
    PatternSource, TriggerSpec,
};
use crate::util::{collapse_whitespace, extension_glob, truncate_at_char_boundary};

// Mined anti-patterns start low and earn a little per repeat observation;
// promotion requires real confirmations on top.
const MINED_BASE_CONFIDENCE: f32 = 0.30;
const MINED_PER_OCCURRENCE: f32 = 0.05;
const MINED_CONFIDENCE_CAP: f32 = 0.60;

// Success streaks are weaker evidence than failure streaks.
const PRACTICE_BASE_CONFIDENCE: f32 = 0.20;
const PRACTICE_PER_OCCURRENCE: f32 = 0.03;
const PRACTICE_CONFIDENCE_CAP: f32 = 0.50;

fn mined_confidence(occurrences: usize) -> f32 {
    (MINED_BASE_CONFIDENCE + MINED_PER_OCCURRENCE * occurrences as f32).min(MINED_CONFIDENCE_CAP)
}

fn practice_confidence(occurrences: usize) -> f32 {
    (PRACTICE_BASE_CONFIDENCE + PRACTICE_PER_OCCURRENCE * occurrences as f32)
        .min(PRACTICE_CONFIDENCE_CAP)
}

/// What to try instead, per error family. Deliberately generic: the sample
/// error message carries the specifics, this carries the direction.
fn remediation_for(error_type: ErrorType, skill: &str) -> String {
    match error_type {
        ErrorType::Validation => format!(
            "Validate inputs before invoking {skill}; check required fields and value ranges first"
        ),
        ErrorType::Type => format!(
            "Check argument and return types before invoking {skill}; add explicit conversions where types differ"
        ),
        ErrorType::Syntax => format!(
            "Re-check generated code before applying {skill}; run a syntax check or formatter first"
        ),
        ErrorType::Timeout => format!(
            "Split {skill} work into smaller steps or raise its timeout; avoid blocking on slow resources"
        ),
        ErrorType::Permission => format!(
            "Check file and directory permissions before running {skill}; avoid paths needing elevated access"
        ),
        ErrorType::NotFound => format!(
            "Verify paths and identifiers exist before invoking {skill}; correct the reference or create the target first"
        ),
        ErrorType::Network => format!(
            "Check connectivity before {skill} and retry with backoff; prefer local resources when the network is flaky"
        ),
        ErrorType::Memory => format!(
            "Reduce the working set for {skill}; process data in chunks instead of loading everything at once"
        ),
        ErrorType::Unknown => format!(
            "Review recent {skill} failures for a shared cause before retrying the same approach"
        ),
    }
}

fn category_from_files(files: &[String]) -> PatternCategory {
    files
        .iter()
        .find_map(|f| PatternCategory::from_path(f))
        .unwrap_or_default()
}

/// Extract one candidate per qualifying group. Groups that produce invalid
/// candidates are skipped, not fatal.
pub fn candidates_from_groups(groups: &[PatternGroup]) -> Vec<PatternCandidate> {
    groups
        .iter()
        .filter_map(|group| {
            let candidate = candidate_from_group(group);
            match schema::validate_candidate(&candidate) {
                Ok(()) => Some(candidate),
                Err(e) => {
                    debug!(group = %group.key, error = %e, "dropping invalid extracted candidate");
                    None
                }
            }
        })
        .collect()
}

/// Build a candidate from one event group: anti-pattern for failure groups,
/// best practice for success groups.
pub fn candidate_from_group(group: &PatternGroup) -> PatternCandidate {
    match group.error_type {
        Some(error_type) => anti_pattern_from(group, error_type),
        None => best_practice_from(group),
    }
}

fn anti_pattern_from(group: &PatternGroup, error_type: ErrorType) -> PatternCandidate {
    let category = category_from_files(&group.related_files);
    let occurrences = group.occurrences();

    let mut wrong = format!(
        "{} repeatedly fails with {} errors",
        group.skill, error_type
    );
    if let Some(sample) = &group.sample_error {
        wrong.push_str(&format!(" (e.g. {})", collapse_whitespace(sample)));
    }
    let wrong = truncate_at_char_boundary(&wrong, PROBLEM_MAX_LEN);

    let right = truncate_at_char_boundary(
        &remediation_for(error_type, &group.skill),
        SOLUTION_MAX_LEN,
    );

    let context = if group.file_patterns.is_empty() {
        format!("when using {}", group.skill)
    } else {
        format!(
            "when using {} on {}",
            group.skill,
            group.file_patterns.join(", ")
        )
    };
    let context = truncate_at_char_boundary(&context, CONDITION_MAX_LEN);

    let mut metadata = PatternMetadata::new(PatternSource::ToolEvents, mined_confidence(occurrences));
    metadata.occurrences = occurrences as u32;
    metadata.related_files = group.related_files.clone();

    PatternCandidate {
        id: PatternId::new(),
        category,
        kind: PatternKind::AntiPattern,
        trigger: TriggerSpec {
            keywords: vec![group.skill.clone(), error_type.to_string()],
            file_patterns: group.file_patterns.clone(),
            context: Some(context),
        },
        content: PatternContent {
            wrong: Some(wrong),
            right: Some(right),
            rationale: None,
        },
        metadata,
        tags: vec![
            group.skill.clone(),
            error_type.to_string(),
            category.to_string(),
        ],
    }
}

fn best_practice_from(group: &PatternGroup) -> PatternCandidate {
    let category = category_from_files(&group.related_files);
    let occurrences = group.occurrences();

    let right = truncate_at_char_boundary(
        &format!(
            "Keep using {} for this kind of work; {} clean runs recorded",
            group.skill, group.success_count
        ),
        SOLUTION_MAX_LEN,
    );
    let context = if group.file_patterns.is_empty() {
        format!("when using {}", group.skill)
    } else {
        format!("when working with {}", group.file_patterns.join(", "))
    };
    let context = truncate_at_char_boundary(&context, CONDITION_MAX_LEN);

    let mut metadata =
        PatternMetadata::new(PatternSource::ToolEvents, practice_confidence(occurrences));
    metadata.occurrences = occurrences as u32;
    metadata.related_files = group.related_files.clone();

    PatternCandidate {
        id: PatternId::new(),
        category,
        kind: PatternKind::BestPractice,
        trigger: TriggerSpec {
            keywords: vec![group.skill.clone()],
            file_patterns: group.file_patterns.clone(),
            context: Some(context),
        },
        content: PatternContent {
            wrong: None,
            right: Some(right),
            rationale: None,
        },
        metadata,
        tags: vec![group.skill.clone(), category.to_string()],
    }
}

/// Build a candidate from a detected correction, or `None` when the prompt
/// did not clear the correction threshold or carried nothing learnable.
pub fn candidate_from_correction(
    prompt: &str,
    detection: &DetectionResult,
    context: &PromptContext,
) -> Option<PatternCandidate> {
    if !detection.is_correction {
        return None;
    }

    let candidate = if detection.explicit_teach {
        let payload = match &detection.teach_payload {
            Some(p) => p,
            None => {
                debug!("explicit teach without payload, nothing to learn");
                return None;
            }
        };
        explicit_candidate(payload, detection, context)
    } else {
        correction_candidate(prompt, detection, context)
    };

    match schema::validate_candidate(&candidate) {
        Ok(()) => Some(candidate),
        Err(e) => {
            debug!(error = %e, "dropping invalid correction candidate");
            None
        }
    }
}

/// Parse a `/learn` payload. Accepted shapes, tried in order:
/// `wrong -> right` (also `=>`), `problem: ... solution: ...` labels, and
/// finally the whole payload as the right approach.
fn parse_teach_payload(payload: &str) -> (Option<String>, String) {
    for separator in ["->", "=>"] {
        if let Some((wrong, right)) = payload.split_once(separator) {
            let wrong = wrong.trim();
            let right = right.trim();
            if !wrong.is_empty() && !right.is_empty() {
                return (Some(wrong.to_string()), right.to_string());
            }
        }
    }

    let lower = payload.to_lowercase();
    if let Some(problem_at) = lower.find("problem:") {
        if let Some(solution_at) = lower.find("solution:") {
            if solution_at > problem_at {
                let wrong = payload[problem_at + "problem:".len()..solution_at].trim();
                let right = payload[solution_at + "solution:".len()..].trim();
                if !right.is_empty() {
                    let wrong = (!wrong.is_empty()).then(|| wrong.to_string());
                    return (wrong, right.to_string());
                }
            }
        }
    }

    (None, payload.trim().to_string())
}

fn explicit_candidate(
    payload: &str,
    detection: &DetectionResult,
    context: &PromptContext,
) -> PatternCandidate {
    let (wrong, right) = parse_teach_payload(payload);

    let mut metadata = PatternMetadata::new(PatternSource::ExplicitTeach, detection.score);
    if let Some(file) = &context.active_file {
        metadata.related_files.push(file.clone());
    }

    PatternCandidate {
        id: PatternId::new(),
        category: detection.category,
        kind: PatternKind::Explicit,
        trigger: trigger_from_detection(detection, context),
        content: PatternContent {
            wrong: wrong.map(|w| truncate_at_char_boundary(&w, PROBLEM_MAX_LEN)),
            right: Some(truncate_at_char_boundary(&right, SOLUTION_MAX_LEN)),
            rationale: None,
        },
        metadata,
        tags: correction_tags(detection),
    }
}

fn correction_candidate(
    prompt: &str,
    detection: &DetectionResult,
    context: &PromptContext,
) -> PatternCandidate {
    // Directives ("always/never ...") state standing preferences; other
    // corrections read as project conventions.
    let kind = if detection.signals.contains(&Signal::Directive) {
        PatternKind::Preference
    } else {
        PatternKind::Convention
    };

    let right = truncate_at_char_boundary(&collapse_whitespace(prompt), SOLUTION_MAX_LEN);

    let mut metadata = PatternMetadata::new(PatternSource::Correction, detection.score);
    if let Some(file) = &context.active_file {
        metadata.related_files.push(file.clone());
    }

    PatternCandidate {
        id: PatternId::new(),
        category: detection.category,
        kind,
        trigger: trigger_from_detection(detection, context),
        content: PatternContent {
            wrong: None,
            right: Some(right),
            rationale: None,
        },
        metadata,
        tags: correction_tags(detection),
    }
}

fn trigger_from_detection(detection: &DetectionResult, context: &PromptContext) -> TriggerSpec {
    let file_patterns = context
        .active_file
        .as_deref()
        .and_then(extension_glob)
        .into_iter()
        .collect();
    let trigger_context = truncate_at_char_boundary(
        &format!("when working on {} tasks", detection.category),
        CONDITION_MAX_LEN,
    );

    TriggerSpec {
        keywords: detection.keywords.clone(),
        file_patterns,
        context: Some(trigger_context),
    }
}

fn correction_tags(detection: &DetectionResult) -> Vec<String> {
    let mut tags = vec![detection.category.to_string()];
    for keyword in detection.keywords.iter().take(3) {
        tags.push(keyword.clone());
    }
    tags
}
