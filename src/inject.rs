//! Relevance ranking and budgeted injection.
//!
//! Scores stored records against the current usage context and packs the
//! best of them into a token-budgeted block of text. Both record shapes
//! rank through one scorer: candidates carry explicit trigger features,
//! while deltas derive theirs (globs embedded in the condition, category
//! and patterns from source files, keywords from the problem text).
//!
//! Both gates must pass: a perfect contextual match with an unreliable
//! track record is excluded, and so is a reliable lesson with no
//! contextual claim. Records missing a stored confidence rank at
//! [`crate::schema::DEFAULT_RANKING_CONFIDENCE`], which sits above the
//! confidence floor so brand-new records remain eligible.

use globset::{Glob, GlobSetBuilder};
use tracing::debug;

use crate::config::InjectionConfig;
use crate::detect::{self, PromptContext};
use crate::render;
use crate::types::{Delta, LearnedRecord, PatternCategory};
use crate::util::{collapse_whitespace, estimate_tokens, extension_glob};

/// Scoring weights. The glob component dominates: matching the file the
/// agent is touching is the strongest relevance signal available.
const FILE_MATCH_WEIGHT: f32 = 0.4;
const CATEGORY_WEIGHT: f32 = 0.2;
const KEYWORD_WEIGHT: f32 = 0.2;
const TAG_WEIGHT_EACH: f32 = 0.05;
const TAG_WEIGHT_CAP: f32 = 0.1;
const CONFIDENCE_WEIGHT: f32 = 0.1;

/// What the agent is doing right now.
#[derive(Debug, Clone, Default)]
pub struct UsageContext {
    /// File the agent is working on, when known.
    pub file_path: Option<String>,
    /// Free-text description of the task, usually the prompt.
    pub prompt: Option<String>,
    /// Caller-declared tags (project, branch, skill hints).
    pub tags: Vec<String>,
}

impl UsageContext {
    fn category(&self) -> Option<PatternCategory> {
        if let Some(path) = &self.file_path {
            if let Some(category) = PatternCategory::from_path(path) {
                return Some(category);
            }
        }
        let prompt = self.prompt.as_deref()?;
        let context = PromptContext {
            recent_edit: false,
            active_file: self.file_path.clone(),
        };
        Some(detect::infer_category(prompt, &context))
    }
}

/// One record that survived gating, with its score and rendered line.
#[derive(Debug, Clone)]
pub struct RankedRecord {
    pub record: LearnedRecord,
    pub score: f32,
    pub line: String,
}

/// Output of one injection build.
#[derive(Debug)]
pub struct InjectionResult {
    /// Packed records in rank order.
    pub entries: Vec<RankedRecord>,
    /// The injection text, one line per record, within budget.
    pub text: String,
    pub tokens_used: usize,
    pub token_budget: usize,
    /// Records examined before gating.
    pub considered: usize,
    /// Records that cleared the double gate.
    pub eligible: usize,
}

/// Rank `records` against `ctx` and pack the winners into the budget.
pub fn build_injection(
    records: Vec<LearnedRecord>,
    ctx: &UsageContext,
    config: &InjectionConfig,
    budget: Option<usize>,
) -> InjectionResult {
    let token_budget = budget.unwrap_or(config.default_token_budget);
    let considered = records.len();

    let mut ranked: Vec<RankedRecord> = records
        .into_iter()
        .filter_map(|record| {
            let score = score_record(&record, ctx);
            let confidence = record.confidence();
            if score < config.min_score || confidence < config.min_confidence {
                return None;
            }
            let line = record_line(&record);
            Some(RankedRecord {
                record,
                score,
                line,
            })
        })
        .collect();
    let eligible = ranked.len();

    // Highest score first; ties break toward higher confidence.
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                b.record
                    .confidence()
                    .partial_cmp(&a.record.confidence())
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    ranked.truncate(config.max_records);

    // Greedy whole-record packing. The first record that does not fit
    // ends the pack; nothing is ever truncated mid-record.
    let mut text = String::new();
    let mut entries = Vec::new();
    for entry in ranked {
        let candidate_text = if text.is_empty() {
            entry.line.clone()
        } else {
            format!("{text}\n{}", entry.line)
        };
        if estimate_tokens(&candidate_text) > token_budget {
            debug!(score = entry.score, "record does not fit budget, stopping pack");
            break;
        }
        text = candidate_text;
        entries.push(entry);
    }

    let tokens_used = estimate_tokens(&text);
    InjectionResult {
        entries,
        text,
        tokens_used,
        token_budget,
        considered,
        eligible,
    }
}

/// Weighted relevance of one record for the context.
pub fn score_record(record: &LearnedRecord, ctx: &UsageContext) -> f32 {
    let mut score = 0.0;

    if let Some(path) = &ctx.file_path {
        if matches_patterns(&record_patterns(record), path) {
            score += FILE_MATCH_WEIGHT;
        }
    }

    if let (Some(record_category), Some(ctx_category)) = (record_category(record), ctx.category()) {
        // General-to-general agreement carries no information; the
        // category weight rewards a specific area lining up.
        if record_category == ctx_category && record_category != PatternCategory::General {
            score += CATEGORY_WEIGHT;
        }
    }

    if let Some(prompt) = &ctx.prompt {
        let prompt = prompt.to_lowercase();
        if record_keywords(record)
            .iter()
            .any(|k| prompt.contains(&k.to_lowercase()))
        {
            score += KEYWORD_WEIGHT;
        }
    }

    if !ctx.tags.is_empty() {
        let overlap = record_tags(record)
            .iter()
            .filter(|tag| ctx.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            .count();
        score += (overlap as f32 * TAG_WEIGHT_EACH).min(TAG_WEIGHT_CAP);
    }

    score + record.confidence() * CONFIDENCE_WEIGHT
}

fn matches_patterns(patterns: &[String], path: &str) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let mut builder = GlobSetBuilder::new();
    let mut any = false;
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
                any = true;
            }
            Err(e) => debug!(pattern, error = %e, "skipping unparsable trigger pattern"),
        }
    }
    if !any {
        return false;
    }
    match builder.build() {
        Ok(set) => set.is_match(path),
        Err(e) => {
            debug!(error = %e, "could not build glob set");
            false
        }
    }
}

fn record_patterns(record: &LearnedRecord) -> Vec<String> {
    match record {
        LearnedRecord::Candidate(c) => c.trigger.file_patterns.clone(),
        LearnedRecord::Delta(d) => delta_patterns(d),
    }
}

/// Deltas do not carry structured triggers; mine the condition text for
/// glob-looking tokens and derive extension globs from source files.
fn delta_patterns(delta: &Delta) -> Vec<String> {
    let mut patterns: Vec<String> = delta
        .condition
        .split_whitespace()
        .filter(|token| token.contains('*'))
        .map(|token| {
            token
                .trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '(' | ')'))
                .to_string()
        })
        .filter(|token| !token.is_empty())
        .collect();
    for source in &delta.source_events {
        if let Some(glob) = extension_glob(source) {
            if !patterns.contains(&glob) {
                patterns.push(glob);
            }
        }
    }
    patterns
}

fn record_category(record: &LearnedRecord) -> Option<PatternCategory> {
    match record {
        LearnedRecord::Candidate(c) => Some(c.category),
        LearnedRecord::Delta(d) => d
            .source_events
            .iter()
            .find_map(|source| PatternCategory::from_path(source)),
    }
}

fn record_keywords(record: &LearnedRecord) -> Vec<String> {
    match record {
        LearnedRecord::Candidate(c) => c.trigger.keywords.clone(),
        LearnedRecord::Delta(d) => detect::extract_keywords(&d.problem),
    }
}

fn record_tags(record: &LearnedRecord) -> &[String] {
    match record {
        LearnedRecord::Candidate(c) => &c.tags,
        LearnedRecord::Delta(_) => &[],
    }
}

/// One-line injectable form of either record shape.
pub fn record_line(record: &LearnedRecord) -> String {
    match record {
        LearnedRecord::Delta(d) => render::injection_line(d),
        LearnedRecord::Candidate(c) => {
            let condition = c
                .trigger
                .context
                .clone()
                .unwrap_or_else(|| format!("related to {}", c.trigger.keywords.join(", ")));
            format!(
                "- [{:.2}] {}: {}",
                c.metadata.confidence,
                collapse_whitespace(&condition),
                collapse_whitespace(&c.content.action_text()),
            )
        }
    }
}
