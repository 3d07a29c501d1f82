//! Correction detection over user prompts.
//!
//! Scores each prompt for "the user is correcting the agent" signals:
//! negation, redirection, quality complaints, explicit instruction. An
//! ignore list runs first so questions and simple acknowledgments never
//! score, no matter what vocabulary they contain. The `/learn` command and
//! memory directives ("remember this", "always/never ...") short-circuit
//! with fixed scores.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::PatternCategory;

/// Score at or above which a prompt counts as a correction.
pub const CORRECTION_THRESHOLD: f32 = 0.4;

/// Fixed score for the `/learn` command.
pub const EXPLICIT_TEACH_SCORE: f32 = 1.0;

/// Base score for memory directives.
pub const DIRECTIVE_SCORE: f32 = 0.6;

const NEGATION_WEIGHT: f32 = 0.30;
const REDIRECTION_WEIGHT: f32 = 0.30;
const QUALITY_WEIGHT: f32 = 0.25;
const INSTRUCTION_WEIGHT: f32 = 0.50;

/// Added when the prompt arrives right after the agent edited a file.
const RECENT_EDIT_BOOST: f32 = 0.15;
/// Added when the prompt carries a fenced code block.
const CODE_BLOCK_BOOST: f32 = 0.10;

/// Maximum keywords extracted from a prompt.
const MAX_KEYWORDS: usize = 10;

/// Which signal families fired on a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Negation,
    Redirection,
    Quality,
    Instruction,
    Directive,
    ExplicitTeach,
}

/// Conversation context the detector folds into its score.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    /// The agent edited a file just before this prompt arrived.
    pub recent_edit: bool,
    /// File the conversation is focused on, when known.
    pub active_file: Option<String>,
}

/// What the detector concluded about one prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Correction score in `[0.0, 1.0]`.
    pub score: f32,
    /// Whether the score cleared [`CORRECTION_THRESHOLD`].
    pub is_correction: bool,
    /// The prompt used the explicit `/learn` command.
    pub explicit_teach: bool,
    /// Payload after `/learn`, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teach_payload: Option<String>,
    /// Signal families that fired.
    pub signals: Vec<Signal>,
    /// Non-stopword keywords, lowercased, first-occurrence order.
    pub keywords: Vec<String>,
    /// Inferred category for downstream extraction.
    pub category: PatternCategory,
}

impl DetectionResult {
    fn ignored(prompt: &str, context: &PromptContext) -> Self {
        Self {
            score: 0.0,
            is_correction: false,
            explicit_teach: false,
            teach_payload: None,
            signals: Vec::new(),
            keywords: extract_keywords(prompt),
            category: infer_category(prompt, context),
        }
    }
}

static NEGATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(no|not|don't|dont|never|stop|wrong|incorrect)\b|\bthat's not\b")
        .expect("Valid negation regex")
});

static REDIRECTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(instead|rather|actually|use .+ not\b|switch to|change (it|this) to)\b")
        .expect("Valid redirection regex")
});

static QUALITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(broken|bug|buggy|doesn't work|does not work|worse|messy|sloppy|ugly|slow)\b")
        .expect("Valid quality regex")
});

static INSTRUCTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(you should|make sure|from now on|going forward|in (the )?future|please (use|avoid|keep))\b")
        .expect("Valid instruction regex")
});

static DIRECTIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bremember this\b|^(always|never)\b|\b(always|never) (use|do|add|put|run|write|prefer|avoid)\b")
        .expect("Valid directive regex")
});

static QUESTION_START_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(what|why|how|when|where|which|who|can you|could you|would you|is it|are there|do you|does)\b")
        .expect("Valid question regex")
});

static CODE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new("```").expect("Valid fence regex"));

// Short acknowledgments that end a turn without teaching anything.
const ACKNOWLEDGMENTS: &[&str] = &[
    "yes", "no", "ok", "okay", "sure", "yep", "nope", "thanks", "thank you", "sounds good",
    "looks good", "lgtm", "great", "perfect", "nice", "go ahead", "continue", "proceed",
    "please continue", "carry on", "makes sense",
];

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "then", "else", "when", "while", "for", "to",
    "of", "in", "on", "at", "by", "with", "from", "into", "about", "as", "is", "are", "was",
    "were", "be", "been", "being", "it", "its", "this", "that", "these", "those", "i", "you",
    "we", "they", "he", "she", "my", "your", "our", "their", "me", "us", "them", "do", "does",
    "did", "done", "have", "has", "had", "will", "would", "can", "could", "should", "shall",
    "may", "might", "must", "not", "don", "won", "isn", "aren", "wasn", "there", "here", "what",
    "which", "who", "how", "why", "where", "all", "any", "some", "more", "most", "other", "than",
    "too", "very", "just", "also", "only", "so", "up", "out", "no", "yes", "please", "make",
    "sure", "instead", "rather", "actually", "use", "using", "used",
];

/// Detects corrective intent in user prompts.
///
/// Stateless; one instance serves the whole process. The struct exists so
/// callers hold the compiled machinery behind one name, matching the other
/// analyzers in this codebase.
pub struct CorrectionDetector;

impl CorrectionDetector {
    pub fn new() -> Self {
        Self
    }

    /// Score one prompt against its context.
    pub fn detect(&self, prompt: &str, context: &PromptContext) -> DetectionResult {
        let trimmed = prompt.trim();

        // Ignore list runs before everything else: questions and bare
        // acknowledgments never score, regardless of vocabulary.
        if is_ignorable(trimmed) {
            return DetectionResult::ignored(trimmed, context);
        }

        if let Some(payload) = trimmed.strip_prefix("/learn") {
            let payload = payload.trim();
            return DetectionResult {
                score: EXPLICIT_TEACH_SCORE,
                is_correction: true,
                explicit_teach: true,
                teach_payload: (!payload.is_empty()).then(|| payload.to_string()),
                signals: vec![Signal::ExplicitTeach],
                keywords: extract_keywords(payload),
                category: infer_category(payload, context),
            };
        }

        // Memory directives carry a fixed score and skip the weighted
        // scan and the context boosts.
        if DIRECTIVE_RE.is_match(trimmed) {
            return DetectionResult {
                score: DIRECTIVE_SCORE,
                is_correction: DIRECTIVE_SCORE >= CORRECTION_THRESHOLD,
                explicit_teach: false,
                teach_payload: None,
                signals: vec![Signal::Directive],
                keywords: extract_keywords(trimmed),
                category: infer_category(trimmed, context),
            };
        }

        let mut signals = Vec::new();
        let mut score = 0.0;
        if NEGATION_RE.is_match(trimmed) {
            signals.push(Signal::Negation);
            score += NEGATION_WEIGHT;
        }
        if REDIRECTION_RE.is_match(trimmed) {
            signals.push(Signal::Redirection);
            score += REDIRECTION_WEIGHT;
        }
        if QUALITY_RE.is_match(trimmed) {
            signals.push(Signal::Quality);
            score += QUALITY_WEIGHT;
        }
        if INSTRUCTION_RE.is_match(trimmed) {
            signals.push(Signal::Instruction);
            score += INSTRUCTION_WEIGHT;
        }

        // Context boosts only amplify an existing signal; a prompt that
        // matched nothing stays at zero.
        if score > 0.0 {
            if context.recent_edit {
                score += RECENT_EDIT_BOOST;
            }
            if CODE_BLOCK_RE.is_match(trimmed) {
                score += CODE_BLOCK_BOOST;
            }
        }

        let score = score.min(1.0);

        DetectionResult {
            score,
            is_correction: score >= CORRECTION_THRESHOLD,
            explicit_teach: false,
            teach_payload: None,
            signals,
            keywords: extract_keywords(trimmed),
            category: infer_category(trimmed, context),
        }
    }
}

impl Default for CorrectionDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn is_ignorable(trimmed: &str) -> bool {
    if trimmed.is_empty() {
        return true;
    }
    if trimmed.ends_with('?') || QUESTION_START_RE.is_match(trimmed) {
        return true;
    }
    let lower = trimmed.to_lowercase();
    let lower = lower.trim_end_matches(['.', '!']);
    ACKNOWLEDGMENTS.contains(&lower)
}

/// Pull up to [`MAX_KEYWORDS`] content words out of a prompt: lowercased,
/// split on non-alphanumeric, stopwords and short tokens dropped, first
/// occurrence order preserved.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !STOPWORDS.contains(t))
    {
        if !keywords.iter().any(|k| k == token) {
            keywords.push(token.to_string());
            if keywords.len() >= MAX_KEYWORDS {
                break;
            }
        }
    }
    keywords
}

static PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\w./-]+\.[A-Za-z]{1,10}\b").expect("Valid path regex")
});

const BACKEND_HINTS: &[&str] = &[
    "api", "database", "sql", "query", "server", "endpoint", "migration", "schema", "backend",
    "handler", "auth",
];
const FRONTEND_HINTS: &[&str] = &[
    "css", "style", "styling", "component", "button", "layout", "render", "frontend", "page",
    "html", "react",
];
const WORKFLOW_HINTS: &[&str] = &[
    "pipeline", "docker", "deploy", "build", "makefile", "workflow", "lint", "release",
];

/// Infer a category from file paths mentioned in the prompt or the active
/// file, falling back to content hints, then `General`.
pub fn infer_category(text: &str, context: &PromptContext) -> PatternCategory {
    if let Some(active) = &context.active_file {
        if let Some(category) = PatternCategory::from_path(active) {
            return category;
        }
    }
    for m in PATH_RE.find_iter(text) {
        if let Some(category) = PatternCategory::from_path(m.as_str()) {
            return category;
        }
    }

    let lower = text.to_lowercase();
    let hits = |hints: &[&str]| hints.iter().filter(|h| lower.contains(*h)).count();
    let backend = hits(BACKEND_HINTS);
    let frontend = hits(FRONTEND_HINTS);
    let workflow = hits(WORKFLOW_HINTS);

    let best = backend.max(frontend).max(workflow);
    if best == 0 {
        PatternCategory::General
    } else if best == backend {
        PatternCategory::Backend
    } else if best == frontend {
        PatternCategory::Frontend
    } else {
        PatternCategory::Workflow
    }
}
