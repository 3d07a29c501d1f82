//! Core data types for the Metis learning memory.
//!
//! This module defines the record shapes shared across the pipeline: the
//! [`Delta`] lesson record that lives in the playbook, the richer
//! [`PatternCandidate`] staged in the corpus, and the id newtypes that keep
//! the two from being confused at compile time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

use crate::schema::{self, FeedbackCounts};

/// Unique identifier for a delta record.
///
/// Wraps a UUID to provide type safety and prevent mixing playbook ids with
/// candidate ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeltaId(Uuid);

impl DeltaId {
    /// Generate a new random delta id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id from its string representation.
    pub fn from_string(s: &str) -> crate::error::Result<Self> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DeltaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeltaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a pattern candidate staged in the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(Uuid);

impl PatternId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> crate::error::Result<Self> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PatternId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A compact lesson extracted from observed behavior.
///
/// The problem/condition/solution triple is the unit the injector renders
/// into prompts. Feedback counters are never mutated directly by callers;
/// they move through [`Delta::record_feedback`] so the clamp and the derived
/// confidence stay consistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    /// Stable unique id.
    pub id: DeltaId,
    /// What went wrong, or what to avoid.
    pub problem: String,
    /// What to do instead.
    pub solution: String,
    /// When this lesson applies.
    pub condition: String,
    /// Feedback tallies, flattened into the record for a stable on-disk shape.
    #[serde(flatten)]
    pub feedback: FeedbackCounts,
    /// Derived success score in `[0.0, 1.0]`. Recomputed from `feedback` on
    /// every mutation; stored so readers never need the formula. A record
    /// file missing the field ranks at the documented default.
    #[serde(default = "schema::default_ranking_confidence")]
    pub confidence: f32,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last time this delta received helpful or human feedback. Also
    /// refreshed when another record is merged into this one.
    pub last_helpful: DateTime<Utc>,
    /// Event ids that contributed to this lesson, oldest first, deduplicated.
    #[serde(default)]
    pub source_events: Vec<String>,
}

impl Delta {
    /// Create a delta with the given triple and starting confidence.
    ///
    /// The starting confidence comes from the extractor (group statistics or
    /// detection score), not from feedback; the counters start at zero.
    pub fn new(
        problem: impl Into<String>,
        solution: impl Into<String>,
        condition: impl Into<String>,
        initial_confidence: f32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: DeltaId::new(),
            problem: problem.into(),
            solution: solution.into(),
            condition: condition.into(),
            feedback: FeedbackCounts::default(),
            confidence: initial_confidence.clamp(0.0, 1.0),
            created: now,
            last_helpful: now,
            source_events: Vec::new(),
        }
    }

    /// Apply one feedback signal and recompute confidence.
    ///
    /// Increments saturate before the clamp, so a stored counter past the
    /// ceiling settles back to the ceiling instead of overflowing.
    pub fn record_feedback(&mut self, signal: FeedbackSignal) {
        match signal {
            FeedbackSignal::Helpful => {
                self.feedback.helpful_count =
                    schema::clamp_count(self.feedback.helpful_count.saturating_add(1));
                self.last_helpful = Utc::now();
            }
            FeedbackSignal::NotHelpful => {
                self.feedback.not_helpful_count =
                    schema::clamp_count(self.feedback.not_helpful_count.saturating_add(1));
            }
            FeedbackSignal::HumanConfirmed => {
                self.feedback.human_feedback_count =
                    schema::clamp_count(self.feedback.human_feedback_count.saturating_add(1));
                self.last_helpful = Utc::now();
            }
        }
        self.confidence = self.feedback.confidence();
    }

    /// Append a source event id, skipping duplicates and honoring the cap.
    pub fn push_source_event(&mut self, event_id: impl Into<String>) {
        let event_id = event_id.into();
        if self.source_events.contains(&event_id) {
            return;
        }
        if self.source_events.len() < schema::MAX_SOURCE_EVENTS {
            self.source_events.push(event_id);
        }
    }

    /// Age of this record in whole days.
    pub fn age_days(&self) -> i64 {
        (Utc::now() - self.created).num_days()
    }

    /// Days since the last helpful or human signal.
    pub fn days_since_helpful(&self) -> i64 {
        (Utc::now() - self.last_helpful).num_days()
    }
}

/// One unit of feedback against a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSignal {
    /// The agent applied the lesson and it worked.
    Helpful,
    /// The lesson was injected but did not help, or was wrong.
    NotHelpful,
    /// A human explicitly confirmed the lesson.
    HumanConfirmed,
}

impl fmt::Display for FeedbackSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackSignal::Helpful => write!(f, "helpful"),
            FeedbackSignal::NotHelpful => write!(f, "not_helpful"),
            FeedbackSignal::HumanConfirmed => write!(f, "human_confirmed"),
        }
    }
}

/// Broad area of the codebase a pattern applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    /// Server-side code, data stores, APIs.
    Backend,
    /// UI code, styling, markup.
    Frontend,
    /// Build, CI, tooling, shell.
    Workflow,
    /// Anything that does not fit the above.
    General,
}

impl PatternCategory {
    /// Infer a category from a file path, by extension and well-known names.
    ///
    /// Returns `None` when the path carries no signal, so callers can fall
    /// back to content-based inference.
    pub fn from_path(path: &str) -> Option<Self> {
        let lower = path.to_lowercase();
        let file_name = Path::new(&lower)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&lower);

        if file_name == "dockerfile"
            || file_name == "makefile"
            || file_name == "justfile"
            || lower.contains(".github/workflows")
            || lower.contains(".gitlab-ci")
        {
            return Some(PatternCategory::Workflow);
        }

        let ext = Path::new(&lower).extension().and_then(|e| e.to_str())?;
        match ext {
            "rs" | "go" | "py" | "rb" | "java" | "kt" | "c" | "cc" | "cpp" | "h" | "hpp"
            | "sql" | "proto" | "ex" | "exs" | "php" | "cs" => Some(PatternCategory::Backend),
            "js" | "jsx" | "ts" | "tsx" | "css" | "scss" | "less" | "html" | "vue" | "svelte" => {
                Some(PatternCategory::Frontend)
            }
            "sh" | "bash" | "yml" | "yaml" | "toml" | "mk" => Some(PatternCategory::Workflow),
            _ => None,
        }
    }

    /// Directory name used by the corpus store for this category.
    pub fn dir_name(&self) -> &'static str {
        match self {
            PatternCategory::Backend => "backend",
            PatternCategory::Frontend => "frontend",
            PatternCategory::Workflow => "workflow",
            PatternCategory::General => "general",
        }
    }
}

impl Default for PatternCategory {
    fn default() -> Self {
        PatternCategory::General
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// What kind of lesson a pattern encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Something observed to fail; avoid it.
    AntiPattern,
    /// Something observed to work; prefer it.
    BestPractice,
    /// A stated user preference.
    Preference,
    /// A project convention inferred from corrections.
    Convention,
    /// Explicitly taught via the learn command.
    Explicit,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatternKind::AntiPattern => "anti_pattern",
            PatternKind::BestPractice => "best_practice",
            PatternKind::Preference => "preference",
            PatternKind::Convention => "convention",
            PatternKind::Explicit => "explicit",
        };
        write!(f, "{s}")
    }
}

/// Where a pattern candidate originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSource {
    /// Mined from grouped tool events.
    ToolEvents,
    /// Detected in a user correction.
    Correction,
    /// Taught directly by the user.
    ExplicitTeach,
}

impl fmt::Display for PatternSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatternSource::ToolEvents => "tool_events",
            PatternSource::Correction => "correction",
            PatternSource::ExplicitTeach => "explicit_teach",
        };
        write!(f, "{s}")
    }
}

/// Conditions under which a pattern should surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Keywords that suggest the pattern is relevant.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Glob patterns over file paths, e.g. `src/**/*.rs`.
    #[serde(default)]
    pub file_patterns: Vec<String>,
    /// Free-text description of the triggering situation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// The substance of a pattern: what to avoid, what to do, and why.
///
/// Every field is optional; validation requires at least one to be
/// populated. An anti-pattern mined before a fix is known carries only
/// `wrong`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternContent {
    /// The mistaken approach, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrong: Option<String>,
    /// The correct approach, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
    /// Why the correct approach is correct, if captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl PatternContent {
    /// The injectable lesson text: the right approach when present,
    /// otherwise the mistake phrased as avoidance, otherwise the rationale.
    pub fn action_text(&self) -> String {
        if let Some(right) = self.right.as_deref().filter(|s| !s.trim().is_empty()) {
            return right.to_string();
        }
        if let Some(wrong) = self.wrong.as_deref().filter(|s| !s.trim().is_empty()) {
            return format!("Avoid: {wrong}");
        }
        self.rationale.clone().unwrap_or_default()
    }
}

/// Provenance and evidence counters for a pattern candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMetadata {
    /// How the candidate entered the corpus.
    pub source: PatternSource,
    /// Current confidence in `[0.0, 1.0]`. Hand-authored corpus records
    /// may omit it and rank at the documented default.
    #[serde(default = "schema::default_ranking_confidence")]
    pub confidence: f32,
    /// First time the underlying behavior was observed.
    pub first_seen: DateTime<Utc>,
    /// Most recent confirmation, observation, or teach.
    pub last_confirmed: DateTime<Utc>,
    /// Times the underlying behavior has been observed.
    pub occurrences: u32,
    /// Times the pattern was confirmed (by outcome or human).
    pub confirmations: u32,
    /// Times evidence contradicted the pattern.
    pub conflicts: u32,
    /// Files where the behavior was seen.
    #[serde(default)]
    pub related_files: Vec<String>,
}

impl PatternMetadata {
    /// Fresh metadata for a newly extracted candidate.
    pub fn new(source: PatternSource, confidence: f32) -> Self {
        let now = Utc::now();
        Self {
            source,
            confidence: confidence.clamp(0.0, 1.0),
            first_seen: now,
            last_confirmed: now,
            occurrences: 1,
            confirmations: 0,
            conflicts: 0,
            related_files: Vec::new(),
        }
    }
}

/// A structured pattern staged in the corpus, richer than a [`Delta`].
///
/// Candidates accumulate evidence (occurrences, confirmations, conflicts)
/// until promotion moves their lesson into the playbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternCandidate {
    /// Stable unique id.
    pub id: PatternId,
    /// Area of the codebase the pattern belongs to.
    pub category: PatternCategory,
    /// What kind of lesson it encodes.
    pub kind: PatternKind,
    /// When the pattern should surface.
    pub trigger: TriggerSpec,
    /// The lesson itself.
    pub content: PatternContent,
    /// Provenance and evidence.
    pub metadata: PatternMetadata,
    /// Freeform labels for filtering and relevance scoring.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PatternCandidate {
    /// Map evidence counters onto feedback counts for the shared
    /// confidence formula: confirmations count as helpful, conflicts as
    /// not-helpful. Explicit teaching counts as a human signal.
    pub fn feedback_view(&self) -> FeedbackCounts {
        let human = if self.metadata.source == PatternSource::ExplicitTeach {
            1
        } else {
            0
        };
        FeedbackCounts {
            helpful_count: schema::clamp_count(self.metadata.confirmations),
            not_helpful_count: schema::clamp_count(self.metadata.conflicts),
            human_feedback_count: human,
        }
    }

    /// Record one confirming observation and refresh confidence.
    pub fn record_confirmation(&mut self) {
        self.metadata.confirmations =
            schema::clamp_count(self.metadata.confirmations.saturating_add(1));
        self.metadata.last_confirmed = Utc::now();
        self.metadata.confidence = self.feedback_view().confidence();
    }

    /// Record one conflicting observation and refresh confidence.
    pub fn record_conflict(&mut self) {
        self.metadata.conflicts = schema::clamp_count(self.metadata.conflicts.saturating_add(1));
        self.metadata.confidence = self.feedback_view().confidence();
    }

    /// Condense this candidate into the playbook triple.
    ///
    /// The problem slot takes the wrong approach when present, otherwise a
    /// description of the trigger; solution is the lesson's action text;
    /// condition comes from trigger context or keywords.
    pub fn to_delta(&self) -> Delta {
        let problem = match &self.content.wrong {
            Some(w) => w.clone(),
            None => format!("Recurring issue: {}", self.describe_trigger()),
        };
        let condition = self
            .trigger
            .context
            .clone()
            .unwrap_or_else(|| self.describe_trigger());
        let mut delta = Delta::new(
            problem,
            self.content.action_text(),
            condition,
            self.metadata.confidence,
        );
        for file in &self.metadata.related_files {
            delta.push_source_event(file.clone());
        }
        delta
    }

    fn describe_trigger(&self) -> String {
        if let Some(ctx) = &self.trigger.context {
            return ctx.clone();
        }
        if !self.trigger.keywords.is_empty() {
            return format!("when working with {}", self.trigger.keywords.join(", "));
        }
        if !self.trigger.file_patterns.is_empty() {
            return format!("when editing {}", self.trigger.file_patterns.join(", "));
        }
        format!("{} work", self.category)
    }
}

/// Tagged union over everything the archive can hold.
///
/// Mixed-shape files (the archive, exports) carry the discriminant so
/// readers can dispatch without sniffing fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record_kind", rename_all = "snake_case")]
pub enum LearnedRecord {
    Delta(Delta),
    Candidate(PatternCandidate),
}

impl LearnedRecord {
    /// Confidence of the wrapped record.
    pub fn confidence(&self) -> f32 {
        match self {
            LearnedRecord::Delta(d) => d.confidence,
            LearnedRecord::Candidate(c) => c.metadata.confidence,
        }
    }

    /// Display id of the wrapped record.
    pub fn id_string(&self) -> String {
        match self {
            LearnedRecord::Delta(d) => d.id.to_string(),
            LearnedRecord::Candidate(c) => c.id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_id_roundtrip() {
        let id = DeltaId::new();
        let s = id.to_string();
        let parsed = DeltaId::from_string(&s).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_delta_id_rejects_garbage() {
        let err = DeltaId::from_string("not-a-uuid").unwrap_err();
        assert!(matches!(err, crate::error::MetisError::InvalidDeltaId(_)));
    }

    #[test]
    fn test_new_delta_clamps_confidence() {
        let d = Delta::new("p".repeat(20), "s".repeat(20), "c".repeat(10), 1.7);
        assert_eq!(d.confidence, 1.0);
        let d = Delta::new("p".repeat(20), "s".repeat(20), "c".repeat(10), -0.3);
        assert_eq!(d.confidence, 0.0);
    }

    #[test]
    fn test_feedback_updates_confidence_and_timestamp() {
        let mut d = Delta::new("p".repeat(20), "s".repeat(20), "c".repeat(10), 0.5);
        let before = d.last_helpful;
        d.record_feedback(FeedbackSignal::Helpful);
        assert_eq!(d.feedback.helpful_count, 1);
        assert_eq!(d.confidence, 1.0);
        assert!(d.last_helpful >= before);

        let ts_before_negative = d.last_helpful;
        d.record_feedback(FeedbackSignal::NotHelpful);
        assert!((d.confidence - 0.5).abs() < f32::EPSILON);
        // Negative feedback must not refresh the helpful timestamp.
        assert_eq!(d.last_helpful, ts_before_negative);
    }

    #[test]
    fn test_human_feedback_weighs_triple() {
        let mut d = Delta::new("p".repeat(20), "s".repeat(20), "c".repeat(10), 0.0);
        d.record_feedback(FeedbackSignal::HumanConfirmed);
        d.record_feedback(FeedbackSignal::NotHelpful);
        // (0 + 3*1) / (0 + 3*1 + 1) = 0.75
        assert!((d.confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_feedback_increment_saturates_past_ceiling() {
        // A hand-edited store can hold any u32; one more signal settles the
        // counter at the ceiling instead of wrapping.
        let mut d = Delta::new("p".repeat(20), "s".repeat(20), "c".repeat(10), 0.5);
        d.feedback.helpful_count = u32::MAX;
        d.record_feedback(FeedbackSignal::Helpful);
        assert_eq!(d.feedback.helpful_count, schema::MAX_FEEDBACK_COUNT);
        assert_eq!(d.confidence, 1.0);

        let mut c = PatternCandidate {
            id: PatternId::new(),
            category: PatternCategory::General,
            kind: PatternKind::Convention,
            trigger: TriggerSpec::default(),
            content: PatternContent {
                wrong: None,
                right: Some("keep module docs current".into()),
                rationale: None,
            },
            metadata: PatternMetadata::new(PatternSource::Correction, 0.5),
            tags: vec![],
        };
        c.metadata.conflicts = u32::MAX;
        c.record_conflict();
        assert_eq!(c.metadata.conflicts, schema::MAX_FEEDBACK_COUNT);
        c.record_confirmation();
        assert_eq!(c.metadata.confirmations, 1);
    }

    #[test]
    fn test_source_events_dedup_and_cap() {
        let mut d = Delta::new("p".repeat(20), "s".repeat(20), "c".repeat(10), 0.5);
        for i in 0..20 {
            d.push_source_event(format!("evt-{i}"));
            d.push_source_event(format!("evt-{i}"));
        }
        assert_eq!(d.source_events.len(), schema::MAX_SOURCE_EVENTS);
        assert_eq!(d.source_events[0], "evt-0");
    }

    #[test]
    fn test_category_from_path() {
        assert_eq!(
            PatternCategory::from_path("src/server/api.rs"),
            Some(PatternCategory::Backend)
        );
        assert_eq!(
            PatternCategory::from_path("web/App.tsx"),
            Some(PatternCategory::Frontend)
        );
        assert_eq!(
            PatternCategory::from_path(".github/workflows/ci.yml"),
            Some(PatternCategory::Workflow)
        );
        assert_eq!(
            PatternCategory::from_path("ops/Dockerfile"),
            Some(PatternCategory::Workflow)
        );
        assert_eq!(PatternCategory::from_path("README.md"), None);
        assert_eq!(PatternCategory::from_path("LICENSE"), None);
    }

    #[test]
    fn test_candidate_confidence_from_evidence() {
        let mut c = PatternCandidate {
            id: PatternId::new(),
            category: PatternCategory::Backend,
            kind: PatternKind::AntiPattern,
            trigger: TriggerSpec::default(),
            content: PatternContent {
                wrong: Some("using blocking IO in the handler".into()),
                right: Some("spawn blocking work on the worker pool".into()),
                rationale: None,
            },
            metadata: PatternMetadata::new(PatternSource::ToolEvents, 0.3),
            tags: vec![],
        };
        c.record_confirmation();
        c.record_confirmation();
        c.record_conflict();
        // (2 + 0) / (2 + 0 + 1)
        assert!((c.metadata.confidence - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_candidate_to_delta_uses_wrong_as_problem() {
        let c = PatternCandidate {
            id: PatternId::new(),
            category: PatternCategory::Frontend,
            kind: PatternKind::Convention,
            trigger: TriggerSpec {
                keywords: vec!["styling".into()],
                file_patterns: vec!["**/*.css".into()],
                context: Some("when writing component styles".into()),
            },
            content: PatternContent {
                wrong: Some("inline style attributes scattered in markup".into()),
                right: Some("use the shared stylesheet tokens".into()),
                rationale: Some("keeps theming consistent".into()),
            },
            metadata: PatternMetadata::new(PatternSource::Correction, 0.6),
            tags: vec!["css".into()],
        };
        let d = c.to_delta();
        assert_eq!(d.problem, "inline style attributes scattered in markup");
        assert_eq!(d.solution, "use the shared stylesheet tokens");
        assert_eq!(d.condition, "when writing component styles");
        assert_eq!(d.confidence, 0.6);
    }

    #[test]
    fn test_action_text_prefers_right_then_wrong_then_rationale() {
        let both = PatternContent {
            wrong: Some("committing straight to main".into()),
            right: Some("open a review branch first".into()),
            rationale: None,
        };
        assert_eq!(both.action_text(), "open a review branch first");

        let wrong_only = PatternContent {
            wrong: Some("committing straight to main".into()),
            right: None,
            rationale: None,
        };
        assert_eq!(wrong_only.action_text(), "Avoid: committing straight to main");

        let rationale_only = PatternContent {
            wrong: None,
            right: None,
            rationale: Some("the hook rejects unreviewed commits".into()),
        };
        assert_eq!(
            rationale_only.action_text(),
            "the hook rejects unreviewed commits"
        );
    }

    #[test]
    fn test_wrong_only_candidate_condenses_to_avoidance() {
        let c = PatternCandidate {
            id: PatternId::new(),
            category: PatternCategory::Workflow,
            kind: PatternKind::AntiPattern,
            trigger: TriggerSpec {
                keywords: vec!["git".into()],
                file_patterns: vec![],
                context: None,
            },
            content: PatternContent {
                wrong: Some("force-pushing over shared branches".into()),
                right: None,
                rationale: None,
            },
            metadata: PatternMetadata::new(PatternSource::ToolEvents, 0.4),
            tags: vec![],
        };
        let d = c.to_delta();
        assert_eq!(d.problem, "force-pushing over shared branches");
        assert_eq!(d.solution, "Avoid: force-pushing over shared branches");
        assert_eq!(d.condition, "when working with git");
    }

    #[test]
    fn test_learned_record_tagging() {
        let d = Delta::new("p".repeat(20), "s".repeat(20), "c".repeat(10), 0.5);
        let rec = LearnedRecord::Delta(d);
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("\"record_kind\":\"delta\""));
        let back: LearnedRecord = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, LearnedRecord::Delta(_)));
    }

    #[test]
    fn test_delta_serde_roundtrip_preserves_fields() {
        let mut d = Delta::new(
            "tests time out when the suite spawns a real server",
            "stub the network layer with the in-process fake",
            "when running the integration suite",
            0.4,
        );
        d.record_feedback(FeedbackSignal::Helpful);
        d.push_source_event("evt-123");

        let json = serde_json::to_string(&d).unwrap();
        // Counters serialize flat, not nested under a `feedback` key.
        assert!(json.contains("\"helpful_count\":1"));
        assert!(!json.contains("\"feedback\""));

        let back: Delta = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, d.id);
        assert_eq!(back.problem, d.problem);
        assert_eq!(back.solution, d.solution);
        assert_eq!(back.condition, d.condition);
        assert_eq!(back.feedback, d.feedback);
        assert_eq!(back.confidence, d.confidence);
        assert_eq!(back.source_events, d.source_events);
    }
}
