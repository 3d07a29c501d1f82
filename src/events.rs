//! Append-only tool event log and the analysis cursor.
//!
//! Events land as one JSON object per line. Readers are fail-open: a
//! missing log yields nothing, a malformed line is dropped with a warning,
//! and neither ever aborts an analysis run. The cursor (`AnalysisState`)
//! records how far analysis has consumed the log; it only moves forward,
//! and only when the caller explicitly advances it after a successful run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::classify::{Classification, ErrorType, Outcome, ToolInvocation};
use crate::error::Result;
use crate::store::atomic_write_json;

/// File name of the event log inside the store root.
pub const EVENTS_FILE: &str = "events.jsonl";

/// File name of the persisted analysis cursor.
pub const ANALYSIS_STATE_FILE: &str = "analysis_state.json";

/// One observed tool invocation, already classified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEvent {
    /// Unique event id, `evt-<uuid>`.
    pub id: String,
    /// When the invocation was observed.
    pub timestamp: DateTime<Utc>,
    /// Session the invocation belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    /// Tool or skill name.
    pub skill: String,
    /// Verb within the skill, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// File the invocation touched, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Classified outcome.
    pub outcome: Outcome,
    /// Error taxonomy entry, when the classifier found error text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    /// Raw error text, truncated at ingest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Severity weight from the classifier, 0 when clean.
    #[serde(default)]
    pub severity: u8,
    /// Wall-clock duration, when measured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Error messages longer than this are truncated at ingest so a pathological
/// stderr dump cannot bloat the log.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

impl ToolEvent {
    /// Build an event from a raw invocation and its classification.
    pub fn from_invocation(invocation: &ToolInvocation, classification: &Classification) -> Self {
        let error_message = invocation
            .error
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(|e| truncate_chars(e, MAX_ERROR_MESSAGE_LEN));

        Self {
            id: format!("evt-{}", Uuid::new_v4()),
            timestamp: Utc::now(),
            session: invocation.session.clone(),
            skill: invocation.tool.clone(),
            action: invocation.action.clone(),
            file_path: invocation.file_path.clone(),
            outcome: classification.outcome,
            error_type: classification.error_type,
            error_message,
            severity: classification.severity,
            duration_ms: invocation.duration_ms,
        }
    }

    /// Grouping key for pattern mining: `skill:error_type` for anything that
    /// went wrong, `skill:success` for clean runs.
    pub fn group_key(&self) -> String {
        match self.outcome {
            Outcome::Success => format!("{}:success", self.skill),
            _ => {
                let error = self.error_type.unwrap_or(ErrorType::Unknown);
                format!("{}:{}", self.skill, error)
            }
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Handle to the JSONL event log.
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// Event log rooted at the given store directory.
    pub fn new(store_root: &Path) -> Self {
        Self {
            path: store_root.join(EVENTS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single JSON line.
    ///
    /// The newline rides in the same `write` as the payload; with
    /// `O_APPEND` that keeps concurrent appenders from interleaving lines.
    pub fn append(&self, event: &ToolEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Read events strictly newer than the watermark, oldest first, up to
    /// `max_events`.
    ///
    /// Fail-open: a missing log is an empty log, and malformed lines are
    /// dropped. An event stamped exactly at the watermark was consumed by
    /// the previous run and is excluded.
    pub fn read_since(&self, watermark: DateTime<Utc>, max_events: usize) -> Vec<ToolEvent> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => {
                debug!(path = %self.path.display(), "no event log, nothing to read");
                return Vec::new();
            }
        };

        let reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut malformed = 0usize;

        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!(error = %e, "unreadable line in event log, stopping read");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ToolEvent>(&line) {
                Ok(event) => {
                    if event.timestamp > watermark {
                        events.push(event);
                        if events.len() >= max_events {
                            break;
                        }
                    }
                }
                Err(e) => {
                    malformed += 1;
                    debug!(error = %e, "dropping malformed event line");
                }
            }
        }

        if malformed > 0 {
            warn!(malformed, "dropped malformed lines from event log");
        }
        events
    }

    /// Total line count, for status reporting. Missing log counts zero.
    pub fn line_count(&self) -> usize {
        match File::open(&self.path) {
            Ok(f) => BufReader::new(f).lines().map_while(|l| l.ok()).count(),
            Err(_) => 0,
        }
    }
}

/// Group events by [`ToolEvent::group_key`], preserving order within each
/// group. BTreeMap keeps group iteration deterministic across runs.
pub fn group_by_key(events: &[ToolEvent]) -> BTreeMap<String, Vec<&ToolEvent>> {
    let mut groups: BTreeMap<String, Vec<&ToolEvent>> = BTreeMap::new();
    for event in events {
        groups.entry(event.group_key()).or_default().push(event);
    }
    groups
}

/// Aggregated view of one event group, ready for pattern extraction.
#[derive(Debug, Clone)]
pub struct PatternGroup {
    /// Group key, `skill:error_type` or `skill:success`.
    pub key: String,
    /// Skill shared by every member.
    pub skill: String,
    /// Error taxonomy entry; `None` marks a success group.
    pub error_type: Option<ErrorType>,
    pub success_count: usize,
    pub failure_count: usize,
    pub partial_count: usize,
    /// Distinct `**/*.<ext>` globs derived from member file paths.
    pub file_patterns: Vec<String>,
    /// Distinct member file paths, first ten.
    pub related_files: Vec<String>,
    /// First non-empty error message seen, as a representative sample.
    pub sample_error: Option<String>,
    /// Member event ids, in input order.
    pub event_ids: Vec<String>,
    /// Highest severity among members.
    pub max_severity: u8,
    /// Timestamp of the newest member.
    pub last_seen: DateTime<Utc>,
}

impl PatternGroup {
    /// Total member count.
    pub fn occurrences(&self) -> usize {
        self.success_count + self.failure_count + self.partial_count
    }

    /// Whether this group collects things that went wrong.
    pub fn is_failure_group(&self) -> bool {
        self.error_type.is_some()
    }
}

const MAX_GROUP_FILES: usize = 10;

/// Aggregate events into groups and keep only those with at least
/// `min_occurrences` members. Output order follows the group key, so runs
/// over the same events extract in the same order.
pub fn group_for_patterns(events: &[ToolEvent], min_occurrences: u32) -> Vec<PatternGroup> {
    let mut groups: BTreeMap<String, PatternGroup> = BTreeMap::new();

    for event in events {
        let key = event.group_key();
        let entry = groups.entry(key.clone()).or_insert_with(|| PatternGroup {
            key,
            skill: event.skill.clone(),
            error_type: match event.outcome {
                Outcome::Success => None,
                _ => Some(event.error_type.unwrap_or(ErrorType::Unknown)),
            },
            success_count: 0,
            failure_count: 0,
            partial_count: 0,
            file_patterns: Vec::new(),
            related_files: Vec::new(),
            sample_error: None,
            event_ids: Vec::new(),
            max_severity: 0,
            last_seen: event.timestamp,
        });

        match event.outcome {
            Outcome::Success => entry.success_count += 1,
            Outcome::Failure => entry.failure_count += 1,
            Outcome::Partial => entry.partial_count += 1,
        }
        if let Some(path) = &event.file_path {
            if !entry.related_files.contains(path) && entry.related_files.len() < MAX_GROUP_FILES {
                entry.related_files.push(path.clone());
            }
            if let Some(pattern) = crate::util::extension_glob(path) {
                if !entry.file_patterns.contains(&pattern) {
                    entry.file_patterns.push(pattern);
                }
            }
        }
        if entry.sample_error.is_none() {
            entry.sample_error = event
                .error_message
                .as_deref()
                .filter(|m| !m.trim().is_empty())
                .map(String::from);
        }
        entry.event_ids.push(event.id.clone());
        entry.max_severity = entry.max_severity.max(event.severity);
        if event.timestamp > entry.last_seen {
            entry.last_seen = event.timestamp;
        }
    }

    groups
        .into_values()
        .filter(|g| g.occurrences() >= min_occurrences as usize)
        .collect()
}

/// Persisted cursor over the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisState {
    /// Everything at or before this timestamp has been analyzed.
    pub watermark: DateTime<Utc>,
    /// When analysis last ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    /// How many analysis runs have completed.
    #[serde(default)]
    pub runs: u64,
}

impl Default for AnalysisState {
    fn default() -> Self {
        Self {
            watermark: DateTime::<Utc>::UNIX_EPOCH,
            last_run: None,
            runs: 0,
        }
    }
}

impl AnalysisState {
    /// Load the cursor, falling back to the epoch default when the file is
    /// missing or unreadable. A corrupt cursor means events get re-analyzed,
    /// which dedup absorbs; losing events would not be recoverable.
    pub fn load(store_root: &Path) -> Self {
        let path = store_root.join(ANALYSIS_STATE_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(state) => state,
                Err(e) => {
                    warn!(error = %e, "corrupt analysis state, restarting from epoch");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Move the watermark forward and stamp the run. Backwards moves are
    /// ignored so a stale caller cannot cause re-consumption.
    pub fn advance(&mut self, new_watermark: DateTime<Utc>) {
        if new_watermark > self.watermark {
            self.watermark = new_watermark;
        }
        self.last_run = Some(Utc::now());
        self.runs += 1;
    }

    /// Persist the cursor atomically.
    pub fn save(&self, store_root: &Path) -> Result<()> {
        atomic_write_json(&store_root.join(ANALYSIS_STATE_FILE), self)
    }
}
