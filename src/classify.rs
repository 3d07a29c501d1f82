//! Tool outcome classification.
//!
//! Pure functions that turn a raw tool invocation record into an outcome
//! (success, failure, partial) and an error taxonomy entry with a severity
//! weight. No IO here; the event log and the observe command both call in.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A raw record of one tool invocation, as reported by the agent harness.
///
/// Only `tool`, `exit_code`, `error` and `response` drive classification;
/// the rest is context carried through to the event log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Name of the tool or skill that ran.
    pub tool: String,
    /// Process exit code, when the tool was a subprocess.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Explicit error payload, when the harness captured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-text response or combined output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Verb within the tool, e.g. `edit` or `run`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// File the invocation touched, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Session the invocation belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    /// Wall-clock duration, when the harness measured it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// How an invocation went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Partial,
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Partial => "partial",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse error taxonomy used for grouping recurring failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Validation,
    Type,
    Syntax,
    Timeout,
    Permission,
    NotFound,
    Network,
    Memory,
    Unknown,
}

impl ErrorType {
    /// Severity weight in `[1, 5]`. Environment-level failures
    /// (permissions, memory) rank highest; unclassified noise lowest.
    pub fn severity(&self) -> u8 {
        match self {
            ErrorType::Permission | ErrorType::Memory => 5,
            ErrorType::Timeout | ErrorType::Network => 4,
            ErrorType::Syntax | ErrorType::Type => 3,
            ErrorType::Validation | ErrorType::NotFound => 2,
            ErrorType::Unknown => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Validation => "validation",
            ErrorType::Type => "type",
            ErrorType::Syntax => "syntax",
            ErrorType::Timeout => "timeout",
            ErrorType::Permission => "permission",
            ErrorType::NotFound => "not_found",
            ErrorType::Network => "network",
            ErrorType::Memory => "memory",
            ErrorType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The classifier's verdict on one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    /// 0 when no error text was available, otherwise the taxonomy weight.
    pub severity: u8,
}

// Ordered: the first matching entry wins, so the more specific categories
// sit above the catch-all network/memory buckets.
static ERROR_PATTERNS: Lazy<Vec<(ErrorType, Regex)>> = Lazy::new(|| {
    vec![
        (
            ErrorType::Validation,
            Regex::new(r"(?i)validation|invalid\s+(argument|input|value|parameter|option)|constraint\s+violat|schema\s+mismatch")
                .expect("Valid validation regex"),
        ),
        (
            ErrorType::Type,
            Regex::new(r"(?i)type\s*(error|mismatch)|mismatched\s+types|cannot\s+convert|incompatible\s+type")
                .expect("Valid type regex"),
        ),
        (
            ErrorType::Syntax,
            Regex::new(r"(?i)syntax\s*error|parse\s+error|unexpected\s+(token|eof|end\s+of)|unterminated")
                .expect("Valid syntax regex"),
        ),
        (
            ErrorType::Timeout,
            Regex::new(r"(?i)timed?\s*out|deadline\s+exceeded").expect("Valid timeout regex"),
        ),
        (
            ErrorType::Permission,
            Regex::new(r"(?i)permission\s+denied|access\s+denied|unauthorized|forbidden|eacces|eperm|operation\s+not\s+permitted")
                .expect("Valid permission regex"),
        ),
        (
            ErrorType::NotFound,
            Regex::new(r"(?i)not\s+found|no\s+such\s+(file|directory|command)|does\s+not\s+exist|enoent")
                .expect("Valid not-found regex"),
        ),
        (
            ErrorType::Network,
            Regex::new(r"(?i)connection\s+(refused|reset|closed|aborted)|network\s+(error|unreachable)|econnrefused|econnreset|dns|host\s+unreachable")
                .expect("Valid network regex"),
        ),
        (
            ErrorType::Memory,
            Regex::new(r"(?i)out\s+of\s+memory|memory\s+(limit|exhausted)|allocation\s+fail|enomem|stack\s+overflow|\boom\b")
                .expect("Valid memory regex"),
        ),
    ]
});

static FAILURE_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(error|errors|failed|failure|exception|fatal|panic|panicked|aborted)\b")
        .expect("Valid failure marker regex")
});

static PARTIAL_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(warning|warnings|partial|partially|skipped|incomplete|degraded)\b")
        .expect("Valid partial marker regex")
});

/// Classify an error message into the taxonomy. First match in the
/// ordered table wins; text that matches nothing is `Unknown`.
pub fn classify_error_text(text: &str) -> ErrorType {
    for (error_type, pattern) in ERROR_PATTERNS.iter() {
        if pattern.is_match(text) {
            return *error_type;
        }
    }
    ErrorType::Unknown
}

/// Classify one invocation.
///
/// A non-zero exit code or a non-empty error field is a failure no matter
/// what the response says. Otherwise the response text decides: failure
/// markers beat partial markers beat success.
pub fn classify(invocation: &ToolInvocation) -> Classification {
    let explicit_error = invocation
        .error
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    let exit_failed = invocation.exit_code.is_some_and(|code| code != 0);

    let outcome = if exit_failed || explicit_error.is_some() {
        Outcome::Failure
    } else {
        match invocation.response.as_deref() {
            Some(response) if FAILURE_MARKERS.is_match(response) => Outcome::Failure,
            Some(response) if PARTIAL_MARKERS.is_match(response) => Outcome::Partial,
            _ => Outcome::Success,
        }
    };

    // Error text drives the taxonomy: the explicit error field if present,
    // else the response when the outcome is not clean.
    let error_text = match outcome {
        Outcome::Success => None,
        _ => explicit_error.or_else(|| {
            invocation
                .response
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
        }),
    };

    let error_type = error_text.map(classify_error_text);
    let severity = error_type.map_or(0, |t| t.severity());

    Classification {
        outcome,
        error_type,
        severity,
    }
}
