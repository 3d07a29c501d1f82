//! Runtime configuration for the learning pipeline.
//!
//! Loaded from `config.toml` inside the store root when present, otherwise
//! defaults apply. Every knob validates on load so a bad value fails loudly
//! at startup instead of surfacing later as strange scoring behavior.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Directory name used for a project-local store.
pub const PROJECT_STORE_DIR: &str = ".metis";

/// Environment variable that overrides store root resolution.
pub const STORE_ENV_VAR: &str = "METIS_HOME";

/// Name of the config file inside the store root.
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main learning configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Event analysis settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Duplicate detection settings
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Promotion, pruning and archival settings
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Prompt injection settings
    #[serde(default)]
    pub injection: InjectionConfig,

    /// File lock settings
    #[serde(default)]
    pub lock: LockConfig,
}

/// Settings for the event analysis pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Minimum occurrences of a grouped failure before a lesson is extracted
    pub min_occurrences: u32,

    /// Maximum number of events consumed per analysis run
    pub max_events_per_run: usize,

    /// Correction-detection score at or above which a prompt is treated
    /// as a learnable correction
    pub detection_threshold: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 3,
            max_events_per_run: 1000,
            detection_threshold: 0.4,
        }
    }
}

/// Settings for near-duplicate merging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Jaccard similarity at or above which two records merge.
    /// Applies to each field independently; all three must clear it.
    pub similarity_threshold: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
        }
    }
}

/// Settings for record lifecycle management
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Records younger than this many days are never pruned
    pub prune_age_days: i64,

    /// Records past the age gate are archived only when their success
    /// rate is below this
    pub prune_success_rate: f32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            prune_age_days: 90,
            prune_success_rate: 0.20,
        }
    }
}

/// Settings for relevance-ranked prompt injection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionConfig {
    /// Maximum records injected per prompt
    pub max_records: usize,

    /// Relevance score below which a record never surfaces
    pub min_score: f32,

    /// Confidence below which a record never surfaces
    pub min_confidence: f32,

    /// Token budget used when the caller does not supply one
    pub default_token_budget: usize,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            max_records: 5,
            min_score: 0.2,
            min_confidence: 0.4,
            default_token_budget: 2000,
        }
    }
}

/// Settings for the cross-process store lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Give up acquiring the lock after this long
    pub timeout_ms: u64,

    /// Sleep between acquisition attempts
    pub retry_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            retry_interval_ms: 100,
        }
    }
}

impl LearningConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: LearningConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: LearningConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `config.toml` from the store root, falling back to defaults
    /// when the file does not exist. A file that exists but fails to parse
    /// or validate is an error, not a fallback to defaults.
    pub fn load_or_default(store_root: &Path) -> Result<Self, ConfigError> {
        let path = store_root.join(CONFIG_FILE_NAME);
        if path.exists() {
            debug!(path = %path.display(), "loading config");
            Self::from_file(&path)
        } else {
            debug!("no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.min_occurrences == 0 {
            return Err(ConfigError::ValidationError(
                "analysis: min_occurrences must be at least 1".to_string(),
            ));
        }
        if self.analysis.max_events_per_run == 0 {
            return Err(ConfigError::ValidationError(
                "analysis: max_events_per_run must be at least 1".to_string(),
            ));
        }
        validate_unit_range("analysis", "detection_threshold", self.analysis.detection_threshold)?;
        validate_unit_range("dedup", "similarity_threshold", self.dedup.similarity_threshold)?;
        if self.lifecycle.prune_age_days < 1 {
            return Err(ConfigError::ValidationError(
                "lifecycle: prune_age_days must be at least 1".to_string(),
            ));
        }
        validate_unit_range("lifecycle", "prune_success_rate", self.lifecycle.prune_success_rate)?;
        if self.injection.max_records == 0 {
            return Err(ConfigError::ValidationError(
                "injection: max_records must be at least 1".to_string(),
            ));
        }
        validate_unit_range("injection", "min_score", self.injection.min_score)?;
        validate_unit_range("injection", "min_confidence", self.injection.min_confidence)?;
        if self.lock.retry_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "lock: retry_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.lock.timeout_ms < self.lock.retry_interval_ms {
            return Err(ConfigError::ValidationError(
                "lock: timeout_ms must be at least retry_interval_ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }
}

fn validate_unit_range(section: &str, name: &str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(ConfigError::ValidationError(format!(
            "{section}: {name} must be within [0.0, 1.0], got {value}"
        )));
    }
    Ok(())
}

/// Resolve the store root directory.
///
/// Precedence: explicit path (CLI flag), then the `METIS_HOME` environment
/// variable, then a project-local `.metis/` directory if one exists in the
/// working directory, then the per-user data directory.
pub fn resolve_store_root(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    if let Ok(home) = std::env::var(STORE_ENV_VAR) {
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }
    let project_store = PathBuf::from(PROJECT_STORE_DIR);
    if project_store.is_dir() {
        return project_store;
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("metis")
}
