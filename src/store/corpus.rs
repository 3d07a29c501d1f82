//! Browsable pattern corpus.
//!
//! Each candidate is mirrored as one YAML file under its category
//! subdirectory (`patterns/backend/<id>.yaml`), with `patterns/index.json`
//! mapping id to file, category, confidence and tags. The YAML side is
//! for humans and downstream tooling; `candidates.json` stays the machine
//! store. Every record write pairs with an index update.
//!
//! Ids come from disk and from the CLI, so they are sanitized before any
//! path is built; anything that could leave the corpus directory is
//! rejected with [`MetisError::PathEscape`].

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MetisError, Result};
use crate::store::{atomic_write_bytes, atomic_write_json, read_json_or_default, Store};
use crate::types::{PatternCandidate, PatternCategory};

pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Record file path relative to the corpus directory.
    pub file: String,
    pub category: PatternCategory,
    pub confidence: f32,
    #[serde(default)]
    pub tags: Vec<String>,
}

type CorpusIndex = BTreeMap<String, IndexEntry>;

pub struct PatternCorpus {
    dir: PathBuf,
}

impl PatternCorpus {
    pub fn open(store: &Store) -> Self {
        Self {
            dir: store.patterns_dir(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write (or overwrite) the YAML record for `candidate` and update
    /// the index in the same call.
    pub fn write(&self, candidate: &PatternCandidate) -> Result<()> {
        let id = candidate.id.to_string();
        let relative = format!("{}/{id}.yaml", candidate.category.dir_name());
        let path = self.resolve(&id, &relative)?;

        let yaml = serde_yaml::to_string(candidate)?;
        atomic_write_bytes(&path, yaml.as_bytes())?;

        let mut index = self.index();
        index.insert(
            id,
            IndexEntry {
                file: relative,
                category: candidate.category,
                confidence: candidate.metadata.confidence,
                tags: candidate.tags.clone(),
            },
        );
        self.write_index(&index)
    }

    /// Load one record by id. Missing or unparsable records read as
    /// `None`; only a malicious id is an error.
    pub fn load(&self, id: &str) -> Result<Option<PatternCandidate>> {
        sanitize_id(id)?;
        let index = self.index();
        let Some(entry) = index.get(id) else {
            return Ok(None);
        };
        let path = self.resolve(id, &entry.file)?;
        Ok(read_yaml_record(&path))
    }

    /// Remove a record and its index entry. Returns whether the id was
    /// present.
    pub fn remove(&self, id: &str) -> Result<bool> {
        sanitize_id(id)?;
        let mut index = self.index();
        let Some(entry) = index.remove(id) else {
            return Ok(false);
        };
        let path = self.resolve(id, &entry.file)?;
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "could not remove corpus record");
            }
        }
        self.write_index(&index)?;
        Ok(true)
    }

    /// Every record the index knows about that still parses.
    pub fn load_all(&self) -> Vec<PatternCandidate> {
        let index = self.index();
        index
            .iter()
            .filter_map(|(id, entry)| {
                let path = self.resolve(id, &entry.file).ok()?;
                read_yaml_record(&path)
            })
            .collect()
    }

    /// Record counts per category directory name, for `status`.
    pub fn counts_by_category(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.index().values() {
            *counts.entry(entry.category.dir_name()).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.index().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index().is_empty()
    }

    fn index(&self) -> CorpusIndex {
        read_json_or_default(&self.index_path())
    }

    fn write_index(&self, index: &CorpusIndex) -> Result<()> {
        atomic_write_json(&self.index_path(), index)
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// Build the absolute path for a record, rejecting anything that
    /// would land outside the corpus directory.
    fn resolve(&self, id: &str, relative: &str) -> Result<PathBuf> {
        sanitize_id(id)?;
        let path = self.dir.join(relative);
        if !path.starts_with(&self.dir) || relative.split('/').any(|part| part == "..") {
            return Err(MetisError::PathEscape(relative.to_string()));
        }
        Ok(path)
    }
}

/// Ids may only contain ASCII alphanumerics, hyphens and underscores.
fn sanitize_id(id: &str) -> Result<()> {
    if id.is_empty()
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(MetisError::PathEscape(id.to_string()));
    }
    Ok(())
}

fn read_yaml_record(path: &Path) -> Option<PatternCandidate> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "unreadable corpus record");
            }
            return None;
        }
    };
    match serde_yaml::from_str(&text) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "dropping unparsable corpus record");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        PatternContent, PatternId, PatternKind, PatternMetadata, PatternSource, TriggerSpec,
    };
    use tempfile::TempDir;

    fn corpus(dir: &TempDir) -> PatternCorpus {
        let store = Store::at(dir.path().join(".metis"));
        store.init().unwrap();
        PatternCorpus::open(&store)
    }

    fn candidate(category: PatternCategory) -> PatternCandidate {
        PatternCandidate {
            id: PatternId::new(),
            category,
            kind: PatternKind::BestPractice,
            trigger: TriggerSpec {
                keywords: vec!["fmt".into()],
                file_patterns: vec!["**/*.rs".into()],
                context: None,
            },
            content: PatternContent {
                wrong: None,
                right: Some("keep running the formatter before commits".into()),
                rationale: None,
            },
            metadata: PatternMetadata::new(PatternSource::ToolEvents, 0.32),
            tags: vec!["fmt".into(), "backend".into()],
        }
    }

    #[test]
    fn test_write_creates_record_and_index_entry() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus(&dir);
        let record = candidate(PatternCategory::Backend);
        let id = record.id.to_string();

        corpus.write(&record).unwrap();

        let expected = corpus.dir().join(format!("backend/{id}.yaml"));
        assert!(expected.exists());

        let index: CorpusIndex = read_json_or_default(&corpus.dir().join(INDEX_FILE));
        let entry = index.get(&id).unwrap();
        assert_eq!(entry.file, format!("backend/{id}.yaml"));
        assert_eq!(entry.category, PatternCategory::Backend);
        assert!((entry.confidence - 0.32).abs() < 1e-6);
    }

    #[test]
    fn test_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus(&dir);
        let record = candidate(PatternCategory::Frontend);
        let id = record.id.to_string();

        corpus.write(&record).unwrap();
        let loaded = corpus.load(&id).unwrap().unwrap();

        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.category, PatternCategory::Frontend);
        assert_eq!(loaded.content.right, record.content.right);
        assert_eq!(loaded.tags, record.tags);
    }

    #[test]
    fn test_wrong_only_record_survives_load() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus(&dir);
        let mut record = candidate(PatternCategory::Backend);
        record.content.right = None;
        record.content.wrong = Some("committing generated files to the repo".into());
        let id = record.id.to_string();

        corpus.write(&record).unwrap();

        // The file carries no right key at all, the same shape a
        // hand-authored wrong-only record has.
        let yaml = fs::read_to_string(corpus.dir().join(format!("backend/{id}.yaml"))).unwrap();
        assert!(!yaml.contains("right:"));

        let all = corpus.load_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content.right, None);
        assert_eq!(
            all[0].content.wrong.as_deref(),
            Some("committing generated files to the repo")
        );
    }

    #[test]
    fn test_remove_deletes_record_and_entry() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus(&dir);
        let record = candidate(PatternCategory::Backend);
        let id = record.id.to_string();

        corpus.write(&record).unwrap();
        assert!(corpus.remove(&id).unwrap());
        assert!(!corpus.remove(&id).unwrap());

        assert!(corpus.load(&id).unwrap().is_none());
        assert!(!corpus.dir().join(format!("backend/{id}.yaml")).exists());
    }

    #[test]
    fn test_traversal_id_rejected() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus(&dir);

        let err = corpus.remove("../../etc/passwd").unwrap_err();
        assert!(matches!(err, MetisError::PathEscape(_)));

        let err = corpus.load("a/b").unwrap_err();
        assert!(matches!(err, MetisError::PathEscape(_)));

        let err = corpus.load("").unwrap_err();
        assert!(matches!(err, MetisError::PathEscape(_)));
    }

    #[test]
    fn test_load_all_skips_corrupt_records() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus(&dir);

        let good = candidate(PatternCategory::Backend);
        let bad = candidate(PatternCategory::Workflow);
        corpus.write(&good).unwrap();
        corpus.write(&bad).unwrap();

        let bad_path = corpus.dir().join(format!("workflow/{}.yaml", bad.id));
        fs::write(&bad_path, ": not valid yaml: [").unwrap();

        let all = corpus.load_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, good.id);
    }

    #[test]
    fn test_counts_by_category() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus(&dir);

        corpus.write(&candidate(PatternCategory::Backend)).unwrap();
        corpus.write(&candidate(PatternCategory::Backend)).unwrap();
        corpus.write(&candidate(PatternCategory::General)).unwrap();

        let counts = corpus.counts_by_category();
        assert_eq!(counts.get("backend"), Some(&2));
        assert_eq!(counts.get("general"), Some(&1));
        assert_eq!(corpus.len(), 3);
    }

    #[test]
    fn test_missing_record_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let corpus = corpus(&dir);
        let record = candidate(PatternCategory::Backend);
        let id = record.id.to_string();

        corpus.write(&record).unwrap();
        fs::remove_file(corpus.dir().join(format!("backend/{id}.yaml"))).unwrap();

        assert!(corpus.load(&id).unwrap().is_none());
    }
}
