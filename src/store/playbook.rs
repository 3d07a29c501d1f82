//! Playbook and candidate stores.
//!
//! `playbook.json` holds the active delta array and `candidates.json` the
//! staging candidate array. Both are mutated only through the `with_*_mut`
//! closures here, which wrap the whole read-modify-write cycle in the
//! store lock and re-validate every record before it is written back.
//!
//! Reads fail open: a missing file is an empty store, a corrupt file falls
//! back to the `.bak` generation before giving up, and individual entries
//! that no longer parse are dropped while the rest survive.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::LockConfig;
use crate::error::Result;
use crate::schema;
use crate::store::{atomic_write_json_with_backup, lock::StoreLock, Store};
use crate::types::{Delta, PatternCandidate};

pub struct Playbook {
    store: Store,
    lock: LockConfig,
}

impl Playbook {
    pub fn open(store: Store, lock: LockConfig) -> Self {
        Self { store, lock }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Lock-free snapshot of the active deltas. Ranking and status paths
    /// use this; they tolerate reading mid-update state.
    pub fn read_deltas(&self) -> Vec<Delta> {
        load_entries(&self.store.playbook_path())
    }

    /// Lock-free snapshot of the staged candidates.
    pub fn read_candidates(&self) -> Vec<PatternCandidate> {
        load_entries(&self.store.candidates_path())
    }

    /// Run `f` over the delta array under the store lock and write the
    /// result back atomically. Nothing is written when `f` fails.
    pub fn with_deltas_mut<R>(
        &self,
        f: impl FnOnce(&mut Vec<Delta>) -> Result<R>,
    ) -> Result<R> {
        let _lock = self.acquire()?;
        let mut deltas = load_entries(&self.store.playbook_path());
        let result = f(&mut deltas)?;
        self.write_deltas(&mut deltas)?;
        Ok(result)
    }

    /// Run `f` over the candidate array under the store lock.
    pub fn with_candidates_mut<R>(
        &self,
        f: impl FnOnce(&mut Vec<PatternCandidate>) -> Result<R>,
    ) -> Result<R> {
        let _lock = self.acquire()?;
        let mut candidates = load_entries(&self.store.candidates_path());
        let result = f(&mut candidates)?;
        self.write_candidates(&mut candidates)?;
        Ok(result)
    }

    /// Run `f` over both arrays in one critical section. Promotion moves
    /// records between the two stores and must see a consistent pair.
    pub fn with_records_mut<R>(
        &self,
        f: impl FnOnce(&mut Vec<Delta>, &mut Vec<PatternCandidate>) -> Result<R>,
    ) -> Result<R> {
        let _lock = self.acquire()?;
        let mut deltas = load_entries(&self.store.playbook_path());
        let mut candidates = load_entries(&self.store.candidates_path());
        let result = f(&mut deltas, &mut candidates)?;
        self.write_deltas(&mut deltas)?;
        self.write_candidates(&mut candidates)?;
        Ok(result)
    }

    fn acquire(&self) -> Result<StoreLock> {
        self.store.init()?;
        StoreLock::acquire(&self.store.lock_path(), &self.lock)
    }

    fn write_deltas(&self, deltas: &mut Vec<Delta>) -> Result<()> {
        deltas.retain(|d| {
            let violations = schema::delta_violations(d);
            if violations.is_empty() {
                true
            } else {
                warn!(id = %d.id, violations = violations.join("; "), "dropping invalid delta on write");
                false
            }
        });
        atomic_write_json_with_backup(&self.store.playbook_path(), deltas)
    }

    fn write_candidates(&self, candidates: &mut Vec<PatternCandidate>) -> Result<()> {
        candidates.retain(|c| {
            let violations = schema::candidate_violations(c);
            if violations.is_empty() {
                true
            } else {
                warn!(id = %c.id, violations = violations.join("; "), "dropping invalid candidate on write");
                false
            }
        });
        atomic_write_json_with_backup(&self.store.candidates_path(), candidates)
    }
}

/// Read a JSON array, dropping entries that fail to parse. A corrupt file
/// falls back to its `.bak` sibling; a missing file is simply empty.
fn load_entries<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    match try_load_entries(path) {
        Some(entries) => entries,
        None => {
            let backup = backup_path(path);
            match try_load_entries(&backup) {
                Some(entries) => {
                    warn!(
                        path = %path.display(),
                        recovered = entries.len(),
                        "store file corrupt, recovered from backup"
                    );
                    entries
                }
                None => {
                    warn!(path = %path.display(), "store file corrupt and no usable backup, starting empty");
                    Vec::new()
                }
            }
        }
    }
}

/// `Some(entries)` when the file is readable (missing counts as readable
/// and empty); `None` only when the file exists but is not a JSON array.
fn try_load_entries<T: DeserializeOwned>(path: &Path) -> Option<Vec<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Some(Vec::new()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable store file");
            return None;
        }
    };
    let values: Vec<serde_json::Value> = serde_json::from_str(&text).ok()?;
    let total = values.len();
    let entries: Vec<T> = values
        .into_iter()
        .filter_map(|v| match serde_json::from_value(v) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "dropping malformed store entry");
                None
            }
        })
        .collect();
    if entries.len() < total {
        warn!(
            path = %path.display(),
            dropped = total - entries.len(),
            kept = entries.len(),
            "dropped malformed store entries"
        );
    }
    Some(entries)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}
