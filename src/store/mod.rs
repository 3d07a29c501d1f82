//! Durable store primitives and on-disk layout.
//!
//! Everything Metis remembers lives under one store root:
//!
//! ```text
//! .metis/
//! ├── events.jsonl            # append-only tool-event log
//! ├── playbook.json           # active delta array
//! ├── candidates.json         # staging candidate array
//! ├── analysis_state.json     # analysis watermark
//! ├── archive/                # dated archive files
//! ├── patterns/               # one YAML record per file + index.json
//! └── playbook.lock           # ephemeral; owner PID as text
//! ```
//!
//! Writes are atomic (serialize to a `.tmp` sibling, rename over the
//! target); reads fail open (missing or corrupt files read as empty).
//! Mutation of the playbook and candidate stores goes through
//! [`playbook::Playbook`], which wraps every read-modify-write cycle in
//! the [`lock::StoreLock`].

pub mod corpus;
pub mod lock;
pub mod playbook;

pub use corpus::PatternCorpus;
pub use lock::StoreLock;
pub use playbook::Playbook;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;

pub const PLAYBOOK_FILE: &str = "playbook.json";
pub const CANDIDATES_FILE: &str = "candidates.json";
pub const LOCK_FILE: &str = "playbook.lock";
pub const ARCHIVE_DIR: &str = "archive";
pub const PATTERNS_DIR: &str = "patterns";

/// Path bookkeeping for a store root. Construction does no I/O; call
/// [`Store::init`] to materialize the layout.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn playbook_path(&self) -> PathBuf {
        self.root.join(PLAYBOOK_FILE)
    }

    pub fn candidates_path(&self) -> PathBuf {
        self.root.join(CANDIDATES_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join(ARCHIVE_DIR)
    }

    pub fn patterns_dir(&self) -> PathBuf {
        self.root.join(PATTERNS_DIR)
    }

    /// Create the store skeleton: the root, the archive and pattern
    /// directories. Files are created lazily on first write, so an
    /// initialized store starts empty and reads as empty.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(self.archive_dir())?;
        fs::create_dir_all(self.patterns_dir())?;
        debug!(root = %self.root.display(), "store layout ready");
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
///
/// The document lands in `<path>.tmp` first and is renamed over the
/// target, so readers only ever see a complete file. Repeat writes reuse
/// the same temporary name and leave no residue behind.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write_bytes(path, json.as_bytes())
}

/// Like [`atomic_write_json`], but first preserves the current file as
/// `<path>.bak` so one generation of history survives a bad write.
pub fn atomic_write_json_with_backup<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if path.exists() {
        let backup = sibling_with_extension(path, "bak");
        if let Err(e) = fs::copy(path, &backup) {
            warn!(path = %path.display(), error = %e, "could not preserve backup");
        }
    }
    atomic_write_json(path, value)
}

/// Write raw bytes through the same temp-then-rename discipline.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = sibling_with_extension(path, "tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn sibling_with_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(ext);
    path.with_file_name(name)
}

/// Read a JSON document, failing open: a missing file reads as the
/// default, and a corrupt file is logged and read as the default rather
/// than aborting the caller.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    read_json_opt(path).unwrap_or_default()
}

/// Read a JSON document if it exists and parses; `None` otherwise.
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable store file, treating as empty");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt store file, treating as empty");
            None
        }
    }
}
