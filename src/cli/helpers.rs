//! Shared helper functions for CLI commands
//!
//! Store resolution and opening live here so every handler resolves paths
//! and configuration the same way.

use metis_core::{
    config::{resolve_store_root, LearningConfig},
    error::Result,
    store::{PatternCorpus, Playbook, Store},
};
use std::path::PathBuf;
use tracing::debug;

/// Resolve the store root from the global `--store` flag and load its
/// configuration. Missing config falls back to defaults; a config file
/// that exists but fails to parse is an error.
pub fn open_store(global_store: Option<PathBuf>) -> Result<(Store, LearningConfig)> {
    let root = resolve_store_root(global_store);
    debug!(root = %root.display(), "using store");
    let config = LearningConfig::load_or_default(&root)?;
    Ok((Store::at(root), config))
}

/// Open the playbook and pattern corpus over a resolved store.
pub fn open_playbook(store: &Store, config: &LearningConfig) -> (Playbook, PatternCorpus) {
    let corpus = PatternCorpus::open(store);
    let playbook = Playbook::open(store.clone(), config.lock.clone());
    (playbook, corpus)
}
