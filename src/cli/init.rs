//! Store initialization command

use metis_core::config::CONFIG_FILE_NAME;
use metis_core::error::Result;
use std::path::PathBuf;
use tracing::debug;

use super::helpers::open_store;

/// Handle store initialization command
pub fn handle(global_store: Option<PathBuf>) -> Result<()> {
    let (store, config) = open_store(global_store)?;

    debug!("Initializing store at {}", store.root().display());
    store.init()?;

    // Write a default config the first time so the knobs are discoverable.
    // An existing file is left alone.
    let config_path = store.root().join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        config.to_file(&config_path)?;
        println!("Wrote default config: {}", config_path.display());
    }

    println!("Store initialized: {}", store.root().display());
    Ok(())
}
