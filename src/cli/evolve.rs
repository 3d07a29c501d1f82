//! Record lifecycle command (promotion, pruning, archival)

use metis_core::{error::Result, evolution::run_evolution};
use std::path::PathBuf;

use super::helpers::{open_playbook, open_store};

/// Handle the evolve command.
pub fn handle(global_store: Option<PathBuf>) -> Result<()> {
    let (store, config) = open_store(global_store)?;
    let (playbook, corpus) = open_playbook(&store, &config);

    println!("Running evolution pass...");
    let report = run_evolution(&playbook, &corpus, &config)?;

    let promotion = &report.promotion;
    println!("Promotion complete:");
    println!("  Candidates scanned: {}", promotion.scanned);
    println!("  Promoted: {}", promotion.promoted);
    println!("  Merged into existing: {}", promotion.merged);
    println!("  Duration: {:?}", promotion.duration);

    let pruning = &report.pruning;
    println!("Pruning complete:");
    println!(
        "  Deltas archived: {}/{}",
        pruning.archived_deltas, pruning.scanned_deltas
    );
    println!(
        "  Candidates archived: {}/{}",
        pruning.archived_candidates, pruning.scanned_candidates
    );
    if let Some(path) = &pruning.archive_path {
        println!("  Archive: {}", path.display());
    }
    println!("  Duration: {:?}", pruning.duration);

    if !promotion.fragments.is_empty() {
        println!();
        for fragment in &promotion.fragments {
            println!("{}", fragment.markdown);
        }
    }

    Ok(())
}
