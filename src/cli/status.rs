//! Store status command

use metis_core::{
    error::Result,
    events::{AnalysisState, EventLog},
    schema,
};
use std::path::PathBuf;

use super::helpers::{open_playbook, open_store};

/// Handle the status command.
pub fn handle(global_store: Option<PathBuf>) -> Result<()> {
    let (store, config) = open_store(global_store)?;

    println!("Metis v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("Store");
    println!("  Path:   {}", store.root().display());
    println!(
        "  Status: {}",
        if store.exists() {
            "initialized"
        } else {
            "not initialized (run 'metis init')"
        }
    );
    println!();

    if !store.exists() {
        return Ok(());
    }

    let (playbook, corpus) = open_playbook(&store, &config);
    let deltas = playbook.read_deltas();
    let candidates = playbook.read_candidates();
    let lifecycle = &config.lifecycle;

    println!("Playbook");
    println!("  Deltas: {}", deltas.len());
    if !deltas.is_empty() {
        let mean: f32 =
            deltas.iter().map(|d| d.confidence).sum::<f32>() / deltas.len() as f32;
        let stale = deltas
            .iter()
            .filter(|d| {
                d.age_days() > lifecycle.prune_age_days
                    && d.feedback.confidence() < lifecycle.prune_success_rate
            })
            .count();
        println!("  Mean confidence: {:.2}", mean);
        println!("  Stale: {}", stale);
    }
    println!();

    println!("Staging");
    println!("  Candidates: {}", candidates.len());
    if !candidates.is_empty() {
        let promotable = candidates
            .iter()
            .filter(|c| schema::is_promotable(c.metadata.confidence))
            .count();
        println!("  Promotable: {}", promotable);
    }
    let by_category = corpus.counts_by_category();
    if !by_category.is_empty() {
        let summary: Vec<String> = by_category
            .iter()
            .map(|(category, count)| format!("{} {}", category, count))
            .collect();
        println!("  Corpus: {}", summary.join(", "));
    }
    println!();

    let log = EventLog::new(store.root());
    let state = AnalysisState::load(store.root());
    println!("Events");
    println!("  Logged: {}", log.line_count());
    println!("  Watermark: {}", state.watermark.format("%Y-%m-%d %H:%M:%S"));
    println!("  Analysis runs: {}", state.runs);

    Ok(())
}
