//! Context injection command
//!
//! Gathers every learned record, ranks it against the caller's context and
//! prints the packed injection block. The text format is what goes into a
//! prompt; json carries scores for tooling.

use metis_core::{
    error::Result,
    inject::{build_injection, UsageContext},
    types::LearnedRecord,
};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

use super::helpers::{open_playbook, open_store};

/// Handle the inject command.
pub fn handle(
    file: Option<String>,
    prompt: Option<String>,
    tags: Option<String>,
    budget: Option<usize>,
    format: String,
    global_store: Option<PathBuf>,
) -> Result<()> {
    let (store, config) = open_store(global_store)?;
    let (playbook, corpus) = open_playbook(&store, &config);

    // Both stores rank together. The corpus can hold hand-authored records
    // that never went through staging; candidates.json wins on id clashes.
    let mut records: Vec<LearnedRecord> = playbook
        .read_deltas()
        .into_iter()
        .map(LearnedRecord::Delta)
        .collect();
    let staged = playbook.read_candidates();
    let mut seen: HashSet<String> = staged.iter().map(|c| c.id.to_string()).collect();
    records.extend(staged.into_iter().map(LearnedRecord::Candidate));
    for candidate in corpus.load_all() {
        if seen.insert(candidate.id.to_string()) {
            records.push(LearnedRecord::Candidate(candidate));
        }
    }
    debug!(records = records.len(), "gathered records for ranking");

    let ctx = UsageContext {
        file_path: file,
        prompt,
        tags: tags
            .map(|t| {
                t.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    };

    let result = build_injection(records, &ctx, &config.injection, budget);

    match format.as_str() {
        "text" => {
            if !result.text.is_empty() {
                println!("{}", result.text);
            }
        }
        "json" => {
            let entries: Vec<_> = result
                .entries
                .iter()
                .map(|entry| {
                    serde_json::json!({
                        "id": entry.record.id_string(),
                        "score": entry.score,
                        "confidence": entry.record.confidence(),
                        "line": entry.line,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "entries": entries,
                    "tokens_used": result.tokens_used,
                    "token_budget": result.token_budget,
                    "considered": result.considered,
                    "eligible": result.eligible,
                })
            );
        }
        other => {
            return Err(anyhow::anyhow!(
                "unsupported inject format: {other} (expected text or json)"
            )
            .into());
        }
    }

    Ok(())
}
