//! Tool outcome observation command
//!
//! The agent harness pipes one invocation record per call, typically from
//! a post-tool hook. Classification happens here so the event log already
//! carries outcome and error type when analysis reads it.

use metis_core::{
    classify::{classify, ToolInvocation},
    error::Result,
    events::{EventLog, ToolEvent},
};
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;

use super::helpers::open_store;

/// Handle the observe command: read one invocation from stdin, classify
/// it and append the event.
pub fn handle(global_store: Option<PathBuf>) -> Result<()> {
    let mut payload = String::new();
    std::io::stdin().read_to_string(&mut payload)?;

    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("observe expects a JSON invocation on stdin").into());
    }

    let invocation: ToolInvocation = serde_json::from_str(trimmed)?;
    let classification = classify(&invocation);
    debug!(
        tool = %invocation.tool,
        outcome = %classification.outcome,
        "classified invocation"
    );

    let (store, _config) = open_store(global_store)?;
    store.init()?;

    let event = ToolEvent::from_invocation(&invocation, &classification);
    let log = EventLog::new(store.root());
    log.append(&event)?;

    println!("Recorded {} ({})", event.skill, event.outcome);
    Ok(())
}
