//! Common test utilities and helpers

use metis_core::{
    classify::{classify, ToolInvocation},
    config::{LearningConfig, LockConfig},
    events::{EventLog, ToolEvent},
    store::{Playbook, Store},
};
use tempfile::TempDir;

/// Create an initialized store in a fresh temp directory. The directory
/// guard must stay alive for the duration of the test.
pub fn test_store() -> (TempDir, Store, LearningConfig) {
    let dir = TempDir::new().expect("temp dir");
    let store = Store::at(dir.path().join(".metis"));
    store.init().expect("store init");
    let mut config = LearningConfig::default();
    // Tests that provoke contention should fail fast, not hang.
    config.lock = LockConfig {
        timeout_ms: 2000,
        retry_interval_ms: 10,
    };
    (dir, store, config)
}

/// Open a playbook over the test store.
pub fn test_playbook(store: &Store, config: &LearningConfig) -> Playbook {
    Playbook::open(store.clone(), config.lock.clone())
}

/// Classify and append one failing invocation, the way the observe
/// command does.
pub fn observe_failure(log: &EventLog, tool: &str, file: &str, error: &str) -> ToolEvent {
    let invocation = ToolInvocation {
        tool: tool.to_string(),
        exit_code: Some(1),
        error: Some(error.to_string()),
        file_path: Some(file.to_string()),
        ..Default::default()
    };
    append(log, &invocation)
}

/// Classify and append one clean invocation.
pub fn observe_success(log: &EventLog, tool: &str, file: &str) -> ToolEvent {
    let invocation = ToolInvocation {
        tool: tool.to_string(),
        exit_code: Some(0),
        response: Some("done".to_string()),
        file_path: Some(file.to_string()),
        ..Default::default()
    };
    append(log, &invocation)
}

fn append(log: &EventLog, invocation: &ToolInvocation) -> ToolEvent {
    let classification = classify(invocation);
    let event = ToolEvent::from_invocation(invocation, &classification);
    log.append(&event).expect("append event");
    event
}
