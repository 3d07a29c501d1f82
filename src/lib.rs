//! Metis - Continual Learning Memory for Coding Agents
//!
//! A file-backed learning loop for agent harnesses that provides:
//! - Tool outcome classification into a small error taxonomy
//! - Pattern mining over the event log and correction detection in prompts
//! - Confidence scoring from weighted feedback with promotion and pruning
//! - Relevance-ranked injection of lessons under a token budget
//!
//! # Architecture
//!
//! The system is organized into several layers:
//! - **Types**: Core data structures (Delta, PatternCandidate, LearnedRecord)
//! - **Store**: Lock-protected JSON stores and the YAML pattern corpus
//! - **Analysis**: Classification, event grouping, correction detection, extraction
//! - **Lifecycle**: Deduplication, promotion, pruning, ranked injection
//!
//! # Example
//!
//! ```ignore
//! use metis_core::{LearnedRecord, LearningConfig, Playbook, Store};
//! use metis_core::inject::{build_injection, UsageContext};
//!
//! fn main() -> metis_core::error::Result<()> {
//!     let config = LearningConfig::default();
//!     let store = Store::at(".metis");
//!     let playbook = Playbook::open(store, config.lock.clone());
//!
//!     // Rank the playbook against the current task
//!     let records = playbook
//!         .read_deltas()
//!         .into_iter()
//!         .map(LearnedRecord::Delta)
//!         .collect();
//!     let ctx = UsageContext {
//!         file_path: Some("src/api/users.rs".to_string()),
//!         ..Default::default()
//!     };
//!     let block = build_injection(records, &ctx, &config.injection, None);
//!     println!("{}", block.text);
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod config;
pub mod dedup;
pub mod detect;
pub mod error;
pub mod events;
pub mod evolution;
pub mod extract;
pub mod inject;
pub mod render;
pub mod schema;
pub mod store;
pub mod types;
pub mod util;

// Re-export commonly used types
pub use config::LearningConfig;
pub use error::{MetisError, Result};
pub use store::{PatternCorpus, Playbook, Store};
pub use types::{
    Delta, DeltaId, FeedbackSignal, LearnedRecord, PatternCandidate, PatternCategory, PatternId,
    PatternKind, PatternSource,
};
