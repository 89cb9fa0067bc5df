//! Domain types for the archiver.
//!
//! This module contains the core data structures:
//! - Identifier: shortcodes and derived pseudo-identifiers
//! - CandidateEntry: a scanned subtree awaiting classification
//! - ContentRecord: a classified, metadata-enriched entry
//! - LogRow: a record rendered in ledger column order
//! - RunSummary: per-run counts and failures

pub mod candidate;
pub mod identifier;
pub mod record;
pub mod schema;
pub mod summary;

// Re-export commonly used types
pub use candidate::{CandidateEntry, EntryKind};
pub use identifier::Identifier;
pub use record::{
    ContentRecord, ContentVariant, Engagement, MediaHint, PathContext, Resharer, Section,
};
pub use schema::{ledger_headers, LedgerColumn, LogRow};
pub use summary::{
    Failure, FailureStage, LogDestination, PartitionLog, RunMode, RunSummary,
};
