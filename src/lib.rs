//! sat-archiver - Instagram content archiver
//!
//! Moves downloaded Instagram content out of daily source folders into a
//! per-account archive and records every archived item in a spreadsheet
//! ledger.
//!
//! # Architecture
//!
//! A run is a fixed sequence of stages:
//! - Scan the source folder into candidate entries
//! - Classify each entry into a content variant
//! - Extract metadata into a record
//! - Drop entries the ledger already holds
//! - Move files into the archive and log one row per archived entry
//!
//! Dry runs stop after the duplicate check and move or log nothing.
//!
//! # Modules
//!
//! - `scan`: FolderScanner and name patterns
//! - `classify`: ContentClassifier
//! - `extract`: MetadataExtractor
//! - `ledger`: Ledger trait, HTTP and local ledgers, DedupIndex, LogSink
//! - `core`: ArchiveMover and Orchestrator
//! - `domain`: Data structures (Identifier, ContentRecord, LogRow, RunSummary)
//! - `config`: Configuration and canonical paths
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Preview the most recent source folder
//! sat-archiver run --dry-run
//!
//! # Archive a specific folder
//! sat-archiver run --folder "~/Downloads/SAT Daily on 2026-02-14" --initials AB
//!
//! # Check the ledger connection
//! sat-archiver check
//! ```

pub mod classify;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod extract;
pub mod ledger;
pub mod scan;

// Re-export main types at crate root for convenience
pub use classify::ContentClassifier;
pub use core::{ArchiveMover, Orchestrator, RunError, RunSettings};
pub use domain::{CandidateEntry, ContentRecord, ContentVariant, Identifier, RunMode, RunSummary};
pub use extract::MetadataExtractor;
pub use ledger::{DedupIndex, HttpLedger, Ledger, LedgerError, LocalLedger, LogSink};
pub use scan::FolderScanner;
