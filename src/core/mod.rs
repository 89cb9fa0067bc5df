//! Core archive pipeline.
//!
//! This module contains:
//! - ArchiveMover: destination planning and file relocation
//! - Orchestrator: stage sequencing and run summaries

pub mod mover;
pub mod orchestrator;

// Re-export commonly used types
pub use mover::{ArchiveMover, FileMove, MoveError, MovePlan, MoveReport, MovedFile};
pub use orchestrator::{
    Orchestrator, PlannedEntry, PreparedRun, RunError, RunSettings, Stage,
};
