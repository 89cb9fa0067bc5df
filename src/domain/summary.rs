//! Run summary: what happened to every entry of one pipeline run.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identifier::Identifier;

/// Execution mode of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Every decision is made, nothing is moved or logged
    DryRun,
    /// Full pipeline
    Apply,
}

/// Pipeline stage an entry failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Scan,
    Classify,
    Extract,
    Move,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Scan => write!(f, "scan"),
            FailureStage::Classify => write!(f, "classify"),
            FailureStage::Extract => write!(f, "extract"),
            FailureStage::Move => write!(f, "move"),
        }
    }
}

/// A failed entry with a human-readable reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub identifier: Option<Identifier>,

    pub path: PathBuf,

    pub stage: FailureStage,

    pub reason: String,

    /// Files left in the source after a partial move
    #[serde(default)]
    pub unmoved: Vec<PathBuf>,

    /// Some files of the entry were moved before the failure
    #[serde(default)]
    pub partial: bool,
}

impl Failure {
    pub fn new(
        identifier: Option<Identifier>,
        path: impl Into<PathBuf>,
        stage: FailureStage,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            identifier,
            path: path.into(),
            stage,
            reason: reason.into(),
            unmoved: Vec::new(),
            partial: false,
        }
    }

    /// Mark the failure as a partial move
    pub fn with_unmoved(mut self, unmoved: Vec<PathBuf>, partial: bool) -> Self {
        self.unmoved = unmoved;
        self.partial = partial;
        self
    }
}

/// Where a batch of ledger rows ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogDestination {
    /// Accepted by the remote ledger
    Remote,
    /// Appended to the local fallback file
    Local { path: PathBuf },
    /// Neither accepted the rows
    Lost,
}

/// Logging outcome for one partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionLog {
    pub partition: String,

    pub rows: usize,

    pub accepted: usize,

    pub destination: LogDestination,

    /// Why the remote path was not used, when it was not
    pub note: Option<String>,
}

/// Counts and failures of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,

    pub mode: RunMode,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    pub scanned: usize,

    pub classified: usize,

    pub skipped_duplicate: usize,

    pub archived: usize,

    pub failed: usize,

    /// Identifiers skipped because the ledger already holds them
    pub duplicates: Vec<Identifier>,

    pub failures: Vec<Failure>,

    pub logged: Vec<PartitionLog>,
}

impl RunSummary {
    pub fn new(mode: RunMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            started_at: Utc::now(),
            completed_at: None,
            scanned: 0,
            classified: 0,
            skipped_duplicate: 0,
            archived: 0,
            failed: 0,
            duplicates: Vec::new(),
            failures: Vec::new(),
            logged: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, failure: Failure) {
        self.failed += 1;
        self.failures.push(failure);
    }

    pub fn record_duplicate(&mut self, identifier: Identifier) {
        self.skipped_duplicate += 1;
        self.duplicates.push(identifier);
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    /// Whether every entry either archived or was skipped as duplicate
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Rows that reached neither the remote ledger nor the fallback file
    pub fn lost_rows(&self) -> usize {
        self.logged
            .iter()
            .filter(|l| l.destination == LogDestination::Lost)
            .map(|l| l.rows)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counters() {
        let mut summary = RunSummary::new(RunMode::Apply);
        summary.record_duplicate(Identifier::token("abc123"));
        summary.record_failure(Failure::new(
            None,
            "/src/unknown",
            FailureStage::Classify,
            "no rule matched",
        ));

        assert_eq!(summary.skipped_duplicate, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_clean());
        assert!(summary.completed_at.is_none());

        summary.complete();
        assert!(summary.completed_at.is_some());
    }

    #[test]
    fn test_lost_rows() {
        let mut summary = RunSummary::new(RunMode::Apply);
        summary.logged.push(PartitionLog {
            partition: "Stories".to_string(),
            rows: 2,
            accepted: 2,
            destination: LogDestination::Remote,
            note: None,
        });
        summary.logged.push(PartitionLog {
            partition: "P&V Manual Backup".to_string(),
            rows: 3,
            accepted: 0,
            destination: LogDestination::Lost,
            note: Some("disk full".to_string()),
        });
        assert_eq!(summary.lost_rows(), 3);
    }
}
