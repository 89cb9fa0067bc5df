//! The archive ledger.
//!
//! The ledger is the system of record for what has been archived. It is
//! reached through the [`Ledger`] trait, implemented by the remote
//! spreadsheet endpoint ([`HttpLedger`]) and the local CSV fallback
//! ([`LocalLedger`]). On top of it sit the duplicate index read at the start
//! of a run and the sink that records rows at the end.

pub mod dedup;
pub mod http;
pub mod local;
pub mod retry;
pub mod sink;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::LogRow;

pub use dedup::{DedupIndex, DedupSet};
pub use http::HttpLedger;
pub use local::LocalLedger;
pub use retry::RetryPolicy;
pub use sink::{LogSink, SinkMode};

/// Errors from ledger access
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger rejected the request: {0}")]
    Rejected(String),

    #[error("Ledger request timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid ledger response: {0}")]
    InvalidResponse(String),

    #[error("Ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl LedgerError {
    /// Transport failures are worth another attempt; rejections are not
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_) | LedgerError::Timeout(_))
    }
}

/// Identifiers held by one ledger partition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSnapshot {
    /// `None` for a snapshot covering every partition at once
    pub partition: Option<String>,

    pub identifiers: Vec<String>,
}

/// Result of a connectivity check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Total rows across partitions
    pub count: u64,

    /// Rows per partition
    #[serde(default)]
    pub counts: BTreeMap<String, u64>,
}

impl std::fmt::Display for HealthReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} existing entries", self.count)?;
        if !self.counts.is_empty() {
            let parts: Vec<String> = self
                .counts
                .iter()
                .map(|(partition, n)| format!("{}: {}", partition, n))
                .collect();
            write!(f, " ({})", parts.join(", "))?;
        }
        Ok(())
    }
}

/// A store of archived rows, partitioned by section
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Short name used in logs and reports
    fn name(&self) -> &str;

    /// Check connectivity and report row counts
    async fn health(&self) -> Result<HealthReport, LedgerError>;

    /// Every identifier already recorded, per partition
    async fn identifiers(&self) -> Result<Vec<PartitionSnapshot>, LedgerError>;

    /// Append rows to a partition. Returns the number of rows accepted.
    async fn append(
        &self,
        partition: &str,
        headers: &[String],
        rows: &[LogRow],
    ) -> Result<usize, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(LedgerError::Timeout(30).is_retryable());
        assert!(LedgerError::Unavailable("connection refused".into()).is_retryable());
        assert!(!LedgerError::Rejected("bad tab".into()).is_retryable());
        assert!(!LedgerError::InvalidResponse("html".into()).is_retryable());
    }

    #[test]
    fn test_health_report_display() {
        let mut report = HealthReport {
            count: 5,
            ..Default::default()
        };
        assert_eq!(report.to_string(), "5 existing entries");

        report.counts.insert("Stories".to_string(), 2);
        report.counts.insert("P&V Manual Backup".to_string(), 3);
        assert_eq!(
            report.to_string(),
            "5 existing entries (P&V Manual Backup: 3, Stories: 2)"
        );
    }
}
