//! Recording archived rows.
//!
//! Rows go to the remote ledger first, one batch per partition, retried with
//! backoff on transport failures. A batch the remote ledger will not take
//! is appended to the local fallback file instead so it is never lost.

use tracing::{info, instrument, warn};

use crate::domain::{ledger_headers, LogDestination, LogRow, PartitionLog};

use super::{Ledger, LedgerError, LocalLedger, RetryPolicy};

/// Where the sink sends rows first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    /// Remote ledger, local file on failure
    Remote,
    /// Local file only
    LocalOnly,
}

impl std::fmt::Display for SinkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkMode::Remote => write!(f, "remote ledger"),
            SinkMode::LocalOnly => write!(f, "local log file"),
        }
    }
}

/// Batches rows per partition and persists them
pub struct LogSink<'a> {
    remote: Option<&'a dyn Ledger>,
    local: &'a LocalLedger,
    retry: RetryPolicy,
    headers: Vec<String>,
}

impl<'a> LogSink<'a> {
    /// `remote = None` forces local logging
    pub fn new(remote: Option<&'a dyn Ledger>, local: &'a LocalLedger, retry: RetryPolicy) -> Self {
        Self {
            remote,
            local,
            retry,
            headers: ledger_headers(),
        }
    }

    pub fn mode(&self) -> SinkMode {
        if self.remote.is_some() {
            SinkMode::Remote
        } else {
            SinkMode::LocalOnly
        }
    }

    /// Persist rows tagged with their partition.
    ///
    /// Partitions are written in first-seen order and row order is kept
    /// within each partition.
    pub async fn log(&self, rows: Vec<(String, LogRow)>) -> Vec<PartitionLog> {
        let mut outcomes = Vec::new();
        for (partition, batch) in group_by_partition(rows) {
            outcomes.push(self.write(&partition, &batch).await);
        }
        outcomes
    }

    /// Persist one partition's batch
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn write(&self, partition: &str, rows: &[LogRow]) -> PartitionLog {
        let mut note = None;

        if let Some(remote) = self.remote {
            match self.send_remote(remote, partition, rows).await {
                Ok(accepted) => {
                    info!(partition, accepted, "Rows recorded in remote ledger");
                    return PartitionLog {
                        partition: partition.to_string(),
                        rows: rows.len(),
                        accepted,
                        destination: LogDestination::Remote,
                        note: None,
                    };
                }
                Err(e) => {
                    warn!(partition, error = %e, "Remote ledger write failed, falling back to local log");
                    note = Some(e.to_string());
                }
            }
        }

        match self.local.append(partition, &self.headers, rows).await {
            Ok(accepted) => PartitionLog {
                partition: partition.to_string(),
                rows: rows.len(),
                accepted,
                destination: LogDestination::Local {
                    path: self.local.path_for(partition),
                },
                note,
            },
            Err(e) => {
                warn!(partition, error = %e, "Local log write failed");
                let reason = match note {
                    Some(remote) => format!("{}; local: {}", remote, e),
                    None => e.to_string(),
                };
                PartitionLog {
                    partition: partition.to_string(),
                    rows: rows.len(),
                    accepted: 0,
                    destination: LogDestination::Lost,
                    note: Some(reason),
                }
            }
        }
    }

    async fn send_remote(
        &self,
        remote: &dyn Ledger,
        partition: &str,
        rows: &[LogRow],
    ) -> Result<usize, LedgerError> {
        let mut attempt = 1;
        loop {
            match remote.append(partition, &self.headers, rows).await {
                Ok(accepted) => return Ok(accepted),
                Err(e) if e.is_retryable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        partition,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Remote append failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Group rows by partition, keeping first-seen partition order
pub fn group_by_partition(rows: Vec<(String, LogRow)>) -> Vec<(String, Vec<LogRow>)> {
    let mut groups: Vec<(String, Vec<LogRow>)> = Vec::new();
    for (partition, row) in rows {
        match groups.iter_mut().find(|(p, _)| *p == partition) {
            Some((_, batch)) => batch.push(row),
            None => groups.push((partition, vec![row])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LedgerColumn;
    use crate::ledger::{HealthReport, PartitionSnapshot};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Remote ledger failing a fixed number of times before succeeding
    struct FlakyLedger {
        failures: Mutex<u32>,
        error: fn() -> LedgerError,
        calls: Mutex<u32>,
    }

    impl FlakyLedger {
        fn new(failures: u32, error: fn() -> LedgerError) -> Self {
            Self {
                failures: Mutex::new(failures),
                error,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Ledger for FlakyLedger {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn health(&self) -> Result<HealthReport, LedgerError> {
            Ok(HealthReport::default())
        }

        async fn identifiers(&self) -> Result<Vec<PartitionSnapshot>, LedgerError> {
            Ok(vec![])
        }

        async fn append(&self, _: &str, _: &[String], rows: &[LogRow]) -> Result<usize, LedgerError> {
            *self.calls.lock().unwrap() += 1;
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err((self.error)());
            }
            Ok(rows.len())
        }
    }

    fn no_wait() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 2.0,
        }
    }

    fn row(identifier: &str) -> LogRow {
        let mut cells = vec![String::new(); LedgerColumn::ALL.len()];
        cells[1] = identifier.to_string();
        serde_json::from_value(serde_json::json!(cells)).unwrap()
    }

    #[test]
    fn test_grouping_keeps_first_seen_order() {
        let groups = group_by_partition(vec![
            ("P&V Manual Backup".to_string(), row("a")),
            ("Stories".to_string(), row("b")),
            ("P&V Manual Backup".to_string(), row("c")),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "P&V Manual Backup");
        assert_eq!(groups[0].1, vec![row("a"), row("c")]);
        assert_eq!(groups[1].0, "Stories");
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let temp = TempDir::new().unwrap();
        let local = LocalLedger::new(temp.path());
        let remote = FlakyLedger::new(2, || LedgerError::Timeout(30));
        let sink = LogSink::new(Some(&remote), &local, no_wait());

        let outcome = sink.write("Stories", &[row("abc123")]).await;
        assert_eq!(outcome.destination, LogDestination::Remote);
        assert_eq!(outcome.accepted, 1);
        assert_eq!(remote.calls(), 3);
        assert!(!local.path_for("Stories").exists());
    }

    #[tokio::test]
    async fn test_exhausted_retries_fall_back_to_local() {
        let temp = TempDir::new().unwrap();
        let local = LocalLedger::new(temp.path());
        let remote = FlakyLedger::new(10, || LedgerError::Unavailable("connection refused".into()));
        let sink = LogSink::new(Some(&remote), &local, no_wait());

        let outcome = sink.write("Stories", &[row("abc123"), row("def456")]).await;
        assert_eq!(remote.calls(), 3);
        assert_eq!(
            outcome.destination,
            LogDestination::Local {
                path: local.path_for("Stories")
            }
        );
        assert_eq!(outcome.accepted, 2);
        assert!(outcome.note.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_rejection_not_retried() {
        let temp = TempDir::new().unwrap();
        let local = LocalLedger::new(temp.path());
        let remote = FlakyLedger::new(1, || LedgerError::Rejected("no such tab".into()));
        let sink = LogSink::new(Some(&remote), &local, no_wait());

        let outcome = sink.write("Stories", &[row("abc123")]).await;
        assert_eq!(remote.calls(), 1);
        assert!(matches!(outcome.destination, LogDestination::Local { .. }));
    }

    #[tokio::test]
    async fn test_forced_local_mode() {
        let temp = TempDir::new().unwrap();
        let local = LocalLedger::new(temp.path());
        let sink = LogSink::new(None, &local, no_wait());
        assert_eq!(sink.mode(), SinkMode::LocalOnly);

        let outcomes = sink
            .log(vec![
                ("Stories".to_string(), row("a")),
                ("P&V Manual Backup".to_string(), row("b")),
            ])
            .await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.note.is_none() && o.accepted == 1));
        assert!(local.path_for("P&V Manual Backup").exists());
    }

    #[tokio::test]
    async fn test_unwritable_local_log_reports_lost_rows() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("logs");
        std::fs::write(&blocker, "not a directory").unwrap();
        let local = LocalLedger::new(&blocker);
        let sink = LogSink::new(None, &local, no_wait());

        let outcome = sink.write("Stories", &[row("a")]).await;
        assert_eq!(outcome.destination, LogDestination::Lost);
        assert_eq!(outcome.accepted, 0);
    }
}
