//! Local CSV fallback ledger.
//!
//! One append-only file per partition: `{dir}/archive_log_{slug}.csv`.
//! Rows that cannot reach the remote ledger land here, and the duplicate
//! index reads them back so that fallback-logged content is not archived
//! twice.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::domain::{LedgerColumn, LogRow};

use super::{HealthReport, Ledger, LedgerError, PartitionSnapshot};

const FILE_PREFIX: &str = "archive_log_";

/// CSV files standing in for ledger partitions
pub struct LocalLedger {
    dir: PathBuf,
    /// Partitions whose header row was already checked this run
    reconciled: Mutex<HashSet<String>>,
}

impl LocalLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            reconciled: Mutex::new(HashSet::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing a partition
    pub fn path_for(&self, partition: &str) -> PathBuf {
        self.dir.join(format!("{}{}.csv", FILE_PREFIX, slug(partition)))
    }

    /// Every fallback file currently present, sorted
    fn files(&self) -> Result<Vec<PathBuf>, LedgerError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let dir = glob::Pattern::escape(&self.dir.to_string_lossy());
        let pattern = Path::new(&dir).join(format!("{}*.csv", FILE_PREFIX));
        let paths = glob::glob(&pattern.to_string_lossy())
            .map_err(|e| LedgerError::InvalidResponse(format!("bad log pattern: {}", e)))?;

        let mut files: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
        files.sort();
        Ok(files)
    }

    /// Rewrite the header row of an existing file when it differs from `headers`
    fn reconcile_header(&self, path: &Path, headers: &[String]) -> Result<(), LedgerError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut records = reader.records();
        let current = match records.next() {
            Some(first) => first?,
            None => return Ok(()),
        };
        if current.iter().eq(headers.iter().map(String::as_str)) {
            return Ok(());
        }

        warn!(file = %path.display(), "Rewriting outdated header row");
        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_writer(temp.as_file_mut());
            writer.write_record(headers)?;
            for record in records {
                writer.write_record(&record?)?;
            }
            writer.flush()?;
        }
        temp.persist(path).map_err(|e| LedgerError::Io(e.error))?;
        Ok(())
    }

    fn append_sync(
        &self,
        partition: &str,
        headers: &[String],
        rows: &[LogRow],
    ) -> Result<usize, LedgerError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(partition);
        let has_content = fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);

        if has_content {
            let first_time = self
                .reconciled
                .lock()
                .map(|mut seen| seen.insert(partition.to_string()))
                .unwrap_or(true);
            if first_time {
                self.reconcile_header(&path, headers)?;
            }
        }

        let file = OpenOptions::new().append(true).create(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
        if !has_content {
            writer.write_record(headers)?;
        }
        for row in rows {
            writer.write_record(row.cells())?;
        }
        writer.flush()?;

        info!(file = %path.display(), rows = rows.len(), "Appended rows to local log");
        Ok(rows.len())
    }

    /// Identifiers recorded in one file, read from its Shortcode column
    fn read_identifiers(path: &Path) -> Result<Vec<String>, LedgerError> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let header = LedgerColumn::Shortcode.header();
        let column = reader
            .headers()?
            .iter()
            .position(|h| h == header)
            .unwrap_or(1);

        let mut identifiers = Vec::new();
        for record in reader.records() {
            if let Some(value) = record?.get(column) {
                identifiers.push(value.to_string());
            }
        }
        Ok(identifiers)
    }
}

#[async_trait]
impl Ledger for LocalLedger {
    fn name(&self) -> &str {
        "local"
    }

    async fn health(&self) -> Result<HealthReport, LedgerError> {
        let mut counts = BTreeMap::new();
        for path in self.files()? {
            let rows = Self::read_identifiers(&path)?.len() as u64;
            counts.insert(partition_label(&path), rows);
        }
        Ok(HealthReport {
            count: counts.values().sum(),
            counts,
        })
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn identifiers(&self) -> Result<Vec<PartitionSnapshot>, LedgerError> {
        let mut snapshots = Vec::new();
        for path in self.files()? {
            let identifiers = Self::read_identifiers(&path)?;
            debug!(file = %path.display(), count = identifiers.len(), "Loaded local identifiers");
            snapshots.push(PartitionSnapshot {
                partition: Some(partition_label(&path)),
                identifiers,
            });
        }
        Ok(snapshots)
    }

    async fn append(
        &self,
        partition: &str,
        headers: &[String],
        rows: &[LogRow],
    ) -> Result<usize, LedgerError> {
        self.append_sync(partition, headers, rows)
    }
}

/// File-name-safe form of a partition name ("P&V Manual Backup" -> "p_v_manual_backup")
pub fn slug(partition: &str) -> String {
    let mut out = String::with_capacity(partition.len());
    for c in partition.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "default".to_string()
    } else {
        trimmed.to_string()
    }
}

fn partition_label(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix(FILE_PREFIX))
        .unwrap_or_default()
        .to_string()
}
