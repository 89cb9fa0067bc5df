//! Pipeline orchestration.
//!
//! Sequences scanning, classification, extraction, duplicate filtering,
//! moving and logging for one source folder. Per-entry failures are
//! collected in the [`RunSummary`]; only a failed scan or an unreachable
//! ledger abort the run, and both happen before anything is moved.

use std::path::PathBuf;

use chrono::Local;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::classify::ContentClassifier;
use crate::domain::{
    CandidateEntry, ContentRecord, EntryKind, Failure, FailureStage, LogRow, RunMode, RunSummary,
    Section,
};
use crate::extract::MetadataExtractor;
use crate::ledger::{DedupIndex, Ledger, LedgerError, LocalLedger, LogSink, RetryPolicy};
use crate::scan::{FolderScanner, ScanError};

use super::mover::{ArchiveMover, MovePlan};

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Cannot load archived identifiers, nothing was moved: {0}")]
    LedgerUnavailable(#[source] LedgerError),
}

/// Pipeline stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scanning,
    Classifying,
    Deduping,
    DryRunReport,
    Archiving,
    Logging,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Scanning => "scanning",
            Stage::Classifying => "classifying",
            Stage::Deduping => "deduping",
            Stage::DryRunReport => "dry_run_report",
            Stage::Archiving => "archiving",
            Stage::Logging => "logging",
            Stage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Settings for one run
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Source folder to archive
    pub source: PathBuf,

    pub archive_root: PathBuf,

    /// Initials written to the Downloader column
    pub downloader: String,

    pub stories_partition: String,

    pub default_partition: String,

    pub retry: RetryPolicy,
}

/// An entry that passed every check and is ready to move
#[derive(Debug, Clone)]
pub struct PlannedEntry {
    pub entry: CandidateEntry,
    pub record: ContentRecord,
    pub plan: MovePlan,
    pub partition: String,
}

/// Result of the read-only stages
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub mode: RunMode,
    pub items: Vec<PlannedEntry>,
    pub summary: RunSummary,
}

/// Runs the archive pipeline
pub struct Orchestrator {
    settings: RunSettings,
    scanner: FolderScanner,
    classifier: ContentClassifier,
    extractor: MetadataExtractor,
    mover: ArchiveMover,
    /// `None` when logging is forced to the local file
    remote: Option<Box<dyn Ledger>>,
    local: LocalLedger,
}

impl Orchestrator {
    pub fn new(settings: RunSettings, remote: Option<Box<dyn Ledger>>, local: LocalLedger) -> Self {
        Self {
            scanner: FolderScanner::new(&settings.source),
            classifier: ContentClassifier::new(),
            extractor: MetadataExtractor::new(),
            mover: ArchiveMover::new(&settings.archive_root),
            settings,
            remote,
            local,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn local_ledger(&self) -> &LocalLedger {
        &self.local
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Run both halves of the pipeline
    pub async fn run(&self, mode: RunMode) -> Result<RunSummary, RunError> {
        let prepared = self.prepare(mode).await?;
        Ok(self.archive(prepared).await)
    }

    /// Scan, classify, extract and filter duplicates. Touches nothing.
    #[instrument(skip(self), fields(source = %self.settings.source.display()))]
    pub async fn prepare(&self, mode: RunMode) -> Result<PreparedRun, RunError> {
        let mut summary = RunSummary::new(mode);
        info!(run_id = %summary.run_id, ?mode, "Starting archive run");

        enter(Stage::Scanning);
        let outcome = self.scanner.scan()?;
        summary.scanned = outcome.total();

        for collision in &outcome.collisions {
            summary.record_failure(Failure::new(
                Some(collision.entry.identifier.clone()),
                &collision.entry.root,
                FailureStage::Scan,
                format!(
                    "duplicate identifier in source (kept {})",
                    collision.kept.display()
                ),
            ));
        }
        for unreadable in &outcome.unreadable {
            summary.record_failure(Failure::new(
                Some(unreadable.identifier.clone()),
                &unreadable.path,
                FailureStage::Scan,
                unreadable.reason.clone(),
            ));
        }

        enter(Stage::Classifying);
        let mut candidates = Vec::new();
        for mut entry in outcome {
            if entry.kind == EntryKind::Folder && self.mover.holds_folder(&entry.name).await {
                info!(identifier = %entry.identifier, "Resuming partially archived entry");
                entry.resumed = true;
            }

            let variant = match self.classifier.classify(&entry) {
                Ok(variant) => variant,
                Err(e) => {
                    summary.record_failure(Failure::new(
                        Some(entry.identifier.clone()),
                        &entry.root,
                        FailureStage::Classify,
                        e.to_string(),
                    ));
                    continue;
                }
            };
            summary.classified += 1;

            match self.extractor.extract(&entry, variant) {
                Ok(record) => candidates.push((entry, record)),
                Err(e) => summary.record_failure(Failure::new(
                    Some(entry.identifier.clone()),
                    &entry.root,
                    FailureStage::Extract,
                    e.to_string(),
                )),
            }
        }

        enter(Stage::Deduping);
        let mut sources: Vec<&dyn Ledger> = Vec::new();
        if let Some(remote) = &self.remote {
            sources.push(remote.as_ref());
        }
        sources.push(&self.local);
        let index = DedupIndex::load(&sources)
            .await
            .map_err(RunError::LedgerUnavailable)?;

        let mut items = Vec::new();
        for (entry, mut record) in candidates {
            if index.is_duplicate(&record.identifier) {
                info!(identifier = %record.identifier, "Already archived, skipping");
                summary.record_duplicate(record.identifier.clone());
                continue;
            }

            let plan = self.mover.plan(&entry, &record);
            record.destination = Some(plan.destination.clone());
            record.db_link = record
                .primary_media
                .as_deref()
                .and_then(|p| plan.target_of(p))
                .map(|p| p.to_path_buf());

            items.push(PlannedEntry {
                partition: self.partition_for(&record).to_string(),
                entry,
                record,
                plan,
            });
        }

        info!(
            planned = items.len(),
            duplicates = summary.skipped_duplicate,
            failed = summary.failed,
            "Prepared run"
        );
        Ok(PreparedRun {
            mode,
            items,
            summary,
        })
    }

    /// Move and log a prepared run. In dry-run mode only the summary is finalised.
    #[instrument(skip(self, prepared), fields(items = prepared.items.len()))]
    pub async fn archive(&self, prepared: PreparedRun) -> RunSummary {
        let PreparedRun {
            mode,
            items,
            mut summary,
        } = prepared;

        if mode == RunMode::DryRun {
            enter(Stage::DryRunReport);
            summary.complete();
            return summary;
        }

        enter(Stage::Archiving);
        let archived_on = Local::now().date_naive();
        let mut rows = Vec::new();
        for item in items {
            let report = self.mover.apply(&item.plan).await;
            if let Some(error) = &report.error {
                summary.record_failure(
                    Failure::new(
                        Some(item.record.identifier.clone()),
                        &item.entry.root,
                        FailureStage::Move,
                        error.to_string(),
                    )
                    .with_unmoved(report.unmoved.clone(), report.is_partial()),
                );
                continue;
            }

            summary.archived += 1;
            let mut record = item.record;
            if let Some(target) = record
                .primary_media
                .as_deref()
                .and_then(|p| report.target_of(p))
            {
                record.db_link = Some(target.to_path_buf());
            }
            rows.push((
                item.partition,
                LogRow::from_record(&record, archived_on, &self.settings.downloader),
            ));
        }

        enter(Stage::Logging);
        if !rows.is_empty() {
            let sink = LogSink::new(
                self.remote.as_deref(),
                &self.local,
                self.settings.retry.clone(),
            );
            summary.logged = sink.log(rows).await;
        }
        if summary.lost_rows() > 0 {
            warn!(rows = summary.lost_rows(), "Some rows could not be recorded anywhere");
        }

        enter(Stage::Done);
        summary.complete();
        info!(
            archived = summary.archived,
            duplicates = summary.skipped_duplicate,
            failed = summary.failed,
            "Archive run complete"
        );
        summary
    }

    fn partition_for(&self, record: &ContentRecord) -> &str {
        match record.context.section {
            Section::Stories => &self.settings.stories_partition,
            Section::General => &self.settings.default_partition,
        }
    }
}

fn enter(stage: Stage) {
    info!(%stage, "Entering stage");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::DryRunReport.to_string(), "dry_run_report");
        assert_eq!(Stage::Done.to_string(), "done");
    }
}
