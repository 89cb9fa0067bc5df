//! Operator-facing text for previews and run summaries.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::core::PreparedRun;
use crate::domain::{Failure, LogDestination, RunSummary};

/// Table of what would move where, followed by counts
pub fn preview(prepared: &PreparedRun) -> String {
    let mut out = String::new();
    let summary = &prepared.summary;

    let _ = writeln!(
        out,
        "Found {} entries: {} to archive, {} already archived, {} failed",
        summary.scanned,
        prepared.items.len(),
        summary.skipped_duplicate,
        summary.failed
    );

    if !prepared.items.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<28} {:<20} {:<24} DESTINATION",
            "IDENTIFIER", "TYPE", "USER"
        );
        let _ = writeln!(out, "{}", "-".repeat(100));
        for item in &prepared.items {
            let _ = writeln!(
                out,
                "{:<28} {:<20} {:<24} {}",
                truncate(item.record.identifier.as_str(), 28),
                item.record.variant.label(),
                truncate(&item.record.username, 24),
                item.plan.destination.display()
            );
        }

        let mut by_variant: BTreeMap<&str, usize> = BTreeMap::new();
        for item in &prepared.items {
            *by_variant.entry(item.record.variant.label()).or_default() += 1;
        }
        let _ = writeln!(out);
        for (label, count) in by_variant {
            let _ = writeln!(out, "  {:<20} {}", label, count);
        }
    }

    if !summary.duplicates.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Already archived:");
        for identifier in &summary.duplicates {
            let _ = writeln!(out, "  {}", identifier);
        }
    }

    write_failures(&mut out, &summary.failures);
    out
}

/// Counts, failures with reasons and where the ledger rows went
pub fn summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Run {}", summary.run_id);
    let _ = writeln!(out, "  Scanned:    {}", summary.scanned);
    let _ = writeln!(out, "  Archived:   {}", summary.archived);
    let _ = writeln!(out, "  Duplicates: {}", summary.skipped_duplicate);
    let _ = writeln!(out, "  Failed:     {}", summary.failed);

    write_failures(&mut out, &summary.failures);

    if !summary.logged.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Ledger:");
        for log in &summary.logged {
            let destination = match &log.destination {
                LogDestination::Remote => "remote ledger".to_string(),
                LogDestination::Local { path } => format!("local file {}", path.display()),
                LogDestination::Lost => "NOT RECORDED".to_string(),
            };
            let _ = write!(
                out,
                "  {}: {} row(s) -> {}",
                log.partition, log.rows, destination
            );
            if let Some(note) = &log.note {
                let _ = write!(out, " ({})", note);
            }
            let _ = writeln!(out);
        }
    }

    let lost = summary.lost_rows();
    if lost > 0 {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "WARNING: {} row(s) were archived but could not be recorded anywhere",
            lost
        );
    }
    out
}

fn write_failures(out: &mut String, failures: &[Failure]) {
    if failures.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Failures:");
    for failure in failures {
        let name = failure
            .identifier
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| failure.path.display().to_string());
        let _ = writeln!(out, "  [{}] {}: {}", failure.stage, name, failure.reason);
        if failure.partial {
            let _ = writeln!(out, "    partially moved; left in source:");
        }
        for path in &failure.unmoved {
            let _ = writeln!(out, "    {}", path.display());
        }
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
