//! Duplicate detection against the ledger.

use std::collections::HashSet;

use tracing::{info, instrument};

use crate::domain::Identifier;

use super::{Ledger, LedgerError};

/// Identifiers already archived, across every partition.
///
/// Compared as exact, case-sensitive strings after trimming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupSet {
    identifiers: HashSet<String>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identifier. Blank values are ignored.
    pub fn insert(&mut self, identifier: &str) -> bool {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.identifiers.insert(trimmed.to_string())
    }

    pub fn contains(&self, identifier: &Identifier) -> bool {
        self.identifiers.contains(identifier.as_str())
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for DedupSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = DedupSet::new();
        for identifier in iter {
            set.insert(identifier.as_ref());
        }
        set
    }
}

/// Snapshot of the ledger taken once at the start of a run
#[derive(Debug, Clone, Default)]
pub struct DedupIndex {
    set: DedupSet,
}

impl DedupIndex {
    /// Wrap an already-built set
    pub fn from_set(set: DedupSet) -> Self {
        Self { set }
    }

    /// Read every partition of every source and union the identifiers.
    ///
    /// Any source failing makes the whole load fail: without a complete
    /// snapshot duplicates cannot be ruled out.
    #[instrument(skip(sources), fields(sources = sources.len()))]
    pub async fn load(sources: &[&dyn Ledger]) -> Result<Self, LedgerError> {
        let mut set = DedupSet::new();
        for source in sources {
            let snapshots = source.identifiers().await.map_err(|e| match e {
                LedgerError::Unavailable(msg) => {
                    LedgerError::Unavailable(format!("{}: {}", source.name(), msg))
                }
                other => LedgerError::Unavailable(format!("{}: {}", source.name(), other)),
            })?;

            for snapshot in snapshots {
                for identifier in &snapshot.identifiers {
                    set.insert(identifier);
                }
            }
        }

        info!(identifiers = set.len(), "Loaded duplicate index");
        Ok(Self { set })
    }

    /// Pure lookup against the loaded snapshot
    pub fn is_duplicate(&self, identifier: &Identifier) -> bool {
        self.set.contains(identifier)
    }

    pub fn set(&self) -> &DedupSet {
        &self.set
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}
