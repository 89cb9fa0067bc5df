//! Physical relocation of archived entries.
//!
//! Destinations live under `{archive_root}/{username}/`. Folder entries keep
//! their folder name and internal layout; grouped files land directly in the
//! user directory. Existing files are never overwritten: a numeric suffix
//! is appended instead. A failed move is not rolled back, so re-running the
//! archiver picks up whatever is still in the source.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::{CandidateEntry, ContentRecord, EntryKind, Identifier};

/// Highest numeric suffix tried before giving up
const MAX_SUFFIX: u32 = 9_999;

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("Cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No free destination name for {0}")]
    NoFreeName(PathBuf),
}

/// One file to relocate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMove {
    pub source: PathBuf,
    /// Preferred target; the actual target may carry a suffix
    pub target: PathBuf,
}

/// Where an entry's files will go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub identifier: Identifier,

    /// Source folder of a folder entry; cleaned up after a move
    pub source_root: PathBuf,

    pub kind: EntryKind,

    /// Destination directory
    pub destination: PathBuf,

    pub files: Vec<FileMove>,
}

impl MovePlan {
    /// Planned target of a source file
    pub fn target_of(&self, source: &Path) -> Option<&Path> {
        self.files
            .iter()
            .find(|f| f.source == source)
            .map(|f| f.target.as_path())
    }
}

/// A file that was relocated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedFile {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Outcome of applying a plan
#[derive(Debug, Default)]
pub struct MoveReport {
    pub moved: Vec<MovedFile>,

    /// Files still in the source
    pub unmoved: Vec<PathBuf>,

    /// The failure that stopped the move
    pub error: Option<MoveError>,
}

impl MoveReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.unmoved.is_empty()
    }

    /// Some files moved before a failure
    pub fn is_partial(&self) -> bool {
        !self.is_complete() && !self.moved.is_empty()
    }

    /// Actual target of a source file
    pub fn target_of(&self, source: &Path) -> Option<&Path> {
        self.moved
            .iter()
            .find(|m| m.source == source)
            .map(|m| m.target.as_path())
    }
}

/// Moves entries into the archive
#[derive(Debug, Clone)]
pub struct ArchiveMover {
    root: PathBuf,
}

impl ArchiveMover {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compute destinations. Pure: does not look at the filesystem.
    pub fn plan(&self, entry: &CandidateEntry, record: &ContentRecord) -> MovePlan {
        let user_dir = self.root.join(path_segment(&record.username));
        let destination = match entry.kind {
            EntryKind::Folder => user_dir.join(path_segment(&entry.name)),
            EntryKind::Files => user_dir,
        };

        let mut files: Vec<FileMove> = entry
            .files
            .iter()
            .map(|source| {
                let target = match entry.kind {
                    EntryKind::Folder => destination.join(entry.relative(source)),
                    EntryKind::Files => {
                        destination.join(source.file_name().unwrap_or(source.as_os_str()))
                    }
                };
                FileMove {
                    source: source.clone(),
                    target,
                }
            })
            .collect();
        // Metadata goes last so an interrupted move leaves it in the source
        files.sort_by_key(|f| is_metadata_file(&f.source));

        MovePlan {
            identifier: entry.identifier.clone(),
            source_root: entry.root.clone(),
            kind: entry.kind,
            destination,
            files,
        }
    }

    /// Whether some user directory of the archive already holds a folder
    /// named like this entry, left by an earlier interrupted move
    pub async fn holds_folder(&self, name: &str) -> bool {
        let segment = path_segment(name);
        let Ok(mut users) = fs::read_dir(&self.root).await else {
            return false;
        };
        while let Ok(Some(user)) = users.next_entry().await {
            let candidate = user.path().join(&segment);
            if fs::metadata(&candidate).await.is_ok_and(|m| m.is_dir()) {
                return true;
            }
        }
        false
    }

    /// Move every file of the plan, stopping at the first failure.
    ///
    /// Already-moved files stay where they are.
    pub async fn apply(&self, plan: &MovePlan) -> MoveReport {
        let mut report = MoveReport::default();

        let mut remaining = plan.files.iter();
        while let Some(file) = remaining.next() {
            match move_file(&file.source, &file.target).await {
                Ok(target) => {
                    debug!(from = %file.source.display(), to = %target.display(), "Moved");
                    report.moved.push(MovedFile {
                        source: file.source.clone(),
                        target,
                    });
                }
                Err(e) => {
                    warn!(identifier = %plan.identifier, error = %e, "Move failed");
                    report.unmoved.push(file.source.clone());
                    report.unmoved.extend(remaining.by_ref().map(|f| f.source.clone()));
                    report.error = Some(e);
                    break;
                }
            }
        }

        if plan.kind == EntryKind::Folder {
            remove_empty_dirs(&plan.source_root).await;
        }
        report
    }
}

async fn move_file(source: &Path, target: &Path) -> Result<PathBuf, MoveError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| MoveError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let target = free_target(target).await?;
    if fs::rename(source, &target).await.is_ok() {
        return Ok(target);
    }

    // Rename fails across filesystems; copy then delete
    if let Err(e) = fs::copy(source, &target).await {
        let _ = fs::remove_file(&target).await;
        return Err(MoveError::Move {
            from: source.to_path_buf(),
            to: target,
            source: e,
        });
    }
    fs::remove_file(source)
        .await
        .map_err(|e| MoveError::Move {
            from: source.to_path_buf(),
            to: target.clone(),
            source: e,
        })?;
    Ok(target)
}

/// First of `name.ext`, `name_1.ext`, `name_2.ext`, ... that does not exist
pub async fn free_target(target: &Path) -> Result<PathBuf, MoveError> {
    if !exists(target).await {
        return Ok(target.to_path_buf());
    }

    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = target.extension().map(|e| e.to_string_lossy().to_string());
    let parent = target.parent().unwrap_or(Path::new(""));

    for n in 1..=MAX_SUFFIX {
        let name = match &ext {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        let candidate = parent.join(name);
        if !exists(&candidate).await {
            return Ok(candidate);
        }
    }
    Err(MoveError::NoFreeName(target.to_path_buf()))
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(true)
}

/// Remove directories left empty under `root`, deepest first, root included
async fn remove_empty_dirs(root: &Path) {
    let dirs: Vec<PathBuf> = WalkDir::new(root)
        .contents_first(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();

    for dir in dirs {
        // Fails on non-empty directories, which is what we want
        if fs::remove_dir(&dir).await.is_ok() {
            debug!(dir = %dir.display(), "Removed empty source directory");
        }
    }
}

fn is_metadata_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with("_metadata.json"))
}

/// Make a name safe to use as one path component
fn path_segment(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
