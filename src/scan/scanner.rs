//! Folder scanner: turns a downloaded source folder into candidate entries.
//!
//! The scanner is read-only. Recognised content folders become one entry
//! each (their whole subtree belongs to the entry); loose story files are
//! grouped by the identifier in their names. A leaf directory holding only
//! unrecognised files becomes an entry with a derived identifier; every
//! other directory is a plain container and is descended into.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use crate::domain::{CandidateEntry, EntryKind, Identifier, PathContext};

use super::context;
use super::patterns::{
    find_date, find_handle, is_post_folder, is_story_file, parse_bucket_folder, parse_post_folder,
    parse_profile_file, parse_story_file,
};

/// Stand-ins for the handle and date of folders whose names carry neither
const UNKNOWN_HANDLE: &str = "unknown";
const UNDATED: &str = "undated";

/// Fatal scan errors. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Source folder does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("Source path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Cannot read directory {path}: {source}")]
    UnreadableDirectory {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// An entry that lost its identifier to an earlier entry of the same run
#[derive(Debug, Clone)]
pub struct Collision {
    pub entry: CandidateEntry,

    /// Root of the entry that kept the identifier
    pub kept: PathBuf,
}

/// An entry with a file that could not be read
#[derive(Debug, Clone)]
pub struct Unreadable {
    pub identifier: Identifier,
    pub path: PathBuf,
    pub reason: String,
}

/// Result of one scan
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Entries with unique identifiers, in path order
    pub entries: Vec<CandidateEntry>,

    pub collisions: Vec<Collision>,

    pub unreadable: Vec<Unreadable>,
}

impl ScanOutcome {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CandidateEntry> {
        self.entries.iter()
    }

    /// Every entry the scan found, including the ones that will fail
    pub fn total(&self) -> usize {
        self.entries.len() + self.collisions.len() + self.unreadable.len()
    }
}

impl IntoIterator for ScanOutcome {
    type Item = CandidateEntry;
    type IntoIter = std::vec::IntoIter<CandidateEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// What a directory means to the scanner
enum DirRole {
    /// Recurse into it
    Container,
    /// A content folder owning its subtree
    Folder(Identifier),
}

enum Found {
    Entry(CandidateEntry),
    Unreadable(Unreadable),
}

/// Story files sharing one identifier
struct StoryGroup {
    identifier: Identifier,
    name: String,
    root: PathBuf,
    files: Vec<PathBuf>,
    container: Option<String>,
    context: PathContext,
    unreadable: Option<String>,
}

/// Read-only walker over a source folder
#[derive(Debug, Clone)]
pub struct FolderScanner {
    root: PathBuf,
}

impl FolderScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the source folder and group its contents into entries.
    ///
    /// Holds no state between calls; scanning twice reads the filesystem twice.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn scan(&self) -> Result<ScanOutcome, ScanError> {
        if !self.root.exists() {
            return Err(ScanError::RootNotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }

        let mut found: Vec<Found> = Vec::new();
        let mut groups: Vec<StoryGroup> = Vec::new();
        let mut group_index: HashMap<Identifier, usize> = HashMap::new();

        let mut walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        while let Some(next) = walker.next() {
            let entry = next.map_err(|e| walk_error(&self.root, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let path = entry.path();

            if entry.file_type().is_dir() {
                if let DirRole::Folder(identifier) = self.dir_role(path, &name)? {
                    walker.skip_current_dir();
                    if let Some(f) = self.collect_folder(path, name, identifier)? {
                        found.push(f);
                    }
                }
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            if let Some(story) = parse_story_file(&name) {
                let identifier = Identifier::token(story.identifier);
                let idx = *group_index.entry(identifier.clone()).or_insert_with(|| {
                    groups.push(self.new_group(identifier, path, &name));
                    groups.len() - 1
                });
                let group = &mut groups[idx];
                if let Err(e) = File::open(path) {
                    group.unreadable = Some(format!("{}: {}", path.display(), e));
                }
                group.files.push(path.to_path_buf());
            } else if let Some(profile) = parse_profile_file(&name) {
                let identifier = Identifier::derived(&profile.handle, &profile.date, &name);
                found.push(self.single_file(path, name, identifier));
            } else {
                debug!(file = %path.display(), "Ignoring unrecognised file");
            }
        }

        for group in groups {
            found.push(group.into_found());
        }

        let outcome = resolve_collisions(found);
        info!(
            entries = outcome.entries.len(),
            collisions = outcome.collisions.len(),
            unreadable = outcome.unreadable.len(),
            "Scan complete"
        );
        Ok(outcome)
    }

    /// Decide whether a directory is a content folder or a container
    fn dir_role(&self, path: &Path, name: &str) -> Result<DirRole, ScanError> {
        if let Some(post) = parse_post_folder(name) {
            return Ok(DirRole::Folder(Identifier::token(post.identifier)));
        }

        if let Some(bucket) = parse_bucket_folder(name) {
            // Story groupings holding recognisable content are only containers
            if bucket.kind.is_story_grouping() && contains_recognised_content(path)? {
                return Ok(DirRole::Container);
            }
            return Ok(DirRole::Folder(Identifier::derived(
                &bucket.handle,
                &bucket.date,
                name,
            )));
        }

        // Unnamed leaf folders still become entries so the classifier can
        // reject them instead of their files vanishing
        if is_unrecognised_leaf(path)? {
            let handle = find_handle(name).unwrap_or_else(|| UNKNOWN_HANDLE.to_string());
            let date = find_date(name)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| UNDATED.to_string());
            let rel = path.strip_prefix(&self.root).unwrap_or(path);
            return Ok(DirRole::Folder(Identifier::derived(
                &handle,
                &date,
                &rel.to_string_lossy(),
            )));
        }

        Ok(DirRole::Container)
    }

    /// Gather the subtree of a content folder
    fn collect_folder(
        &self,
        path: &Path,
        name: String,
        identifier: Identifier,
    ) -> Result<Option<Found>, ScanError> {
        let mut files = Vec::new();
        let mut dirs = Vec::new();

        for next in WalkDir::new(path)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = match next {
                Ok(entry) => entry,
                Err(e) => {
                    let failed = e.path().map(Path::to_path_buf).unwrap_or_default();
                    if failed.is_dir() {
                        return Err(walk_error(path, e));
                    }
                    warn!(file = %failed.display(), error = %e, "Unreadable file in entry");
                    return Ok(Some(Found::Unreadable(Unreadable {
                        identifier,
                        path: path.to_path_buf(),
                        reason: format!("{}: {}", failed.display(), e),
                    })));
                }
            };

            if entry.file_type().is_dir() {
                if let Ok(rel) = entry.path().strip_prefix(path) {
                    dirs.push(rel.to_path_buf());
                }
            } else if entry.file_type().is_file() {
                if let Err(e) = File::open(entry.path()) {
                    warn!(file = %entry.path().display(), error = %e, "Unreadable file in entry");
                    return Ok(Some(Found::Unreadable(Unreadable {
                        identifier,
                        path: path.to_path_buf(),
                        reason: format!("{}: {}", entry.path().display(), e),
                    })));
                }
                files.push(entry.into_path());
            }
        }

        if files.is_empty() {
            debug!(folder = %path.display(), "Dropping empty entry");
            return Ok(None);
        }

        Ok(Some(Found::Entry(CandidateEntry {
            identifier,
            kind: EntryKind::Folder,
            name,
            root: path.to_path_buf(),
            files,
            dirs,
            container: None,
            context: self.context_of(path.parent()),
            resumed: false,
        })))
    }

    fn single_file(&self, path: &Path, name: String, identifier: Identifier) -> Found {
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        if let Err(e) = File::open(path) {
            return Found::Unreadable(Unreadable {
                identifier,
                path: path.to_path_buf(),
                reason: format!("{}: {}", path.display(), e),
            });
        }

        Found::Entry(CandidateEntry {
            identifier,
            kind: EntryKind::Files,
            name,
            context: self.context_of(Some(&parent)),
            root: parent,
            files: vec![path.to_path_buf()],
            dirs: Vec::new(),
            container: None,
            resumed: false,
        })
    }

    fn new_group(&self, identifier: Identifier, first: &Path, name: &str) -> StoryGroup {
        let parent = first.parent().map(Path::to_path_buf).unwrap_or_default();
        let container = parent
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| {
                parse_bucket_folder(n)
                    .map(|b| b.kind.is_story_grouping())
                    .unwrap_or(false)
            })
            .map(str::to_string);

        StoryGroup {
            identifier,
            name: name.to_string(),
            context: self.context_of(Some(&parent)),
            root: parent,
            files: Vec::new(),
            container,
            unreadable: None,
        }
    }

    /// Context of an entry whose parent directory is `dir`
    fn context_of(&self, dir: Option<&Path>) -> PathContext {
        let rel = dir
            .and_then(|d| d.strip_prefix(&self.root).ok())
            .unwrap_or(Path::new(""));
        context::derive(rel)
    }
}

impl StoryGroup {
    fn into_found(self) -> Found {
        if let Some(reason) = self.unreadable {
            return Found::Unreadable(Unreadable {
                identifier: self.identifier,
                path: self.root,
                reason,
            });
        }

        let mut files = self.files;
        files.sort();
        Found::Entry(CandidateEntry {
            identifier: self.identifier,
            kind: EntryKind::Files,
            name: self.name,
            root: self.root,
            files,
            dirs: Vec::new(),
            container: self.container,
            context: self.context,
            resumed: false,
        })
    }
}

/// Keep the first entry per identifier in path order
fn resolve_collisions(found: Vec<Found>) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    let mut entries = Vec::new();

    for f in found {
        match f {
            Found::Entry(entry) => entries.push(entry),
            Found::Unreadable(u) => outcome.unreadable.push(u),
        }
    }

    entries.sort_by(|a, b| a.root.cmp(&b.root).then_with(|| a.name.cmp(&b.name)));

    let mut claimed: HashMap<Identifier, PathBuf> = HashMap::new();
    for entry in entries {
        if let Some(kept) = claimed.get(&entry.identifier) {
            warn!(
                identifier = %entry.identifier,
                path = %entry.root.display(),
                kept = %kept.display(),
                "Identifier already claimed in this run"
            );
            outcome.collisions.push(Collision {
                kept: kept.clone(),
                entry,
            });
            continue;
        }
        claimed.insert(entry.identifier.clone(), entry.root.clone());
        outcome.entries.push(entry);
    }

    outcome
}

/// A directory without subdirectories whose files the scanner has no pattern for
fn is_unrecognised_leaf(dir: &Path) -> Result<bool, ScanError> {
    let mut has_files = false;
    for next in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = next.map_err(|e| walk_error(dir, e))?;
        if entry.file_type().is_dir() {
            return Ok(false);
        }
        let name = entry.file_name().to_string_lossy();
        if is_story_file(&name) || parse_profile_file(&name).is_some() {
            return Ok(false);
        }
        has_files |= entry.file_type().is_file();
    }
    Ok(has_files)
}

/// Whether a story grouping folder holds story files or post folders
fn contains_recognised_content(dir: &Path) -> Result<bool, ScanError> {
    for next in WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = next.map_err(|e| walk_error(dir, e))?;
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_file() && is_story_file(&name) {
            return Ok(true);
        }
        if entry.file_type().is_dir() && is_post_folder(&name) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

fn walk_error(fallback: &Path, error: walkdir::Error) -> ScanError {
    let path = error
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| fallback.to_path_buf());
    ScanError::UnreadableDirectory { path, source: error }
}
