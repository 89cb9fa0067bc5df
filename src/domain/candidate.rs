//! Candidate entries produced by the folder scanner.

use std::path::{Path, PathBuf};

use super::identifier::Identifier;
use super::record::PathContext;

/// How the entry was found on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A recognised content folder; the whole subtree belongs to the entry
    Folder,

    /// Loose files grouped by the identifier in their names
    Files,
}

/// A filesystem subtree plus its inferred identifier.
///
/// Immutable once built by the scanner.
#[derive(Debug, Clone)]
pub struct CandidateEntry {
    pub identifier: Identifier,

    pub kind: EntryKind,

    /// Folder name for folder entries, first file name for file groups
    pub name: String,

    /// The content folder, or the directory holding the grouped files
    pub root: PathBuf,

    /// Every file of the entry (absolute paths, sorted)
    pub files: Vec<PathBuf>,

    /// Subdirectories of a folder entry, relative to `root`
    pub dirs: Vec<PathBuf>,

    /// Named folder the grouped files were collected from
    pub container: Option<String>,

    pub context: PathContext,

    /// An earlier run already moved part of this entry into the archive
    pub resumed: bool,
}

impl CandidateEntry {
    /// File names of the entry
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .filter_map(|f| f.file_name())
            .filter_map(|n| n.to_str())
    }

    /// Path of a file relative to the entry root
    pub fn relative<'a>(&self, file: &'a Path) -> &'a Path {
        file.strip_prefix(&self.root).unwrap_or(file)
    }

    /// Files whose name ends with the given suffix (case-insensitive)
    pub fn files_ending_with<'a>(&'a self, suffix: &'a str) -> impl Iterator<Item = &'a PathBuf> {
        let suffix = suffix.to_ascii_lowercase();
        self.files.iter().filter(move |f| {
            f.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.to_ascii_lowercase().ends_with(&suffix))
                .unwrap_or(false)
        })
    }

    /// Whether the folder entry has a subdirectory with this name (at any depth)
    pub fn has_dir_named(&self, name: &str) -> bool {
        self.dirs.iter().any(|d| {
            d.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.eq_ignore_ascii_case(name))
                .unwrap_or(false)
        })
    }

    /// Whether any file lives inside a subdirectory with this name
    pub fn has_file_under(&self, dir_name: &str) -> bool {
        self.files.iter().any(|f| {
            self.relative(f)
                .parent()
                .map(|p| {
                    p.components().any(|c| {
                        c.as_os_str()
                            .to_str()
                            .map(|s| s.eq_ignore_ascii_case(dir_name))
                            .unwrap_or(false)
                    })
                })
                .unwrap_or(false)
        })
    }

    /// Directory whose name labels the entry: the folder itself, or the
    /// named container the files came from
    pub fn label(&self) -> &str {
        match self.kind {
            EntryKind::Folder => &self.name,
            EntryKind::Files => self.container.as_deref().unwrap_or(&self.name),
        }
    }
}
