//! Canonical paths for the archiver.
//!
//! Single source of truth for default locations, plus discovery of the
//! daily source folders downloads land in.
//!
//! | Location | Default | Purpose |
//! |----------|---------|---------|
//! | home | `~/.sat-archiver` | config, credential, local logs |
//! | archive root | `~/Downloads/Instagram Archive` | archived content |
//! | downloads | `~/Downloads` | where source folders are searched |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::scan::patterns::find_date;

/// Source folder name patterns used when the config names none
pub const DEFAULT_SOURCE_PATTERNS: [&str; 2] = ["SAT Daily on ????-??-??", "Daily MO on ????-??-??"];

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("Failed to determine home directory")
}

/// Archiver state directory (~/.sat-archiver)
pub fn default_home() -> Result<PathBuf> {
    Ok(home_dir()?.join(super::CONFIG_DIR))
}

/// Default archive destination (~/Downloads/Instagram Archive)
pub fn default_archive_root() -> Result<PathBuf> {
    Ok(downloads_dir()?.join("Instagram Archive"))
}

/// The user's downloads directory
pub fn downloads_dir() -> Result<PathBuf> {
    match dirs::download_dir() {
        Some(dir) => Ok(dir),
        None => Ok(home_dir()?.join("Downloads")),
    }
}

pub fn default_source_patterns() -> Vec<String> {
    DEFAULT_SOURCE_PATTERNS.iter().map(|p| p.to_string()).collect()
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Directories in `downloads` whose names match any pattern, newest first
/// by the date in their names. Ties and undated names fall back to
/// descending name order, undated after dated.
pub fn source_folders(downloads: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut folders = Vec::new();
    for pattern in patterns {
        let full = downloads.join(pattern);
        let full = full.to_string_lossy();
        let matches = glob::glob(&full)
            .with_context(|| format!("Invalid source folder pattern: {}", pattern))?;
        for path in matches.filter_map(Result::ok) {
            if path.is_dir() && !folders.contains(&path) {
                folders.push(path);
            }
        }
    }

    folders.sort_by(|a, b| {
        folder_date(b)
            .cmp(&folder_date(a))
            .then_with(|| b.file_name().cmp(&a.file_name()))
    });
    Ok(folders)
}

fn folder_date(path: &Path) -> Option<NaiveDate> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(find_date)
}

/// The most recently dated source folder, if any
pub fn latest_source_folder(downloads: &Path, patterns: &[String]) -> Result<Option<PathBuf>> {
    Ok(source_folders(downloads, patterns)?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde("~/x/y"), home.join("x/y"));
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("/abs"), PathBuf::from("/abs"));
        assert_eq!(expand_tilde("rel/~"), PathBuf::from("rel/~"));
    }

    #[test]
    fn test_source_folders_newest_first() {
        let temp = TempDir::new().unwrap();
        for name in [
            "SAT Daily on 2026-02-12",
            "SAT Daily on 2026-02-14",
            "Daily MO on 2026-02-13",
            "Something else",
        ] {
            std::fs::create_dir_all(temp.path().join(name)).unwrap();
        }
        std::fs::write(temp.path().join("SAT Daily on 2026-02-15"), "file, not folder").unwrap();

        let folders = source_folders(temp.path(), &default_source_patterns()).unwrap();
        let names: Vec<_> = folders
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "SAT Daily on 2026-02-14",
                "Daily MO on 2026-02-13",
                "SAT Daily on 2026-02-12",
            ]
        );
    }

    #[test]
    fn test_latest_source_folder_compares_dates_across_patterns() {
        let temp = TempDir::new().unwrap();
        for name in [
            "SAT Daily on 2026-02-10",
            "Daily MO on 2026-02-14",
            "Daily MO on 2026-02-14 (1)",
        ] {
            std::fs::create_dir_all(temp.path().join(name)).unwrap();
        }
        let patterns = vec![
            "SAT Daily on ????-??-??".to_string(),
            "Daily MO on *".to_string(),
        ];

        let latest = latest_source_folder(temp.path(), &patterns).unwrap().unwrap();
        assert_eq!(latest, temp.path().join("Daily MO on 2026-02-14 (1)"));

        let folders = source_folders(temp.path(), &patterns).unwrap();
        assert_eq!(folders.last().unwrap(), &temp.path().join("SAT Daily on 2026-02-10"));
    }

    #[test]
    fn test_latest_source_folder_none() {
        let temp = TempDir::new().unwrap();
        assert!(latest_source_folder(temp.path(), &default_source_patterns())
            .unwrap()
            .is_none());
    }
}
