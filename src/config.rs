//! Configuration for the archiver.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (applied by the CLI on top of this)
//! 2. Environment variables (SAT_ARCHIVER_HOME, SAT_ARCHIVER_ARCHIVE_ROOT,
//!    SAT_ARCHIVER_LEDGER_URL, SAT_ARCHIVER_CREDENTIAL)
//! 3. Config file (.sat-archiver/config.yaml)
//! 4. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .sat-archiver/config.yaml
//! - Falls back to ~/.sat-archiver/config.yaml
//! - Relative paths in the file resolve against the directory holding
//!   `.sat-archiver/`; `~` expands to the home directory

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ledger::RetryPolicy;

/// Directory name holding the config file
pub const CONFIG_DIR: &str = ".sat-archiver";

const CONFIG_FILE: &str = "config.yaml";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub initials: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    pub archive_root: Option<String>,
    /// Where source folders are searched
    pub downloads: Option<String>,
    /// Glob patterns (folder names) of source folders
    pub source_patterns: Option<Vec<String>>,
    /// Local fallback log directory
    pub log_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerConfig {
    pub url: Option<String>,
    pub credential_path: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub partitions: Option<Vec<String>>,
    pub stories_partition: Option<String>,
    pub default_partition: Option<String>,
    pub retry: Option<RetryPolicy>,
}

/// Resolved ledger settings
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSettings {
    pub url: Option<String>,
    pub credential_path: Option<PathBuf>,
    pub timeout_seconds: u64,
    /// Partitions read for duplicate detection; empty means the unioned listing
    pub partitions: Vec<String>,
    pub stories_partition: String,
    pub default_partition: String,
    pub retry: RetryPolicy,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            url: None,
            credential_path: None,
            timeout_seconds: 30,
            partitions: vec![STORIES_PARTITION.to_string(), DEFAULT_PARTITION.to_string()],
            stories_partition: STORIES_PARTITION.to_string(),
            default_partition: DEFAULT_PARTITION.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

const STORIES_PARTITION: &str = "Stories";
const DEFAULT_PARTITION: &str = "P&V Manual Backup";

impl LedgerSettings {
    /// Read the pre-shared credential, if a credential file is configured
    pub fn credential(&self) -> Result<Option<String>> {
        let Some(path) = &self.credential_path else {
            return Ok(None);
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credential file: {}", path.display()))?;
        let key = content.trim().to_string();
        Ok(if key.is_empty() { None } else { Some(key) })
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Archiver state directory (~/.sat-archiver)
    pub home: PathBuf,
    /// Destination root of archived content
    pub archive_root: PathBuf,
    /// Directory searched for source folders
    pub downloads: PathBuf,
    pub source_patterns: Vec<String>,
    /// Local fallback log directory
    pub log_dir: PathBuf,
    pub ledger: LedgerSettings,
    pub initials: Option<String>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching `start` and its parents, then `home`
fn find_config_file(start: Option<PathBuf>, home: &Path) -> Option<PathBuf> {
    if let Some(mut current) = start {
        loop {
            let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }
    }

    let fallback = home.join(CONFIG_FILE);
    fallback.exists().then_some(fallback)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = paths::expand_tilde(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Load configuration from all sources.
///
/// `env` looks up environment variables; `cwd` starts the config file search.
fn load_config_with(cwd: Option<PathBuf>, env: impl Fn(&str) -> Option<String>) -> Result<ResolvedConfig> {
    let home = match env("SAT_ARCHIVER_HOME") {
        Some(dir) => paths::expand_tilde(&dir),
        None => paths::default_home()?,
    };

    let config_file = find_config_file(cwd, &home);
    let (file, base_dir) = match &config_file {
        Some(config_path) => {
            let file = load_config_file(config_path)?;
            // Base directory is the parent of .sat-archiver/ (i.e., grandparent of config.yaml)
            let base_dir = config_path
                .parent()
                .and_then(|p| p.parent())
                .unwrap_or(Path::new("."))
                .to_path_buf();
            (file, base_dir)
        }
        None => (ConfigFile::default(), home.clone()),
    };

    let resolve = |value: Option<String>| value.map(|v| resolve_path(&base_dir, &v));

    let archive_root = env("SAT_ARCHIVER_ARCHIVE_ROOT")
        .map(|v| paths::expand_tilde(&v))
        .or_else(|| resolve(file.paths.archive_root.clone()))
        .map(Ok)
        .unwrap_or_else(paths::default_archive_root)?;

    let downloads = resolve(file.paths.downloads.clone())
        .map(Ok)
        .unwrap_or_else(paths::downloads_dir)?;

    let source_patterns = file
        .paths
        .source_patterns
        .clone()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(paths::default_source_patterns);

    let log_dir = resolve(file.paths.log_dir.clone()).unwrap_or_else(|| home.join("logs"));

    let defaults = LedgerSettings::default();
    let ledger_file = file.ledger;
    let ledger = LedgerSettings {
        url: env("SAT_ARCHIVER_LEDGER_URL")
            .or(ledger_file.url)
            .filter(|u| !u.trim().is_empty()),
        credential_path: env("SAT_ARCHIVER_CREDENTIAL")
            .map(|v| paths::expand_tilde(&v))
            .or_else(|| resolve(ledger_file.credential_path)),
        timeout_seconds: ledger_file.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        partitions: ledger_file.partitions.unwrap_or(defaults.partitions),
        stories_partition: ledger_file
            .stories_partition
            .unwrap_or(defaults.stories_partition),
        default_partition: ledger_file
            .default_partition
            .unwrap_or(defaults.default_partition),
        retry: ledger_file.retry.unwrap_or(defaults.retry),
    };

    Ok(ResolvedConfig {
        home,
        archive_root,
        downloads,
        source_patterns,
        log_dir,
        ledger,
        initials: file.initials.filter(|i| !i.trim().is_empty()),
        config_file,
    })
}

fn load_config() -> Result<ResolvedConfig> {
    load_config_with(std::env::current_dir().ok(), |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let temp = TempDir::new().unwrap();
        let home = temp.path().join("home");
        let config = load_config_with(
            None,
            env_from(&[("SAT_ARCHIVER_HOME", home.to_str().unwrap())]),
        )
        .unwrap();

        assert!(config.config_file.is_none());
        assert_eq!(config.log_dir, home.join("logs"));
        assert!(config.archive_root.ends_with("Instagram Archive"));
        assert_eq!(config.ledger.timeout_seconds, 30);
        assert_eq!(config.ledger.stories_partition, "Stories");
        assert_eq!(config.ledger.default_partition, "P&V Manual Backup");
        assert_eq!(config.ledger.retry.max_attempts, 3);
        assert!(config.ledger.url.is_none());
    }

    #[test]
    fn test_config_file_discovered_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(CONFIG_FILE),
            r#"
version: "1"
paths:
  archive_root: ./archive
  downloads: ./downloads
  source_patterns: ["Batch ????"]
ledger:
  url: https://ledger.example.com/exec
  credential_path: ./key.txt
  timeout_seconds: 5
  partitions: []
  retry:
    max_attempts: 5
initials: AB
"#,
        )
        .unwrap();
        let nested = temp.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let home = temp.path().join("home");
        let config = load_config_with(
            Some(nested),
            env_from(&[("SAT_ARCHIVER_HOME", home.to_str().unwrap())]),
        )
        .unwrap();

        assert_eq!(config.config_file, Some(dir.join(CONFIG_FILE)));
        assert_eq!(config.archive_root, temp.path().join("./archive"));
        assert_eq!(config.downloads, temp.path().join("./downloads"));
        assert_eq!(config.source_patterns, vec!["Batch ????".to_string()]);
        assert_eq!(config.ledger.url.as_deref(), Some("https://ledger.example.com/exec"));
        assert_eq!(config.ledger.timeout_seconds, 5);
        assert!(config.ledger.partitions.is_empty());
        assert_eq!(config.ledger.retry.max_attempts, 5);
        assert_eq!(config.ledger.retry.initial_delay_ms, 1000);
        assert_eq!(config.initials.as_deref(), Some("AB"));
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(CONFIG_FILE),
            "paths:\n  archive_root: ./archive\nledger:\n  url: https://file.example.com\n",
        )
        .unwrap();

        let config = load_config_with(
            Some(temp.path().to_path_buf()),
            env_from(&[
                ("SAT_ARCHIVER_HOME", temp.path().join("home").to_str().unwrap()),
                ("SAT_ARCHIVER_ARCHIVE_ROOT", "/srv/archive"),
                ("SAT_ARCHIVER_LEDGER_URL", "https://env.example.com"),
            ]),
        )
        .unwrap();

        assert_eq!(config.archive_root, PathBuf::from("/srv/archive"));
        assert_eq!(config.ledger.url.as_deref(), Some("https://env.example.com"));
    }

    #[test]
    fn test_credential_file_is_trimmed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("key");
        std::fs::write(&path, "  s3cret\n").unwrap();

        let settings = LedgerSettings {
            credential_path: Some(path),
            ..Default::default()
        };
        assert_eq!(settings.credential().unwrap().as_deref(), Some("s3cret"));
        assert_eq!(LedgerSettings::default().credential().unwrap(), None);
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/./subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
