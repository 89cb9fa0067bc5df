//! Command-line interface for sat-archiver.
//!
//! Provides commands for archiving a source folder, checking the ledger
//! connection, listing source folders and showing the resolved configuration.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{self, paths, LedgerSettings, ResolvedConfig};
use crate::core::{Orchestrator, RunSettings};
use crate::domain::RunMode;
use crate::ledger::{HttpLedger, Ledger, LocalLedger};

pub mod prompt;
pub mod render;

/// Initials recorded by dry runs when none are configured
const DRY_RUN_INITIALS: &str = "DRY";

/// sat-archiver - Archive downloaded Instagram content and record it in the ledger
#[derive(Parser, Debug)]
#[command(name = "sat-archiver")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Archive a source folder
    Run {
        /// Source folder (defaults to the most recent dated download folder)
        #[arg(short, long)]
        folder: Option<PathBuf>,

        /// Show what would be archived without moving or logging anything
        #[arg(long)]
        dry_run: bool,

        /// Ledger endpoint URL
        #[arg(long, env = "SAT_ARCHIVER_LEDGER_URL")]
        ledger_url: Option<String>,

        /// File holding the ledger credential
        #[arg(long)]
        credential: Option<PathBuf>,

        /// Operator initials for the Downloader column
        #[arg(long)]
        initials: Option<String>,

        /// Log to the local fallback file instead of the remote ledger
        #[arg(long)]
        local_log: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Check the ledger connection
    Check {
        /// Ledger endpoint URL
        #[arg(long, env = "SAT_ARCHIVER_LEDGER_URL")]
        ledger_url: Option<String>,

        /// File holding the ledger credential
        #[arg(long)]
        credential: Option<PathBuf>,
    },

    /// List candidate source folders, newest first
    Folders,

    /// Show resolved configuration (debug)
    Config,
}

/// Options of the `run` command
#[derive(Debug, Clone, Default)]
struct RunOptions {
    folder: Option<PathBuf>,
    dry_run: bool,
    ledger_url: Option<String>,
    credential: Option<PathBuf>,
    initials: Option<String>,
    local_log: bool,
    yes: bool,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// Returns a failing exit code when any entry failed; fatal errors are returned as `Err`.
    pub async fn execute(self) -> Result<ExitCode> {
        match self.command {
            Commands::Run {
                folder,
                dry_run,
                ledger_url,
                credential,
                initials,
                local_log,
                yes,
            } => {
                run_archive(RunOptions {
                    folder,
                    dry_run,
                    ledger_url,
                    credential,
                    initials,
                    local_log,
                    yes,
                })
                .await
            }
            Commands::Check {
                ledger_url,
                credential,
            } => check_ledger(ledger_url, credential).await,
            Commands::Folders => list_folders(),
            Commands::Config => show_config(),
        }
    }
}

/// Archive one source folder
async fn run_archive(opts: RunOptions) -> Result<ExitCode> {
    let cfg = config::config()?;
    let mode = if opts.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Apply
    };

    let source = match opts.folder {
        Some(folder) => folder,
        None => paths::latest_source_folder(&cfg.downloads, &cfg.source_patterns)?
            .with_context(|| {
                format!(
                    "No source folder matching {:?} in {}; pass --folder",
                    cfg.source_patterns,
                    cfg.downloads.display()
                )
            })?,
    };
    if !source.is_dir() {
        anyhow::bail!("Source folder does not exist: {}", source.display());
    }

    let ledger_settings = ledger_settings(cfg, opts.ledger_url, opts.credential);
    let remote: Option<Box<dyn Ledger>> = if opts.local_log {
        None
    } else {
        Some(Box::new(http_ledger(&ledger_settings)?))
    };

    let downloader = match resolve_initials(opts.initials, cfg, mode)? {
        Some(initials) => initials,
        None => anyhow::bail!("Initials are required to archive; pass --initials"),
    };

    println!("Source:      {}", source.display());
    println!("Destination: {}", cfg.archive_root.display());
    println!(
        "Logging to:  {}",
        if remote.is_some() {
            "remote ledger"
        } else {
            "local log file"
        }
    );
    println!();

    let orchestrator = Orchestrator::new(
        RunSettings {
            source,
            archive_root: cfg.archive_root.clone(),
            downloader,
            stories_partition: ledger_settings.stories_partition.clone(),
            default_partition: ledger_settings.default_partition.clone(),
            retry: ledger_settings.retry.clone(),
        },
        remote,
        LocalLedger::new(&cfg.log_dir),
    );

    let prepared = orchestrator.prepare(mode).await?;
    print!("{}", render::preview(&prepared));

    if mode == RunMode::DryRun {
        println!();
        println!("[DRY RUN] No files will be moved or logged.");
        let summary = orchestrator.archive(prepared).await;
        return Ok(exit_code(summary.is_clean()));
    }

    if prepared.items.is_empty() {
        println!();
        println!("Nothing to archive.");
        let summary = orchestrator.archive(prepared).await;
        return Ok(exit_code(summary.is_clean()));
    }

    println!();
    if !opts.yes {
        let question = format!("Proceed with archiving {} items?", prepared.items.len());
        if !prompt::confirm(&question, Some(false)).context("Failed to read confirmation")? {
            println!("Aborted.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let summary = orchestrator.archive(prepared).await;
    println!();
    print!("{}", render::summary(&summary));

    Ok(exit_code(summary.is_clean()))
}

/// Flag values over configured ledger settings
fn ledger_settings(
    cfg: &ResolvedConfig,
    url: Option<String>,
    credential: Option<PathBuf>,
) -> LedgerSettings {
    let mut settings = cfg.ledger.clone();
    if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
        settings.url = Some(url);
    }
    if let Some(path) = credential {
        settings.credential_path = Some(path);
    }
    settings
}

fn http_ledger(settings: &LedgerSettings) -> Result<HttpLedger> {
    let url = settings
        .url
        .clone()
        .context("No ledger URL configured; pass --ledger-url or --local-log")?;
    let credential = settings.credential()?;
    let ledger = HttpLedger::new(
        url,
        credential,
        settings.partitions.clone(),
        settings.timeout_seconds,
    )?;
    Ok(ledger)
}

/// Flag, then config, then a dry-run placeholder or an interactive prompt
fn resolve_initials(
    flag: Option<String>,
    cfg: &ResolvedConfig,
    mode: RunMode,
) -> Result<Option<String>> {
    let known = flag
        .or_else(|| cfg.initials.clone())
        .map(|i| i.trim().to_uppercase())
        .filter(|i| !i.is_empty());
    if known.is_some() {
        return Ok(known);
    }
    match mode {
        RunMode::DryRun => Ok(Some(DRY_RUN_INITIALS.to_string())),
        RunMode::Apply => prompt::initials().context("Failed to read initials"),
    }
}

fn exit_code(clean: bool) -> ExitCode {
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

/// Report ledger connectivity and row counts
async fn check_ledger(url: Option<String>, credential: Option<PathBuf>) -> Result<ExitCode> {
    let cfg = config::config()?;
    let settings = ledger_settings(cfg, url, credential);
    let ledger = http_ledger(&settings)?;

    let report = ledger
        .health()
        .await
        .with_context(|| format!("Ledger check failed for {}", ledger.url()))?;

    println!("Connected to {}", ledger.url());
    println!("  {}", report);
    Ok(ExitCode::SUCCESS)
}

fn list_folders() -> Result<ExitCode> {
    let cfg = config::config()?;
    let folders = paths::source_folders(&cfg.downloads, &cfg.source_patterns)?;

    if folders.is_empty() {
        println!(
            "No source folders matching {:?} in {}",
            cfg.source_patterns,
            cfg.downloads.display()
        );
        return Ok(ExitCode::SUCCESS);
    }

    for (i, folder) in folders.iter().enumerate() {
        let marker = if i == 0 { " (default)" } else { "" };
        println!("{}{}", folder.display(), marker);
    }
    Ok(ExitCode::SUCCESS)
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<ExitCode> {
    let cfg = config::config()?;

    println!(
        "# Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    let yaml = serde_yaml::to_string(cfg).context("Failed to render configuration")?;
    print!("{}", yaml);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::try_parse_from([
            "sat-archiver",
            "run",
            "--folder",
            "/tmp/src",
            "--dry-run",
            "--initials",
            "ab",
            "--local-log",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                folder,
                dry_run,
                initials,
                local_log,
                yes,
                ..
            } => {
                assert_eq!(folder, Some(PathBuf::from("/tmp/src")));
                assert!(dry_run);
                assert!(local_log);
                assert!(!yes);
                assert_eq!(initials.as_deref(), Some("ab"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_flag_overrides_ledger_settings() {
        let cfg = ResolvedConfig {
            home: PathBuf::from("/h"),
            archive_root: PathBuf::from("/a"),
            downloads: PathBuf::from("/d"),
            source_patterns: paths::default_source_patterns(),
            log_dir: PathBuf::from("/h/logs"),
            ledger: LedgerSettings {
                url: Some("https://config.example.com".to_string()),
                ..Default::default()
            },
            initials: Some("cf".to_string()),
            config_file: None,
        };

        let settings = ledger_settings(&cfg, None, Some(PathBuf::from("/k")));
        assert_eq!(settings.url.as_deref(), Some("https://config.example.com"));
        assert_eq!(settings.credential_path, Some(PathBuf::from("/k")));

        let settings = ledger_settings(&cfg, Some("https://flag.example.com".to_string()), None);
        assert_eq!(settings.url.as_deref(), Some("https://flag.example.com"));

        assert_eq!(
            resolve_initials(None, &cfg, RunMode::Apply).unwrap().as_deref(),
            Some("CF")
        );
        assert_eq!(
            resolve_initials(Some(" xy ".to_string()), &cfg, RunMode::Apply)
                .unwrap()
                .as_deref(),
            Some("XY")
        );
    }

    #[test]
    fn test_dry_run_initials_placeholder() {
        let cfg = ResolvedConfig {
            home: PathBuf::from("/h"),
            archive_root: PathBuf::from("/a"),
            downloads: PathBuf::from("/d"),
            source_patterns: Vec::new(),
            log_dir: PathBuf::from("/h/logs"),
            ledger: LedgerSettings::default(),
            initials: None,
            config_file: None,
        };
        assert_eq!(
            resolve_initials(None, &cfg, RunMode::DryRun).unwrap().as_deref(),
            Some(DRY_RUN_INITIALS)
        );
    }

    #[test]
    fn test_missing_ledger_url_is_an_error() {
        let err = http_ledger(&LedgerSettings::default()).unwrap_err();
        assert!(err.to_string().contains("--local-log"));
    }
}
