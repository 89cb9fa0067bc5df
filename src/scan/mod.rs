//! Source folder scanning.
//!
//! - `patterns`: naming conventions of downloaded files and folders
//! - `context`: ledger facts implied by ancestor folders
//! - `scanner`: the walker that groups files into candidate entries

pub mod context;
pub mod patterns;
pub mod scanner;

pub use scanner::{Collision, FolderScanner, ScanError, ScanOutcome, Unreadable};
