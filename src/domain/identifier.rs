//! Content identifiers.
//!
//! An identifier is either the shortcode embedded in a file or folder name,
//! or a deterministic pseudo-identifier derived for buckets (profiles,
//! comment threads, story collections) that carry no shortcode.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Prefix marking identifiers that were derived rather than read from a name
pub const DERIVED_PREFIX: &str = "NOID_";

/// Identifier of one piece of archived content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier(String);

impl Identifier {
    /// Wrap a shortcode read from a file or folder name
    pub fn token(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_string())
    }

    /// Derive a pseudo-identifier for a bucket without a shortcode.
    ///
    /// Format: `NOID_{handle}_{date}_{hash8}` where the hash covers the full
    /// entry name so that two buckets for the same handle and day differ.
    pub fn derived(handle: &str, date: &str, name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        let digest = hasher.finalize();
        let short = hex::encode(&digest[..4]);
        Self(format!("{}{}_{}_{}", DERIVED_PREFIX, handle, date, short))
    }

    /// Whether this identifier was derived from naming conventions
    pub fn is_derived(&self) -> bool {
        self.0.starts_with(DERIVED_PREFIX)
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
