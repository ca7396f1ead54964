//! Confirmation store: staged installs waiting for an explicit confirm.
//!
//! A successful stage is saved under a fresh [`ConfirmToken`]. The finalize
//! step [`take`](ConfirmationStore::take)s the record, which removes it, so a
//! token can be confirmed at most once. Records expire after a TTL and then
//! behave exactly like unknown tokens.

mod file;
mod memory;

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::registry::PackageEntry;

pub use file::FileConfirmationStore;
pub use memory::MemoryConfirmationStore;

/// Cache namespace; the file store keeps its records in a directory of this name.
pub const NAMESPACE: &str = "composer";

/// Default lifetime of a pending install.
pub const DEFAULT_TTL_SECS: i64 = 6 * 60 * 60;

const TOKEN_PREFIX: &str = "composer-confirm-key-";
const MAX_TOKEN_LEN: usize = 128;

/// Single-use key linking a staged install to its finalize call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfirmToken(String);

impl ConfirmToken {
    /// A new random token (UUID v4, 122 random bits).
    pub fn generate() -> Self {
        Self(format!("{}{}", TOKEN_PREFIX, Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfirmToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ConfirmToken {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && s.len() <= MAX_TOKEN_LEN
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            bail!("Invalid confirmation key: {:?}", s);
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ConfirmToken {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConfirmToken> for String {
    fn from(value: ConfirmToken) -> Self {
        value.0
    }
}

/// A package downloaded and extracted into its staging directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInstall {
    pub package: PackageEntry,
    /// Staging directory holding the extracted archive
    pub unzipped_files_location: PathBuf,
    /// Entry names found in the staging directory, children before parents
    #[serde(rename = "packages")]
    pub files: Vec<String>,
    /// Identity of the stage that produced the staging directory. A later
    /// stage of the same target replaces the directory and this id with it.
    #[serde(default)]
    pub stage_id: String,
}

/// What a store persists: the pending install and its deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredRecord {
    pub pending: PendingInstall,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn new(pending: PendingInstall, ttl: Duration) -> Result<Self> {
        let created_at = Utc::now();
        let expires_at = created_at.checked_add_signed(ttl).ok_or_else(|| {
            anyhow!(
                "Confirmation TTL of {} seconds is out of range",
                ttl.num_seconds()
            )
        })?;
        Ok(Self {
            pending,
            created_at,
            expires_at,
        })
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Time-bounded key-value store for pending installs.
#[cfg_attr(test, mockall::automock)]
pub trait ConfirmationStore: Send + Sync {
    fn save(&self, token: &ConfirmToken, pending: &PendingInstall) -> Result<()>;

    /// Returns the record if present and not expired. Does not consume it.
    fn load(&self, token: &ConfirmToken) -> Result<Option<PendingInstall>>;

    /// Atomically returns and removes the record.
    fn take(&self, token: &ConfirmToken) -> Result<Option<PendingInstall>>;
}

#[cfg(test)]
pub(crate) fn sample_pending(target_dir: &str) -> PendingInstall {
    let package = serde_json::from_value(serde_json::json!({
        "name": format!("acme/{}", target_dir),
        "version": "1.0.0",
        "dist": {"type": "zip", "url": "https://example/pkg.zip"},
        "target-dir": target_dir,
        "type": "microweber-module"
    }))
    .unwrap();

    PendingInstall {
        package,
        unzipped_files_location: PathBuf::from("/cache/composer-download").join(target_dir),
        files: vec!["index.php".into(), "config.php".into()],
        stage_id: "stage-1".into(),
    }
}
