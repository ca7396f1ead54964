use anyhow::{Context, Result};
use chrono::Duration;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    ConfirmToken, ConfirmationStore, DEFAULT_TTL_SECS, NAMESPACE, PendingInstall, StoredRecord,
};
use crate::runtime::Runtime;

/// One JSON file per token under `<cache>/composer/`.
///
/// Confirming can happen in a later process than staging. `take` claims the
/// record by renaming it first, so two concurrent takes of the same token
/// cannot both succeed.
pub struct FileConfirmationStore<R: Runtime> {
    runtime: Arc<R>,
    dir: PathBuf,
    ttl: Duration,
}

impl<R: Runtime> FileConfirmationStore<R> {
    pub fn new(runtime: Arc<R>, dir: PathBuf, ttl: Duration) -> Self {
        Self { runtime, dir, ttl }
    }

    /// Store rooted at `<cache_root>/composer` with the default TTL.
    pub fn in_cache(runtime: Arc<R>, cache_root: &Path) -> Self {
        Self::new(
            runtime,
            cache_root.join(NAMESPACE),
            Duration::seconds(DEFAULT_TTL_SECS),
        )
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, token: &ConfirmToken) -> PathBuf {
        self.dir.join(format!("{}.json", token))
    }

    fn read_record(&self, path: &Path) -> Result<Option<StoredRecord>> {
        if !self.runtime.exists(path) {
            return Ok(None);
        }
        let content = self
            .runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read confirmation record {:?}", path))?;
        match serde_json::from_str::<StoredRecord>(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Discarding unreadable confirmation record {:?}: {}", path, e);
                self.remove_quietly(path);
                Ok(None)
            }
        }
    }

    fn remove_quietly(&self, path: &Path) {
        if let Err(e) = self.runtime.remove_file(path) {
            debug!("Failed to remove confirmation record {:?}: {:#}", path, e);
        }
    }

    /// Deletes every expired record. Failures are logged and skipped.
    pub fn purge_expired(&self) {
        if !self.runtime.is_dir(&self.dir) {
            return;
        }
        let entries = match self.runtime.read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Failed to list confirmation records: {:#}", e);
                return;
            }
        };
        for path in entries {
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if let Ok(Some(record)) = self.read_record(&path)
                && record.is_expired()
            {
                debug!("Removing expired confirmation record {:?}", path);
                self.remove_quietly(&path);
            }
        }
    }
}

impl<R: Runtime> ConfirmationStore for FileConfirmationStore<R> {
    #[tracing::instrument(skip(self, pending))]
    fn save(&self, token: &ConfirmToken, pending: &PendingInstall) -> Result<()> {
        let record = StoredRecord::new(pending.clone(), self.ttl)?;
        self.purge_expired();
        self.runtime
            .create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create confirmation store {:?}", self.dir))?;

        let json = serde_json::to_vec_pretty(&record)?;

        // Write then rename so a reader never sees a half-written record
        let path = self.record_path(token);
        let tmp = self.dir.join(format!("{}.tmp", token));
        self.runtime
            .write(&tmp, &json)
            .with_context(|| format!("Failed to write confirmation record {:?}", tmp))?;
        self.runtime
            .rename(&tmp, &path)
            .with_context(|| format!("Failed to save confirmation record {:?}", path))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn load(&self, token: &ConfirmToken) -> Result<Option<PendingInstall>> {
        let path = self.record_path(token);
        match self.read_record(&path)? {
            Some(record) if record.is_expired() => {
                debug!("Confirmation record {} expired", token);
                self.remove_quietly(&path);
                Ok(None)
            }
            Some(record) => Ok(Some(record.pending)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    fn take(&self, token: &ConfirmToken) -> Result<Option<PendingInstall>> {
        let path = self.record_path(token);
        if !self.runtime.exists(&path) {
            return Ok(None);
        }

        let claimed = self
            .dir
            .join(format!("{}.taken-{}", token, Uuid::new_v4().simple()));
        if let Err(e) = self.runtime.rename(&path, &claimed) {
            // Lost the race to another taker, or the record vanished
            debug!("Failed to claim confirmation record {}: {:#}", token, e);
            return Ok(None);
        }

        let record = self.read_record(&claimed);
        self.remove_quietly(&claimed);
        Ok(record?
            .filter(|record| !record.is_expired())
            .map(|record| record.pending))
    }
}
