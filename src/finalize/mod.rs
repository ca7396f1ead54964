//! Moves a confirmed staging directory into its live location.
//!
//! The confirmation token is consumed before anything on disk changes, so a
//! token finalizes at most once. The previous installation is deleted and the
//! staging directory renamed into its place; the result is either the staged
//! tree in full or an error, never a merge of old and new.
//!
//! A token whose staging directory has since been restaged for another
//! request is treated as expired; the files there are not the ones it was
//! issued for.

use anyhow::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::confirm::{ConfirmToken, ConfirmationStore, PendingInstall};
use crate::error::PackageError;
use crate::locks::TargetLocks;
use crate::oplog::OperationLog;
use crate::rescan::{ModuleRescanner, RescanOptions};
use crate::runtime::Runtime;
use crate::staging::stage_marker_path;

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallResult {
    pub success: String,
    pub log: String,
    pub files: Vec<String>,
}

pub struct Finalizer<R: Runtime> {
    runtime: Arc<R>,
    store: Arc<dyn ConfirmationStore>,
    rescanner: Arc<dyn ModuleRescanner>,
    locks: TargetLocks,
    log: OperationLog<R>,
    userfiles: PathBuf,
}

impl<R: Runtime> Finalizer<R> {
    pub fn new(
        runtime: Arc<R>,
        store: Arc<dyn ConfirmationStore>,
        rescanner: Arc<dyn ModuleRescanner>,
        locks: TargetLocks,
        log: OperationLog<R>,
        userfiles: PathBuf,
    ) -> Self {
        Self {
            runtime,
            store,
            rescanner,
            locks,
            log,
            userfiles,
        }
    }

    /// `<userfiles>/modules/<target-dir>` or `<userfiles>/templates/<target-dir>`.
    pub fn destination(&self, pending: &PendingInstall) -> Result<PathBuf> {
        let package = &pending.package;
        Ok(self
            .userfiles
            .join(package.install_root()?)
            .join(package.target_dir_name()?))
    }

    #[tracing::instrument(skip(self))]
    pub async fn finalize(&self, token: &ConfirmToken) -> Result<InstallResult> {
        let pending = self
            .store
            .take(token)?
            .ok_or_else(|| PackageError::ConfirmationExpired {
                token: token.to_string(),
            })?;

        let destination = self.destination(&pending)?;
        let target_dir = pending.package.target_dir_name()?;
        let _lock = self.locks.lock(target_dir).await?;

        self.check_stage(&pending, token)?;
        self.replace(&pending.unzipped_files_location, &destination)?;

        let marker = stage_marker_path(&pending.unzipped_files_location);
        if let Err(e) = self.runtime.remove_file(&marker) {
            debug!("Failed to remove stage marker {:?}: {:#}", marker, e);
        }

        if let Err(e) = self.rescanner.rescan(&RescanOptions::default()).await {
            warn!("Module rescan request failed: {:#}", e);
        }

        let result = InstallResult {
            success: format!(
                "Success. You have installed: {} .  Total files installed",
                pending.package.name
            ),
            log: "Done!".to_string(),
            files: pending.files,
        };
        self.log.append(&result.log);
        Ok(result)
    }

    /// The staging directory must still hold the stage `pending` came from.
    fn check_stage(&self, pending: &PendingInstall, token: &ConfirmToken) -> Result<()> {
        let marker = stage_marker_path(&pending.unzipped_files_location);
        let current = self.runtime.read_to_string(&marker).ok();
        let matches = current.as_deref().map(str::trim) == Some(pending.stage_id.as_str());
        if pending.stage_id.is_empty() || !matches {
            warn!(
                "Staging directory {:?} no longer holds {} {}",
                pending.unzipped_files_location, pending.package.name, pending.package.version
            );
            return Err(PackageError::ConfirmationExpired {
                token: token.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn replace(&self, staging: &Path, destination: &Path) -> Result<()> {
        let move_failed = |message: String| PackageError::DestinationMoveFailed {
            from: staging.to_path_buf(),
            to: destination.to_path_buf(),
            message,
        };

        if !self.runtime.is_dir(staging) {
            return Err(move_failed("staged files are missing".to_string()).into());
        }

        if self.runtime.exists(destination) {
            debug!("Removing previous installation {:?}", destination);
            if let Err(e) = self.runtime.remove_dir_all(destination) {
                debug!("Failed to remove {:?}: {:#}", destination, e);
            }
            if self.runtime.exists(destination) {
                return Err(move_failed("previous installation could not be removed".to_string()).into());
            }
        }

        if let Some(parent) = destination.parent() {
            self.runtime
                .create_dir_all(parent)
                .map_err(|e| move_failed(format!("{:#}", e)))?;
        }

        self.runtime
            .rename(staging, destination)
            .map_err(|e| move_failed(format!("{:#}", e)))?;
        Ok(())
    }
}
