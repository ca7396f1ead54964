//! Archive staging: download, extract and inventory a package before it is
//! confirmed.
//!
//! Each package stages into `<cache>/composer-download/<target-dir>/`. The
//! directory is wiped first, the archive streams to `last-package.zip`, is
//! extracted in place and then deleted. On any failure the staging directory
//! is removed, so a [`PendingInstall`] only ever points at a complete
//! extraction.
//!
//! A completed stage writes its id to `<target-dir>.stage` next to the staging
//! directory. Restaging the target replaces that id, which is how an older
//! pending install notices its files are gone.

mod manifest;

use anyhow::{Context, Result};
use log::{debug, warn};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::archive::{ArchiveExtractor, ArchiveExtractorImpl};
use crate::cleanup::{self, CleanupGuard, SharedCleanupContext};
use crate::confirm::PendingInstall;
use crate::error::PackageError;
use crate::http::HttpClient;
use crate::locks::TargetLocks;
use crate::oplog::OperationLog;
use crate::registry::PackageEntry;
use crate::runtime::Runtime;

pub use manifest::scan_children_first;

/// Directory under the cache root holding one staging directory per target.
pub const DOWNLOAD_DIR_NAME: &str = "composer-download";

/// File name the archive is downloaded to, whatever its real format.
pub const ARCHIVE_FILE_NAME: &str = "last-package.zip";

/// Marker holding the id of the stage currently in `staging`.
pub fn stage_marker_path(staging: &Path) -> PathBuf {
    let mut name = staging
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".stage");
    staging.with_file_name(name)
}

pub struct Stager<R: Runtime + 'static> {
    runtime: Arc<R>,
    http_client: HttpClient,
    extractor: ArchiveExtractorImpl,
    log: OperationLog<R>,
    locks: TargetLocks,
    download_root: PathBuf,
    cleanup_ctx: SharedCleanupContext,
    interrupt_cleanup: bool,
}

impl<R: Runtime + 'static> Stager<R> {
    pub fn new(
        runtime: Arc<R>,
        http_client: HttpClient,
        log: OperationLog<R>,
        locks: TargetLocks,
        cache_root: &Path,
    ) -> Self {
        Self {
            runtime,
            http_client,
            extractor: ArchiveExtractorImpl::new(),
            log,
            locks,
            download_root: cache_root.join(DOWNLOAD_DIR_NAME),
            cleanup_ctx: cleanup::new_shared(),
            interrupt_cleanup: false,
        }
    }

    /// Remove the staging directory and exit if Ctrl-C arrives mid-stage.
    pub fn with_interrupt_cleanup(mut self, enabled: bool) -> Self {
        self.interrupt_cleanup = enabled;
        self
    }

    pub fn staging_dir(&self, target_dir: &str) -> PathBuf {
        self.download_root.join(target_dir)
    }

    /// Downloads and extracts `entry` into its staging directory.
    #[tracing::instrument(skip(self, entry), fields(package = %entry.name, version = %entry.version))]
    pub async fn stage(&self, entry: &PackageEntry) -> Result<PendingInstall> {
        if entry.requires_license() {
            return Err(PackageError::LicenseRequired {
                name: entry.name.clone(),
                version: entry.version.clone(),
            }
            .into());
        }
        let url = entry
            .dist
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PackageError::DownloadFailed {
                url: String::new(),
                message: format!("package {} has no dist url", entry.name),
            })?;
        let target_dir = entry.target_dir_name()?;

        let _lock = self.locks.lock(target_dir).await?;

        let staging = self.staging_dir(target_dir);
        self.prepare_staging(&staging)?;

        let guard = CleanupGuard::new(Arc::clone(&self.cleanup_ctx), staging.clone());
        let interrupt_handler = self.interrupt_cleanup.then(|| {
            cleanup::spawn_interrupt_handler(
                Arc::clone(&self.runtime),
                Arc::clone(&self.cleanup_ctx),
            )
        });

        let result = self.download_and_extract(url, &staging).await;

        if let Some(handler) = interrupt_handler {
            handler.abort();
        }

        match result {
            Ok((files, stage_id)) => {
                guard.release();
                Ok(PendingInstall {
                    package: entry.clone(),
                    unzipped_files_location: staging,
                    files,
                    stage_id,
                })
            }
            Err(e) => {
                self.discard(&staging);
                guard.release();
                Err(e)
            }
        }
    }

    fn prepare_staging(&self, staging: &Path) -> Result<()> {
        let marker = stage_marker_path(staging);
        if self.runtime.exists(&marker) {
            self.runtime
                .remove_file(&marker)
                .with_context(|| format!("Failed to remove stage marker {:?}", marker))?;
        }
        if self.runtime.exists(staging) {
            debug!("Removing stale staging directory {:?}", staging);
            if let Err(e) = self.runtime.remove_dir_all(staging) {
                warn!("Failed to remove stale staging directory {:?}: {:#}", staging, e);
            }
        }
        self.runtime
            .create_dir_all(staging)
            .with_context(|| format!("Failed to create staging directory {:?}", staging))
    }

    fn discard(&self, staging: &Path) {
        if self.runtime.exists(staging)
            && let Err(e) = self.runtime.remove_dir_all(staging)
        {
            warn!("Failed to remove staging directory {:?}: {:#}", staging, e);
        }
    }

    /// Returns the manifest and the id of this stage.
    async fn download_and_extract(&self, url: &str, staging: &Path) -> Result<(Vec<String>, String)> {
        let archive = staging.join(ARCHIVE_FILE_NAME);

        self.log.append("Downloading the package file..");
        let runtime = Arc::clone(&self.runtime);
        let writer_path = archive.clone();
        self.http_client
            .download_file(url, move || runtime.create_file(&writer_path))
            .await
            .map_err(|e| PackageError::DownloadFailed {
                url: url.to_string(),
                message: format!("{:#}", e),
            })?;

        self.log.append("Extract the package file..");
        self.extractor
            .extract(self.runtime.as_ref(), &archive, staging)
            .map_err(|e| PackageError::ExtractionFailed {
                message: format!("{:#}", e),
            })?;

        if let Err(e) = self.runtime.remove_file(&archive) {
            warn!("Failed to remove downloaded archive {:?}: {:#}", archive, e);
        }

        let files = scan_children_first(self.runtime.as_ref(), staging)?;
        for name in &files {
            self.log.append(&format!("Unzip file: {}", name));
        }

        let stage_id = Uuid::new_v4().simple().to_string();
        let marker = stage_marker_path(staging);
        self.runtime
            .write(&marker, stage_id.as_bytes())
            .with_context(|| format!("Failed to write stage marker {:?}", marker))?;
        Ok((files, stage_id))
    }
}
