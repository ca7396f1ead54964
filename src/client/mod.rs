//! The public face of the package client.
//!
//! [`ComposerClient`] ties the registry, stager, confirmation store and
//! finalizer together into the four public operations: `search`,
//! `request_install`, `download_package` and `install`.

mod response;

use anyhow::Result;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::confirm::{ConfirmToken, ConfirmationStore, PendingInstall};
use crate::error::PackageError;
use crate::finalize::{Finalizer, InstallResult};
use crate::http::HttpClient;
use crate::license::LicenseProvider;
use crate::locks::TargetLocks;
use crate::oplog::OperationLog;
use crate::registry::{self, PackageEntry, RegistrySource, SearchFilter, SearchResult};
use crate::rescan::ModuleRescanner;
use crate::resolver;
use crate::runtime::Runtime;
use crate::staging::{DOWNLOAD_DIR_NAME, Stager};

pub use response::{
    CONFIRM_INSTALL_MODULE, FormDataParams, InstallRequest, InstallResponse, LICENSE_EDIT_MODULE,
    NOT_FOUND_MESSAGE,
};

/// Everything a [`ComposerClient`] is assembled from.
pub struct ClientParts<R: Runtime + 'static> {
    pub runtime: Arc<R>,
    pub http_client: HttpClient,
    pub registry: Arc<dyn RegistrySource>,
    pub licenses: Arc<dyn LicenseProvider>,
    pub store: Arc<dyn ConfirmationStore>,
    pub rescanner: Arc<dyn ModuleRescanner>,
    /// Registry index URLs, in priority order
    pub registries: Vec<String>,
    pub userfiles: PathBuf,
    pub cache_root: PathBuf,
    /// Clean up the staging directory on Ctrl-C (CLI only)
    pub interrupt_cleanup: bool,
}

pub struct ComposerClient<R: Runtime + 'static> {
    registry: Arc<dyn RegistrySource>,
    licenses: Arc<dyn LicenseProvider>,
    registries: Vec<String>,
    store: Arc<dyn ConfirmationStore>,
    stager: Stager<R>,
    finalizer: Finalizer<R>,
    log: OperationLog<R>,
}

impl<R: Runtime + 'static> ComposerClient<R> {
    pub fn new(parts: ClientParts<R>) -> Self {
        let locks = TargetLocks::with_lock_dir(parts.cache_root.join(DOWNLOAD_DIR_NAME));
        let log = OperationLog::in_userfiles(Arc::clone(&parts.runtime), &parts.userfiles);

        let stager = Stager::new(
            Arc::clone(&parts.runtime),
            parts.http_client,
            log.clone(),
            locks.clone(),
            &parts.cache_root,
        )
        .with_interrupt_cleanup(parts.interrupt_cleanup);

        let finalizer = Finalizer::new(
            parts.runtime,
            Arc::clone(&parts.store),
            parts.rescanner,
            locks,
            log.clone(),
            parts.userfiles,
        );

        Self {
            registry: parts.registry,
            licenses: parts.licenses,
            registries: parts.registries,
            store: parts.store,
            stager,
            finalizer,
            log,
        }
    }

    pub fn registries(&self) -> &[String] {
        &self.registries
    }

    pub async fn search(&self, filter: &SearchFilter) -> Result<SearchResult> {
        registry::search(
            self.registry.as_ref(),
            &self.registries,
            self.licenses.as_ref(),
            filter,
        )
        .await
    }

    /// Resolves and stages a package, or finalizes it when `confirm_key` is set.
    ///
    /// Never fails: every error becomes an error response.
    #[tracing::instrument(skip(self))]
    pub async fn request_install(&self, request: &InstallRequest) -> InstallResponse {
        match self.try_request_install(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    "Install of {} {} failed: {:#}",
                    request.require_name, request.require_version, e
                );
                self.log.append(&format!("Error: {}", e));
                InstallResponse::failure(&e)
            }
        }
    }

    async fn try_request_install(&self, request: &InstallRequest) -> Result<InstallResponse> {
        let name = request.require_name.as_str();
        let version = request.require_version.as_str();
        self.log.reset("Request install...");

        if let Some(key) = &request.confirm_key {
            return self.install_confirmed(key, name, version).await;
        }

        self.log
            .append(&format!("Searching for {} for version {}", name, version));
        let matches = match self.search(&SearchFilter::exact(name, version)).await? {
            SearchResult::Matches(matches) => matches,
            SearchResult::Index(_) => Vec::new(),
        };
        let entry = resolver::first_match(matches, name, version)?;

        if entry.requires_license() {
            info!("{} {} requires a license key", name, version);
            return Ok(InstallResponse::license_required(name, version));
        }
        // Nothing to download if the package could never be installed
        entry.install_root()?;

        let token = ConfirmToken::generate();
        self.download_package(&entry, &token).await?;
        Ok(InstallResponse::confirm(&token, name, version))
    }

    async fn install_confirmed(
        &self,
        key: &str,
        name: &str,
        version: &str,
    ) -> Result<InstallResponse> {
        let expired = || PackageError::ConfirmationExpired {
            token: key.to_string(),
        };
        let token: ConfirmToken = key.parse().map_err(|_| expired())?;

        match self.store.load(&token)? {
            Some(pending)
                if pending.package.name == name && pending.package.version == version => {}
            Some(pending) => {
                warn!(
                    "Confirmation key {} belongs to {} {}, not {} {}",
                    token, pending.package.name, pending.package.version, name, version
                );
                return Err(expired().into());
            }
            None => return Err(expired().into()),
        }

        let result = self.install(&token).await?;
        Ok(InstallResponse::installed(result))
    }

    /// Finalizes whatever `key` was issued for, without a name check.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, key: &str) -> InstallResponse {
        self.log.reset("Confirm install...");
        let result = match key.parse::<ConfirmToken>() {
            Ok(token) => self.install(&token).await,
            Err(_) => Err(PackageError::ConfirmationExpired {
                token: key.to_string(),
            }
            .into()),
        };
        match result {
            Ok(result) => InstallResponse::installed(result),
            Err(e) => {
                self.log.append(&format!("Error: {}", e));
                InstallResponse::failure(&e)
            }
        }
    }

    /// Stages `entry` and records it under `token`.
    ///
    /// The record is only written once the archive is fully extracted.
    pub async fn download_package(
        &self,
        entry: &PackageEntry,
        token: &ConfirmToken,
    ) -> Result<PendingInstall> {
        let pending = self.stager.stage(entry).await?;
        self.store.save(token, &pending)?;
        Ok(pending)
    }

    /// Moves the install staged under `token` into place.
    pub async fn install(&self, token: &ConfirmToken) -> Result<InstallResult> {
        self.finalizer.finalize(token).await
    }
}
