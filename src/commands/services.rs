//! Service factory: builds the client and its collaborators from a [`Config`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, redirect};

use crate::{
    client::{ClientParts, ComposerClient},
    confirm::FileConfirmationStore,
    http::{DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT_SECS, HttpClient},
    license::FileLicenseProvider,
    registry::RegistryClient,
    rescan::MarkerFileRescanner,
    runtime::Runtime,
};

use super::config::Config;

pub const USER_AGENT: &str = concat!("mwpkg/", env!("CARGO_PKG_VERSION"));

/// HTTP client with the registry timeout and redirect limit.
pub fn build_http_client() -> Result<HttpClient> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .redirect(redirect::Policy::limited(DEFAULT_MAX_REDIRECTS))
        .build()?;

    Ok(HttpClient::new(client))
}

/// Assembles a [`ComposerClient`] with file-backed collaborators.
pub fn build_client<R: Runtime + 'static>(
    runtime: Arc<R>,
    config: &Config,
    interrupt_cleanup: bool,
) -> Result<ComposerClient<R>> {
    let http_client = build_http_client()?;

    let store = FileConfirmationStore::in_cache(Arc::clone(&runtime), &config.cache_root)
        .with_ttl(config.confirm_ttl);

    Ok(ComposerClient::new(ClientParts {
        runtime: Arc::clone(&runtime),
        http_client: http_client.clone(),
        registry: Arc::new(RegistryClient::new(http_client)),
        licenses: Arc::new(FileLicenseProvider::new(
            Arc::clone(&runtime),
            config.licenses_path.clone(),
        )),
        store: Arc::new(store),
        rescanner: Arc::new(MarkerFileRescanner::new(
            Arc::clone(&runtime),
            &config.userfiles,
        )),
        registries: config.registries.clone(),
        userfiles: config.userfiles.clone(),
        cache_root: config.cache_root.clone(),
        interrupt_cleanup,
    }))
}
