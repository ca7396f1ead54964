//! HTTP registry client.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};

use crate::error::PackageError;
use crate::http::HttpClient;
use crate::license::{LicenseRecord, authorization_header};

use super::{PackageIndex, RegistrySource};

/// Fetches registry indexes over HTTP.
///
/// Timeout and redirect policy live on the wrapped client (see `services`).
pub struct RegistryClient {
    http_client: HttpClient,
}

impl RegistryClient {
    pub fn new(http_client: HttpClient) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl RegistrySource for RegistryClient {
    #[tracing::instrument(skip(self, licenses))]
    async fn fetch_index(&self, url: &str, licenses: &[LicenseRecord]) -> Result<PackageIndex> {
        debug!("Fetching package index with {} license(s)", licenses.len());
        let authorization = authorization_header(licenses)?;

        let body = self
            .http_client
            .get_text(url, Some(&authorization))
            .await
            .map_err(|e| PackageError::RegistryUnreachable {
                url: url.to_string(),
                message: format!("{:#}", e),
            })?;

        let index = PackageIndex::from_registry_body(&body);
        info!("Registry {} lists {} package(s)", url, index.len());
        Ok(index)
    }
}
