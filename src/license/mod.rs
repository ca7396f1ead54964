//! License records used to authenticate registry requests.
//!
//! License storage belongs to the host application; this crate only needs
//! the current list of records, passed explicitly into each registry call.

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::runtime::Runtime;

/// One opaque license record as stored by the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseRecord(pub serde_json::Value);

/// Supplies the license records sent to registries.
#[cfg_attr(test, mockall::automock)]
pub trait LicenseProvider: Send + Sync {
    fn list_licenses(&self) -> Result<Vec<LicenseRecord>>;
}

/// Builds the `Authorization` header value: `Basic <base64(json array)>`.
pub fn authorization_header(licenses: &[LicenseRecord]) -> Result<String> {
    let json = serde_json::to_string(licenses).context("Failed to serialize license records")?;
    Ok(format!("Basic {}", BASE64.encode(json)))
}

/// A fixed list of license records.
#[derive(Debug, Clone, Default)]
pub struct StaticLicenses {
    records: Vec<LicenseRecord>,
}

impl StaticLicenses {
    pub fn new(records: Vec<LicenseRecord>) -> Self {
        Self { records }
    }
}

impl LicenseProvider for StaticLicenses {
    fn list_licenses(&self) -> Result<Vec<LicenseRecord>> {
        Ok(self.records.clone())
    }
}

/// Reads license records from a JSON array file. A missing file means no licenses.
pub struct FileLicenseProvider<R: Runtime> {
    runtime: Arc<R>,
    path: PathBuf,
}

impl<R: Runtime> FileLicenseProvider<R> {
    pub fn new(runtime: Arc<R>, path: PathBuf) -> Self {
        Self { runtime, path }
    }
}

impl<R: Runtime> LicenseProvider for FileLicenseProvider<R> {
    #[tracing::instrument(skip(self))]
    fn list_licenses(&self) -> Result<Vec<LicenseRecord>> {
        if !self.runtime.exists(&self.path) {
            debug!("No license file at {:?}", self.path);
            return Ok(Vec::new());
        }

        let content = self
            .runtime
            .read_to_string(&self.path)
            .with_context(|| format!("Failed to read license file {:?}", self.path))?;

        if content.trim().is_empty() {
            warn!("License file {:?} is empty", self.path);
            return Ok(Vec::new());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("License file {:?} is not a JSON array", self.path))
    }
}
