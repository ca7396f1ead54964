//! Module-rescan notification sent after a successful install.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::runtime::Runtime;

/// Marker file name written into the userfiles root.
pub const MARKER_FILE_NAME: &str = "rescan_modules.json";

/// Options forwarded to the host's module scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescanOptions {
    pub skip_cache: bool,
    pub cleanup_db: bool,
    pub reload_modules: bool,
}

impl Default for RescanOptions {
    fn default() -> Self {
        Self {
            skip_cache: true,
            cleanup_db: true,
            reload_modules: true,
        }
    }
}

impl RescanOptions {
    /// `skip_cache=1&cleanup_db=1&reload_modules=1` form used by the host.
    pub fn to_query(&self) -> String {
        format!(
            "skip_cache={}&cleanup_db={}&reload_modules={}",
            u8::from(self.skip_cache),
            u8::from(self.cleanup_db),
            u8::from(self.reload_modules)
        )
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModuleRescanner: Send + Sync {
    async fn rescan(&self, options: &RescanOptions) -> Result<()>;
}

/// Asks the host to rescan by dropping a JSON request into the userfiles root.
pub struct MarkerFileRescanner<R: Runtime> {
    runtime: Arc<R>,
    path: PathBuf,
}

#[derive(Serialize)]
struct RescanRequest<'a> {
    query: String,
    requested_at: String,
    #[serde(flatten)]
    options: &'a RescanOptions,
}

impl<R: Runtime> MarkerFileRescanner<R> {
    pub fn new(runtime: Arc<R>, userfiles: &Path) -> Self {
        Self {
            runtime,
            path: userfiles.join(MARKER_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<R: Runtime> ModuleRescanner for MarkerFileRescanner<R> {
    #[tracing::instrument(skip(self))]
    async fn rescan(&self, options: &RescanOptions) -> Result<()> {
        let request = RescanRequest {
            query: options.to_query(),
            requested_at: Utc::now().to_rfc3339(),
            options,
        };
        if let Some(parent) = self.path.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        self.runtime
            .write(&self.path, &serde_json::to_vec_pretty(&request)?)
            .with_context(|| format!("Failed to write rescan request {:?}", self.path))
    }
}
