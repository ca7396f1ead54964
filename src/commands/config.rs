use anyhow::{Result, anyhow, bail};
use chrono::Duration;
use log::debug;
use std::path::PathBuf;

use crate::confirm::DEFAULT_TTL_SECS;
use crate::runtime::Runtime;

pub const DEFAULT_REGISTRY: &str = "https://packages-satis.microweberapi.com/packages.json";

/// Application name used for the default data and cache directories.
const APP_DIR: &str = "mwpkg";

/// Longest accepted confirmation TTL, roughly a century.
pub const MAX_CONFIRM_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Values given on the command line (or via their environment variables).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub userfiles: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub registries: Vec<String>,
    pub licenses: Option<PathBuf>,
    pub confirm_ttl_secs: Option<u64>,
}

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub userfiles: PathBuf,
    pub cache_root: PathBuf,
    pub registries: Vec<String>,
    pub licenses_path: PathBuf,
    pub confirm_ttl: Duration,
}

impl Config {
    /// Fills every setting not given in `overrides` with its default.
    pub fn load<R: Runtime>(runtime: &R, overrides: ConfigOverrides) -> Result<Self> {
        let userfiles = match overrides.userfiles {
            Some(path) => path,
            None => runtime
                .data_dir()
                .ok_or_else(|| anyhow!("Could not determine the data directory"))?
                .join(APP_DIR)
                .join("userfiles"),
        };

        let cache_root = match overrides.cache_dir {
            Some(path) => path,
            None => runtime
                .cache_dir()
                .ok_or_else(|| anyhow!("Could not determine the cache directory"))?
                .join(APP_DIR),
        };

        let registries: Vec<String> = overrides
            .registries
            .into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        let registries = if registries.is_empty() {
            vec![DEFAULT_REGISTRY.to_string()]
        } else {
            registries
        };

        let licenses_path = overrides
            .licenses
            .unwrap_or_else(|| userfiles.join("licenses.json"));

        let ttl_secs = match overrides.confirm_ttl_secs {
            Some(secs) if secs > MAX_CONFIRM_TTL_SECS => {
                bail!(
                    "Confirmation TTL of {} seconds is too large (maximum {})",
                    secs,
                    MAX_CONFIRM_TTL_SECS
                );
            }
            Some(secs) => i64::try_from(secs)?,
            None => DEFAULT_TTL_SECS,
        };
        let confirm_ttl = Duration::try_seconds(ttl_secs)
            .ok_or_else(|| anyhow!("Confirmation TTL of {} seconds is too large", ttl_secs))?;

        let config = Self {
            userfiles,
            cache_root,
            registries,
            licenses_path,
            confirm_ttl,
        };
        debug!("Using config: {:?}", config);
        Ok(config)
    }
}
