//! Searching across the configured registries.

use anyhow::{Context, Result};
use futures_util::future::join_all;
use log::{debug, warn};
use serde::Serialize;

use crate::license::LicenseProvider;
use crate::resolver;

use super::{PackageEntry, PackageIndex, RegistrySource};

/// What to look for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchFilter {
    /// No filter: the first registry's full index
    #[default]
    All,
    /// Exact name and version
    Exact { name: String, version: String },
}

impl SearchFilter {
    pub fn exact(name: impl Into<String>, version: impl Into<String>) -> Self {
        SearchFilter::Exact {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchResult {
    Index(PackageIndex),
    Matches(Vec<PackageEntry>),
}

/// Queries `registries` in order.
///
/// With [`SearchFilter::All`] only the first registry is consulted and its
/// whole index returned. With [`SearchFilter::Exact`] every registry is
/// fetched concurrently and matches are returned in registry order; failing
/// registries are skipped, unless all of them failed.
#[tracing::instrument(skip(source, registries, licenses))]
pub async fn search(
    source: &dyn RegistrySource,
    registries: &[String],
    licenses: &dyn LicenseProvider,
    filter: &SearchFilter,
) -> Result<SearchResult> {
    let licenses = licenses
        .list_licenses()
        .context("Failed to load license records")?;

    let (name, version) = match filter {
        SearchFilter::All => {
            let Some(first) = registries.first() else {
                return Ok(SearchResult::Index(PackageIndex::new()));
            };
            let index = source.fetch_index(first, &licenses).await?;
            return Ok(SearchResult::Index(index));
        }
        SearchFilter::Exact { name, version } => (name, version),
    };

    let results = join_all(
        registries
            .iter()
            .map(|url| source.fetch_index(url, &licenses)),
    )
    .await;

    let mut matches = Vec::new();
    let mut first_error = None;
    let mut failures = 0;

    for (url, result) in registries.iter().zip(results) {
        match result {
            Ok(index) => {
                if let Some(entry) = resolver::resolve(&index, name, version) {
                    debug!("Found {} {} in {}", name, version, url);
                    matches.push(entry.clone());
                }
            }
            Err(e) => {
                warn!("Skipping registry {}: {:#}", url, e);
                failures += 1;
                first_error.get_or_insert(e);
            }
        }
    }

    if matches.is_empty()
        && failures == registries.len()
        && let Some(e) = first_error
    {
        return Err(e);
    }

    Ok(SearchResult::Matches(matches))
}
