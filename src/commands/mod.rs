//! CLI command handlers. Each one builds the client, runs one operation and
//! prints the JSON response on stdout.

use anyhow::Result;
use log::debug;
use serde::Serialize;
use std::sync::Arc;

use crate::client::{InstallRequest, InstallResponse};
use crate::registry::SearchFilter;
use crate::runtime::Runtime;

pub mod config;
pub mod services;

use config::Config;

/// Prints the first registry's index, or every exact match of `filter`.
#[tracing::instrument(skip(runtime, config))]
pub async fn search<R: Runtime + 'static>(
    runtime: R,
    config: &Config,
    filter: SearchFilter,
) -> Result<()> {
    let client = services::build_client(Arc::new(runtime), config, false)?;
    let result = client.search(&filter).await?;
    print_json(&result)
}

/// Resolves and stages a package, or installs it when a confirm key is given.
#[tracing::instrument(skip(runtime, config))]
pub async fn request_install<R: Runtime + 'static>(
    runtime: R,
    config: &Config,
    request: InstallRequest,
) -> Result<InstallResponse> {
    let client = services::build_client(Arc::new(runtime), config, true)?;
    let response = client.request_install(&request).await;
    print_json(&response)?;
    Ok(response)
}

/// Installs the package staged under `key`.
#[tracing::instrument(skip(runtime, config))]
pub async fn confirm<R: Runtime + 'static>(
    runtime: R,
    config: &Config,
    key: &str,
) -> Result<InstallResponse> {
    let client = services::build_client(Arc::new(runtime), config, false)?;
    let response = client.confirm(key).await;
    print_json(&response)?;
    Ok(response)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    debug!("Response is {} bytes", json.len());
    println!("{}", json);
    Ok(())
}
