//! Package registries: index model, fetching and searching.
//!
//! A registry serves `{ "packages": { <name>: { <version>: <entry> } } }`.
//! Indexes are rebuilt on every query; nothing is cached between calls.

mod client;
mod search;

use anyhow::Result;
use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::PackageError;
use crate::license::LicenseRecord;

pub use client::RegistryClient;
pub use search::{SearchFilter, SearchResult, search};

/// Fetches the package index of a single registry URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistrySource: Send + Sync {
    async fn fetch_index(&self, url: &str, licenses: &[LicenseRecord]) -> Result<PackageIndex>;
}

/// How a package is distributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DistKind {
    /// Premium package; a license key must be entered before download
    LicenseKey,
    /// Downloadable archive (`zip`, `tar`, `archive`, ...)
    Archive(String),
}

impl Default for DistKind {
    fn default() -> Self {
        DistKind::Archive(String::new())
    }
}

impl From<String> for DistKind {
    fn from(value: String) -> Self {
        if value == "license_key" {
            DistKind::LicenseKey
        } else {
            DistKind::Archive(value)
        }
    }
}

impl From<DistKind> for String {
    fn from(value: DistKind) -> Self {
        match value {
            DistKind::LicenseKey => "license_key".to_string(),
            DistKind::Archive(kind) => kind,
        }
    }
}

/// The `dist` block of a package entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    #[serde(rename = "type", default)]
    pub kind: DistKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// What a package installs as. Only modules and templates have a home.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PackageType {
    Module,
    Template,
    Other(String),
}

impl PackageType {
    /// Directory under userfiles that holds packages of this type.
    pub fn install_root_name(&self) -> Option<&'static str> {
        match self {
            PackageType::Module => Some("modules"),
            PackageType::Template => Some("templates"),
            PackageType::Other(_) => None,
        }
    }
}

impl From<String> for PackageType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "microweber-module" => PackageType::Module,
            "microweber-template" => PackageType::Template,
            _ => PackageType::Other(value),
        }
    }
}

impl From<PackageType> for String {
    fn from(value: PackageType) -> Self {
        match value {
            PackageType::Module => "microweber-module".to_string(),
            PackageType::Template => "microweber-template".to_string(),
            PackageType::Other(other) => other,
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from(self.clone()))
    }
}

/// One (name, version) record of a registry index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub dist: Distribution,
    #[serde(rename = "target-dir", default, skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub package_type: Option<PackageType>,
    /// Fields this client does not interpret (description, authors, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PackageEntry {
    pub fn requires_license(&self) -> bool {
        self.dist.kind == DistKind::LicenseKey
    }

    /// The target directory as a single, safe path component.
    pub fn target_dir_name(&self) -> Result<&str> {
        let dir = self.target_dir.as_deref().unwrap_or_default();
        let valid = !dir.is_empty()
            && dir != "."
            && dir != ".."
            && !dir.contains(['/', '\\'])
            && !dir.contains('\0');
        if !valid {
            return Err(PackageError::DownloadFailed {
                url: self.dist.url.clone().unwrap_or_default(),
                message: format!("package {} has no valid target-dir", self.name),
            }
            .into());
        }
        Ok(dir)
    }

    /// `modules` or `templates`; any other type cannot be installed.
    pub fn install_root(&self) -> Result<&'static str> {
        self.package_type
            .as_ref()
            .and_then(PackageType::install_root_name)
            .ok_or_else(|| {
                PackageError::UnsupportedPackageType {
                    package_type: self
                        .package_type
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                }
                .into()
            })
    }
}

/// name -> version -> entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageIndex {
    packages: BTreeMap<String, BTreeMap<String, PackageEntry>>,
}

impl PackageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a registry response body.
    ///
    /// A body that is not JSON, or whose `packages` field is missing or not an
    /// object, yields an empty index. Malformed versions are skipped.
    pub fn from_registry_body(body: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                warn!("Registry response is not valid JSON ({}); treating as empty", e);
                return Self::new();
            }
        };

        let Some(packages) = value.get("packages").and_then(|p| p.as_object()) else {
            warn!("Registry response has no 'packages' object; treating as empty");
            return Self::new();
        };

        let mut index = Self::new();
        for (name, versions) in packages {
            let Some(versions) = versions.as_object() else {
                warn!("Skipping package {}: versions are not an object", name);
                continue;
            };
            for (version, data) in versions {
                match serde_json::from_value::<PackageEntry>(data.clone()) {
                    Ok(mut entry) => {
                        if entry.name.is_empty() {
                            entry.name = name.clone();
                        }
                        if entry.version.is_empty() {
                            entry.version = version.clone();
                        }
                        index.insert(name, version, entry);
                    }
                    Err(e) => warn!("Skipping {} {}: {}", name, version, e),
                }
            }
        }
        index
    }

    pub fn insert(&mut self, name: &str, version: &str, entry: PackageEntry) {
        self.packages
            .entry(name.to_string())
            .or_default()
            .insert(version.to_string(), entry);
    }

    /// Exact lookup of `index[name][version]`.
    pub fn get(&self, name: &str, version: &str) -> Option<&PackageEntry> {
        self.packages.get(name)?.get(version)
    }

    pub fn versions(&self, name: &str) -> Option<&BTreeMap<String, PackageEntry>> {
        self.packages.get(name)
    }

    /// Number of packages (not versions).
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
