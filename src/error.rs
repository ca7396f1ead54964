//! Domain failures of the install workflow.
//!
//! These travel inside `anyhow::Error` and are recovered with
//! [`PackageError::find`] wherever a caller needs to branch on the kind.

use std::path::PathBuf;

/// Structured failure of a registry, staging or finalize step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageError {
    /// Transport failure or non-2xx status while fetching a registry index
    RegistryUnreachable { url: String, message: String },
    /// No registry lists the exact name and version
    PackageNotFound { name: String, version: String },
    /// The package is premium; the caller must send the user to license entry
    LicenseRequired { name: String, version: String },
    /// The distribution archive could not be fetched completely
    DownloadFailed { url: String, message: String },
    /// The downloaded archive could not be unpacked
    ExtractionFailed { message: String },
    /// The confirmation token is unknown, expired or already used
    ConfirmationExpired { token: String },
    /// Staged content could not replace the live directory
    DestinationMoveFailed {
        from: PathBuf,
        to: PathBuf,
        message: String,
    },
    /// Only modules and templates have an install location
    UnsupportedPackageType { package_type: String },
}

impl PackageError {
    /// Finds a `PackageError` anywhere in an error chain.
    pub fn find(error: &anyhow::Error) -> Option<&PackageError> {
        error.chain().find_map(|e| e.downcast_ref::<PackageError>())
    }

    /// Stable snake_case identifier, used in JSON responses.
    pub fn code(&self) -> &'static str {
        match self {
            PackageError::RegistryUnreachable { .. } => "registry_unreachable",
            PackageError::PackageNotFound { .. } => "package_not_found",
            PackageError::LicenseRequired { .. } => "license_required",
            PackageError::DownloadFailed { .. } => "download_failed",
            PackageError::ExtractionFailed { .. } => "extraction_failed",
            PackageError::ConfirmationExpired { .. } => "confirmation_expired",
            PackageError::DestinationMoveFailed { .. } => "destination_move_failed",
            PackageError::UnsupportedPackageType { .. } => "unsupported_package_type",
        }
    }
}

impl std::fmt::Display for PackageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageError::RegistryUnreachable { url, message } => {
                write!(f, "Registry {} is unreachable: {}", url, message)
            }
            PackageError::PackageNotFound { name, version } => {
                write!(f, "Package {} version {} was not found", name, version)
            }
            PackageError::LicenseRequired { name, version } => {
                write!(
                    f,
                    "Package {} version {} requires a license key",
                    name, version
                )
            }
            PackageError::DownloadFailed { url, message } => {
                write!(f, "Failed to download {}: {}", url, message)
            }
            PackageError::ExtractionFailed { message } => {
                write!(f, "Failed to extract package: {}", message)
            }
            PackageError::ConfirmationExpired { .. } => {
                write!(f, "Confirmation expired, please retry the installation")
            }
            PackageError::DestinationMoveFailed { from, to, message } => {
                write!(
                    f,
                    "Failed to move {} to {}: {}",
                    from.display(),
                    to.display(),
                    message
                )
            }
            PackageError::UnsupportedPackageType { package_type } => {
                write!(f, "Unsupported package type: {}", package_type)
            }
        }
    }
}

impl std::error::Error for PackageError {}
