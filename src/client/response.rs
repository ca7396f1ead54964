use serde::{Deserialize, Serialize};

use crate::confirm::ConfirmToken;
use crate::error::PackageError;
use crate::finalize::InstallResult;

pub const NOT_FOUND_MESSAGE: &str = "Error. Cannot find any packages.";
pub const LICENSE_EDIT_MODULE: &str = "settings/group/license_edit";
pub const CONFIRM_INSTALL_MODULE: &str = "admin/developer_tools/package_manager/confirm_install";

/// Parameters of an install request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRequest {
    pub require_name: String,
    pub require_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_key: Option<String>,
}

impl InstallRequest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            require_name: name.into(),
            require_version: version.into(),
            confirm_key: None,
        }
    }

    pub fn with_confirm_key(mut self, key: impl Into<String>) -> Self {
        self.confirm_key = Some(key.into());
        self
    }
}

/// Parameters handed to the follow-up form (license entry or confirmation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDataParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_key: Option<String>,
    pub require_name: String,
    pub require_version: String,
}

/// Structured answer of `request_install`. Exactly one of `error`,
/// `form_data_module` without `error`, or `success` describes the outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data_module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data_module_params: Option<FormDataParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

impl InstallResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn not_found() -> Self {
        Self {
            error: Some(NOT_FOUND_MESSAGE.to_string()),
            error_code: Some("package_not_found".to_string()),
            ..Default::default()
        }
    }

    /// Sends the user to the license-entry form.
    pub fn license_required(name: &str, version: &str) -> Self {
        Self {
            error: Some("You need license key to install this package".to_string()),
            error_code: Some("license_required".to_string()),
            message: Some(
                "This package is premium and you must have a license key to install it"
                    .to_string(),
            ),
            form_data_module: Some(LICENSE_EDIT_MODULE.to_string()),
            form_data_module_params: Some(FormDataParams {
                confirm_key: None,
                require_name: name.to_string(),
                require_version: version.to_string(),
            }),
            ..Default::default()
        }
    }

    /// The package is staged and waits for `confirm_key`.
    pub fn confirm(token: &ConfirmToken, name: &str, version: &str) -> Self {
        Self {
            message: Some("Please confirm installation".to_string()),
            form_data_module: Some(CONFIRM_INSTALL_MODULE.to_string()),
            form_data_module_params: Some(FormDataParams {
                confirm_key: Some(token.to_string()),
                require_name: name.to_string(),
                require_version: version.to_string(),
            }),
            ..Default::default()
        }
    }

    pub fn installed(result: InstallResult) -> Self {
        Self {
            success: Some(result.success),
            log: Some(result.log),
            files: Some(result.files),
            ..Default::default()
        }
    }

    /// Error response for any failure of the workflow.
    pub fn failure(error: &anyhow::Error) -> Self {
        match PackageError::find(error) {
            Some(PackageError::PackageNotFound { .. }) => Self::not_found(),
            Some(PackageError::LicenseRequired { name, version }) => {
                Self::license_required(name, version)
            }
            Some(kind) => Self {
                error: Some(kind.to_string()),
                error_code: Some(kind.code().to_string()),
                ..Default::default()
            },
            None => Self {
                error: Some(format!("{:#}", error)),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_confirm_shape_has_no_error() {
        let token: ConfirmToken = "composer-confirm-key-abc".parse().unwrap();
        let response = InstallResponse::confirm(&token, "acme/widget", "1.0.0");

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "message": "Please confirm installation",
                "form_data_module": "admin/developer_tools/package_manager/confirm_install",
                "form_data_module_params": {
                    "confirm_key": "composer-confirm-key-abc",
                    "require_name": "acme/widget",
                    "require_version": "1.0.0"
                }
            })
        );
        assert!(!response.is_error());
    }

    #[test]
    fn test_license_shape() {
        let response = InstallResponse::license_required("acme/pro", "2.0.0");
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["form_data_module"], "settings/group/license_edit");
        assert_eq!(value["form_data_module_params"]["require_name"], "acme/pro");
        assert!(value["form_data_module_params"].get("confirm_key").is_none());
        assert!(response.is_error());
    }

    #[test]
    fn test_failure_maps_error_kinds() {
        let err = anyhow::Error::from(PackageError::PackageNotFound {
            name: "a".into(),
            version: "1".into(),
        });
        assert_eq!(InstallResponse::failure(&err), InstallResponse::not_found());

        let err = anyhow::Error::from(PackageError::ConfirmationExpired {
            token: "t".into(),
        });
        let response = InstallResponse::failure(&err);
        assert_eq!(response.error_code.as_deref(), Some("confirmation_expired"));
        assert!(response.error.unwrap().contains("please retry"));

        let err = anyhow::anyhow!("disk full").context("Failed to save");
        let response = InstallResponse::failure(&err);
        assert_eq!(response.error.as_deref(), Some("Failed to save: disk full"));
        assert_eq!(response.error_code, None);
    }

    #[test]
    fn test_request_deserializes_without_confirm_key() {
        let request: InstallRequest =
            serde_json::from_str(r#"{"require_name":"a/b","require_version":"1.0"}"#).unwrap();
        assert_eq!(request, InstallRequest::new("a/b", "1.0"));
    }
}
