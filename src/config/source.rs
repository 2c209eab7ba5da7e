//! VM sourcing configuration: clone from a template or deploy a remote package.

use std::collections::BTreeMap;

use serde::Deserialize;
use url::Url;

use super::Secret;
use crate::driver::RemoteAuth;
use crate::error::VsforgeError;
use crate::sanitize::sanitize_url;

/// Remote OVF/OVA package to deploy from.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteSourceConfig {
    /// `http://` or `https://` URL of the package.
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<Secret>,
    /// Skip TLS certificate verification when fetching the package.
    #[serde(default)]
    pub skip_tls_verify: bool,
}

impl RemoteSourceConfig {
    /// Returns the URL with any embedded password removed.
    pub fn display_url(&self) -> String {
        sanitize_url(&self.url)
    }

    /// Returns the passwords this source carries: the configured one and any
    /// embedded in the URL.
    pub fn known_secrets(&self) -> Vec<String> {
        let mut secrets: Vec<String> = self
            .password
            .iter()
            .map(|p| p.expose().to_string())
            .collect();
        if let Ok(url) = Url::parse(&self.url)
            && let Some(password) = url.password()
        {
            secrets.push(password.to_string());
        }
        secrets.retain(|s| !s.is_empty());
        secrets
    }

    /// Returns credentials only when both username and password are set.
    pub fn auth(&self) -> Option<RemoteAuth> {
        match (non_empty(self.username.as_deref()), &self.password) {
            (Some(username), Some(password)) if !password.is_empty() => Some(RemoteAuth {
                username: username.to_string(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    /// Validates the remote source, returning every violation found.
    pub fn prepare(&self) -> Vec<VsforgeError> {
        let mut errs = Vec::new();

        if self.url.trim().is_empty() {
            errs.push(VsforgeError::Validation("'url' is required for remote source".to_string()));
        } else if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            errs.push(VsforgeError::Validation(
                "remote source URL must use HTTP or HTTPS protocol".to_string(),
            ));
        } else if Url::parse(&self.url).is_err() {
            errs.push(VsforgeError::Validation(format!(
                "remote source URL '{}' is not a valid URL",
                self.display_url()
            )));
        }

        let has_username = non_empty(self.username.as_deref()).is_some();
        let has_password = self.password.as_ref().is_some_and(|p| !p.is_empty());
        if has_username && !has_password {
            errs.push(VsforgeError::Validation(
                "'password' is required when 'username' is specified for remote source"
                    .to_string(),
            ));
        }
        if has_password && !has_username {
            errs.push(VsforgeError::Validation(
                "'username' is required when 'password' is specified for remote source"
                    .to_string(),
            ));
        }

        errs
    }
}

/// vApp properties and OVF deployment option applied to the new VM.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct VAppConfig {
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// OVF deployment option to select (remote sources only).
    #[serde(default)]
    pub deployment_option: Option<String>,
}

/// Where the VM comes from and how it is shaped while being created.
///
/// Exactly one of `template` or `remote_source` must be set.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CloneConfig {
    /// Name or inventory path of the VM/template to clone.
    #[serde(default)]
    pub template: Option<String>,
    /// Remote OVF/OVA package to deploy.
    #[serde(default)]
    pub remote_source: Option<RemoteSourceConfig>,
    /// Create a linked clone from the source's current snapshot.
    #[serde(default)]
    pub linked_clone: bool,
    /// Network to connect the first NIC to.
    #[serde(default)]
    pub network: Option<String>,
    /// Static MAC address for the first NIC.
    #[serde(default)]
    pub mac_address: Option<String>,
    /// VM annotation.
    #[serde(default)]
    pub notes: Option<String>,
    /// New size of the primary disk in MB.
    #[serde(default)]
    pub disk_size: Option<u64>,
    #[serde(default)]
    pub vapp: VAppConfig,
}

/// The single VM source selected by a valid [`CloneConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmSource<'a> {
    /// Clone an existing VM or template.
    Template(&'a str),
    /// Deploy from a remote OVF/OVA package.
    Remote(&'a RemoteSourceConfig),
}

impl CloneConfig {
    /// Returns the configured source, or `None` unless exactly one is set.
    pub fn source(&self) -> Option<VmSource<'_>> {
        match (non_empty(self.template.as_deref()), &self.remote_source) {
            (Some(template), None) => Some(VmSource::Template(template)),
            (None, Some(remote)) => Some(VmSource::Remote(remote)),
            _ => None,
        }
    }

    /// Validates the clone settings, returning every violation found.
    pub fn prepare(&self) -> Vec<VsforgeError> {
        let mut errs = Vec::new();

        match (non_empty(self.template.as_deref()), &self.remote_source) {
            (Some(_), Some(_)) => errs.push(VsforgeError::Validation(
                "'template' and 'remote_source' cannot both be specified".to_string(),
            )),
            (None, None) => errs.push(VsforgeError::Validation(
                "either 'template' or 'remote_source' must be specified".to_string(),
            )),
            (None, Some(remote)) => {
                errs.extend(remote.prepare());
                if self.linked_clone {
                    errs.push(VsforgeError::Validation(
                        "'linked_clone' cannot be used with 'remote_source'".to_string(),
                    ));
                }
            }
            (Some(_), None) => {
                if self.vapp.deployment_option.is_some() {
                    errs.push(VsforgeError::Validation(
                        "'vapp.deployment_option' is only supported with 'remote_source'"
                            .to_string(),
                    ));
                }
            }
        }

        if self.linked_clone && self.disk_size.is_some() {
            errs.push(VsforgeError::Validation(
                "'linked_clone' and 'disk_size' cannot be used together".to_string(),
            ));
        }
        if self.disk_size == Some(0) {
            errs.push(VsforgeError::Validation("'disk_size' must be greater than zero".to_string()));
        }
        if non_empty(self.mac_address.as_deref()).is_some()
            && non_empty(self.network.as_deref()).is_none()
        {
            errs.push(VsforgeError::Validation(
                "'network' is required when 'mac_address' is specified".to_string(),
            ));
        }

        errs
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
