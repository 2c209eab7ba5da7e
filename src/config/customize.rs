//! Guest customization configuration.

use std::net::{Ipv4Addr, Ipv6Addr};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use super::{Secret, validate_host_file_exists};
use crate::error::VsforgeError;

fn default_true() -> bool {
    true
}

/// Linux guest identity.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LinuxOptions {
    pub host_name: String,
    #[serde(default)]
    pub domain: String,
    /// IANA time zone (e.g., `Etc/UTC`).
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default = "default_true")]
    pub hw_clock_utc: bool,
}

/// Windows guest identity, rendered into a sysprep answer by the driver.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WindowsOptions {
    pub computer_name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub organization_name: Option<String>,
    #[serde(default)]
    pub admin_password: Option<Secret>,
    #[serde(default)]
    pub workgroup: Option<String>,
    #[serde(default)]
    pub join_domain: Option<String>,
    #[serde(default)]
    pub domain_admin: Option<String>,
    #[serde(default)]
    pub domain_admin_password: Option<Secret>,
    #[serde(default)]
    pub product_key: Option<String>,
    /// Windows time zone index.
    #[serde(default)]
    pub time_zone: Option<u32>,
    #[serde(default)]
    pub auto_logon: bool,
    #[serde(default)]
    pub auto_logon_count: Option<u32>,
    #[serde(default)]
    pub run_once_commands: Vec<String>,
}

/// Static addressing and DNS for one guest NIC. Unset addresses mean DHCP.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NetworkInterface {
    #[serde(default)]
    pub dns_server_list: Vec<String>,
    #[serde(default)]
    pub dns_domain: Option<String>,
    #[serde(default)]
    pub ipv4_address: Option<String>,
    /// Prefix length, 0-32.
    #[serde(default)]
    pub ipv4_netmask: Option<u8>,
    #[serde(default)]
    pub ipv6_address: Option<String>,
    /// Prefix length, 0-128.
    #[serde(default)]
    pub ipv6_netmask: Option<u8>,
}

/// Guest OS identity plus per-NIC and global network settings.
///
/// Exactly one identity source must be set.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CustomizeConfig {
    #[serde(default)]
    pub linux_options: Option<LinuxOptions>,
    #[serde(default)]
    pub windows_options: Option<WindowsOptions>,
    /// Local sysprep answer file; relative paths resolve against the build file.
    #[serde(default)]
    pub windows_sysprep_file: Option<Utf8PathBuf>,
    #[serde(default)]
    pub windows_sysprep_text: Option<String>,
    #[serde(default)]
    pub network_interface: Vec<NetworkInterface>,
    #[serde(default)]
    pub ipv4_gateway: Option<String>,
    #[serde(default)]
    pub ipv6_gateway: Option<String>,
    #[serde(default)]
    pub dns_server_list: Vec<String>,
    #[serde(default)]
    pub dns_suffix_list: Vec<String>,
}

/// The single identity source selected by a valid [`CustomizeConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource<'a> {
    Linux(&'a LinuxOptions),
    Windows(&'a WindowsOptions),
    SysprepFile(&'a Utf8Path),
    SysprepText(&'a str),
}

impl CustomizeConfig {
    fn identity_sources(&self) -> Vec<IdentitySource<'_>> {
        let mut sources = Vec::new();
        if let Some(linux) = &self.linux_options {
            sources.push(IdentitySource::Linux(linux));
        }
        if let Some(windows) = &self.windows_options {
            sources.push(IdentitySource::Windows(windows));
        }
        if let Some(path) = &self.windows_sysprep_file {
            sources.push(IdentitySource::SysprepFile(path));
        }
        if let Some(text) = &self.windows_sysprep_text {
            sources.push(IdentitySource::SysprepText(text));
        }
        sources
    }

    /// Returns the identity source, or `None` unless exactly one is set.
    pub fn identity(&self) -> Option<IdentitySource<'_>> {
        match self.identity_sources().as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }

    /// Resolves a relative sysprep file path against `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: &Utf8Path) {
        if let Some(path) = &mut self.windows_sysprep_file
            && path.is_relative()
        {
            *path = base_dir.join(&*path);
        }
    }

    pub fn prepare(&self) -> Vec<VsforgeError> {
        let mut errs = Vec::new();

        match self.identity_sources().as_slice() {
            [] => errs.push(VsforgeError::Validation(
                "one of 'linux_options', 'windows_options', 'windows_sysprep_file' or \
                'windows_sysprep_text' must be specified"
                    .to_string(),
            )),
            [IdentitySource::Linux(linux)] => {
                if linux.host_name.trim().is_empty() {
                    errs.push(VsforgeError::Validation(
                        "'linux_options.host_name' is required".to_string(),
                    ));
                }
            }
            [IdentitySource::Windows(windows)] => {
                if windows.computer_name.trim().is_empty() {
                    errs.push(VsforgeError::Validation(
                        "'windows_options.computer_name' is required".to_string(),
                    ));
                }
                if windows.join_domain.is_some() && windows.workgroup.is_some() {
                    errs.push(VsforgeError::Validation(
                        "'join_domain' and 'workgroup' cannot be used together".to_string(),
                    ));
                }
                if windows.join_domain.is_some()
                    && (windows.domain_admin.is_none() || windows.domain_admin_password.is_none())
                {
                    errs.push(VsforgeError::Validation(
                        "'domain_admin' and 'domain_admin_password' are required when \
                        'join_domain' is specified"
                            .to_string(),
                    ));
                }
            }
            [IdentitySource::SysprepFile(path)] => {
                if let Err(e) = validate_host_file_exists(path, "sysprep file") {
                    errs.push(e);
                }
            }
            [IdentitySource::SysprepText(text)] => {
                if text.trim().is_empty() {
                    errs.push(VsforgeError::Validation(
                        "'windows_sysprep_text' must not be empty".to_string(),
                    ));
                }
            }
            _ => errs.push(VsforgeError::Validation(
                "only one of 'linux_options', 'windows_options', 'windows_sysprep_file' or \
                'windows_sysprep_text' can be specified"
                    .to_string(),
            )),
        }

        if self.network_interface.is_empty() {
            errs.push(VsforgeError::Validation(
                "at least one 'network_interface' must be specified".to_string(),
            ));
        }

        for (index, nic) in self.network_interface.iter().enumerate() {
            errs.extend(nic.prepare(index + 1));
        }

        if let Some(gw) = &self.ipv4_gateway
            && gw.parse::<Ipv4Addr>().is_err()
        {
            errs.push(VsforgeError::Validation(format!("invalid 'ipv4_gateway': '{}'", gw)));
        }
        if let Some(gw) = &self.ipv6_gateway
            && gw.parse::<Ipv6Addr>().is_err()
        {
            errs.push(VsforgeError::Validation(format!("invalid 'ipv6_gateway': '{}'", gw)));
        }

        errs
    }
}

impl NetworkInterface {
    fn prepare(&self, n: usize) -> Vec<VsforgeError> {
        let mut errs = Vec::new();

        match (&self.ipv4_address, self.ipv4_netmask) {
            (Some(addr), Some(bits)) => {
                if addr.parse::<Ipv4Addr>().is_err() {
                    errs.push(VsforgeError::Validation(format!(
                        "network_interface {}: invalid 'ipv4_address': '{}'",
                        n, addr
                    )));
                }
                if bits > 32 {
                    errs.push(VsforgeError::Validation(format!(
                        "network_interface {}: 'ipv4_netmask' must be between 0 and 32, got {}",
                        n, bits
                    )));
                }
            }
            (Some(_), None) => errs.push(VsforgeError::Validation(format!(
                "network_interface {}: 'ipv4_netmask' is required when 'ipv4_address' is specified",
                n
            ))),
            (None, Some(_)) => errs.push(VsforgeError::Validation(format!(
                "network_interface {}: 'ipv4_address' is required when 'ipv4_netmask' is specified",
                n
            ))),
            (None, None) => {}
        }

        match (&self.ipv6_address, self.ipv6_netmask) {
            (Some(addr), Some(bits)) => {
                if addr.parse::<Ipv6Addr>().is_err() {
                    errs.push(VsforgeError::Validation(format!(
                        "network_interface {}: invalid 'ipv6_address': '{}'",
                        n, addr
                    )));
                }
                if bits > 128 {
                    errs.push(VsforgeError::Validation(format!(
                        "network_interface {}: 'ipv6_netmask' must be between 0 and 128, got {}",
                        n, bits
                    )));
                }
            }
            (Some(_), None) => errs.push(VsforgeError::Validation(format!(
                "network_interface {}: 'ipv6_netmask' is required when 'ipv6_address' is specified",
                n
            ))),
            (None, Some(_)) => errs.push(VsforgeError::Validation(format!(
                "network_interface {}: 'ipv6_address' is required when 'ipv6_netmask' is specified",
                n
            ))),
            (None, None) => {}
        }

        errs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nic(addr: &str, bits: u8) -> NetworkInterface {
        NetworkInterface {
            ipv4_address: Some(addr.to_string()),
            ipv4_netmask: Some(bits),
            ..Default::default()
        }
    }

    fn linux() -> LinuxOptions {
        LinuxOptions {
            host_name: "web-01".to_string(),
            domain: "example.com".to_string(),
            time_zone: None,
            hw_clock_utc: true,
        }
    }

    #[test]
    fn linux_with_one_nic_is_valid() {
        let cfg = CustomizeConfig {
            linux_options: Some(linux()),
            network_interface: vec![nic("10.0.0.5", 24)],
            ipv4_gateway: Some("10.0.0.1".to_string()),
            ..Default::default()
        };
        assert!(cfg.prepare().is_empty(), "got: {:?}", cfg.prepare());
        assert!(matches!(cfg.identity(), Some(IdentitySource::Linux(_))));
    }

    #[test]
    fn identity_none_and_multiple_have_distinct_errors() {
        let none = CustomizeConfig {
            network_interface: vec![NetworkInterface::default()],
            ..Default::default()
        };
        let many = CustomizeConfig {
            linux_options: Some(linux()),
            windows_sysprep_text: Some("<unattend/>".to_string()),
            network_interface: vec![NetworkInterface::default()],
            ..Default::default()
        };

        let none_msg = none.prepare()[0].to_string();
        let many_msg = many.prepare()[0].to_string();
        assert!(none_msg.contains("must be specified"), "got: {}", none_msg);
        assert!(many_msg.contains("only one of"), "got: {}", many_msg);
        assert!(none.identity().is_none());
        assert!(many.identity().is_none());
    }

    #[test]
    fn missing_network_interface_is_rejected() {
        let cfg = CustomizeConfig {
            linux_options: Some(linux()),
            ..Default::default()
        };
        let msgs: Vec<String> = cfg.prepare().iter().map(ToString::to_string).collect();
        assert_eq!(msgs, vec!["validation error: at least one 'network_interface' must be specified"]);
    }

    #[test]
    fn address_without_netmask_is_rejected() {
        let cfg = CustomizeConfig {
            linux_options: Some(linux()),
            network_interface: vec![NetworkInterface {
                ipv4_address: Some("10.0.0.5".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let msgs: Vec<String> = cfg.prepare().iter().map(ToString::to_string).collect();
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("network_interface 1: 'ipv4_netmask' is required"));
    }

    #[test]
    fn missing_sysprep_file_is_io_error() {
        let cfg = CustomizeConfig {
            windows_sysprep_file: Some(Utf8PathBuf::from("/nonexistent/unattend.xml")),
            network_interface: vec![NetworkInterface::default()],
            ..Default::default()
        };
        let errs = cfg.prepare();
        assert_eq!(errs.len(), 1);
        assert!(matches!(errs[0], VsforgeError::Io { .. }));
    }

    #[test]
    fn resolve_paths_joins_relative_sysprep_file() {
        let mut cfg = CustomizeConfig {
            windows_sysprep_file: Some(Utf8PathBuf::from("unattend.xml")),
            ..Default::default()
        };
        cfg.resolve_paths(Utf8Path::new("/builds/win"));
        assert_eq!(
            cfg.windows_sysprep_file.as_deref(),
            Some(Utf8Path::new("/builds/win/unattend.xml"))
        );
    }
}
