//! Guest reachability, provisioning and shutdown configuration.

use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;
use strum::Display;

use super::Secret;
use crate::driver::IpWait;
use crate::error::VsforgeError;

fn default_ip_wait_timeout() -> u64 {
    30 * 60
}

fn default_ip_settle_timeout() -> u64 {
    5
}

fn default_shutdown_timeout() -> u64 {
    5 * 60
}

fn default_exit_codes() -> Vec<i32> {
    vec![0]
}

/// How the build talks to the running guest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CommunicatorKind {
    /// No guest access; IP wait and provisioning are skipped.
    None,
    #[default]
    Ssh,
    Winrm,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CommunicatorConfig {
    #[serde(default, rename = "type")]
    pub kind: CommunicatorKind,
    /// Connect to this host instead of the address reported by the guest.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<Secret>,
}

impl CommunicatorConfig {
    pub fn enabled(&self) -> bool {
        self.kind != CommunicatorKind::None
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WaitIpConfig {
    /// Seconds to wait for an address.
    #[serde(default = "default_ip_wait_timeout")]
    pub timeout: u64,
    /// Seconds the address must stay unchanged before it is accepted.
    #[serde(default = "default_ip_settle_timeout")]
    pub settle_timeout: u64,
    /// Only accept an address inside this CIDR block.
    #[serde(default)]
    pub address: Option<String>,
}

impl Default for WaitIpConfig {
    fn default() -> Self {
        Self {
            timeout: default_ip_wait_timeout(),
            settle_timeout: default_ip_settle_timeout(),
            address: None,
        }
    }
}

impl WaitIpConfig {
    pub fn to_wait(&self) -> IpWait {
        IpWait {
            timeout: Duration::from_secs(self.timeout),
            settle_timeout: Duration::from_secs(self.settle_timeout),
            network: self.address.clone(),
        }
    }

    pub fn prepare(&self) -> Vec<VsforgeError> {
        let mut errs = Vec::new();
        if self.timeout == 0 {
            errs.push(VsforgeError::Validation(
                "'wait_ip.timeout' must be greater than zero".to_string(),
            ));
        }
        if let Some(cidr) = &self.address
            && !is_valid_cidr(cidr)
        {
            errs.push(VsforgeError::Validation(format!(
                "'wait_ip.address' must be a CIDR block (e.g., 10.0.0.0/8), got '{}'",
                cidr
            )));
        }
        errs
    }
}

fn is_valid_cidr(cidr: &str) -> bool {
    let Some((addr, bits)) = cidr.split_once('/') else {
        return false;
    };
    let Ok(bits) = bits.parse::<u8>() else {
        return false;
    };
    match addr.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => bits <= 32,
        Ok(IpAddr::V6(_)) => bits <= 128,
        Err(_) => false,
    }
}

/// Inline shell commands run through the communicator.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ShellProvisioner {
    pub inline: Vec<String>,
    /// Exit codes treated as success.
    #[serde(default = "default_exit_codes")]
    pub valid_exit_codes: Vec<i32>,
}

/// A provisioner run once the guest is reachable.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
#[non_exhaustive]
pub enum ProvisionerConfig {
    Shell(ShellProvisioner),
}

impl ProvisionerConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Shell(_) => "shell",
        }
    }

    pub fn prepare(&self, n: usize) -> Vec<VsforgeError> {
        let mut errs = Vec::new();
        match self {
            Self::Shell(shell) => {
                if shell.inline.iter().all(|c| c.trim().is_empty()) {
                    errs.push(VsforgeError::Validation(format!(
                        "provisioner {}: 'inline' must contain at least one command",
                        n
                    )));
                }
                if shell.valid_exit_codes.is_empty() {
                    errs.push(VsforgeError::Validation(format!(
                        "provisioner {}: 'valid_exit_codes' must not be empty",
                        n
                    )));
                }
            }
        }
        errs
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ShutdownConfig {
    /// Guest command that shuts the machine down. Without one, the driver
    /// asks the guest tools for a soft shutdown.
    #[serde(default)]
    pub command: Option<String>,
    /// Seconds to wait for the VM to power off.
    #[serde(default = "default_shutdown_timeout")]
    pub timeout: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout: default_shutdown_timeout(),
        }
    }
}
