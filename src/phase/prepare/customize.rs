//! Guest OS customization.
//!
//! Builds a [`CustomizationSpec`] from the configured identity source and
//! the per-NIC settings, then hands it to the driver.
//!
//! A configured gateway is attached to the first interface, in declaration
//! order, whose address and mask reach it (`address & mask == gateway & mask`).
//! Later interfaces on the same subnet get no gateway. IPv4 and IPv6 are
//! matched independently.

use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::config::{CustomizeConfig, IdentitySource, LinuxOptions, NetworkInterface, WindowsOptions};
use crate::driver::{
    CustomizationSpec, GlobalIpSettings, Identity, Ipv4Setting, Ipv6Setting, LinuxPrep,
    NicSettings, Sysprep,
};
use crate::error::VsforgeError;
use crate::phase::{Step, StepAction, halt, halt_config, halt_driver};
use crate::state::StateBag;

const DEFAULT_FULL_NAME: &str = "Administrator";
const DEFAULT_ORGANIZATION: &str = "Built by vsforge";

#[derive(Debug)]
pub struct StepCustomize {
    config: CustomizeConfig,
}

impl StepCustomize {
    pub fn new(config: CustomizeConfig) -> Self {
        Self { config }
    }
}

impl Step for StepCustomize {
    fn name(&self) -> &'static str {
        "customize"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let Some(vm) = bag.vm().cloned() else {
            return halt_config(bag, "no VM to customize");
        };

        let spec = match build_customization_spec(&self.config) {
            Ok(spec) => spec,
            Err(e) => return halt(bag, e),
        };

        bag.ui().say("customizing VM...");
        if let Err(e) = bag.driver().customize(&vm, &spec) {
            return halt_driver(bag, "customize", e);
        }
        StepAction::Continue
    }
}

/// Composes the full customization request.
///
/// A sysprep file is read here rather than during validation so the
/// current content is used.
pub fn build_customization_spec(config: &CustomizeConfig) -> Result<CustomizationSpec, VsforgeError> {
    let identity = match config.identity() {
        Some(IdentitySource::Linux(linux)) => Identity::Linux(linux_prep(linux)),
        Some(IdentitySource::Windows(windows)) => Identity::Windows(sysprep(windows)),
        Some(IdentitySource::SysprepFile(path)) => {
            let text = fs::read_to_string(path)
                .map_err(|e| VsforgeError::io(format!("failed to read sysprep file: {}", path), e))?;
            Identity::SysprepText(text)
        }
        Some(IdentitySource::SysprepText(text)) => Identity::SysprepText(text.to_string()),
        None => {
            return Err(VsforgeError::Config(
                "exactly one customization identity must be set".to_string(),
            ));
        }
    };

    Ok(CustomizationSpec {
        identity,
        nics: derive_nic_settings(config)?,
        global: GlobalIpSettings {
            dns_servers: config.dns_server_list.clone(),
            dns_suffixes: config.dns_suffix_list.clone(),
        },
    })
}

fn linux_prep(linux: &LinuxOptions) -> LinuxPrep {
    LinuxPrep {
        host_name: linux.host_name.clone(),
        domain: linux.domain.clone(),
        time_zone: linux.time_zone.clone(),
        hw_clock_utc: linux.hw_clock_utc,
    }
}

fn sysprep(windows: &WindowsOptions) -> Sysprep {
    Sysprep {
        computer_name: windows.computer_name.clone(),
        full_name: windows
            .full_name
            .clone()
            .unwrap_or_else(|| DEFAULT_FULL_NAME.to_string()),
        organization_name: windows
            .organization_name
            .clone()
            .unwrap_or_else(|| DEFAULT_ORGANIZATION.to_string()),
        admin_password: windows.admin_password.clone(),
        workgroup: windows.workgroup.clone(),
        join_domain: windows.join_domain.clone(),
        domain_admin: windows.domain_admin.clone(),
        domain_admin_password: windows.domain_admin_password.clone(),
        product_key: windows.product_key.clone(),
        time_zone: windows.time_zone,
        auto_logon: windows.auto_logon,
        auto_logon_count: windows.auto_logon_count.unwrap_or(1),
        run_once_commands: windows.run_once_commands.clone(),
    }
}

/// Derives per-NIC IP settings in interface order.
///
/// Interfaces without a static address use DHCP.
pub fn derive_nic_settings(config: &CustomizeConfig) -> Result<Vec<NicSettings>, VsforgeError> {
    let gateway4 = config
        .ipv4_gateway
        .as_deref()
        .map(|gw| parse_addr::<Ipv4Addr>(gw, "ipv4_gateway"))
        .transpose()?;
    let gateway6 = config
        .ipv6_gateway
        .as_deref()
        .map(|gw| parse_addr::<Ipv6Addr>(gw, "ipv6_gateway"))
        .transpose()?;

    let mut pending4 = gateway4;
    let mut pending6 = gateway6;
    let mut nics = Vec::with_capacity(config.network_interface.len());

    for (index, nic) in config.network_interface.iter().enumerate() {
        let n = index + 1;
        nics.push(NicSettings {
            ipv4: ipv4_setting(nic, n, &mut pending4)?,
            ipv6: ipv6_setting(nic, n, &mut pending6)?,
            dns_servers: nic.dns_server_list.clone(),
            dns_domain: nic.dns_domain.clone(),
        });
    }
    Ok(nics)
}

/// `pending` holds the gateway until an interface claims it.
fn ipv4_setting(
    nic: &NetworkInterface,
    n: usize,
    pending: &mut Option<Ipv4Addr>,
) -> Result<Ipv4Setting, VsforgeError> {
    let (address, bits) = match (&nic.ipv4_address, nic.ipv4_netmask) {
        (None, _) => return Ok(Ipv4Setting::Dhcp),
        (Some(addr), Some(bits)) => (parse_addr::<Ipv4Addr>(addr, "ipv4_address")?, bits),
        (Some(_), None) => {
            return Err(VsforgeError::Config(format!(
                "network_interface {}: 'ipv4_netmask' is required when 'ipv4_address' is specified",
                n
            )));
        }
    };
    let mask = ipv4_mask(bits).ok_or_else(|| {
        VsforgeError::Config(format!("network_interface {}: invalid 'ipv4_netmask' {}", n, bits))
    })?;

    let gateway = pending.take_if(|gw| u32::from(*gw) & mask == u32::from(address) & mask);
    Ok(Ipv4Setting::Static {
        address,
        subnet_mask: Ipv4Addr::from(mask),
        gateway,
    })
}

fn ipv6_setting(
    nic: &NetworkInterface,
    n: usize,
    pending: &mut Option<Ipv6Addr>,
) -> Result<Option<Ipv6Setting>, VsforgeError> {
    let (address, bits) = match (&nic.ipv6_address, nic.ipv6_netmask) {
        (None, _) => return Ok(None),
        (Some(addr), Some(bits)) => (parse_addr::<Ipv6Addr>(addr, "ipv6_address")?, bits),
        (Some(_), None) => {
            return Err(VsforgeError::Config(format!(
                "network_interface {}: 'ipv6_netmask' is required when 'ipv6_address' is specified",
                n
            )));
        }
    };
    let mask = ipv6_mask(bits).ok_or_else(|| {
        VsforgeError::Config(format!("network_interface {}: invalid 'ipv6_netmask' {}", n, bits))
    })?;

    let gateway = pending.take_if(|gw| u128::from(*gw) & mask == u128::from(address) & mask);
    Ok(Some(Ipv6Setting {
        address,
        prefix_len: bits,
        gateway,
    }))
}

/// Converts a prefix length to a mask, `None` if longer than 32 bits.
pub fn ipv4_mask(bits: u8) -> Option<u32> {
    match bits {
        0 => Some(0),
        1..=32 => Some(u32::MAX << (32 - u32::from(bits))),
        _ => None,
    }
}

fn ipv6_mask(bits: u8) -> Option<u128> {
    match bits {
        0 => Some(0),
        1..=128 => Some(u128::MAX << (128 - u32::from(bits))),
        _ => None,
    }
}

fn parse_addr<T: std::str::FromStr>(value: &str, field: &str) -> Result<T, VsforgeError> {
    value
        .parse::<T>()
        .map_err(|_| VsforgeError::Config(format!("invalid '{}': '{}'", field, value)))
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

    #[test]
    fn masks_from_prefix_length() {
        assert_eq!(ipv4_mask(0), Some(0));
        assert_eq!(ipv4_mask(24).map(Ipv4Addr::from), Some(Ipv4Addr::new(255, 255, 255, 0)));
        assert_eq!(ipv4_mask(32).map(Ipv4Addr::from), Some(Ipv4Addr::new(255, 255, 255, 255)));
        assert_eq!(ipv4_mask(33), None);
        assert_eq!(ipv6_mask(64), Some(u128::MAX << 64));
        assert_eq!(ipv6_mask(129), None);
    }

    #[test]
    fn unreachable_gateway_is_not_attached() {
        let cfg = CustomizeConfig {
            network_interface: vec![nic("10.0.0.5", 24)],
            ipv4_gateway: Some("192.168.1.1".to_string()),
            ..Default::default()
        };
        let nics = derive_nic_settings(&cfg).unwrap();
        assert_eq!(
            nics[0].ipv4,
            Ipv4Setting::Static {
                address: Ipv4Addr::new(10, 0, 0, 5),
                subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
                gateway: None,
            }
        );
    }

    #[test]
    fn interface_without_address_uses_dhcp() {
        let cfg = CustomizeConfig {
            network_interface: vec![NetworkInterface::default()],
            ..Default::default()
        };
        let nics = derive_nic_settings(&cfg).unwrap();
        assert_eq!(nics[0].ipv4, Ipv4Setting::Dhcp);
        assert_eq!(nics[0].ipv6, None);
    }

    #[test]
    fn ipv6_gateway_is_matched_independently() {
        let cfg = CustomizeConfig {
            network_interface: vec![
                nic("10.0.0.5", 24),
                NetworkInterface {
                    ipv6_address: Some("fd00::10".to_string()),
                    ipv6_netmask: Some(64),
                    ..Default::default()
                },
            ],
            ipv4_gateway: Some("10.0.0.1".to_string()),
            ipv6_gateway: Some("fd00::1".to_string()),
            ..Default::default()
        };
        let nics = derive_nic_settings(&cfg).unwrap();
        assert!(matches!(
            nics[0].ipv4,
            Ipv4Setting::Static { gateway: Some(_), .. }
        ));
        assert_eq!(nics[0].ipv6, None);
        assert_eq!(nics[1].ipv4, Ipv4Setting::Dhcp);
        assert_eq!(
            nics[1].ipv6.as_ref().and_then(|s| s.gateway),
            Some("fd00::1".parse::<Ipv6Addr>().unwrap())
        );
    }

    #[test]
    fn sysprep_defaults_are_filled() {
        let prep = sysprep(&WindowsOptions {
            computer_name: "win-01".to_string(),
            ..Default::default()
        });
        assert_eq!(prep.full_name, DEFAULT_FULL_NAME);
        assert_eq!(prep.organization_name, DEFAULT_ORGANIZATION);
        assert_eq!(prep.auto_logon_count, 1);
    }
}
