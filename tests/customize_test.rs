//! Tests for guest customization spec derivation.

mod helpers;

use std::net::Ipv4Addr;
use std::sync::Arc;

use helpers::{MockDriver, bag_with, vm};
use vsforge::config::{CustomizeConfig, LinuxOptions, NetworkInterface};
use vsforge::driver::{Identity, Ipv4Setting};
use vsforge::phase::prepare::{StepCustomize, build_customization_spec, derive_nic_settings};
use vsforge::phase::{Step, StepAction};

fn static_nic(address: &str, netmask: u8) -> NetworkInterface {
    NetworkInterface {
        ipv4_address: Some(address.to_string()),
        ipv4_netmask: Some(netmask),
        ..Default::default()
    }
}

fn linux() -> LinuxOptions {
    LinuxOptions {
        host_name: "web-01".to_string(),
        domain: "example.com".to_string(),
        ..Default::default()
    }
}

fn gateway_of(setting: &Ipv4Setting) -> Option<Ipv4Addr> {
    match setting {
        Ipv4Setting::Static { gateway, .. } => *gateway,
        Ipv4Setting::Dhcp => None,
    }
}

#[test]
fn test_gateway_goes_to_first_matching_interface_only() {
    let cfg = CustomizeConfig {
        linux_options: Some(linux()),
        network_interface: vec![
            static_nic("192.168.1.10", 24),
            static_nic("10.0.0.10", 24),
            static_nic("10.0.0.11", 24),
        ],
        ipv4_gateway: Some("10.0.0.1".to_string()),
        ..Default::default()
    };

    let nics = derive_nic_settings(&cfg).unwrap();

    assert_eq!(nics.len(), 3);
    assert_eq!(gateway_of(&nics[0].ipv4), None);
    assert_eq!(gateway_of(&nics[1].ipv4), Some(Ipv4Addr::new(10, 0, 0, 1)));
    assert_eq!(gateway_of(&nics[2].ipv4), None);
}

#[test]
fn test_mask_is_derived_from_prefix_length() {
    let cfg = CustomizeConfig {
        linux_options: Some(linux()),
        network_interface: vec![static_nic("172.16.5.9", 20)],
        ipv4_gateway: Some("172.16.0.1".to_string()),
        ..Default::default()
    };

    let nics = derive_nic_settings(&cfg).unwrap();

    assert_eq!(
        nics[0].ipv4,
        Ipv4Setting::Static {
            address: Ipv4Addr::new(172, 16, 5, 9),
            subnet_mask: Ipv4Addr::new(255, 255, 240, 0),
            gateway: Some(Ipv4Addr::new(172, 16, 0, 1)),
        }
    );
}

#[test]
fn test_invalid_address_is_rejected() {
    let cfg = CustomizeConfig {
        linux_options: Some(linux()),
        network_interface: vec![static_nic("10.0.0.300", 24)],
        ..Default::default()
    };

    let err = derive_nic_settings(&cfg).unwrap_err();
    assert_eq!(err.to_string(), "configuration error: invalid 'ipv4_address': '10.0.0.300'");
}

#[test]
fn test_sysprep_file_is_read_at_build_time() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unattend.xml");
    std::fs::write(&path, "<unattend/>").unwrap();

    let cfg = CustomizeConfig {
        windows_sysprep_file: Some(camino::Utf8PathBuf::from_path_buf(path).unwrap()),
        network_interface: vec![NetworkInterface::default()],
        ..Default::default()
    };

    let spec = build_customization_spec(&cfg).unwrap();
    assert_eq!(spec.identity, Identity::SysprepText("<unattend/>".to_string()));
}

#[test]
fn test_step_hands_spec_to_driver() {
    let driver = Arc::new(MockDriver::new());
    let (mut bag, _ui) = bag_with(driver.clone());
    bag.set_vm(vm("web-01"));

    let mut step = StepCustomize::new(CustomizeConfig {
        linux_options: Some(linux()),
        network_interface: vec![NetworkInterface::default()],
        dns_server_list: vec!["10.0.0.53".to_string()],
        ..Default::default()
    });

    assert_eq!(step.run(&mut bag), StepAction::Continue);
    assert!(driver.called("customize:web-01"));
}
