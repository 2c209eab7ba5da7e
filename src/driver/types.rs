//! Request and response types exchanged with a [`Driver`](super::Driver).

use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use strum::Display;

use crate::config::{Firmware, Secret};

/// Opaque reference to a remote virtual machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmHandle {
    /// Managed object identifier assigned by the hypervisor.
    pub id: String,
    /// Display name of the VM.
    pub name: String,
    /// Inventory path (e.g., `/dc1/vm/builds/web-01`).
    pub path: String,
    /// Datacenter containing the VM.
    pub datacenter: String,
}

impl fmt::Display for VmHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.id)
    }
}

/// Parameters for opening a driver session.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub server: String,
    pub username: String,
    pub password: Secret,
    pub insecure: bool,
    pub datacenter: Option<String>,
}

/// Where a new VM is placed in the inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub folder: Option<String>,
    pub cluster: Option<String>,
    pub host: Option<String>,
    pub resource_pool: Option<String>,
    pub datastore: Option<String>,
}

/// A single virtual disk to attach to a VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSpec {
    pub size_mb: u64,
    pub thin_provisioned: bool,
    pub eagerly_scrub: bool,
    pub controller_index: usize,
}

/// Request to clone an existing VM or template.
#[derive(Debug, Clone)]
pub struct CloneRequest {
    pub name: String,
    pub placement: Placement,
    pub linked_clone: bool,
    pub network: Option<String>,
    /// Always lower-cased.
    pub mac_address: Option<String>,
    pub annotation: Option<String>,
    pub vapp_properties: BTreeMap<String, String>,
    pub primary_disk_size_mb: Option<u64>,
    pub disk_controllers: Vec<String>,
    pub disks: Vec<DiskSpec>,
}

/// Credentials for a remote OVF/OVA source.
#[derive(Debug, Clone)]
pub struct RemoteAuth {
    pub username: String,
    pub password: Secret,
}

/// Request to deploy a VM from a remote OVF/OVA package.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub url: String,
    pub auth: Option<RemoteAuth>,
    pub skip_tls_verify: bool,
    pub vapp_properties: BTreeMap<String, String>,
    pub deployment_option: Option<String>,
    pub name: String,
    pub placement: Placement,
    pub network: Option<String>,
}

/// Query for the deployment options a remote package offers.
#[derive(Debug, Clone)]
pub struct OptionsQuery {
    pub url: String,
    pub auth: Option<RemoteAuth>,
    pub skip_tls_verify: bool,
    pub locale: String,
}

/// One deployment option declared by an OVF package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OvfOption {
    /// Option key, as referenced by `deployment_option`.
    pub option: String,
    pub description: String,
}

/// Reference to an in-flight remote task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef(pub String);

/// Reference to a progress monitor attached to a remote task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorRef(pub String);

/// Reference to an NFC lease held for a package upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRef(pub String);

/// Sub-resources acquired while a remote deployment runs.
///
/// The driver records each item as soon as it exists and clears it once the
/// item has been released, so whatever remains after a failed deployment is
/// exactly what still needs cleaning up.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeploymentResources {
    pub task: Option<TaskRef>,
    pub monitor: Option<MonitorRef>,
    pub lease: Option<LeaseRef>,
}

impl DeploymentResources {
    /// Returns true if no sub-resource is held.
    pub fn is_empty(&self) -> bool {
        self.task.is_none() && self.monitor.is_none() && self.lease.is_none()
    }
}

/// Hardware settings applied after the VM exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareSpec {
    pub cpus: Option<u32>,
    pub cores_per_socket: Option<u32>,
    pub cpu_reservation_mhz: Option<u64>,
    pub cpu_limit_mhz: Option<i64>,
    pub cpu_hot_plug: bool,
    pub memory_mb: Option<u64>,
    pub memory_reservation_mb: Option<u64>,
    pub reserve_all_memory: bool,
    pub memory_hot_plug: bool,
    pub nested_hv: bool,
    pub firmware: Option<Firmware>,
    pub video_ram_kb: Option<u64>,
}

impl HardwareSpec {
    /// Returns true if the spec would not change anything.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Controller a CD-ROM drive is attached to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CdromController {
    #[default]
    Ide,
    Sata,
}

/// Guest identity applied during customization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Linux(LinuxPrep),
    Windows(Sysprep),
    /// Raw sysprep XML, from a file or inline text.
    SysprepText(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxPrep {
    pub host_name: String,
    pub domain: String,
    pub time_zone: Option<String>,
    pub hw_clock_utc: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sysprep {
    pub computer_name: String,
    pub full_name: String,
    pub organization_name: String,
    pub admin_password: Option<Secret>,
    pub workgroup: Option<String>,
    pub join_domain: Option<String>,
    pub domain_admin: Option<String>,
    pub domain_admin_password: Option<Secret>,
    pub product_key: Option<String>,
    pub time_zone: Option<u32>,
    pub auto_logon: bool,
    pub auto_logon_count: u32,
    pub run_once_commands: Vec<String>,
}

/// IPv4 settings for one NIC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ipv4Setting {
    Dhcp,
    Static {
        address: Ipv4Addr,
        subnet_mask: Ipv4Addr,
        gateway: Option<Ipv4Addr>,
    },
}

/// Static IPv6 settings for one NIC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6Setting {
    pub address: Ipv6Addr,
    pub prefix_len: u8,
    pub gateway: Option<Ipv6Addr>,
}

/// Derived IP configuration for one NIC, in interface order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NicSettings {
    pub ipv4: Ipv4Setting,
    pub ipv6: Option<Ipv6Setting>,
    pub dns_servers: Vec<String>,
    pub dns_domain: Option<String>,
}

/// Settings shared by all NICs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalIpSettings {
    pub dns_servers: Vec<String>,
    pub dns_suffixes: Vec<String>,
}

/// Complete guest customization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomizationSpec {
    pub identity: Identity,
    pub nics: Vec<NicSettings>,
    pub global: GlobalIpSettings,
}

/// Options for the IP wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpWait {
    pub timeout: Duration,
    pub settle_timeout: Duration,
    /// Only accept an address inside this CIDR block (e.g., `10.0.0.0/8`).
    pub network: Option<String>,
}

/// Request to import a VM into a content library.
#[derive(Debug, Clone)]
pub struct LibraryImport {
    pub library: String,
    pub name: String,
    pub description: Option<String>,
    pub placement: Placement,
    pub ovf: bool,
}

/// Disk image format written by an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Ovf,
    Ova,
}

/// Checksum manifest written next to exported files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ManifestAlgorithm {
    None,
    Sha1,
    #[default]
    Sha256,
    Sha512,
}

/// Request to export a VM to local files.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub name: String,
    pub output_directory: camino::Utf8PathBuf,
    pub force: bool,
    pub format: ExportFormat,
    pub manifest: ManifestAlgorithm,
    pub image_files: bool,
}

/// Files produced by an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutput {
    pub directory: camino::Utf8PathBuf,
    pub files: Vec<camino::Utf8PathBuf>,
}
