use serde::Deserialize;
use strum::Display;

use crate::driver::HardwareSpec;
use crate::error::VsforgeError;

/// Firmware the VM boots with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Firmware {
    Bios,
    Efi,
    /// EFI with secure boot enabled.
    EfiSecure,
}

/// CPU, memory and firmware settings applied after the VM exists.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HardwareConfig {
    #[serde(default)]
    pub cpus: Option<u32>,
    #[serde(default)]
    pub cpu_cores: Option<u32>,
    /// CPU reservation in MHz.
    #[serde(default)]
    pub cpu_reservation: Option<u64>,
    /// CPU limit in MHz, `-1` for unlimited.
    #[serde(default)]
    pub cpu_limit: Option<i64>,
    #[serde(default)]
    pub cpu_hot_plug: bool,
    /// Memory size in MB.
    #[serde(default)]
    pub ram: Option<u64>,
    /// Memory reservation in MB.
    #[serde(default)]
    pub ram_reservation: Option<u64>,
    #[serde(default)]
    pub ram_reserve_all: bool,
    #[serde(default)]
    pub memory_hot_plug: bool,
    /// Expose hardware-assisted virtualization to the guest.
    #[serde(default)]
    pub nested_hv: bool,
    #[serde(default)]
    pub firmware: Option<Firmware>,
    /// Video memory in KB.
    #[serde(default)]
    pub video_ram: Option<u64>,
}

impl HardwareConfig {
    pub fn to_spec(&self) -> HardwareSpec {
        HardwareSpec {
            cpus: self.cpus,
            cores_per_socket: self.cpu_cores,
            cpu_reservation_mhz: self.cpu_reservation,
            cpu_limit_mhz: self.cpu_limit,
            cpu_hot_plug: self.cpu_hot_plug,
            memory_mb: self.ram,
            memory_reservation_mb: self.ram_reservation,
            reserve_all_memory: self.ram_reserve_all,
            memory_hot_plug: self.memory_hot_plug,
            nested_hv: self.nested_hv,
            firmware: self.firmware,
            video_ram_kb: self.video_ram,
        }
    }

    pub fn prepare(&self) -> Vec<VsforgeError> {
        let mut errs = Vec::new();

        if self.cpus == Some(0) {
            errs.push(VsforgeError::Validation("'cpus' must be greater than zero".to_string()));
        }
        if self.ram == Some(0) {
            errs.push(VsforgeError::Validation("'ram' must be greater than zero".to_string()));
        }
        if let (Some(cpus), Some(cores)) = (self.cpus, self.cpu_cores)
            && (cores == 0 || cores > cpus || cpus % cores != 0)
        {
            errs.push(VsforgeError::Validation(format!(
                "'cpu_cores' ({}) must evenly divide 'cpus' ({})",
                cores, cpus
            )));
        }
        if self.ram_reservation.is_some() && self.ram_reserve_all {
            errs.push(VsforgeError::Validation(
                "'ram_reservation' and 'ram_reserve_all' cannot be used together".to_string(),
            ));
        }
        if let Some(limit) = self.cpu_limit
            && limit < -1
        {
            errs.push(VsforgeError::Validation(format!(
                "'cpu_limit' must be -1 (unlimited) or a non-negative value, got {}",
                limit
            )));
        }

        errs
    }
}
