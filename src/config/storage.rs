use serde::Deserialize;

use crate::driver::DiskSpec;
use crate::error::VsforgeError;

/// Controller type used when none is configured.
pub const DEFAULT_DISK_CONTROLLER: &str = "lsilogic";

const SUPPORTED_CONTROLLERS: &[&str] =
    &["lsilogic", "lsilogic-sas", "pvscsi", "buslogic", "scsi", "sata", "nvme"];

/// An additional virtual disk.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DiskConfig {
    /// Size in MB.
    pub size: u64,
    #[serde(default)]
    pub thin_provisioned: bool,
    #[serde(default)]
    pub eagerly_scrub: bool,
    /// Index into `disk_controller_type`.
    #[serde(default)]
    pub controller_index: usize,
}

/// Disk controllers and additional disks.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub disk_controller_type: Vec<String>,
    #[serde(default)]
    pub disks: Vec<DiskConfig>,
}

impl StorageConfig {
    /// Returns the controller list, defaulting to a single [`DEFAULT_DISK_CONTROLLER`].
    pub fn controllers(&self) -> Vec<String> {
        if self.disk_controller_type.is_empty() {
            vec![DEFAULT_DISK_CONTROLLER.to_string()]
        } else {
            self.disk_controller_type.clone()
        }
    }

    pub fn disk_specs(&self) -> Vec<DiskSpec> {
        self.disks
            .iter()
            .map(|d| DiskSpec {
                size_mb: d.size,
                thin_provisioned: d.thin_provisioned,
                eagerly_scrub: d.eagerly_scrub,
                controller_index: d.controller_index,
            })
            .collect()
    }

    pub fn prepare(&self) -> Vec<VsforgeError> {
        let mut errs = Vec::new();
        let controllers = self.controllers();

        for kind in &controllers {
            if !SUPPORTED_CONTROLLERS.contains(&kind.as_str()) {
                errs.push(VsforgeError::Validation(format!(
                    "unsupported disk controller type '{}' (expected one of: {})",
                    kind,
                    SUPPORTED_CONTROLLERS.join(", ")
                )));
            }
        }

        for (index, disk) in self.disks.iter().enumerate() {
            let n = index + 1;
            if disk.size == 0 {
                errs.push(VsforgeError::Validation(format!(
                    "disk {}: 'size' must be greater than zero",
                    n
                )));
            }
            if disk.thin_provisioned && disk.eagerly_scrub {
                errs.push(VsforgeError::Validation(format!(
                    "disk {}: 'thin_provisioned' and 'eagerly_scrub' cannot both be true",
                    n
                )));
            }
            if disk.controller_index >= controllers.len() {
                errs.push(VsforgeError::Validation(format!(
                    "disk {}: 'controller_index' {} is out of range ({} controller(s) defined)",
                    n,
                    disk.controller_index,
                    controllers.len()
                )));
            }
        }

        errs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(size: u64, controller_index: usize) -> DiskConfig {
        DiskConfig {
            size,
            thin_provisioned: true,
            eagerly_scrub: false,
            controller_index,
        }
    }

    #[test]
    fn controllers_default_to_lsilogic() {
        assert_eq!(StorageConfig::default().controllers(), vec!["lsilogic"]);
    }

    #[test]
    fn valid_disks_pass() {
        let cfg = StorageConfig {
            disk_controller_type: vec!["pvscsi".to_string(), "nvme".to_string()],
            disks: vec![disk(20480, 0), disk(1024, 1)],
        };
        assert!(cfg.prepare().is_empty());
        assert_eq!(cfg.disk_specs()[1].controller_index, 1);
    }

    #[test]
    fn zero_size_and_bad_index_are_reported() {
        let cfg = StorageConfig {
            disk_controller_type: vec![],
            disks: vec![disk(0, 0), disk(1024, 1)],
        };
        let msgs: Vec<String> = cfg.prepare().iter().map(ToString::to_string).collect();
        assert_eq!(msgs.len(), 2, "got: {:?}", msgs);
        assert!(msgs[0].contains("disk 1: 'size' must be greater than zero"));
        assert!(msgs[1].contains("disk 2: 'controller_index' 1 is out of range"));
    }

    #[test]
    fn unknown_controller_is_rejected() {
        let cfg = StorageConfig {
            disk_controller_type: vec!["floppy".to_string()],
            disks: vec![],
        };
        assert_eq!(cfg.prepare().len(), 1);
    }
}
