//! Boot media and boot sequence configuration.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use super::validate_host_file_exists;
use crate::driver::CdromController;
use crate::error::VsforgeError;

const BOOT_DEVICES: &[&str] = &["disk", "cdrom", "floppy", "ethernet"];

fn default_boot_wait_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CdromConfig {
    #[serde(default, rename = "type")]
    pub controller: CdromController,
    /// Datastore ISO paths (e.g., `[datastore1] iso/ubuntu.iso`), one drive each.
    #[serde(default)]
    pub iso_paths: Vec<String>,
    /// Eject media from every drive once provisioning is done.
    #[serde(default)]
    pub eject_cdrom: bool,
    /// Remove every drive once provisioning is done.
    #[serde(default)]
    pub remove_cdrom: bool,
}

/// Floppy image attached during the build.
///
/// `local_image` is uploaded to the VM's datastore first; `datastore_image`
/// is attached in place.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FloppyConfig {
    #[serde(default)]
    pub local_image: Option<Utf8PathBuf>,
    #[serde(default)]
    pub datastore_image: Option<String>,
}

impl FloppyConfig {
    pub fn is_empty(&self) -> bool {
        self.local_image.is_none() && self.datastore_image.is_none()
    }

    pub fn resolve_paths(&mut self, base_dir: &Utf8Path) {
        if let Some(path) = &mut self.local_image
            && path.is_relative()
        {
            *path = base_dir.join(&*path);
        }
    }

    pub fn prepare(&self) -> Vec<VsforgeError> {
        match (&self.local_image, &self.datastore_image) {
            (Some(_), Some(_)) => vec![VsforgeError::Validation(
                "'local_image' and 'datastore_image' are mutually exclusive".to_string(),
            )],
            (Some(path), None) => validate_host_file_exists(path, "floppy image")
                .err()
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BootConfig {
    /// Firmware boot order, e.g. `[disk, cdrom]`.
    #[serde(default)]
    pub order: Vec<String>,
    /// Seconds to wait after power-on before typing `command`.
    #[serde(default = "default_boot_wait_secs")]
    pub wait: u64,
    /// Key sequence typed on the console, joined in order.
    #[serde(default)]
    pub command: Vec<String>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            wait: default_boot_wait_secs(),
            command: Vec::new(),
        }
    }
}

impl BootConfig {
    pub fn prepare(&self) -> Vec<VsforgeError> {
        self.order
            .iter()
            .filter(|device| !BOOT_DEVICES.contains(&device.as_str()))
            .map(|device| {
                VsforgeError::Validation(format!(
                    "unsupported boot device '{}' (expected one of: {})",
                    device,
                    BOOT_DEVICES.join(", ")
                ))
            })
            .collect()
    }
}
