//! Build file configuration.
//!
//! A build file is a YAML document deserialized into [`Config`]. Loading
//! resolves relative paths against the build file's directory; validation
//! ([`Config::validate`]) runs every block's `prepare` and reports all
//! violations at once.

mod customize;
mod guest;
mod hardware;
mod media;
mod output;
mod source;
mod storage;

use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;

use camino::Utf8Path;
use serde::Deserialize;

pub use customize::{CustomizeConfig, IdentitySource, LinuxOptions, NetworkInterface, WindowsOptions};
pub use guest::{
    CommunicatorConfig, CommunicatorKind, ProvisionerConfig, ShellProvisioner, ShutdownConfig,
    WaitIpConfig,
};
pub use hardware::{Firmware, HardwareConfig};
pub use media::{BootConfig, CdromConfig, FloppyConfig};
pub use output::{ContentLibraryConfig, DEFAULT_SNAPSHOT_NAME, ExportConfig, SnapshotConfig};
pub use source::{CloneConfig, RemoteSourceConfig, VAppConfig, VmSource};
pub use storage::{DEFAULT_DISK_CONTROLLER, DiskConfig, StorageConfig};

use crate::driver::{ConnectionSpec, Placement};
use crate::error::VsforgeError;

/// A credential that never shows up in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the plain-text value. Only transports should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// Management plane connection settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConnectConfig {
    pub vcenter_server: String,
    pub username: String,
    pub password: Secret,
    #[serde(default)]
    pub insecure_connection: bool,
    #[serde(default)]
    pub datacenter: Option<String>,
}

impl ConnectConfig {
    pub fn to_spec(&self) -> ConnectionSpec {
        ConnectionSpec {
            server: self.vcenter_server.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            insecure: self.insecure_connection,
            datacenter: self.datacenter.clone(),
        }
    }

    pub fn prepare(&self) -> Vec<VsforgeError> {
        let mut errs = Vec::new();
        if self.vcenter_server.trim().is_empty() {
            errs.push(VsforgeError::Validation("'vcenter_server' is required".to_string()));
        }
        if self.username.trim().is_empty() {
            errs.push(VsforgeError::Validation("'username' is required".to_string()));
        }
        if self.password.is_empty() {
            errs.push(VsforgeError::Validation("'password' is required".to_string()));
        }
        errs
    }
}

/// Name and inventory placement of the VM being built.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LocationConfig {
    pub vm_name: String,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub resource_pool: Option<String>,
    #[serde(default)]
    pub datastore: Option<String>,
}

impl LocationConfig {
    pub fn placement(&self) -> Placement {
        Placement {
            folder: self.folder.clone(),
            cluster: self.cluster.clone(),
            host: self.host.clone(),
            resource_pool: self.resource_pool.clone(),
            datastore: self.datastore.clone(),
        }
    }

    /// Inventory path of the VM relative to the datacenter's VM folder.
    pub fn vm_path(&self) -> String {
        match self.folder.as_deref().map(|f| f.trim_matches('/')) {
            Some(folder) if !folder.is_empty() => format!("{}/{}", folder, self.vm_name),
            _ => self.vm_name.clone(),
        }
    }

    pub fn prepare(&self) -> Vec<VsforgeError> {
        let mut errs = Vec::new();
        if self.vm_name.trim().is_empty() {
            errs.push(VsforgeError::Validation("'vm_name' is required".to_string()));
        }
        if self.host.is_none() && self.cluster.is_none() {
            errs.push(VsforgeError::Validation("'host' or 'cluster' is required".to_string()));
        }
        errs
    }
}

/// Top-level build file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub connection: ConnectConfig,
    pub location: LocationConfig,
    pub source: CloneConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cdrom: CdromConfig,
    #[serde(default)]
    pub floppy: FloppyConfig,
    #[serde(default)]
    pub boot: BootConfig,
    #[serde(default)]
    pub wait_ip: WaitIpConfig,
    #[serde(default)]
    pub communicator: CommunicatorConfig,
    #[serde(default)]
    pub provisioners: Vec<ProvisionerConfig>,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub customize: Option<CustomizeConfig>,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub convert_to_template: bool,
    #[serde(default)]
    pub export: Option<ExportConfig>,
    #[serde(default)]
    pub content_library: Option<ContentLibraryConfig>,
    /// Destroy an existing VM with the same name before building.
    #[serde(default)]
    pub force: bool,
    /// Destroy the VM once every output has been produced.
    #[serde(default)]
    pub destroy: bool,
}

impl Config {
    /// Resolves relative file paths against `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: &Utf8Path) {
        self.floppy.resolve_paths(base_dir);
        if let Some(customize) = &mut self.customize {
            customize.resolve_paths(base_dir);
        }
        if let Some(export) = &mut self.export {
            export.resolve_paths(base_dir);
        }
    }

    /// Returns every violation found across all blocks.
    pub fn violations(&self) -> Vec<VsforgeError> {
        let mut errs = Vec::new();
        errs.extend(self.connection.prepare());
        errs.extend(self.location.prepare());
        errs.extend(self.source.prepare());
        errs.extend(self.hardware.prepare());
        errs.extend(self.storage.prepare());
        errs.extend(self.floppy.prepare());
        errs.extend(self.boot.prepare());
        if self.communicator.enabled() {
            errs.extend(self.wait_ip.prepare());
        }
        for (index, provisioner) in self.provisioners.iter().enumerate() {
            errs.extend(provisioner.prepare(index + 1));
        }
        if !self.provisioners.is_empty() && !self.communicator.enabled() {
            errs.push(VsforgeError::Validation(
                "provisioners require a communicator, but 'communicator.type' is 'none'"
                    .to_string(),
            ));
        }
        if self.shutdown.command.is_some() && !self.communicator.enabled() {
            errs.push(VsforgeError::Validation(
                "'shutdown.command' requires a communicator, but 'communicator.type' is 'none'"
                    .to_string(),
            ));
        }
        if let Some(customize) = &self.customize {
            errs.extend(customize.prepare());
        }
        if let Some(export) = &self.export {
            errs.extend(export.prepare());
        }
        if let Some(library) = &self.content_library {
            errs.extend(library.prepare(self.convert_to_template));
            if library.destroy && self.destroy {
                errs.push(VsforgeError::Validation(
                    "'content_library.destroy' and 'destroy' cannot both be set".to_string(),
                ));
            }
        }
        errs
    }

    /// Validates the whole build file.
    ///
    /// A single violation is returned as-is; several are folded into one
    /// `Validation` error listing each on its own line.
    pub fn validate(&self) -> Result<(), VsforgeError> {
        let mut errs = self.violations();
        match errs.len() {
            0 => Ok(()),
            1 => Err(errs.remove(0)),
            n => {
                let lines: Vec<String> = errs
                    .iter()
                    .map(|e| match e {
                        VsforgeError::Validation(msg) => format!("  - {}", msg),
                        other => format!("  - {}", other),
                    })
                    .collect();
                Err(VsforgeError::Validation(format!(
                    "{} problems found:\n{}",
                    n,
                    lines.join("\n")
                )))
            }
        }
    }
}

/// Loads a build file and resolves its relative paths.
pub fn load_config(path: &Utf8Path) -> Result<Config, VsforgeError> {
    let file = File::open(path).map_err(|e| VsforgeError::io(path.to_string(), e))?;
    let reader = BufReader::new(file);
    let mut config: Config = serde_yaml::from_reader(reader)
        .map_err(|e| VsforgeError::Config(format!("YAML parse error in {}: {}", path, e)))?;

    let base_dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    config.resolve_paths(base_dir);
    Ok(config)
}

/// Validates that a host-side file exists and is a regular file (not a symlink).
pub(crate) fn validate_host_file_exists(path: &Utf8Path, label: &str) -> Result<(), VsforgeError> {
    let metadata = fs::symlink_metadata(path)
        .map_err(|e| VsforgeError::io(format!("failed to read {} metadata: {}", label, path), e))?;
    if metadata.is_symlink() {
        return Err(VsforgeError::Validation(format!(
            "{} path '{}' is a symlink, which is not allowed",
            label, path
        )));
    }
    if !metadata.is_file() {
        return Err(VsforgeError::Validation(format!("{} is not a file: {}", label, path)));
    }
    Ok(())
}
