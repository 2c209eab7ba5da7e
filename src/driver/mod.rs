//! Hypervisor capability abstraction for vsforge.
//!
//! This module provides:
//! - [`Driver`]: Trait over the hypervisor management plane
//! - [`Communicator`]: Trait for running commands inside the guest
//! - [`Exporter`]: Trait for writing a VM out as OVF/OVA files
//! - [`DryRunDriver`]: In-process implementation that logs every call
//!
//! Steps depend only on these traits, never on a concrete transport.

mod dry_run;
pub mod types;

use std::net::IpAddr;

use anyhow::Result;
use camino::Utf8Path;
use tokio_util::sync::CancellationToken;

use crate::error::VsforgeError;
use crate::ui::Ui;

pub use dry_run::{DryRunCommunicator, DryRunDriver, DryRunExporter};
pub use types::*;

/// Trait over the hypervisor management plane.
///
/// Implementations must be `Send + Sync` so a single session can be shared
/// through `Arc<dyn Driver>` by every step of a build. Long-running calls
/// receive the build's [`CancellationToken`] and are expected to cancel the
/// matching remote task when it fires.
pub trait Driver: Send + Sync {
    /// Opens the management session.
    fn connect(&self, spec: &ConnectionSpec) -> Result<()>;

    /// Closes the management session.
    fn disconnect(&self) -> Result<()>;

    /// Looks up a VM or template by name or inventory path.
    fn find_vm(&self, name: &str) -> Result<Option<VmHandle>>;

    /// Clones `source` into a new VM.
    fn clone_vm(
        &self,
        source: &VmHandle,
        request: &CloneRequest,
        cancel: &CancellationToken,
    ) -> Result<VmHandle>;

    /// Deploys a new VM from a remote OVF/OVA package.
    ///
    /// Every sub-resource acquired along the way is recorded in `resources`
    /// and cleared again once released.
    fn deploy_remote_package(
        &self,
        request: &DeployRequest,
        ui: &dyn Ui,
        cancel: &CancellationToken,
        resources: &mut DeploymentResources,
    ) -> Result<VmHandle>;

    /// Lists the deployment options declared by a remote package.
    fn deployment_options(&self, query: &OptionsQuery) -> Result<Vec<OvfOption>>;

    /// Cancels a running remote task.
    fn cancel_task(&self, task: &TaskRef) -> Result<()>;

    /// Stops a progress monitor.
    fn stop_progress_monitor(&self, monitor: &MonitorRef) -> Result<()>;

    /// Aborts an NFC lease.
    fn abort_lease(&self, lease: &LeaseRef) -> Result<()>;

    /// Returns true if the VM is marked as a template.
    fn is_template(&self, vm: &VmHandle) -> Result<bool>;

    /// Converts a template back into a regular VM.
    fn mark_as_vm(&self, vm: &VmHandle, placement: &Placement) -> Result<()>;

    /// Returns true if the VM is powered on.
    fn is_powered_on(&self, vm: &VmHandle) -> Result<bool>;

    fn power_on(&self, vm: &VmHandle) -> Result<()>;

    fn power_off(&self, vm: &VmHandle) -> Result<()>;

    /// Deletes the VM and its disks.
    fn destroy_vm(&self, vm: &VmHandle) -> Result<()>;

    /// Applies hardware settings.
    fn configure_hardware(&self, vm: &VmHandle, spec: &HardwareSpec) -> Result<()>;

    /// Applies a guest customization specification.
    fn customize(&self, vm: &VmHandle, spec: &CustomizationSpec) -> Result<()>;

    /// Sets the firmware boot order (e.g., `["disk", "cdrom"]`).
    fn set_boot_order(&self, vm: &VmHandle, order: &[String]) -> Result<()>;

    /// Types a key sequence on the VM console.
    fn type_keys(&self, vm: &VmHandle, keys: &str) -> Result<()>;

    /// Adds a CD-ROM drive, optionally backed by a datastore ISO.
    fn add_cdrom(&self, vm: &VmHandle, controller: CdromController, iso: Option<&str>)
    -> Result<()>;

    /// Ejects media from every CD-ROM drive.
    fn eject_cdroms(&self, vm: &VmHandle) -> Result<()>;

    /// Removes every CD-ROM drive.
    fn remove_cdroms(&self, vm: &VmHandle) -> Result<()>;

    /// Uploads a local file to a datastore and returns its datastore path.
    fn upload_file(&self, local: &Utf8Path, datastore: Option<&str>, remote: &str)
    -> Result<String>;

    /// Deletes a file from a datastore.
    fn delete_datastore_file(&self, path: &str) -> Result<()>;

    /// Adds a floppy drive backed by a datastore image.
    fn add_floppy(&self, vm: &VmHandle, image: &str) -> Result<()>;

    /// Removes every floppy drive.
    fn remove_floppy(&self, vm: &VmHandle) -> Result<()>;

    /// Blocks until the guest reports an IP address.
    fn wait_for_ip(&self, vm: &VmHandle, wait: &IpWait, cancel: &CancellationToken)
    -> Result<IpAddr>;

    /// Asks the guest OS to shut down.
    fn shutdown_guest(&self, vm: &VmHandle) -> Result<()>;

    /// Blocks until the VM is powered off.
    fn wait_for_power_off(
        &self,
        vm: &VmHandle,
        timeout: std::time::Duration,
        cancel: &CancellationToken,
    ) -> Result<()>;

    fn create_snapshot(&self, vm: &VmHandle, name: &str) -> Result<()>;

    fn convert_to_template(&self, vm: &VmHandle) -> Result<()>;

    /// Imports the VM into a content library and returns the item id.
    fn import_to_library(&self, vm: &VmHandle, request: &LibraryImport) -> Result<String>;

    /// Removes an existing VM at `path` ahead of a build.
    ///
    /// When nothing exists at `path` this is a no-op. When a VM exists and
    /// `force` is not set, fails with [`VsforgeError::AlreadyExists`].
    /// Otherwise the VM is powered off, converted back from a template if
    /// needed, and destroyed.
    fn pre_clean_vm(&self, ui: &dyn Ui, path: &str, force: bool, placement: &Placement)
    -> Result<()> {
        let Some(vm) = self.find_vm(path)? else {
            return Ok(());
        };
        if !force {
            return Err(VsforgeError::AlreadyExists {
                path: path.to_string(),
            }
            .into());
        }

        ui.say(&format!("the force option is set, deleting the existing VM {}...", path));
        if self.is_template(&vm)? {
            self.mark_as_vm(&vm, placement)?;
        } else if self.is_powered_on(&vm)? {
            self.power_off(&vm)?;
        }
        self.destroy_vm(&vm)
    }
}

/// Runs commands inside a reachable guest (SSH, WinRM, ...).
pub trait Communicator: Send + Sync {
    /// Returns the communicator type name (e.g., "ssh").
    fn name(&self) -> &'static str;

    /// Executes `command` on `host` and returns its exit code.
    fn execute(&self, host: &str, command: &str) -> Result<i32>;
}

/// Writes a VM out as OVF/OVA files.
pub trait Exporter: Send + Sync {
    fn export(
        &self,
        vm: &VmHandle,
        request: &ExportRequest,
        cancel: &CancellationToken,
    ) -> Result<ExportOutput>;
}
