//! VM creation: clone a template or deploy a remote OVF/OVA package.

use tracing::{debug, instrument};

use crate::config::{CloneConfig, LocationConfig, RemoteSourceConfig, StorageConfig, VmSource};
use crate::driver::{
    CloneRequest, DeployRequest, DeploymentResources, LeaseRef, MonitorRef, OptionsQuery, TaskRef,
    VmHandle,
};
use crate::error::VsforgeError;
use crate::phase::{Step, StepAction, cleanup_vm, halt, halt_config, halt_driver, report_cleanup_error};
use crate::state::{StateBag, keys};

/// Locale passed when listing a package's deployment options.
pub const DEFAULT_OVF_LOCALE: &str = "US";

/// Creates the VM from exactly one source and stores it under [`keys::VM`].
///
/// An existing VM at the target path is removed first when `force` is set.
/// Cleanup releases any deployment task, progress monitor or lease left
/// behind by a failed deployment, then tears the VM down if the build
/// failed.
#[derive(Debug)]
pub struct StepCreateVm {
    location: LocationConfig,
    source: CloneConfig,
    storage: StorageConfig,
    force: bool,
    locale: String,
}

impl StepCreateVm {
    pub fn new(
        location: LocationConfig,
        source: CloneConfig,
        storage: StorageConfig,
        force: bool,
    ) -> Self {
        Self {
            location,
            source,
            storage,
            force,
            locale: DEFAULT_OVF_LOCALE.to_string(),
        }
    }

    fn clone_request(&self) -> CloneRequest {
        CloneRequest {
            name: self.location.vm_name.clone(),
            placement: self.location.placement(),
            linked_clone: self.source.linked_clone,
            network: self.source.network.clone(),
            mac_address: self.source.mac_address.as_deref().map(str::to_lowercase),
            annotation: self.source.notes.clone(),
            vapp_properties: self.source.vapp.properties.clone(),
            primary_disk_size_mb: self.source.disk_size,
            disk_controllers: self.storage.controllers(),
            disks: self.storage.disk_specs(),
        }
    }

    fn deploy_request(&self, remote: &RemoteSourceConfig) -> DeployRequest {
        DeployRequest {
            url: remote.url.clone(),
            auth: remote.auth(),
            skip_tls_verify: remote.skip_tls_verify,
            vapp_properties: self.source.vapp.properties.clone(),
            deployment_option: self.source.vapp.deployment_option.clone(),
            name: self.location.vm_name.clone(),
            placement: self.location.placement(),
            network: self.source.network.clone(),
        }
    }

    #[instrument(skip(self, bag), fields(vm = %self.location.vm_name))]
    fn clone_from_template(
        &self,
        bag: &mut StateBag,
        template: &str,
    ) -> Result<VmHandle, VsforgeError> {
        let driver = bag.driver();
        let cancel = bag.cancel_token();

        let source = driver
            .find_vm(template)
            .map_err(|e| VsforgeError::driver("find template", e))?
            .ok_or_else(|| VsforgeError::NotFound(format!("template '{}'", template)))?;

        bag.ui()
            .say(&format!("cloning VM {} from {}...", self.location.vm_name, source.path));
        let request = self.clone_request();
        driver.clone_vm(&source, &request, &cancel).map_err(|e| {
            if cancel.is_cancelled() {
                VsforgeError::Cancelled(format!("clone of {} was cancelled", template))
            } else {
                VsforgeError::driver("clone", e)
            }
        })
    }

    #[instrument(skip_all, fields(vm = %self.location.vm_name))]
    fn deploy_from_remote(
        &self,
        bag: &mut StateBag,
        remote: &RemoteSourceConfig,
    ) -> Result<VmHandle, VsforgeError> {
        let driver = bag.driver();
        let ui = bag.ui();
        let cancel = bag.cancel_token();
        let url = remote.display_url();
        let secrets = remote.known_secrets();
        let secrets: Vec<&str> = secrets.iter().map(String::as_str).collect();

        if let Some(requested) = &self.source.vapp.deployment_option {
            let query = OptionsQuery {
                url: remote.url.clone(),
                auth: remote.auth(),
                skip_tls_verify: remote.skip_tls_verify,
                locale: self.locale.clone(),
            };
            let options = driver
                .deployment_options(&query)
                .map_err(|e| VsforgeError::deployment(url.clone(), e, &secrets))?;
            if !options.iter().any(|o| &o.option == requested) {
                return Err(VsforgeError::DeploymentOption {
                    requested: requested.clone(),
                    available: options.into_iter().map(|o| o.option).collect(),
                });
            }
        }

        ui.say(&format!("deploying VM {} from remote source {}...", self.location.vm_name, url));
        let request = self.deploy_request(remote);
        let mut resources = DeploymentResources::default();
        let result = driver.deploy_remote_package(&request, ui.as_ref(), &cancel, &mut resources);

        match result {
            Ok(vm) => {
                ui.say(&format!(
                    "successfully deployed VM {} from remote source",
                    self.location.vm_name
                ));
                stash_resources(bag, resources);
                Ok(vm)
            }
            Err(e) => {
                if cancel.is_cancelled() {
                    if let Some(task) = &resources.task {
                        match driver.cancel_task(task) {
                            Ok(()) => resources.task = None,
                            Err(cancel_err) => {
                                report_cleanup_error(bag, "cancelling deployment task", &cancel_err)
                            }
                        }
                    }
                    stash_resources(bag, resources);
                    return Err(VsforgeError::Cancelled(format!(
                        "deployment from {} was cancelled",
                        url
                    )));
                }
                stash_resources(bag, resources);
                Err(VsforgeError::deployment(url, e, &secrets))
            }
        }
    }
}

/// Moves whatever sub-resources the driver still holds into the bag.
fn stash_resources(bag: &mut StateBag, resources: DeploymentResources) {
    if let Some(task) = resources.task {
        bag.put(keys::DEPLOY_TASK, task);
    }
    if let Some(monitor) = resources.monitor {
        bag.put(keys::DEPLOY_MONITOR, monitor);
    }
    if let Some(lease) = resources.lease {
        bag.put(keys::NFC_LEASE, lease);
    }
}

impl Step for StepCreateVm {
    fn name(&self) -> &'static str {
        "create-vm"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let driver = bag.driver();
        let ui = bag.ui();

        let path = self.location.vm_path();
        if let Err(e) =
            driver.pre_clean_vm(ui.as_ref(), &path, self.force, &self.location.placement())
        {
            return halt_driver(bag, "pre-clean", e);
        }

        let result = match self.source.source() {
            Some(VmSource::Template(template)) => self.clone_from_template(bag, template),
            Some(VmSource::Remote(remote)) => self.deploy_from_remote(bag, remote),
            None => {
                return halt_config(bag, "exactly one of 'template' or 'remote_source' must be set");
            }
        };

        match result {
            Ok(vm) => {
                debug!("created VM {}", vm);
                bag.set_vm(vm);
                StepAction::Continue
            }
            Err(e) => halt(bag, e),
        }
    }

    fn cleanup(&mut self, bag: &mut StateBag) {
        let driver = bag.driver();
        let ui = bag.ui();

        if let Some(task) = bag.remove::<TaskRef>(keys::DEPLOY_TASK) {
            ui.say("cancelling in-flight deployment task...");
            if let Err(e) = driver.cancel_task(&task) {
                report_cleanup_error(bag, "cancelling deployment task", &e);
            }
        }
        if let Some(monitor) = bag.remove::<MonitorRef>(keys::DEPLOY_MONITOR) {
            ui.say("stopping deployment progress monitor...");
            if let Err(e) = driver.stop_progress_monitor(&monitor) {
                report_cleanup_error(bag, "stopping progress monitor", &e);
            }
        }
        if let Some(lease) = bag.remove::<LeaseRef>(keys::NFC_LEASE) {
            ui.say("aborting NFC lease...");
            if let Err(e) = driver.abort_lease(&lease) {
                report_cleanup_error(bag, "aborting NFC lease", &e);
            }
        }

        cleanup_vm(bag);
    }
}
