use std::net::{IpAddr, Ipv4Addr};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use camino::Utf8Path;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use super::{Communicator, Driver, Exporter, types::*};
use crate::sanitize::sanitize_url;
use crate::ui::Ui;

/// Driver that performs no remote calls.
///
/// Every operation is logged and succeeds. Lookups always find a VM, and
/// VMs "created" during the run are remembered so power state and template
/// flags behave consistently within one build.
#[derive(Debug, Default)]
pub struct DryRunDriver {
    datacenter: Mutex<String>,
    vms: Mutex<Vec<DryRunVm>>,
}

#[derive(Debug, Clone)]
struct DryRunVm {
    handle: VmHandle,
    powered_on: bool,
    template: bool,
}

impl DryRunDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn synthesize(&self, name: &str) -> VmHandle {
        let datacenter = self
            .datacenter
            .lock()
            .map(|dc| dc.clone())
            .unwrap_or_default();
        VmHandle {
            id: format!("vm-{}", Uuid::new_v4().simple()),
            name: name.rsplit('/').next().unwrap_or(name).to_string(),
            path: name.to_string(),
            datacenter,
        }
    }

    fn remember(&self, handle: &VmHandle) {
        if let Ok(mut vms) = self.vms.lock() {
            vms.push(DryRunVm {
                handle: handle.clone(),
                powered_on: false,
                template: false,
            });
        }
    }

    fn update(&self, vm: &VmHandle, f: impl FnOnce(&mut DryRunVm)) {
        if let Ok(mut vms) = self.vms.lock()
            && let Some(entry) = vms.iter_mut().find(|e| e.handle.id == vm.id)
        {
            f(entry);
        }
    }

    fn state(&self, vm: &VmHandle) -> Option<DryRunVm> {
        self.vms
            .lock()
            .ok()
            .and_then(|vms| vms.iter().find(|e| e.handle.id == vm.id).cloned())
    }
}

impl Driver for DryRunDriver {
    fn connect(&self, spec: &ConnectionSpec) -> Result<()> {
        info!("dry run: connect to {} as {}", spec.server, spec.username);
        if let Ok(mut dc) = self.datacenter.lock() {
            *dc = spec.datacenter.clone().unwrap_or_else(|| "datacenter".to_string());
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        info!("dry run: disconnect");
        Ok(())
    }

    fn find_vm(&self, name: &str) -> Result<Option<VmHandle>> {
        info!("dry run: find vm {}", name);
        let vms = self
            .vms
            .lock()
            .map_err(|_| anyhow::anyhow!("dry run state poisoned"))?;
        if let Some(found) = vms.iter().find(|e| e.handle.path == name || e.handle.name == name) {
            return Ok(Some(found.handle.clone()));
        }
        drop(vms);
        // every lookup target exists in a dry run
        Ok(Some(self.synthesize(name)))
    }

    fn clone_vm(
        &self,
        source: &VmHandle,
        request: &CloneRequest,
        _cancel: &CancellationToken,
    ) -> Result<VmHandle> {
        info!("dry run: clone {} to {}", source.path, request.name);
        let handle = self.synthesize(&request.name);
        self.remember(&handle);
        Ok(handle)
    }

    fn deploy_remote_package(
        &self,
        request: &DeployRequest,
        ui: &dyn Ui,
        _cancel: &CancellationToken,
        resources: &mut DeploymentResources,
    ) -> Result<VmHandle> {
        info!("dry run: deploy {} as {}", sanitize_url(&request.url), request.name);
        resources.task = Some(TaskRef(format!("task-{}", Uuid::new_v4().simple())));
        ui.say("dry run: upload progress 100%");
        resources.task = None;
        let handle = self.synthesize(&request.name);
        self.remember(&handle);
        Ok(handle)
    }

    fn deployment_options(&self, query: &OptionsQuery) -> Result<Vec<OvfOption>> {
        info!("dry run: list deployment options of {}", sanitize_url(&query.url));
        Ok(Vec::new())
    }

    fn cancel_task(&self, task: &TaskRef) -> Result<()> {
        info!("dry run: cancel task {}", task.0);
        Ok(())
    }

    fn stop_progress_monitor(&self, monitor: &MonitorRef) -> Result<()> {
        info!("dry run: stop progress monitor {}", monitor.0);
        Ok(())
    }

    fn abort_lease(&self, lease: &LeaseRef) -> Result<()> {
        info!("dry run: abort lease {}", lease.0);
        Ok(())
    }

    fn is_template(&self, vm: &VmHandle) -> Result<bool> {
        Ok(self.state(vm).is_some_and(|s| s.template))
    }

    fn mark_as_vm(&self, vm: &VmHandle, _placement: &Placement) -> Result<()> {
        info!("dry run: mark {} as vm", vm);
        self.update(vm, |s| s.template = false);
        Ok(())
    }

    fn is_powered_on(&self, vm: &VmHandle) -> Result<bool> {
        Ok(self.state(vm).is_some_and(|s| s.powered_on))
    }

    fn power_on(&self, vm: &VmHandle) -> Result<()> {
        info!("dry run: power on {}", vm);
        self.update(vm, |s| s.powered_on = true);
        Ok(())
    }

    fn power_off(&self, vm: &VmHandle) -> Result<()> {
        info!("dry run: power off {}", vm);
        self.update(vm, |s| s.powered_on = false);
        Ok(())
    }

    fn destroy_vm(&self, vm: &VmHandle) -> Result<()> {
        info!("dry run: destroy {}", vm);
        if let Ok(mut vms) = self.vms.lock() {
            vms.retain(|e| e.handle.id != vm.id);
        }
        Ok(())
    }

    fn configure_hardware(&self, vm: &VmHandle, spec: &HardwareSpec) -> Result<()> {
        info!("dry run: configure {}: {:?}", vm, spec);
        Ok(())
    }

    fn customize(&self, vm: &VmHandle, spec: &CustomizationSpec) -> Result<()> {
        info!("dry run: customize {} with {} nic(s)", vm, spec.nics.len());
        Ok(())
    }

    fn set_boot_order(&self, vm: &VmHandle, order: &[String]) -> Result<()> {
        info!("dry run: set boot order of {} to {}", vm, order.join(","));
        Ok(())
    }

    fn type_keys(&self, vm: &VmHandle, keys: &str) -> Result<()> {
        info!("dry run: type {} key(s) on {}", keys.chars().count(), vm);
        Ok(())
    }

    fn add_cdrom(&self, vm: &VmHandle, controller: CdromController, iso: Option<&str>) -> Result<()> {
        info!("dry run: add {} cdrom to {} ({})", controller, vm, iso.unwrap_or("empty"));
        Ok(())
    }

    fn eject_cdroms(&self, vm: &VmHandle) -> Result<()> {
        info!("dry run: eject cdroms of {}", vm);
        Ok(())
    }

    fn remove_cdroms(&self, vm: &VmHandle) -> Result<()> {
        info!("dry run: remove cdroms of {}", vm);
        Ok(())
    }

    fn upload_file(&self, local: &Utf8Path, datastore: Option<&str>, remote: &str) -> Result<String> {
        let datastore = datastore.unwrap_or("datastore1");
        info!("dry run: upload {} to [{}] {}", local, datastore, remote);
        Ok(format!("[{}] {}", datastore, remote))
    }

    fn delete_datastore_file(&self, path: &str) -> Result<()> {
        info!("dry run: delete {}", path);
        Ok(())
    }

    fn add_floppy(&self, vm: &VmHandle, image: &str) -> Result<()> {
        info!("dry run: add floppy {} to {}", image, vm);
        Ok(())
    }

    fn remove_floppy(&self, vm: &VmHandle) -> Result<()> {
        info!("dry run: remove floppy of {}", vm);
        Ok(())
    }

    fn wait_for_ip(&self, vm: &VmHandle, wait: &IpWait, _cancel: &CancellationToken) -> Result<IpAddr> {
        info!("dry run: wait up to {:?} for an address on {}", wait.timeout, vm);
        Ok(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)))
    }

    fn shutdown_guest(&self, vm: &VmHandle) -> Result<()> {
        info!("dry run: shut down guest {}", vm);
        self.update(vm, |s| s.powered_on = false);
        Ok(())
    }

    fn wait_for_power_off(
        &self,
        vm: &VmHandle,
        timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        info!("dry run: wait up to {:?} for {} to power off", timeout, vm);
        Ok(())
    }

    fn create_snapshot(&self, vm: &VmHandle, name: &str) -> Result<()> {
        info!("dry run: snapshot {} as '{}'", vm, name);
        Ok(())
    }

    fn convert_to_template(&self, vm: &VmHandle) -> Result<()> {
        info!("dry run: convert {} to template", vm);
        self.update(vm, |s| s.template = true);
        Ok(())
    }

    fn import_to_library(&self, vm: &VmHandle, request: &LibraryImport) -> Result<String> {
        info!("dry run: import {} into library {} as {}", vm, request.library, request.name);
        Ok(Uuid::new_v4().to_string())
    }

    /// There is no inventory to clean; existing VMs are never reported.
    fn pre_clean_vm(&self, _ui: &dyn Ui, path: &str, force: bool, _placement: &Placement) -> Result<()> {
        info!("dry run: skip existing VM check for {} (force: {})", path, force);
        Ok(())
    }
}

/// Communicator that logs commands instead of running them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunCommunicator;

impl Communicator for DryRunCommunicator {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn execute(&self, host: &str, command: &str) -> Result<i32> {
        info!("dry run: {}: {}", host, command);
        Ok(0)
    }
}

/// Exporter that reports the files it would write.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunExporter;

impl Exporter for DryRunExporter {
    fn export(
        &self,
        vm: &VmHandle,
        request: &ExportRequest,
        _cancel: &CancellationToken,
    ) -> Result<ExportOutput> {
        info!("dry run: export {} to {} as {}", vm, request.output_directory, request.format);
        let file = request
            .output_directory
            .join(format!("{}.{}", request.name, request.format));
        Ok(ExportOutput {
            directory: request.output_directory.clone(),
            files: vec![file],
        })
    }
}
