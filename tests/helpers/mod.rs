use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use camino::Utf8Path;
use tokio_util::sync::CancellationToken;

use vsforge::driver::{
    CdromController, CloneRequest, ConnectionSpec, CustomizationSpec, DeployRequest,
    DeploymentResources, Driver, HardwareSpec, IpWait, LeaseRef, LibraryImport, MonitorRef,
    OptionsQuery, OvfOption, TaskRef, VmHandle,
};
use vsforge::phase::{Step, StepAction};
use vsforge::state::StateBag;
use vsforge::ui::Ui;

/// Creates a VM handle in datacenter `dc1`.
#[allow(dead_code)]
pub fn vm(name: &str) -> VmHandle {
    VmHandle {
        id: format!("vm-{}", name),
        name: name.to_string(),
        path: format!("/dc1/vm/{}", name),
        datacenter: "dc1".to_string(),
    }
}

/// Driver double that records every call and fails on request.
#[derive(Default)]
pub struct MockDriver {
    calls: Mutex<Vec<String>>,
    /// VMs visible to `find_vm`, by name or path.
    pub vms: Mutex<HashMap<String, VmHandle>>,
    /// Deployment options offered by any remote package.
    pub options: Vec<OvfOption>,
    /// Error text returned by `deploy_remote_package`.
    pub deploy_error: Option<String>,
    /// Resources still held when `deploy_remote_package` fails.
    pub leaked: DeploymentResources,
    /// Operations that fail with "<op> exploded".
    pub failing: Vec<&'static str>,
    /// Cancels the build token while a deployment is in flight.
    pub cancel_on_deploy: bool,
    powered_on: Mutex<bool>,
}

#[allow(dead_code)]
impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vm(self, key: &str, handle: VmHandle) -> Self {
        self.vms.lock().unwrap().insert(key.to_string(), handle);
        self
    }

    pub fn with_options(mut self, names: &[&str]) -> Self {
        self.options = names
            .iter()
            .map(|name| OvfOption {
                option: name.to_string(),
                description: format!("{} deployment", name),
            })
            .collect();
        self
    }

    pub fn with_deploy_error(mut self, message: impl Into<String>) -> Self {
        self.deploy_error = Some(message.into());
        self
    }

    pub fn with_leaked(mut self, resources: DeploymentResources) -> Self {
        self.leaked = resources;
        self
    }

    pub fn cancelling_deploy(mut self) -> Self {
        self.cancel_on_deploy = true;
        self
    }

    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing.push(op);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns true if a call starting with `prefix` was recorded.
    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    fn record(&self, op: &'static str, detail: &str) -> Result<()> {
        let call = if detail.is_empty() {
            op.to_string()
        } else {
            format!("{}:{}", op, detail)
        };
        self.calls.lock().unwrap().push(call);
        if self.failing.contains(&op) {
            bail!("{} exploded", op);
        }
        Ok(())
    }
}

impl Driver for MockDriver {
    fn connect(&self, spec: &ConnectionSpec) -> Result<()> {
        self.record("connect", &spec.server)
    }

    fn disconnect(&self) -> Result<()> {
        self.record("disconnect", "")
    }

    fn find_vm(&self, name: &str) -> Result<Option<VmHandle>> {
        self.record("find_vm", name)?;
        Ok(self.vms.lock().unwrap().get(name).cloned())
    }

    fn clone_vm(
        &self,
        source: &VmHandle,
        request: &CloneRequest,
        _cancel: &CancellationToken,
    ) -> Result<VmHandle> {
        self.record("clone_vm", &format!("{}->{}", source.name, request.name))?;
        Ok(vm(&request.name))
    }

    fn deploy_remote_package(
        &self,
        request: &DeployRequest,
        _ui: &dyn Ui,
        cancel: &CancellationToken,
        resources: &mut DeploymentResources,
    ) -> Result<VmHandle> {
        self.record("deploy", &request.name)?;
        if self.cancel_on_deploy {
            cancel.cancel();
        }
        if let Some(message) = &self.deploy_error {
            *resources = self.leaked.clone();
            bail!("{}", message);
        }
        Ok(vm(&request.name))
    }

    fn deployment_options(&self, query: &OptionsQuery) -> Result<Vec<OvfOption>> {
        self.record("deployment_options", &query.locale)?;
        Ok(self.options.clone())
    }

    fn cancel_task(&self, task: &TaskRef) -> Result<()> {
        self.record("cancel_task", &task.0)
    }

    fn stop_progress_monitor(&self, monitor: &MonitorRef) -> Result<()> {
        self.record("stop_monitor", &monitor.0)
    }

    fn abort_lease(&self, lease: &LeaseRef) -> Result<()> {
        self.record("abort_lease", &lease.0)
    }

    fn is_template(&self, vm: &VmHandle) -> Result<bool> {
        self.record("is_template", &vm.name)?;
        Ok(false)
    }

    fn mark_as_vm(&self, vm: &VmHandle, _placement: &vsforge::driver::Placement) -> Result<()> {
        self.record("mark_as_vm", &vm.name)
    }

    fn is_powered_on(&self, _vm: &VmHandle) -> Result<bool> {
        Ok(*self.powered_on.lock().unwrap())
    }

    fn power_on(&self, vm: &VmHandle) -> Result<()> {
        self.record("power_on", &vm.name)?;
        *self.powered_on.lock().unwrap() = true;
        Ok(())
    }

    fn power_off(&self, vm: &VmHandle) -> Result<()> {
        self.record("power_off", &vm.name)?;
        *self.powered_on.lock().unwrap() = false;
        Ok(())
    }

    fn destroy_vm(&self, vm: &VmHandle) -> Result<()> {
        self.record("destroy_vm", &vm.name)
    }

    fn configure_hardware(&self, vm: &VmHandle, _spec: &HardwareSpec) -> Result<()> {
        self.record("configure_hardware", &vm.name)
    }

    fn customize(&self, vm: &VmHandle, _spec: &CustomizationSpec) -> Result<()> {
        self.record("customize", &vm.name)
    }

    fn set_boot_order(&self, _vm: &VmHandle, order: &[String]) -> Result<()> {
        self.record("set_boot_order", &order.join(","))
    }

    fn type_keys(&self, _vm: &VmHandle, keys: &str) -> Result<()> {
        self.record("type_keys", keys)
    }

    fn add_cdrom(&self, _vm: &VmHandle, controller: CdromController, iso: Option<&str>) -> Result<()> {
        self.record("add_cdrom", &format!("{}:{}", controller, iso.unwrap_or("")))
    }

    fn eject_cdroms(&self, vm: &VmHandle) -> Result<()> {
        self.record("eject_cdroms", &vm.name)
    }

    fn remove_cdroms(&self, vm: &VmHandle) -> Result<()> {
        self.record("remove_cdroms", &vm.name)
    }

    fn upload_file(&self, local: &Utf8Path, _datastore: Option<&str>, remote: &str) -> Result<String> {
        self.record("upload_file", local.as_str())?;
        Ok(format!("[datastore1] {}", remote))
    }

    fn delete_datastore_file(&self, path: &str) -> Result<()> {
        self.record("delete_datastore_file", path)
    }

    fn add_floppy(&self, _vm: &VmHandle, image: &str) -> Result<()> {
        self.record("add_floppy", image)
    }

    fn remove_floppy(&self, vm: &VmHandle) -> Result<()> {
        self.record("remove_floppy", &vm.name)
    }

    fn wait_for_ip(&self, vm: &VmHandle, _wait: &IpWait, _cancel: &CancellationToken) -> Result<IpAddr> {
        self.record("wait_for_ip", &vm.name)?;
        Ok(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)))
    }

    fn shutdown_guest(&self, vm: &VmHandle) -> Result<()> {
        self.record("shutdown_guest", &vm.name)?;
        *self.powered_on.lock().unwrap() = false;
        Ok(())
    }

    fn wait_for_power_off(
        &self,
        vm: &VmHandle,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.record("wait_for_power_off", &vm.name)
    }

    fn create_snapshot(&self, _vm: &VmHandle, name: &str) -> Result<()> {
        self.record("create_snapshot", name)
    }

    fn convert_to_template(&self, vm: &VmHandle) -> Result<()> {
        self.record("convert_to_template", &vm.name)
    }

    fn import_to_library(&self, _vm: &VmHandle, request: &LibraryImport) -> Result<String> {
        self.record("import_to_library", &request.library)?;
        Ok("item-1".to_string())
    }
}

/// [`Ui`] that keeps every message for later inspection.
#[derive(Default)]
pub struct RecordingUi {
    pub said: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingUi {
    pub fn said(&self) -> Vec<String> {
        self.said.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Ui for RecordingUi {
    fn say(&self, message: &str) {
        self.said.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// Creates a bag backed by `driver` and a fresh [`RecordingUi`].
#[allow(dead_code)]
pub fn bag_with(driver: Arc<MockDriver>) -> (StateBag, Arc<RecordingUi>) {
    let ui = Arc::new(RecordingUi::default());
    let bag = StateBag::new(driver, ui.clone(), CancellationToken::new());
    (bag, ui)
}

/// Step that appends `run:<name>` and `cleanup:<name>` to a shared log.
#[allow(dead_code)]
pub struct RecordingStep {
    pub name: &'static str,
    pub log: Arc<Mutex<Vec<String>>>,
    pub action: StepAction,
    /// Cancels this token when the step runs.
    pub cancel_on_run: Option<CancellationToken>,
}

#[allow(dead_code)]
impl RecordingStep {
    pub fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            action: StepAction::Continue,
            cancel_on_run: None,
        }
    }

    pub fn halting(mut self) -> Self {
        self.action = StepAction::Halt;
        self
    }

    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_run = Some(token);
        self
    }

    pub fn boxed(self) -> Box<dyn Step> {
        Box::new(self)
    }
}

impl Step for RecordingStep {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        self.log.lock().unwrap().push(format!("run:{}", self.name));
        if let Some(token) = &self.cancel_on_run {
            token.cancel();
        }
        if self.action == StepAction::Halt {
            bag.set_error(vsforge::error::VsforgeError::Config(format!(
                "{} failed",
                self.name
            )));
        }
        self.action
    }

    fn cleanup(&mut self, _bag: &mut StateBag) {
        self.log.lock().unwrap().push(format!("cleanup:{}", self.name));
    }
}

/// Minimal valid build file; tests append blocks to it.
#[allow(dead_code)]
pub const BASE_YAML: &str = r#"---
connection:
  vcenter_server: vcenter.example.com
  username: administrator@vsphere.local
  password: hunter2
location:
  vm_name: web-01
  cluster: cluster1
source:
  template: ubuntu-tmpl
"#;

/// Writes `yaml` as `build.yaml` under `dir` and returns its path.
#[allow(dead_code)]
pub fn write_build_file(dir: &camino::Utf8Path, yaml: &str) -> camino::Utf8PathBuf {
    let path = dir.join("build.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

/// Loads a build file from YAML text via a temporary directory.
#[allow(dead_code)]
pub fn load_config_from_yaml(
    yaml: impl AsRef<str>,
) -> Result<vsforge::config::Config, vsforge::error::VsforgeError> {
    let dir = tempfile::tempdir().unwrap();
    let root = camino::Utf8Path::from_path(dir.path()).unwrap();
    let path = write_build_file(root, yaml.as_ref());
    vsforge::config::load_config(&path)
}
