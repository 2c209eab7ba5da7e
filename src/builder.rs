//! Turns a validated [`Config`] into a [`Pipeline`] and runs it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::artifact::BuildArtifact;
use crate::config::Config;
use crate::driver::{Communicator, Driver, Exporter};
use crate::error::VsforgeError;
use crate::phase::Step;
use crate::phase::assemble::{
    StepConvertToTemplate, StepCreateSnapshot, StepDestroy, StepExport, StepImportToLibrary,
    StepRemoveMedia,
};
use crate::phase::prepare::{
    FloppySource, StepAddCdrom, StepAddFloppy, StepBootOrder, StepConfigureHardware,
    StepConnect, StepCreateVm, StepCustomize,
};
use crate::phase::provision::{
    ShutdownMethod, StepBootCommand, StepPowerOn, StepProvision, StepShutdown, StepWaitForIp,
};
use crate::pipeline::{Pipeline, RunOutcome};
use crate::state::StateBag;
use crate::ui::Ui;

/// External collaborators a build runs against.
#[derive(Clone)]
pub struct Capabilities {
    pub driver: Arc<dyn Driver>,
    pub ui: Arc<dyn Ui>,
    /// Required when provisioners or a shutdown command are configured.
    pub communicator: Option<Arc<dyn Communicator>>,
    /// Required when an export is configured.
    pub exporter: Option<Arc<dyn Exporter>>,
    pub cancel: CancellationToken,
}

impl Capabilities {
    pub fn new(driver: Arc<dyn Driver>, ui: Arc<dyn Ui>) -> Self {
        Self {
            driver,
            ui,
            communicator: None,
            exporter: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_communicator(mut self, communicator: Arc<dyn Communicator>) -> Self {
        self.communicator = Some(communicator);
        self
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

fn communicator(caps: &Capabilities, purpose: &str) -> Result<Arc<dyn Communicator>, VsforgeError> {
    caps.communicator.clone().ok_or_else(|| {
        VsforgeError::Config(format!("{} requires a communicator, but none is available", purpose))
    })
}

/// Selects the steps the configuration asks for, in execution order.
#[tracing::instrument(skip_all, fields(vm = %config.location.vm_name))]
pub fn build_pipeline(config: &Config, caps: &Capabilities) -> Result<Pipeline, VsforgeError> {
    let mut prepare: Vec<Box<dyn Step>> = vec![
        Box::new(StepConnect::new(config.connection.clone())),
        Box::new(StepCreateVm::new(
            config.location.clone(),
            config.source.clone(),
            config.storage.clone(),
            config.force,
        )),
    ];
    if let Some(customize) = &config.customize {
        prepare.push(Box::new(StepCustomize::new(customize.clone())));
    }
    let hardware = config.hardware.to_spec();
    if !hardware.is_empty() {
        prepare.push(Box::new(StepConfigureHardware::new(hardware)));
    }
    if !config.cdrom.iso_paths.is_empty() {
        prepare.push(Box::new(StepAddCdrom::new(
            config.cdrom.controller,
            config.cdrom.iso_paths.clone(),
        )));
    }
    let floppy = match (&config.floppy.local_image, &config.floppy.datastore_image) {
        (Some(local), None) => Some(FloppySource::Local(local.clone())),
        (None, Some(path)) => Some(FloppySource::Datastore(path.clone())),
        _ => None,
    };
    if let Some(source) = floppy {
        prepare.push(Box::new(StepAddFloppy::new(source, config.location.datastore.clone())));
    }
    if !config.boot.order.is_empty() {
        prepare.push(Box::new(StepBootOrder::new(config.boot.order.clone())));
    }

    let mut provision: Vec<Box<dyn Step>> = vec![Box::new(StepPowerOn)];
    if !config.boot.command.is_empty() {
        provision.push(Box::new(StepBootCommand::new(
            Duration::from_secs(config.boot.wait),
            config.boot.command.clone(),
        )));
    }
    if config.communicator.enabled() {
        provision.push(Box::new(StepWaitForIp::new(config.wait_ip.to_wait())));
    }
    if !config.provisioners.is_empty() {
        provision.push(Box::new(StepProvision::new(
            communicator(caps, "provisioning")?,
            config.communicator.host.clone(),
            config.provisioners.clone(),
        )));
    }
    let shutdown = match &config.shutdown.command {
        Some(command) => ShutdownMethod::Command {
            communicator: communicator(caps, "'shutdown.command'")?,
            host: config.communicator.host.clone(),
            command: command.clone(),
        },
        None => ShutdownMethod::Guest,
    };
    provision.push(Box::new(StepShutdown::new(
        shutdown,
        Duration::from_secs(config.shutdown.timeout),
    )));

    let mut assemble: Vec<Box<dyn Step>> = Vec::new();
    if config.cdrom.eject_cdrom || config.cdrom.remove_cdrom || !config.floppy.is_empty() {
        assemble.push(Box::new(StepRemoveMedia::new(
            config.cdrom.eject_cdrom,
            config.cdrom.remove_cdrom,
        )));
    }
    if config.snapshot.create {
        assemble.push(Box::new(StepCreateSnapshot::new(config.snapshot.snapshot_name())));
    }
    if config.convert_to_template {
        assemble.push(Box::new(StepConvertToTemplate));
    }
    if let Some(export) = &config.export {
        let exporter = caps.exporter.clone().ok_or_else(|| {
            VsforgeError::Config("export requires an exporter, but none is available".to_string())
        })?;
        assemble.push(Box::new(StepExport::new(exporter, export.clone())));
    }
    if let Some(library) = &config.content_library {
        assemble.push(Box::new(StepImportToLibrary::new(library.clone())));
    }
    if config.destroy {
        assemble.push(Box::new(StepDestroy));
    }

    let pipeline = Pipeline::new(prepare, provision, assemble);
    debug!("pipeline steps: {}", pipeline.step_names().join(", "));
    Ok(pipeline)
}

/// Runs a build from a validated configuration.
///
/// Returns the terminal build error (already sanitized) if any step halted
/// or the build was cancelled.
pub fn run_pipeline(config: &Config, caps: Capabilities) -> Result<BuildArtifact, VsforgeError> {
    let mut pipeline = build_pipeline(config, &caps)?;
    let mut bag = StateBag::new(caps.driver, caps.ui, caps.cancel);

    let outcome = pipeline.run(&mut bag);
    if let Some(err) = bag.take_error() {
        return Err(err);
    }
    match outcome {
        RunOutcome::Completed => {}
        RunOutcome::Halted { step } => {
            return Err(VsforgeError::Config(format!(
                "step '{}' halted without reporting an error",
                step
            )));
        }
        RunOutcome::Cancelled { before } => {
            return Err(VsforgeError::Cancelled(format!(
                "build cancelled before step '{}'",
                before
            )));
        }
    }

    let artifact = BuildArtifact::from_state(&bag, &config.location).ok_or_else(|| {
        VsforgeError::Config("build finished without producing a VM".to_string())
    })?;
    info!("build finished: {}", artifact);
    Ok(artifact)
}
