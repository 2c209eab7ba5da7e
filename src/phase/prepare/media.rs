//! Boot media attached before the VM is powered on.

use camino::Utf8PathBuf;

use crate::driver::CdromController;
use crate::phase::{Step, StepAction, halt_config, halt_driver, report_cleanup_error};
use crate::state::{StateBag, keys};

/// Adds one CD-ROM drive per ISO path.
#[derive(Debug)]
pub struct StepAddCdrom {
    controller: CdromController,
    iso_paths: Vec<String>,
}

impl StepAddCdrom {
    pub fn new(controller: CdromController, iso_paths: Vec<String>) -> Self {
        Self {
            controller,
            iso_paths,
        }
    }
}

impl Step for StepAddCdrom {
    fn name(&self) -> &'static str {
        "add-cdrom"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let Some(vm) = bag.vm().cloned() else {
            return halt_config(bag, "no VM to attach CD-ROM drives to");
        };
        let driver = bag.driver();
        let ui = bag.ui();

        for iso in &self.iso_paths {
            ui.say(&format!("mounting ISO {}...", iso));
            if let Err(e) = driver.add_cdrom(&vm, self.controller, Some(iso)) {
                return halt_driver(bag, "add CD-ROM", e);
            }
        }
        StepAction::Continue
    }
}

/// Where the floppy image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FloppySource {
    /// Local image uploaded to the VM's datastore.
    Local(Utf8PathBuf),
    /// Image already on a datastore.
    Datastore(String),
}

/// Attaches a floppy image, uploading it first if it is local.
///
/// Cleanup detaches the drive if it is still attached and deletes the
/// uploaded image.
#[derive(Debug)]
pub struct StepAddFloppy {
    source: FloppySource,
    datastore: Option<String>,
}

impl StepAddFloppy {
    pub fn new(source: FloppySource, datastore: Option<String>) -> Self {
        Self { source, datastore }
    }
}

impl Step for StepAddFloppy {
    fn name(&self) -> &'static str {
        "add-floppy"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let Some(vm) = bag.vm().cloned() else {
            return halt_config(bag, "no VM to attach a floppy drive to");
        };
        let driver = bag.driver();
        let ui = bag.ui();

        let image = match &self.source {
            FloppySource::Datastore(path) => path.clone(),
            FloppySource::Local(local) => {
                let file_name = local.file_name().unwrap_or("floppy.flp");
                let remote = format!("{}/{}", vm.name, file_name);
                ui.say(&format!("uploading floppy image {}...", local));
                match driver.upload_file(local, self.datastore.as_deref(), &remote) {
                    Ok(path) => {
                        bag.put(keys::UPLOADED_FLOPPY, path.clone());
                        path
                    }
                    Err(e) => return halt_driver(bag, "upload floppy image", e),
                }
            }
        };

        ui.say("adding floppy drive...");
        if let Err(e) = driver.add_floppy(&vm, &image) {
            return halt_driver(bag, "add floppy", e);
        }
        bag.put(keys::FLOPPY_ATTACHED, true);
        StepAction::Continue
    }

    fn cleanup(&mut self, bag: &mut StateBag) {
        let driver = bag.driver();

        if bag.remove::<bool>(keys::FLOPPY_ATTACHED) == Some(true)
            && let Some(vm) = bag.vm().cloned()
        {
            bag.ui().say("removing floppy drive...");
            if let Err(e) = driver.remove_floppy(&vm) {
                report_cleanup_error(bag, "removing floppy drive", &e);
            }
        }

        if let Some(path) = bag.remove::<String>(keys::UPLOADED_FLOPPY) {
            bag.ui().say(&format!("deleting floppy image {}...", path));
            if let Err(e) = driver.delete_datastore_file(&path) {
                report_cleanup_error(bag, "deleting floppy image", &e);
            }
        }
    }
}
