use crate::phase::{Step, StepAction, halt_config, halt_driver};
use crate::state::{StateBag, keys};

/// Detaches boot media before the VM is captured.
#[derive(Debug, Default)]
pub struct StepRemoveMedia {
    eject_cdrom: bool,
    remove_cdrom: bool,
}

impl StepRemoveMedia {
    pub fn new(eject_cdrom: bool, remove_cdrom: bool) -> Self {
        Self {
            eject_cdrom,
            remove_cdrom,
        }
    }
}

impl Step for StepRemoveMedia {
    fn name(&self) -> &'static str {
        "remove-media"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let Some(vm) = bag.vm().cloned() else {
            return halt_config(bag, "no VM to remove media from");
        };
        let driver = bag.driver();
        let ui = bag.ui();

        if bag.flag(keys::FLOPPY_ATTACHED) {
            ui.say("removing floppy drive...");
            if let Err(e) = driver.remove_floppy(&vm) {
                return halt_driver(bag, "remove floppy", e);
            }
            bag.remove::<bool>(keys::FLOPPY_ATTACHED);
        }

        if self.eject_cdrom && !self.remove_cdrom {
            ui.say("ejecting CD-ROM media...");
            if let Err(e) = driver.eject_cdroms(&vm) {
                return halt_driver(bag, "eject CD-ROM", e);
            }
        }
        if self.remove_cdrom {
            ui.say("removing CD-ROM drives...");
            if let Err(e) = driver.remove_cdroms(&vm) {
                return halt_driver(bag, "remove CD-ROM", e);
            }
        }
        StepAction::Continue
    }
}
