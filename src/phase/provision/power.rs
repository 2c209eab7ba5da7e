use std::time::Duration;

use crate::error::VsforgeError;
use crate::phase::{Step, StepAction, halt, halt_config, halt_driver, report_cleanup_error};
use crate::state::{StateBag, keys};

use super::sleep_cancellable;

/// Powers the VM on. If the build fails later, cleanup powers it off again.
#[derive(Debug, Default)]
pub struct StepPowerOn;

impl Step for StepPowerOn {
    fn name(&self) -> &'static str {
        "power-on"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let Some(vm) = bag.vm().cloned() else {
            return halt_config(bag, "no VM to power on");
        };
        bag.ui().say("powering on VM...");
        if let Err(e) = bag.driver().power_on(&vm) {
            return halt_driver(bag, "power on", e);
        }
        bag.put(keys::POWERED_ON, true);
        StepAction::Continue
    }

    fn cleanup(&mut self, bag: &mut StateBag) {
        let powered_on = bag.remove::<bool>(keys::POWERED_ON) == Some(true);
        let failed = bag.error().is_some() || bag.is_cancelled();
        if !powered_on || !failed {
            return;
        }
        let Some(vm) = bag.vm().cloned() else {
            return;
        };
        let driver = bag.driver();
        match driver.is_powered_on(&vm) {
            Ok(false) => {}
            Ok(true) => {
                bag.ui().say("powering off VM...");
                if let Err(e) = driver.power_off(&vm) {
                    report_cleanup_error(bag, "powering off VM", &e);
                }
            }
            Err(e) => report_cleanup_error(bag, "reading VM power state", &e),
        }
    }
}

/// Waits for the guest firmware, then types the boot command.
#[derive(Debug)]
pub struct StepBootCommand {
    wait: Duration,
    command: Vec<String>,
}

impl StepBootCommand {
    pub fn new(wait: Duration, command: Vec<String>) -> Self {
        Self { wait, command }
    }
}

impl Step for StepBootCommand {
    fn name(&self) -> &'static str {
        "boot-command"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let Some(vm) = bag.vm().cloned() else {
            return halt_config(bag, "no VM to type the boot command on");
        };
        let driver = bag.driver();
        let ui = bag.ui();

        if !self.wait.is_zero() {
            ui.say(&format!("waiting {}s for boot...", self.wait.as_secs()));
            if !sleep_cancellable(self.wait, &bag.cancel_token()) {
                return halt(bag, VsforgeError::Cancelled("boot wait was cancelled".to_string()));
            }
        }

        ui.say("typing boot command...");
        for keys in &self.command {
            if bag.is_cancelled() {
                return halt(bag, VsforgeError::Cancelled("boot command was cancelled".to_string()));
            }
            if let Err(e) = driver.type_keys(&vm, keys) {
                return halt_driver(bag, "type boot command", e);
            }
        }
        StepAction::Continue
    }
}
