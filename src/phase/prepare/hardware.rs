use tracing::debug;

use crate::driver::HardwareSpec;
use crate::phase::{Step, StepAction, halt_config, halt_driver};
use crate::state::StateBag;

#[derive(Debug)]
pub struct StepConfigureHardware {
    spec: HardwareSpec,
}

impl StepConfigureHardware {
    pub fn new(spec: HardwareSpec) -> Self {
        Self { spec }
    }
}

impl Step for StepConfigureHardware {
    fn name(&self) -> &'static str {
        "configure-hardware"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        if self.spec.is_empty() {
            debug!("no hardware changes requested");
            return StepAction::Continue;
        }
        let Some(vm) = bag.vm().cloned() else {
            return halt_config(bag, "no VM to configure");
        };

        bag.ui().say("configuring hardware...");
        if let Err(e) = bag.driver().configure_hardware(&vm, &self.spec) {
            return halt_driver(bag, "configure hardware", e);
        }
        StepAction::Continue
    }
}
