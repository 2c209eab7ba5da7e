use crate::phase::{Step, StepAction, halt_config, halt_driver};
use crate::state::StateBag;

/// Sets the firmware boot order.
#[derive(Debug)]
pub struct StepBootOrder {
    order: Vec<String>,
}

impl StepBootOrder {
    pub fn new(order: Vec<String>) -> Self {
        Self { order }
    }
}

impl Step for StepBootOrder {
    fn name(&self) -> &'static str {
        "boot-order"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let Some(vm) = bag.vm().cloned() else {
            return halt_config(bag, "no VM to set the boot order on");
        };
        bag.ui()
            .say(&format!("setting boot order to {}...", self.order.join(",")));
        if let Err(e) = bag.driver().set_boot_order(&vm, &self.order) {
            return halt_driver(bag, "set boot order", e);
        }
        StepAction::Continue
    }
}
