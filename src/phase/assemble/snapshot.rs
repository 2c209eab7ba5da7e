use crate::phase::{Step, StepAction, halt_config, halt_driver};
use crate::state::{StateBag, keys};

#[derive(Debug)]
pub struct StepCreateSnapshot {
    name: String,
}

impl StepCreateSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Step for StepCreateSnapshot {
    fn name(&self) -> &'static str {
        "create-snapshot"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let Some(vm) = bag.vm().cloned() else {
            return halt_config(bag, "no VM to snapshot");
        };
        bag.ui().say(&format!("creating snapshot '{}'...", self.name));
        if let Err(e) = bag.driver().create_snapshot(&vm, &self.name) {
            return halt_driver(bag, "create snapshot", e);
        }
        StepAction::Continue
    }
}

#[derive(Debug, Default)]
pub struct StepConvertToTemplate;

impl Step for StepConvertToTemplate {
    fn name(&self) -> &'static str {
        "convert-to-template"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let Some(vm) = bag.vm().cloned() else {
            return halt_config(bag, "no VM to convert");
        };
        bag.ui().say("converting VM to template...");
        if let Err(e) = bag.driver().convert_to_template(&vm) {
            return halt_driver(bag, "convert to template", e);
        }
        bag.put(keys::TEMPLATE, true);
        StepAction::Continue
    }
}
