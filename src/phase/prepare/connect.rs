use crate::config::ConnectConfig;
use crate::phase::{Step, StepAction, halt_driver, report_cleanup_error};
use crate::state::{StateBag, keys};

/// Opens the driver session; cleanup closes it again.
#[derive(Debug)]
pub struct StepConnect {
    config: ConnectConfig,
}

impl StepConnect {
    pub fn new(config: ConnectConfig) -> Self {
        Self { config }
    }
}

impl Step for StepConnect {
    fn name(&self) -> &'static str {
        "connect"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        bag.ui()
            .say(&format!("connecting to {}...", self.config.vcenter_server));
        if let Err(e) = bag.driver().connect(&self.config.to_spec()) {
            return halt_driver(bag, "connect", e);
        }
        bag.put(keys::SESSION_OPEN, true);
        StepAction::Continue
    }

    fn cleanup(&mut self, bag: &mut StateBag) {
        if bag.remove::<bool>(keys::SESSION_OPEN) != Some(true) {
            return;
        }
        if let Err(e) = bag.driver().disconnect() {
            report_cleanup_error(bag, "closing session", &e);
        }
    }
}
