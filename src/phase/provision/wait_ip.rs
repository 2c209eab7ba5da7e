use crate::driver::IpWait;
use crate::error::VsforgeError;
use crate::phase::{Step, StepAction, halt, halt_config, halt_driver};
use crate::state::{StateBag, keys};

/// Blocks until the guest reports an address and stores it under [`keys::IP`].
#[derive(Debug)]
pub struct StepWaitForIp {
    wait: IpWait,
}

impl StepWaitForIp {
    pub fn new(wait: IpWait) -> Self {
        Self { wait }
    }
}

impl Step for StepWaitForIp {
    fn name(&self) -> &'static str {
        "wait-for-ip"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let Some(vm) = bag.vm().cloned() else {
            return halt_config(bag, "no VM to wait for");
        };
        let cancel = bag.cancel_token();

        bag.ui().say("waiting for IP address...");
        match bag.driver().wait_for_ip(&vm, &self.wait, &cancel) {
            Ok(ip) => {
                bag.ui().say(&format!("IP address: {}", ip));
                bag.put(keys::IP, ip);
                StepAction::Continue
            }
            Err(_) if cancel.is_cancelled() => halt(
                bag,
                VsforgeError::Cancelled("waiting for IP address was cancelled".to_string()),
            ),
            Err(e) => halt_driver(bag, "wait for IP", e),
        }
    }
}
