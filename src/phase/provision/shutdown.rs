use std::sync::Arc;
use std::time::Duration;

use crate::driver::Communicator;
use crate::error::VsforgeError;
use crate::phase::{Step, StepAction, halt, halt_config, halt_driver};
use crate::state::{StateBag, keys};

use super::shell::guest_host;

/// How the guest is asked to shut down.
pub enum ShutdownMethod {
    /// Soft shutdown through the guest tools.
    Guest,
    /// Run a command over the communicator.
    Command {
        communicator: Arc<dyn Communicator>,
        host: Option<String>,
        command: String,
    },
}

/// Shuts the guest down and waits for the VM to power off.
pub struct StepShutdown {
    method: ShutdownMethod,
    timeout: Duration,
}

impl StepShutdown {
    pub fn new(method: ShutdownMethod, timeout: Duration) -> Self {
        Self { method, timeout }
    }
}

impl Step for StepShutdown {
    fn name(&self) -> &'static str {
        "shutdown"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let Some(vm) = bag.vm().cloned() else {
            return halt_config(bag, "no VM to shut down");
        };
        let driver = bag.driver();
        let ui = bag.ui();
        let cancel = bag.cancel_token();

        match &self.method {
            ShutdownMethod::Guest => {
                ui.say("shutting down VM...");
                if let Err(e) = driver.shutdown_guest(&vm) {
                    return halt_driver(bag, "shutdown", e);
                }
            }
            ShutdownMethod::Command {
                communicator,
                host,
                command,
            } => {
                let Some(host) = guest_host(bag, host.as_deref()) else {
                    return halt_config(bag, "no guest address to run the shutdown command on");
                };
                ui.say("executing shutdown command...");
                // the connection usually drops while the guest goes down
                if let Err(e) = communicator.execute(&host, command) {
                    tracing::debug!("shutdown command returned an error: {:#}", e);
                }
            }
        }

        ui.say(&format!("waiting up to {}s for VM to power off...", self.timeout.as_secs()));
        match driver.wait_for_power_off(&vm, self.timeout, &cancel) {
            Ok(()) => {
                bag.remove::<bool>(keys::POWERED_ON);
                ui.say("VM is powered off");
                StepAction::Continue
            }
            Err(_) if cancel.is_cancelled() => halt(
                bag,
                VsforgeError::Cancelled("waiting for power off was cancelled".to_string()),
            ),
            Err(e) => halt_driver(bag, "wait for power off", e),
        }
    }
}
