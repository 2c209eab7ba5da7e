use std::net::IpAddr;
use std::sync::Arc;

use tracing::debug;

use crate::config::ProvisionerConfig;
use crate::driver::Communicator;
use crate::error::VsforgeError;
use crate::phase::{Step, StepAction, halt, halt_config, halt_driver};
use crate::sanitize::sanitize_error_message;
use crate::state::{StateBag, keys};

/// Returns the host to reach the guest on: the override, else the address
/// found by the IP wait.
pub(crate) fn guest_host(bag: &StateBag, host_override: Option<&str>) -> Option<String> {
    host_override
        .map(str::to_string)
        .or_else(|| bag.get::<IpAddr>(keys::IP).map(ToString::to_string))
}

/// Runs the configured provisioners through the communicator.
pub struct StepProvision {
    communicator: Arc<dyn Communicator>,
    host: Option<String>,
    provisioners: Vec<ProvisionerConfig>,
}

impl StepProvision {
    pub fn new(
        communicator: Arc<dyn Communicator>,
        host: Option<String>,
        provisioners: Vec<ProvisionerConfig>,
    ) -> Self {
        Self {
            communicator,
            host,
            provisioners,
        }
    }
}

impl Step for StepProvision {
    fn name(&self) -> &'static str {
        "provision"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let Some(host) = guest_host(bag, self.host.as_deref()) else {
            return halt_config(bag, "no guest address to provision; set 'communicator.host'");
        };
        let ui = bag.ui();
        let total = self.provisioners.len();

        for (index, provisioner) in self.provisioners.iter().enumerate() {
            ui.say(&format!(
                "running provisioner {}/{} ({}) over {}...",
                index + 1,
                total,
                provisioner.name(),
                self.communicator.name()
            ));
            match provisioner {
                ProvisionerConfig::Shell(shell) => {
                    for command in shell.inline.iter().filter(|c| !c.trim().is_empty()) {
                        if bag.is_cancelled() {
                            return halt(
                                bag,
                                VsforgeError::Cancelled("provisioning was cancelled".to_string()),
                            );
                        }
                        debug!("executing: {}", sanitize_error_message(command));
                        let status = match self.communicator.execute(&host, command) {
                            Ok(status) => status,
                            Err(e) => {
                                return halt_driver(bag, &format!("provisioner {}", index + 1), e);
                            }
                        };
                        if !shell.valid_exit_codes.contains(&status) {
                            return halt(
                                bag,
                                VsforgeError::Driver {
                                    operation: format!("provisioner {}", index + 1),
                                    message: format!(
                                        "command '{}' exited with status {}",
                                        command, status
                                    ),
                                },
                            );
                        }
                    }
                }
            }
        }
        StepAction::Continue
    }
}
