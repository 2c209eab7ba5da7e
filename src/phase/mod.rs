//! Build steps, grouped by phase.
//!
//! ## Phase structure
//!
//! - [`prepare`]: connect, create the VM and configure it while powered off
//! - [`provision`]: boot the VM, reach the guest, provision and shut down
//! - [`assemble`]: produce outputs (snapshot, template, export, library)
//!
//! Every step implements [`Step`]. The pipeline calls `cleanup` on each
//! step that started, in reverse order, whatever the outcome of the build.

pub mod assemble;
pub mod prepare;
pub mod provision;

use tracing::{debug, warn};

use crate::error::VsforgeError;
use crate::sanitize::sanitize_error_message;
use crate::state::{StateBag, keys};

/// What the pipeline does after a step's `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    Continue,
    Halt,
}

/// A unit of work in the build pipeline.
pub trait Step {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Performs the step.
    ///
    /// On failure the step records the error in the bag (see [`halt`]) and
    /// returns [`StepAction::Halt`].
    fn run(&mut self, bag: &mut StateBag) -> StepAction;

    /// Releases whatever `run` acquired.
    ///
    /// Called even if `run` halted part-way. Must only act on state it
    /// recognizes and must not panic; failures are reported, not returned.
    fn cleanup(&mut self, _bag: &mut StateBag) {}
}

/// Records `err` as the build error, reports it and halts.
pub(crate) fn halt(bag: &mut StateBag, err: VsforgeError) -> StepAction {
    let err = err.sanitized();
    bag.ui().error(&err.to_string());
    bag.set_error(err);
    StepAction::Halt
}

/// Halts with a [`VsforgeError::Driver`] built from a driver failure.
///
/// Typed errors coming back from the driver (e.g., `AlreadyExists`) are
/// kept as they are.
pub(crate) fn halt_driver(bag: &mut StateBag, operation: &str, err: anyhow::Error) -> StepAction {
    let err = match err.downcast::<VsforgeError>() {
        Ok(typed) => typed,
        Err(other) => VsforgeError::driver(operation, other),
    };
    halt(bag, err)
}

/// Halts with a configuration error raised by a step that found its input
/// in a state validation should have rejected.
pub(crate) fn halt_config(bag: &mut StateBag, message: impl Into<String>) -> StepAction {
    halt(bag, VsforgeError::Config(message.into()))
}

/// Reports a failed best-effort cleanup action without failing the build.
pub(crate) fn report_cleanup_error(bag: &StateBag, what: &str, err: &anyhow::Error) {
    let message = sanitize_error_message(&format!("error {}: {:#}", what, err));
    warn!("{}", message);
    bag.ui().error(&message);
}

/// Tears down the VM when the build failed, was cancelled, or asked for it.
///
/// The VM is powered off (if running) and destroyed. Used by the steps that
/// create the VM. Failures are reported and otherwise ignored.
pub fn cleanup_vm(bag: &mut StateBag) {
    let failed = bag.error().is_some() || bag.is_cancelled();
    if !failed && !bag.flag(keys::DESTROY_VM) {
        return;
    }
    let Some(vm) = bag.vm().cloned() else {
        debug!("no VM to destroy");
        return;
    };

    let driver = bag.driver();
    bag.ui().say(&format!("destroying VM {}...", vm.path));

    match driver.is_powered_on(&vm) {
        Ok(true) => {
            if let Err(e) = driver.power_off(&vm) {
                report_cleanup_error(bag, "powering off VM", &e);
            }
        }
        Ok(false) => {}
        Err(e) => report_cleanup_error(bag, "reading VM power state", &e),
    }

    if let Err(e) = driver.destroy_vm(&vm) {
        report_cleanup_error(bag, "destroying VM", &e);
    }
}
