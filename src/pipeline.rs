//! Pipeline orchestrator for executing build steps in phases.
//!
//! Steps run strictly in order across three phases:
//!
//! 1. **Prepare**: connect, create the VM and configure it while powered off
//! 2. **Provision**: boot the VM, reach the guest and provision it
//! 3. **Assemble**: produce outputs from the finished VM
//!
//! Each step that starts is pushed onto a cleanup stack. However the run
//! ends (completion, halt, cancellation or panic) the stack is unwound and
//! `cleanup` is called on every started step, most recent first.

use tracing::{debug, info};

use crate::error::VsforgeError;
use crate::phase::{Step, StepAction};
use crate::state::StateBag;

const PHASE_PREPARE: &str = "prepare";
const PHASE_PROVISION: &str = "provision";
const PHASE_ASSEMBLE: &str = "assemble";

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step returned `Continue`.
    Completed,
    /// A step returned `Halt`; the bag holds the error.
    Halted {
        /// Name of the step that halted.
        step: &'static str,
    },
    /// Cancellation was observed before a step started.
    Cancelled {
        /// Name of the step that did not start.
        before: &'static str,
    },
}

/// Ordered list of build steps.
pub struct Pipeline {
    prepare: Vec<Box<dyn Step>>,
    provision: Vec<Box<dyn Step>>,
    assemble: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new(
        prepare: Vec<Box<dyn Step>>,
        provision: Vec<Box<dyn Step>>,
        assemble: Vec<Box<dyn Step>>,
    ) -> Self {
        Self {
            prepare,
            provision,
            assemble,
        }
    }

    /// Returns true if the pipeline has no steps.
    pub fn is_empty(&self) -> bool {
        self.total_steps() == 0
    }

    /// Returns the total number of steps across all phases.
    pub fn total_steps(&self) -> usize {
        self.prepare.len() + self.provision.len() + self.assemble.len()
    }

    /// Returns the step names in execution order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.prepare
            .iter()
            .chain(&self.provision)
            .chain(&self.assemble)
            .map(|s| s.name())
            .collect()
    }

    /// Runs every step in order, then cleans up the started ones in reverse.
    pub fn run(&mut self, bag: &mut StateBag) -> RunOutcome {
        if self.is_empty() {
            return RunOutcome::Completed;
        }

        info!("starting pipeline with {} step(s)", self.total_steps());

        let total = self.total_steps();
        let steps = self
            .prepare
            .iter_mut()
            .map(|s| (PHASE_PREPARE, s))
            .chain(self.provision.iter_mut().map(|s| (PHASE_PROVISION, s)))
            .chain(self.assemble.iter_mut().map(|s| (PHASE_ASSEMBLE, s)));

        let mut stack = CleanupStack {
            started: Vec::with_capacity(total),
            bag,
        };

        for (index, (phase, step)) in steps.enumerate() {
            let name = step.name();
            if stack.bag.is_cancelled() {
                info!("cancelled before {} step {}", phase, name);
                stack.bag.set_error(VsforgeError::Cancelled(format!(
                    "build cancelled before step '{}'",
                    name
                )));
                return RunOutcome::Cancelled { before: name };
            }

            info!("running {} step {}/{}: {}", phase, index + 1, total, name);
            stack.started.push(step);
            let action = match stack.started.last_mut() {
                Some(step) => step.run(stack.bag),
                None => StepAction::Halt,
            };

            if action == StepAction::Halt {
                info!("{} step {} halted the build", phase, name);
                return RunOutcome::Halted { step: name };
            }
        }

        info!("pipeline completed successfully");
        RunOutcome::Completed
    }
}

/// Steps that have started, cleaned up in reverse order on drop.
struct CleanupStack<'s, 'b> {
    started: Vec<&'s mut Box<dyn Step>>,
    bag: &'b mut StateBag,
}

impl Drop for CleanupStack<'_, '_> {
    fn drop(&mut self) {
        while let Some(step) = self.started.pop() {
            debug!("cleaning up step {}", step.name());
            step.cleanup(self.bag);
        }
    }
}
