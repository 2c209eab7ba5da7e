use crate::phase::{Step, StepAction};
use crate::state::{StateBag, keys};

/// Marks the VM for removal once the build finishes.
///
/// The VM itself is destroyed by the cleanup of the step that created it,
/// after every output step has run.
#[derive(Debug, Default)]
pub struct StepDestroy;

impl Step for StepDestroy {
    fn name(&self) -> &'static str {
        "destroy"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        bag.ui().say("the VM will be destroyed when the build finishes");
        bag.put(keys::DESTROY_VM, true);
        StepAction::Continue
    }
}
