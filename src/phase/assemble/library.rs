use crate::config::ContentLibraryConfig;
use crate::driver::LibraryImport;
use crate::phase::{Step, StepAction, halt_config, halt_driver};
use crate::state::{StateBag, keys};

/// Publishes the VM to a content library.
#[derive(Debug)]
pub struct StepImportToLibrary {
    config: ContentLibraryConfig,
}

impl StepImportToLibrary {
    pub fn new(config: ContentLibraryConfig) -> Self {
        Self { config }
    }
}

impl Step for StepImportToLibrary {
    fn name(&self) -> &'static str {
        "content-library"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let Some(vm) = bag.vm().cloned() else {
            return halt_config(bag, "no VM to import");
        };

        let request = LibraryImport {
            library: self.config.library.clone(),
            name: self.config.name.clone().unwrap_or_else(|| vm.name.clone()),
            description: self.config.description.clone(),
            placement: self.config.placement(),
            ovf: self.config.ovf,
        };

        bag.ui().say(&format!(
            "importing {} into content library {} as {}...",
            vm.name, request.library, request.name
        ));
        match bag.driver().import_to_library(&vm, &request) {
            Ok(item) => {
                bag.put(keys::LIBRARY_ITEM, item);
                if self.config.destroy {
                    bag.put(keys::DESTROY_VM, true);
                }
                StepAction::Continue
            }
            Err(e) => halt_driver(bag, "import to content library", e),
        }
    }
}
