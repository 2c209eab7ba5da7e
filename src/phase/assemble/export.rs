use std::sync::Arc;

use crate::config::ExportConfig;
use crate::driver::{ExportRequest, Exporter};
use crate::error::VsforgeError;
use crate::phase::{Step, StepAction, halt, halt_config};
use crate::state::{StateBag, keys};

/// Exports the VM to local OVF/OVA files.
pub struct StepExport {
    exporter: Arc<dyn Exporter>,
    config: ExportConfig,
}

impl StepExport {
    pub fn new(exporter: Arc<dyn Exporter>, config: ExportConfig) -> Self {
        Self { exporter, config }
    }
}

impl Step for StepExport {
    fn name(&self) -> &'static str {
        "export"
    }

    fn run(&mut self, bag: &mut StateBag) -> StepAction {
        let Some(vm) = bag.vm().cloned() else {
            return halt_config(bag, "no VM to export");
        };
        let cancel = bag.cancel_token();

        let request = ExportRequest {
            name: self.config.name.clone().unwrap_or_else(|| vm.name.clone()),
            output_directory: self.config.output_directory.clone(),
            force: self.config.force,
            format: self.config.format,
            manifest: self.config.manifest,
            image_files: self.config.image_files,
        };

        bag.ui().say(&format!(
            "exporting {} as {} to {}...",
            vm.name, request.format, request.output_directory
        ));
        match self.exporter.export(&vm, &request, &cancel) {
            Ok(output) => {
                bag.ui()
                    .say(&format!("exported {} file(s)", output.files.len()));
                bag.put(keys::EXPORT_OUTPUT, output);
                StepAction::Continue
            }
            Err(_) if cancel.is_cancelled() => {
                halt(bag, VsforgeError::Cancelled("export was cancelled".to_string()))
            }
            Err(e) => halt(bag, VsforgeError::driver("export", e)),
        }
    }
}
