//! Assemble phase: produce outputs from the finished VM.

pub mod destroy;
pub mod export;
pub mod library;
pub mod media;
pub mod snapshot;

pub use destroy::StepDestroy;
pub use export::StepExport;
pub use library::StepImportToLibrary;
pub use media::StepRemoveMedia;
pub use snapshot::{StepConvertToTemplate, StepCreateSnapshot};
