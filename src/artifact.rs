//! Result of a successful build.

use std::fmt;

use camino::Utf8PathBuf;
use strum::Display;

use crate::config::LocationConfig;
use crate::driver::{ExportOutput, VmHandle};
use crate::state::{StateBag, keys};

/// What is left in the inventory once the build has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactState {
    /// A regular, powered-off VM.
    Vm,
    /// The VM was converted to a template.
    Template,
    /// The VM was destroyed after its outputs were produced.
    Destroyed,
}

/// Summary of a finished build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub name: String,
    pub id: String,
    pub datacenter: String,
    pub location: LocationConfig,
    /// Directory holding exported files, if the VM was exported.
    pub output_dir: Option<Utf8PathBuf>,
    pub exported_files: Vec<Utf8PathBuf>,
    /// Content library item id, if the VM was published.
    pub library_item: Option<String>,
    pub state: ArtifactState,
}

impl BuildArtifact {
    /// Assembles the artifact from the final state of a build.
    ///
    /// Returns `None` if no VM was produced.
    pub fn from_state(bag: &StateBag, location: &LocationConfig) -> Option<Self> {
        let vm: &VmHandle = bag.vm()?;
        let export = bag.get::<ExportOutput>(keys::EXPORT_OUTPUT);

        let state = if bag.flag(keys::DESTROY_VM) {
            ArtifactState::Destroyed
        } else if bag.flag(keys::TEMPLATE) {
            ArtifactState::Template
        } else {
            ArtifactState::Vm
        };

        Some(Self {
            name: vm.name.clone(),
            id: vm.id.clone(),
            datacenter: vm.datacenter.clone(),
            location: location.clone(),
            output_dir: export.map(|e| e.directory.clone()),
            exported_files: export.map(|e| e.files.clone()).unwrap_or_default(),
            library_item: bag.get::<String>(keys::LIBRARY_ITEM).cloned(),
            state,
        })
    }
}

impl fmt::Display for BuildArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}) in datacenter {}",
            self.state, self.name, self.id, self.datacenter
        )?;
        if let Some(folder) = &self.location.folder {
            write!(f, ", folder {}", folder)?;
        }
        if let Some(dir) = &self.output_dir {
            write!(f, "; exported {} file(s) to {}", self.exported_files.len(), dir)?;
        }
        if let Some(item) = &self.library_item {
            write!(f, "; content library item {}", item)?;
        }
        Ok(())
    }
}
