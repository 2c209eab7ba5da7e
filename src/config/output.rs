//! Post-build output configuration: snapshot, export and content library.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::driver::{ExportFormat, ManifestAlgorithm, Placement};
use crate::error::VsforgeError;

/// Snapshot name used when none is configured.
pub const DEFAULT_SNAPSHOT_NAME: &str = "Created by vsforge";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub name: Option<String>,
}

impl SnapshotConfig {
    pub fn snapshot_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_SNAPSHOT_NAME)
    }
}

/// Local OVF/OVA export of the finished VM.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Directory receiving the exported files; relative paths resolve
    /// against the build file.
    pub output_directory: Utf8PathBuf,
    /// Base name of the exported files. Defaults to the VM name.
    #[serde(default)]
    pub name: Option<String>,
    /// Overwrite existing files in `output_directory`.
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub manifest: ManifestAlgorithm,
    /// Also export floppy and ISO images attached to the VM.
    #[serde(default)]
    pub image_files: bool,
}

impl ExportConfig {
    pub fn resolve_paths(&mut self, base_dir: &Utf8Path) {
        if self.output_directory.is_relative() {
            self.output_directory = base_dir.join(&self.output_directory);
        }
    }

    pub fn prepare(&self) -> Vec<VsforgeError> {
        let mut errs = Vec::new();
        if self.output_directory.as_str().trim().is_empty() {
            errs.push(VsforgeError::Validation(
                "'export.output_directory' is required".to_string(),
            ));
        } else if !self.force
            && let Ok(mut entries) = self.output_directory.read_dir_utf8()
            && entries.next().is_some()
        {
            errs.push(VsforgeError::Validation(format!(
                "export output directory '{}' is not empty; set 'force' to overwrite",
                self.output_directory
            )));
        }
        if let Some(name) = &self.name
            && (name.is_empty() || name.contains('/'))
        {
            errs.push(VsforgeError::Validation(format!(
                "'export.name' must be a plain file name, got '{}'",
                name
            )));
        }
        errs
    }
}

/// Publishes the finished VM to a content library.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ContentLibraryConfig {
    pub library: String,
    /// Library item name. Defaults to the VM name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Import as an OVF template instead of a VM template.
    #[serde(default)]
    pub ovf: bool,
    /// Destroy the source VM once the import has finished.
    #[serde(default)]
    pub destroy: bool,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub resource_pool: Option<String>,
    #[serde(default)]
    pub datastore: Option<String>,
}

impl ContentLibraryConfig {
    pub fn placement(&self) -> Placement {
        Placement {
            folder: self.folder.clone(),
            cluster: self.cluster.clone(),
            host: self.host.clone(),
            resource_pool: self.resource_pool.clone(),
            datastore: self.datastore.clone(),
        }
    }

    pub fn prepare(&self, convert_to_template: bool) -> Vec<VsforgeError> {
        let mut errs = Vec::new();
        if self.library.trim().is_empty() {
            errs.push(VsforgeError::Validation(
                "'content_library.library' is required".to_string(),
            ));
        }
        if !self.ovf && convert_to_template {
            errs.push(VsforgeError::Validation(
                "'convert_to_template' cannot be used with a VM template content library import; \
                set 'ovf' to publish an OVF template"
                    .to_string(),
            ));
        }
        if self.ovf
            && (self.cluster.is_some()
                || self.host.is_some()
                || self.resource_pool.is_some()
                || self.datastore.is_some())
        {
            errs.push(VsforgeError::Validation(
                "placement options are only supported for VM template content library imports"
                    .to_string(),
            ));
        }
        errs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_name_defaults() {
        assert_eq!(SnapshotConfig::default().snapshot_name(), DEFAULT_SNAPSHOT_NAME);
    }

    #[test]
    fn export_defaults_from_yaml() {
        let cfg: ExportConfig = serde_yaml::from_str("output_directory: out").unwrap();
        assert_eq!(cfg.format, ExportFormat::Ovf);
        assert_eq!(cfg.manifest, ManifestAlgorithm::Sha256);
        assert!(!cfg.force);
    }

    #[test]
    fn export_into_non_empty_directory_requires_force() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.ovf"), "x").unwrap();
        let mut cfg = ExportConfig {
            output_directory: Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(),
            name: None,
            force: false,
            format: ExportFormat::Ova,
            manifest: ManifestAlgorithm::None,
            image_files: false,
        };
        assert_eq!(cfg.prepare().len(), 1);
        cfg.force = true;
        assert!(cfg.prepare().is_empty());
    }

    #[test]
    fn vm_template_import_conflicts_with_template_conversion() {
        let cfg = ContentLibraryConfig {
            library: "images".to_string(),
            ..Default::default()
        };
        assert!(cfg.prepare(false).is_empty());
        assert_eq!(cfg.prepare(true).len(), 1);
    }
}
