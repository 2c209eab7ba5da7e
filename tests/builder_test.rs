//! Tests for step selection and whole-build runs against a mock driver.

mod helpers;

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use helpers::{BASE_YAML, MockDriver, RecordingUi, load_config_from_yaml, vm};
use vsforge::artifact::ArtifactState;
use vsforge::builder::{Capabilities, build_pipeline, run_pipeline};
use vsforge::driver::{DryRunCommunicator, DryRunExporter};
use vsforge::error::VsforgeError;

fn caps(driver: &Arc<MockDriver>) -> (Capabilities, Arc<RecordingUi>) {
    let ui = Arc::new(RecordingUi::default());
    (Capabilities::new(driver.clone(), ui.clone()), ui)
}

fn driver() -> Arc<MockDriver> {
    Arc::new(MockDriver::new().with_vm("ubuntu-tmpl", vm("ubuntu-tmpl")))
}

#[test]
fn test_minimal_pipeline_steps() -> Result<()> {
    let config = load_config_from_yaml(BASE_YAML)?;
    let (caps, _ui) = caps(&driver());

    let pipeline = build_pipeline(&config, &caps)?;

    assert_eq!(
        pipeline.step_names(),
        ["connect", "create-vm", "power-on", "wait-for-ip", "shutdown"]
    );
    Ok(())
}

#[test]
fn test_full_pipeline_steps_in_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let out = camino::Utf8Path::from_path(dir.path()).unwrap().join("out");
    let yaml = format!(
        "{}hardware:\n  cpus: 2\n  ram: 4096\n\
         customize:\n  linux_options:\n    host_name: web-01\n  network_interface:\n    - {{}}\n\
         cdrom:\n  iso_paths: ['[ds1] iso/tools.iso']\n  remove_cdrom: true\n\
         floppy:\n  datastore_image: '[ds1] floppies/seed.flp'\n\
         boot:\n  order: [disk, cdrom]\n  wait: 0\n  command: ['<enter>']\n\
         provisioners:\n  - type: shell\n    inline: [uptime]\n\
         snapshot:\n  create: true\n\
         export:\n  output_directory: {}\n\
         content_library:\n  library: golden\n  ovf: true\n\
         convert_to_template: true\n\
         destroy: true\n",
        BASE_YAML, out
    );
    let config = load_config_from_yaml(yaml)?;
    config.validate()?;
    let (caps, _ui) = caps(&driver());
    let caps = caps
        .with_communicator(Arc::new(DryRunCommunicator))
        .with_exporter(Arc::new(DryRunExporter));

    let pipeline = build_pipeline(&config, &caps)?;

    assert_eq!(
        pipeline.step_names(),
        [
            "connect",
            "create-vm",
            "customize",
            "configure-hardware",
            "add-cdrom",
            "add-floppy",
            "boot-order",
            "power-on",
            "boot-command",
            "wait-for-ip",
            "provision",
            "shutdown",
            "remove-media",
            "create-snapshot",
            "convert-to-template",
            "export",
            "content-library",
            "destroy",
        ]
    );
    Ok(())
}

#[test]
fn test_provisioners_need_a_communicator_capability() -> Result<()> {
    let yaml = format!("{}provisioners:\n  - type: shell\n    inline: [uptime]\n", BASE_YAML);
    let config = load_config_from_yaml(yaml)?;
    let (caps, _ui) = caps(&driver());

    let err = build_pipeline(&config, &caps).err().unwrap();
    assert_eq!(
        err.to_string(),
        "configuration error: provisioning requires a communicator, but none is available"
    );
    Ok(())
}

#[test]
fn test_successful_build_produces_artifact() -> Result<()> {
    let yaml = format!(
        "{}communicator:\n  type: none\nsnapshot:\n  create: true\nconvert_to_template: true\n",
        BASE_YAML
    );
    let config = load_config_from_yaml(yaml)?;
    let driver = driver();
    let (caps, ui) = caps(&driver);

    let artifact = run_pipeline(&config, caps)?;

    assert_eq!(artifact.name, "web-01");
    assert_eq!(artifact.datacenter, "dc1");
    assert_eq!(artifact.state, ArtifactState::Template);
    assert!(driver.called("create_snapshot:Created by vsforge"));
    assert!(driver.called("convert_to_template:web-01"));
    assert!(driver.called("disconnect"));
    assert!(!driver.called("destroy_vm"));
    assert!(!driver.called("wait_for_ip"));
    assert!(ui.errors().is_empty());
    Ok(())
}

#[test]
fn test_failed_step_tears_down_vm_and_reports_error() -> Result<()> {
    let config = load_config_from_yaml(format!("{}communicator:\n  type: none\n", BASE_YAML))?;
    let driver = Arc::new(
        MockDriver::new()
            .with_vm("ubuntu-tmpl", vm("ubuntu-tmpl"))
            .failing("shutdown_guest"),
    );
    let (caps, ui) = caps(&driver);

    let err = run_pipeline(&config, caps).unwrap_err();

    assert_eq!(err.to_string(), "shutdown failed: shutdown_guest exploded");
    let calls = driver.calls();
    let power_off = calls.iter().position(|c| c == "power_off:web-01");
    let destroy = calls.iter().position(|c| c == "destroy_vm:web-01");
    let disconnect = calls.iter().position(|c| c == "disconnect");
    assert!(power_off.is_some());
    assert!(destroy > power_off);
    assert!(disconnect > destroy);
    assert_eq!(ui.errors(), ["shutdown failed: shutdown_guest exploded"]);
    Ok(())
}

#[test]
fn test_destroy_removes_vm_after_outputs() -> Result<()> {
    let yaml = format!(
        "{}communicator:\n  type: none\ncontent_library:\n  library: golden\n  destroy: true\n",
        BASE_YAML
    );
    let config = load_config_from_yaml(yaml)?;
    let driver = driver();
    let (caps, _ui) = caps(&driver);

    let artifact = run_pipeline(&config, caps)?;

    assert_eq!(artifact.state, ArtifactState::Destroyed);
    assert_eq!(artifact.library_item.as_deref(), Some("item-1"));
    assert!(driver.called("destroy_vm:web-01"));
    Ok(())
}

#[test]
fn test_cancelled_build_reports_cancellation() -> Result<()> {
    let config = load_config_from_yaml(BASE_YAML)?;
    let driver = driver();
    let (caps, _ui) = caps(&driver);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = run_pipeline(&config, caps.with_cancel(cancel)).unwrap_err();

    assert!(matches!(err, VsforgeError::Cancelled(_)));
    assert!(driver.calls().is_empty());
    Ok(())
}
