//! Per-build state shared between steps.
//!
//! A [`StateBag`] lives for exactly one build. Steps exchange values through
//! string keys (see [`keys`]); absence of a key is a normal state. The
//! driver, UI sink and cancellation token are fixed at construction.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::driver::{Driver, VmHandle};
use crate::error::VsforgeError;
use crate::ui::Ui;

/// Well-known state bag keys.
pub mod keys {
    /// [`VmHandle`](crate::driver::VmHandle) of the VM being built.
    pub const VM: &str = "vm";
    /// `bool`: destroy the VM during cleanup even if the build succeeded.
    pub const DESTROY_VM: &str = "destroy_vm";
    /// `bool`: the driver session is open.
    pub const SESSION_OPEN: &str = "session_open";
    /// [`TaskRef`](crate::driver::TaskRef) of an in-flight deployment.
    pub const DEPLOY_TASK: &str = "deploy_task";
    /// [`MonitorRef`](crate::driver::MonitorRef) of a deployment's progress monitor.
    pub const DEPLOY_MONITOR: &str = "deploy_monitor";
    /// [`LeaseRef`](crate::driver::LeaseRef) held by a deployment.
    pub const NFC_LEASE: &str = "nfc_lease";
    /// `String`: datastore path of an uploaded floppy image.
    pub const UPLOADED_FLOPPY: &str = "uploaded_floppy";
    /// `bool`: a floppy drive is attached.
    pub const FLOPPY_ATTACHED: &str = "floppy_attached";
    /// `bool`: the VM was powered on by the build.
    pub const POWERED_ON: &str = "powered_on";
    /// [`IpAddr`](std::net::IpAddr) reported by the guest.
    pub const IP: &str = "ip";
    /// [`ExportOutput`](crate::driver::ExportOutput) of a finished export.
    pub const EXPORT_OUTPUT: &str = "export_output";
    /// `String`: content library item id.
    pub const LIBRARY_ITEM: &str = "library_item";
    /// `bool`: the VM was converted to a template.
    pub const TEMPLATE: &str = "template";
}

/// Mutable store for one build.
pub struct StateBag {
    driver: Arc<dyn Driver>,
    ui: Arc<dyn Ui>,
    cancel: CancellationToken,
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
    error: Option<VsforgeError>,
}

impl StateBag {
    pub fn new(driver: Arc<dyn Driver>, ui: Arc<dyn Ui>, cancel: CancellationToken) -> Self {
        Self {
            driver,
            ui,
            cancel,
            values: HashMap::new(),
            error: None,
        }
    }

    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }

    pub fn ui(&self) -> Arc<dyn Ui> {
        Arc::clone(&self.ui)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn put<T: Any + Send + Sync>(&mut self, key: &str, value: T) {
        self.values.insert(key.to_string(), Box::new(value));
    }

    /// Returns the value under `key` if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns true if `key` holds `true`.
    pub fn flag(&self, key: &str) -> bool {
        self.get::<bool>(key).copied().unwrap_or(false)
    }

    /// Removes and returns the value under `key`.
    ///
    /// A value of a different type is left in place and `None` is returned.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.values.get(key).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        self.values
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    pub fn vm(&self) -> Option<&VmHandle> {
        self.get::<VmHandle>(keys::VM)
    }

    pub fn set_vm(&mut self, vm: VmHandle) {
        self.put(keys::VM, vm);
    }

    /// Records the terminal build error.
    ///
    /// Only the first error is kept; it is stored sanitized. Returns false if
    /// an error was already recorded.
    pub fn set_error(&mut self, err: VsforgeError) -> bool {
        if self.error.is_some() {
            tracing::debug!("build error already recorded, dropping: {}", err);
            return false;
        }
        self.error = Some(err.sanitized());
        true
    }

    pub fn error(&self) -> Option<&VsforgeError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<VsforgeError> {
        self.error.take()
    }
}

impl std::fmt::Debug for StateBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("StateBag")
            .field("keys", &keys)
            .field("error", &self.error)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
