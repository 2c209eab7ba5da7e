//! Prepare phase: connect, create the VM and configure it while powered off.

pub mod boot;
pub mod clone;
pub mod connect;
pub mod customize;
pub mod hardware;
pub mod media;

pub use boot::StepBootOrder;
pub use clone::{DEFAULT_OVF_LOCALE, StepCreateVm};
pub use connect::StepConnect;
pub use customize::{StepCustomize, build_customization_spec, derive_nic_settings};
pub use hardware::StepConfigureHardware;
pub use media::{FloppySource, StepAddCdrom, StepAddFloppy};
