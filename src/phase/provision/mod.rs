//! Provision phase: boot the VM, reach the guest, provision and shut down.

pub mod power;
pub mod shell;
pub mod shutdown;
pub mod wait_ip;

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

pub use power::{StepBootCommand, StepPowerOn};
pub use shell::StepProvision;
pub use shutdown::{ShutdownMethod, StepShutdown};
pub use wait_ip::StepWaitForIp;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Sleeps for `duration` unless `cancel` fires first.
///
/// Returns false if the wait was cut short by cancellation.
pub(crate) fn sleep_cancellable(duration: Duration, cancel: &CancellationToken) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(CANCEL_POLL_INTERVAL.min(deadline - now));
    }
}
