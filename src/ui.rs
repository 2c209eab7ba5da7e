//! Line-oriented progress output for a build.
//!
//! Steps report progress through [`Ui`] rather than logging directly so the
//! surrounding program decides where messages go. Callers are expected to
//! sanitize anything that may contain driver-supplied text before passing it
//! here; see [`crate::sanitize`].

use tracing::{error, info};

/// Output sink for build progress and errors.
pub trait Ui: Send + Sync {
    /// Reports a progress message.
    fn say(&self, message: &str);

    /// Reports an error message.
    fn error(&self, message: &str);
}

/// [`Ui`] implementation that forwards messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingUi;

impl Ui for TracingUi {
    fn say(&self, message: &str) {
        info!("{}", message);
    }

    fn error(&self, message: &str) {
        error!("{}", message);
    }
}
