//! Progress reporting and cooperative cancellation.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{CloneError, Result};

/// Receives human-readable progress messages.
pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Progress side channel. Every message is logged; the callback, when set,
/// receives it too.
#[derive(Clone, Default)]
pub struct Progress {
    callback: Option<ProgressCallback>,
}

impl Progress {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    pub fn notify(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{}", message);
        if let Some(callback) = &self.callback {
            callback(message);
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// What every step of a clone needs besides the connections.
#[derive(Debug, Clone, Default)]
pub struct CloneContext {
    pub progress: Progress,
    pub cancel: CancellationToken,
}

impl CloneContext {
    pub fn new(progress: Progress, cancel: CancellationToken) -> Self {
        Self { progress, cancel }
    }

    /// Called at the start of every table / object step.
    pub fn ensure_not_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(CloneError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn notify(&self, message: impl AsRef<str>) {
        self.progress.notify(message);
    }
}
