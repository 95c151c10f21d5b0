//! Scoped `FOREIGN_KEY_CHECKS` management on the destination.
//!
//! The guard is the only code that touches the flag. There is no async drop,
//! so the orchestrator runs acquire / body / release explicitly and combines
//! the two outcomes with [`settle`].

use tracing::{debug, warn};

use crate::error::Result;
use crate::session::{value_to_i64, Session};

/// Holds the destination's original `FOREIGN_KEY_CHECKS` value while checks
/// are disabled.
#[derive(Debug)]
pub struct ConstraintGuard {
    original: i64,
    released: bool,
}

impl ConstraintGuard {
    /// Read the current flag and disable foreign key checks.
    pub async fn acquire<S: Session + ?Sized>(dest: &mut S) -> Result<Self> {
        let original = dest
            .scalar("SELECT @@FOREIGN_KEY_CHECKS", Vec::new())
            .await?
            .as_ref()
            .and_then(value_to_i64)
            .unwrap_or(1);
        dest.execute("SET FOREIGN_KEY_CHECKS = 0").await?;
        debug!("FOREIGN_KEY_CHECKS disabled (was {})", original);
        Ok(Self {
            original,
            released: false,
        })
    }

    pub fn original(&self) -> i64 {
        self.original
    }

    /// Restore the original value. Consumes the guard.
    pub async fn release<S: Session + ?Sized>(mut self, dest: &mut S) -> Result<()> {
        self.released = true;
        dest.execute(&format!("SET FOREIGN_KEY_CHECKS = {}", self.original))
            .await?;
        debug!("FOREIGN_KEY_CHECKS restored to {}", self.original);
        Ok(())
    }
}

impl Drop for ConstraintGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                "FOREIGN_KEY_CHECKS guard dropped without release; destination session keeps checks disabled (original value {})",
                self.original
            );
        }
    }
}

/// Combine the outcome of the guarded body with the outcome of the restore.
///
/// The body's error wins; a restore failure after a successful body is
/// returned as the error.
pub fn settle<T>(outcome: Result<T>, restored: Result<()>) -> Result<T> {
    match (outcome, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(restore_err)) => Err(restore_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(restore_err)) => {
            warn!(
                "Failed to restore FOREIGN_KEY_CHECKS after error: {}",
                restore_err
            );
            Err(err)
        }
    }
}
