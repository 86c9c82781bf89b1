//! Cooperative cancellation.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::DiffError;

/// A cloneable flag that aborts a running diff.
///
/// Clones share the same flag. The engine polls it at coarse granularity
/// (once per aligned pair of nodes and once per LCS table row), so a
/// cancelled diff stops promptly and returns [`DiffError::Cancelled`]
/// without a partial result.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every diff observing this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Return `Err(DiffError::Cancelled)` if cancellation was requested.
    #[inline]
    pub fn check(&self) -> Result<(), DiffError> {
        if self.is_cancelled() {
            Err(DiffError::Cancelled)
        } else {
            Ok(())
        }
    }
}
