//! Cooperative cancellation between tile-sized units of work.
//!
//! A [`CancelToken`] is a cloneable flag shared between a controller and
//! a worker. Workers poll it between tiles and stop at the next boundary,
//! keeping whatever partial result they have built; nothing is
//! interrupted mid-tile.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared cancellation flag.
///
/// Clones observe the same flag. Dropping every clone simply discards
/// the flag; there is no implicit cancel-on-drop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag; every clone sees it on the next poll.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True once any clone has cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Lowers the flag so the token can gate another run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}
