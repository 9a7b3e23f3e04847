//! Cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Raised by any computation that observed a cancellation request
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("generation pass was cancelled")]
pub struct Cancelled;

/// A shareable "should stop" flag
///
/// Clones observe the same flag. [`CancellationToken::none`] never cancels
/// and costs nothing to poll.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Option<Arc<AtomicBool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            flag: Some(Arc::new(AtomicBool::new(false))),
        }
    }

    /// A token that can never be cancelled
    pub fn none() -> Self {
        Self { flag: None }
    }

    /// Request cancellation; every clone observes it
    pub fn cancel(&self) {
        if let Some(flag) = &self.flag {
            flag.store(true, Ordering::Release);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    /// Poll point: `Err(Cancelled)` once cancellation was requested
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
