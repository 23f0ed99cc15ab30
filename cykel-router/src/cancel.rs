use crate::RoutingError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// A cooperative cancellation token.
///
/// The search checks the token at every expansion, so a cancelled or
/// timed-out query unwinds promptly, releasing its tile references without
/// touching shared state. Cloning is cheap and all clones observe the same
/// cancellation.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that never fires unless [`CancelToken::cancel`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that additionally fires once the deadline passes.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: Some(deadline),
            }),
        }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns the appropriate error if the query should stop.
    ///
    /// # Errors
    ///
    /// [`RoutingError::Cancelled`] after [`CancelToken::cancel`], or
    /// [`RoutingError::DeadlineExceeded`] once the deadline has passed.
    pub fn check(&self) -> Result<(), RoutingError> {
        if self.inner.cancelled.load(Ordering::Relaxed) {
            return Err(RoutingError::Cancelled);
        }
        if let Some(deadline) = self.inner.deadline
            && Instant::now() >= deadline
        {
            return Err(RoutingError::DeadlineExceeded);
        }
        Ok(())
    }
}
