//! Single-flight access to an execution context that is not safe for
//! concurrent reuse.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::trace;

use crate::error::GuardError;

/// Exclusive, FIFO-ordered access to a shared value.
///
/// Callers queue at the lock in arrival order. The guarded closure runs on a
/// blocking worker thread so interpreter work never stalls the async
/// reactor. The lock is released when the closure returns, errors or
/// panics. If the awaiting caller goes away, the closure still runs to
/// completion while holding the lock.
pub struct ExecutionGuard<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for ExecutionGuard<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> ExecutionGuard<T> {
    /// Wrap a value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Run `f` with exclusive access to the guarded value.
    pub async fn with_exclusive_access<F, R>(&self, f: F) -> Result<R, GuardError>
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        let mut guard = Arc::clone(&self.inner).lock_owned().await;
        trace!("Execution guard acquired");

        let result = tokio::task::spawn_blocking(move || {
            let out = f(&mut guard);
            drop(guard);
            trace!("Execution guard released");
            out
        })
        .await;

        result.map_err(|e| GuardError::Worker(e.to_string()))
    }

    /// Run `f` with exclusive access from synchronous code.
    ///
    /// Must not be called from within an async execution context.
    pub fn with_exclusive_access_blocking<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.inner.blocking_lock();
        f(&mut guard)
    }

    /// Whether some caller currently holds the lock.
    pub fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
