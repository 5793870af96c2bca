use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Cloneable stop signal shared by the polling loop, the preview thread and
/// the Ctrl+C handler
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (lock, condvar) = &*self.inner;
        *lock_ignoring_poison(lock) = true;
        condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *lock_ignoring_poison(&self.inner.0)
    }

    /// Sleep for `timeout` or until cancelled, whichever comes first
    ///
    /// Returns true if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, condvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut cancelled = lock_ignoring_poison(lock);

        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            cancelled = match condvar.wait_timeout(cancelled, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }

        *cancelled
    }
}

// The flag is a plain bool, so a panic elsewhere cannot leave it half-written
fn lock_ignoring_poison(lock: &Mutex<bool>) -> MutexGuard<'_, bool> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
