//! Advisory named mutex abstraction.
//!
//! Any operation that mutates a Product's quantity or processes an Event
//! first acquires an exclusive lock named `"{kind}:{id}"` from the durable
//! store, so exclusion holds across process boundaries. Acquisition is
//! bounded: timing out yields the recoverable `LockBusy`, while a backend
//! malfunction yields `LockFailure`. Release happens on every exit path via
//! the guard's `Drop`.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DomainResult;

/// Scoped holder of an advisory lock. Dropping it releases the lock.
pub struct LockGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LockGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Guard that releases nothing; for lock managers with external scoping.
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl core::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LockGuard")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// Named exclusive lock provider, typically backed by the durable store.
pub trait LockManager: Send + Sync {
    /// Acquire `name` exclusively, waiting at most `timeout`.
    fn acquire(&self, name: &str, timeout: Duration) -> DomainResult<LockGuard>;
}

impl<L> LockManager for Arc<L>
where
    L: LockManager + ?Sized,
{
    fn acquire(&self, name: &str, timeout: Duration) -> DomainResult<LockGuard> {
        (**self).acquire(name, timeout)
    }
}

/// Lock acquisition policy shared by the engines.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LockPolicy {
    /// Bounded wait for each acquisition.
    pub timeout: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

impl LockPolicy {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
