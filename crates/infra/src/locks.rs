//! In-memory advisory named lock manager.
//!
//! Production deployments back `LockManager` with the durable store (a lock
//! table or row locks) so exclusion holds across processes; this
//! implementation covers single-process use and tests. Waits are
//! deadline-based on a condvar; timing out yields the recoverable
//! `LockBusy`, a poisoned table yields `LockFailure`.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use warehause_core::{DomainError, DomainResult, LockGuard, LockManager};

#[derive(Default)]
struct LockTable {
    held: Mutex<HashSet<String>>,
    freed: Condvar,
}

/// Process-local named exclusive locks.
#[derive(Default, Clone)]
pub struct InMemoryLockManager {
    table: Arc<LockTable>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names currently held; diagnostic only.
    pub fn held(&self) -> Vec<String> {
        self.table
            .held
            .lock()
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl LockManager for InMemoryLockManager {
    fn acquire(&self, name: &str, timeout: Duration) -> DomainResult<LockGuard> {
        let deadline = Instant::now() + timeout;

        let mut held = self.table.held.lock().map_err(|_| DomainError::LockFailure {
            name: name.to_string(),
            detail: "lock table poisoned".to_string(),
        })?;

        while held.contains(name) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DomainError::LockBusy {
                    name: name.to_string(),
                    waited_ms: timeout.as_millis() as u64,
                });
            }

            let (guard, wait) = self
                .table
                .freed
                .wait_timeout(held, remaining)
                .map_err(|_| DomainError::LockFailure {
                    name: name.to_string(),
                    detail: "lock table poisoned".to_string(),
                })?;
            held = guard;

            if wait.timed_out() && held.contains(name) {
                return Err(DomainError::LockBusy {
                    name: name.to_string(),
                    waited_ms: timeout.as_millis() as u64,
                });
            }
        }

        held.insert(name.to_string());

        let table = Arc::clone(&self.table);
        let key = name.to_string();
        Ok(LockGuard::new(move || {
            if let Ok(mut held) = table.held.lock() {
                held.remove(&key);
                table.freed.notify_all();
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn second_acquisition_times_out_busy() {
        let locks = InMemoryLockManager::new();
        let _guard = locks.acquire("product:a", Duration::from_millis(50)).unwrap();

        let err = locks
            .acquire("product:a", Duration::from_millis(20))
            .unwrap_err();
        assert_eq!(err.code(), "lock_busy");
        assert!(err.is_retriable());
    }

    #[test]
    fn distinct_names_do_not_contend() {
        let locks = InMemoryLockManager::new();
        let _a = locks.acquire("product:a", Duration::from_millis(20)).unwrap();
        let _b = locks.acquire("product:b", Duration::from_millis(20)).unwrap();
    }

    #[test]
    fn dropping_the_guard_releases() {
        let locks = InMemoryLockManager::new();
        {
            let _guard = locks.acquire("event:x", Duration::from_millis(20)).unwrap();
            assert_eq!(locks.held(), vec!["event:x".to_string()]);
        }
        assert!(locks.held().is_empty());
        assert!(locks.acquire("event:x", Duration::from_millis(20)).is_ok());
    }

    #[test]
    fn waiter_proceeds_once_holder_drops() {
        let locks = InMemoryLockManager::new();
        let guard = locks.acquire("event:x", Duration::from_millis(50)).unwrap();

        let contender = {
            let locks = locks.clone();
            thread::spawn(move || locks.acquire("event:x", Duration::from_secs(2)).is_ok())
        };

        thread::sleep(Duration::from_millis(50));
        drop(guard);

        assert!(contender.join().unwrap());
    }

    #[test]
    fn guard_releases_on_panic_path() {
        let locks = InMemoryLockManager::new();
        let locks2 = locks.clone();

        let _ = thread::spawn(move || {
            let _guard = locks2
                .acquire("product:p", Duration::from_millis(50))
                .unwrap();
            panic!("worker died");
        })
        .join();

        // the dying worker's guard dropped during unwind
        assert!(locks.acquire("product:p", Duration::from_millis(100)).is_ok());
    }
}
