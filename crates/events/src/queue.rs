//! Batch queue: drain deferred events, one worker per event.
//!
//! The drain itself runs under a coarse `"eventqueue"` lock so overlapping
//! scheduler invocations are safe; each worker then re-acquires its event's
//! own lock inside `process()`, which guarantees at-most-one concurrent
//! processing per event while unrelated events proceed in parallel.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use warehause_core::{DomainResult, Entity, LockManager, LockPolicy, Status};

use crate::processor::Processor;
use crate::store::EventStore;

const QUEUE_LOCK: &str = "eventqueue";

/// Outcome of one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DrainReport {
    pub spawned: usize,
    pub processed: usize,
    pub failed: usize,
}

/// Drains OPEN batched events and recovers stale PROCESSING ones.
pub struct EventQueue {
    events: Arc<dyn EventStore>,
    locks: Arc<dyn LockManager>,
    policy: LockPolicy,
    processor: Arc<Processor>,
}

impl EventQueue {
    pub fn new(
        events: Arc<dyn EventStore>,
        locks: Arc<dyn LockManager>,
        processor: Arc<Processor>,
    ) -> Self {
        Self {
            events,
            locks,
            policy: LockPolicy::default(),
            processor,
        }
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Select all OPEN batched events and process each on its own worker
    /// thread. Per-event failures are logged and counted, never fatal to the
    /// drain.
    pub fn drain(&self) -> DomainResult<DrainReport> {
        let _guard = self.locks.acquire(QUEUE_LOCK, self.policy.timeout)?;

        let batch = self.events.open_batched()?;
        let mut handles = Vec::with_capacity(batch.len());
        for event in batch {
            let processor = Arc::clone(&self.processor);
            let event_id = event.id();
            let handle = thread::Builder::new()
                .name(format!("event-worker-{event_id}"))
                .spawn(move || processor.process(event_id))
                .expect("failed to spawn event worker thread");
            handles.push(handle);
        }

        let mut report = DrainReport {
            spawned: handles.len(),
            ..DrainReport::default()
        };
        for handle in handles {
            match handle.join() {
                Ok(Ok(_)) => report.processed += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(error = %e, "event processing failed");
                }
                Err(_) => {
                    report.failed += 1;
                    error!("event worker panicked");
                }
            }
        }

        info!(
            spawned = report.spawned,
            processed = report.processed,
            failed = report.failed,
            "drained event queue"
        );
        Ok(report)
    }

    /// Return events stuck in PROCESSING longer than `stale_after` to OPEN
    /// so the next drain retries them.
    ///
    /// A worker that is merely slow still holds its event's lock, so the
    /// short acquisition attempt fails busy and the event is skipped; only
    /// events whose worker died (lock free, status unchanged) are requeued.
    pub fn requeue_stale(&self, stale_after: Duration) -> DomainResult<usize> {
        let cutoff = Utc::now() - chrono::Duration::from_std(stale_after).unwrap_or_default();
        let stale = self.events.stale_processing(cutoff)?;

        let mut requeued = 0;
        for probe in stale {
            let guard = self
                .locks
                .acquire(&probe.lock_name(), Duration::from_millis(10));
            let _guard = match guard {
                Ok(guard) => guard,
                Err(e) if e.is_retriable() => continue, // worker still alive
                Err(e) => return Err(e),
            };

            // re-fetch under the lock; the worker may have finished
            let Some(mut event) = self.events.get(probe.id())? else {
                continue;
            };
            if event.status() != Status::Processing {
                continue;
            }

            event.set_status(Status::Open);
            event
                .meta
                .append_option("requeued", json!(Utc::now().to_rfc3339()));
            warn!(event = %event.id(), "requeueing stale processing event");
            if let Err(e) = self.processor.save(&mut event) {
                error!(event = %event.id(), error = %e, "failed to requeue stale event");
                continue;
            }
            requeued += 1;
        }

        Ok(requeued)
    }
}
