//! Garbage collection of virtual entities.
//!
//! A periodic sweep deletes every virtual event, warehause, and product
//! whose status reached Destroy. A delete blocked by a remaining reference
//! is logged and skipped rather than treated as fatal; collection resumes on
//! the next sweep.

use std::sync::Arc;

use tracing::{error, info};

use warehause_container::WarehauseStore;
use warehause_core::{DomainResult, Entity, EntityId, LockManager, LockPolicy};
use warehause_ledger::ProductStore;

use crate::store::EventStore;

const SWEEP_LOCK: &str = "garbagecollector";

/// Outcome of one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SweepReport {
    pub collected: usize,
    pub skipped: usize,
}

/// Periodic collector for destroy-flagged virtual entities.
pub struct GarbageCollector {
    events: Arc<dyn EventStore>,
    warehauses: Arc<dyn WarehauseStore>,
    products: Arc<dyn ProductStore>,
    locks: Arc<dyn LockManager>,
    policy: LockPolicy,
}

impl GarbageCollector {
    pub fn new(
        events: Arc<dyn EventStore>,
        warehauses: Arc<dyn WarehauseStore>,
        products: Arc<dyn ProductStore>,
        locks: Arc<dyn LockManager>,
    ) -> Self {
        Self {
            events,
            warehauses,
            products,
            locks,
            policy: LockPolicy::default(),
        }
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Delete every virtual entity with status Destroy, family by family.
    /// Safe to re-invoke on overlapping schedules.
    pub fn sweep(&self) -> DomainResult<SweepReport> {
        let _guard = self.locks.acquire(SWEEP_LOCK, self.policy.timeout)?;

        let mut report = SweepReport::default();

        let candidates: Vec<EntityId> = self
            .events
            .virtual_destroyed()?
            .iter()
            .map(|e| e.id())
            .collect();
        collect_each(candidates, |id| self.events.delete(id), "event", &mut report);

        let candidates: Vec<EntityId> = self
            .warehauses
            .virtual_destroyed()?
            .iter()
            .map(|w| w.id())
            .collect();
        collect_each(
            candidates,
            |id| self.warehauses.delete(id),
            "warehause",
            &mut report,
        );

        let candidates: Vec<EntityId> = self
            .products
            .virtual_destroyed()?
            .iter()
            .map(|p| p.id())
            .collect();
        collect_each(
            candidates,
            |id| self.products.delete(id),
            "product",
            &mut report,
        );

        info!(
            collected = report.collected,
            skipped = report.skipped,
            "garbage collection sweep finished"
        );
        Ok(report)
    }
}

fn collect_each(
    candidates: Vec<EntityId>,
    mut delete: impl FnMut(EntityId) -> DomainResult<()>,
    kind: &str,
    report: &mut SweepReport,
) {
    for id in candidates {
        match delete(id) {
            Ok(()) => {
                report.collected += 1;
                info!(kind, id = %id, "garbage collected");
            }
            Err(e) => {
                // still referenced or transient store failure; next sweep
                report.skipped += 1;
                error!(kind, id = %id, error = %e, "unable to delete, skipping");
            }
        }
    }
}
