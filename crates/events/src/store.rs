//! Durable-store boundary for events.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use warehause_core::{DomainResult, EntityId};

use crate::event::{Event, EventDef};

/// Storage for event definitions.
pub trait EventDefStore: Send + Sync {
    fn insert(&self, dfn: EventDef) -> DomainResult<()>;
    fn update(&self, dfn: &EventDef) -> DomainResult<()>;
    fn get(&self, id: EntityId) -> DomainResult<Option<EventDef>>;
    /// Cascades to child definitions and to every manufactured instance.
    fn delete(&self, id: EntityId) -> DomainResult<()>;
}

/// Storage for event instances.
pub trait EventStore: Send + Sync {
    fn insert(&self, event: Event) -> DomainResult<()>;
    fn update(&self, event: &Event) -> DomainResult<()>;
    fn get(&self, id: EntityId) -> DomainResult<Option<Event>>;
    /// Cascades to causal children.
    fn delete(&self, id: EntityId) -> DomainResult<()>;
    fn children_of(&self, id: EntityId) -> DomainResult<Vec<Event>>;
    /// Batch-queue candidates: OPEN events with `is_batched` set, ordered by
    /// creation time.
    fn open_batched(&self) -> DomainResult<Vec<Event>>;
    /// Events stuck in PROCESSING whose `proc_start` is before `cutoff`.
    fn stale_processing(&self, cutoff: DateTime<Utc>) -> DomainResult<Vec<Event>>;
    /// Garbage-collection candidates: virtual rows whose status is Destroy.
    fn virtual_destroyed(&self) -> DomainResult<Vec<Event>>;
}

impl<S> EventDefStore for Arc<S>
where
    S: EventDefStore + ?Sized,
{
    fn insert(&self, dfn: EventDef) -> DomainResult<()> {
        (**self).insert(dfn)
    }
    fn update(&self, dfn: &EventDef) -> DomainResult<()> {
        (**self).update(dfn)
    }
    fn get(&self, id: EntityId) -> DomainResult<Option<EventDef>> {
        (**self).get(id)
    }
    fn delete(&self, id: EntityId) -> DomainResult<()> {
        (**self).delete(id)
    }
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn insert(&self, event: Event) -> DomainResult<()> {
        (**self).insert(event)
    }
    fn update(&self, event: &Event) -> DomainResult<()> {
        (**self).update(event)
    }
    fn get(&self, id: EntityId) -> DomainResult<Option<Event>> {
        (**self).get(id)
    }
    fn delete(&self, id: EntityId) -> DomainResult<()> {
        (**self).delete(id)
    }
    fn children_of(&self, id: EntityId) -> DomainResult<Vec<Event>> {
        (**self).children_of(id)
    }
    fn open_batched(&self) -> DomainResult<Vec<Event>> {
        (**self).open_batched()
    }
    fn stale_processing(&self, cutoff: DateTime<Utc>) -> DomainResult<Vec<Event>> {
        (**self).stale_processing(cutoff)
    }
    fn virtual_destroyed(&self) -> DomainResult<Vec<Event>> {
        (**self).virtual_destroyed()
    }
}
