//! Durable-store boundary for containers, including the
//! productdef↔warehause storage mapping.

use std::sync::Arc;

use warehause_core::{DomainResult, EntityId};

use crate::warehause::{Warehause, WarehauseDef};

/// Storage for warehause definitions.
pub trait WarehauseDefStore: Send + Sync {
    fn insert(&self, dfn: WarehauseDef) -> DomainResult<()>;
    fn update(&self, dfn: &WarehauseDef) -> DomainResult<()>;
    fn get(&self, id: EntityId) -> DomainResult<Option<WarehauseDef>>;
    /// Cascades to child definitions and to every manufactured instance.
    fn delete(&self, id: EntityId) -> DomainResult<()>;
}

/// Storage for warehause instances.
pub trait WarehauseStore: Send + Sync {
    fn insert(&self, warehause: Warehause) -> DomainResult<()>;
    fn update(&self, warehause: &Warehause) -> DomainResult<()>;
    fn get(&self, id: EntityId) -> DomainResult<Option<Warehause>>;
    /// Cascades to contained child warehauses; fails with `Referenced` while
    /// product rows still point at the warehause.
    fn delete(&self, id: EntityId) -> DomainResult<()>;
    fn children_of(&self, id: EntityId) -> DomainResult<Vec<Warehause>>;
    /// Garbage-collection candidates: virtual rows whose status is Destroy.
    fn virtual_destroyed(&self) -> DomainResult<Vec<Warehause>>;

    /// Whitelist a product definition for storage at a warehause (and, by
    /// hierarchy, everything contained in it).
    fn map_productdef(&self, dfn: EntityId, warehause: EntityId) -> DomainResult<()>;
    fn unmap_productdef(&self, dfn: EntityId, warehause: EntityId) -> DomainResult<()>;
    /// Definitions explicitly mapped to this warehause (not its ancestors).
    fn productdefs_mapped_to(&self, warehause: EntityId) -> DomainResult<Vec<EntityId>>;
}

impl<S> WarehauseDefStore for Arc<S>
where
    S: WarehauseDefStore + ?Sized,
{
    fn insert(&self, dfn: WarehauseDef) -> DomainResult<()> {
        (**self).insert(dfn)
    }
    fn update(&self, dfn: &WarehauseDef) -> DomainResult<()> {
        (**self).update(dfn)
    }
    fn get(&self, id: EntityId) -> DomainResult<Option<WarehauseDef>> {
        (**self).get(id)
    }
    fn delete(&self, id: EntityId) -> DomainResult<()> {
        (**self).delete(id)
    }
}

impl<S> WarehauseStore for Arc<S>
where
    S: WarehauseStore + ?Sized,
{
    fn insert(&self, warehause: Warehause) -> DomainResult<()> {
        (**self).insert(warehause)
    }
    fn update(&self, warehause: &Warehause) -> DomainResult<()> {
        (**self).update(warehause)
    }
    fn get(&self, id: EntityId) -> DomainResult<Option<Warehause>> {
        (**self).get(id)
    }
    fn delete(&self, id: EntityId) -> DomainResult<()> {
        (**self).delete(id)
    }
    fn children_of(&self, id: EntityId) -> DomainResult<Vec<Warehause>> {
        (**self).children_of(id)
    }
    fn virtual_destroyed(&self) -> DomainResult<Vec<Warehause>> {
        (**self).virtual_destroyed()
    }
    fn map_productdef(&self, dfn: EntityId, warehause: EntityId) -> DomainResult<()> {
        (**self).map_productdef(dfn, warehause)
    }
    fn unmap_productdef(&self, dfn: EntityId, warehause: EntityId) -> DomainResult<()> {
        (**self).unmap_productdef(dfn, warehause)
    }
    fn productdefs_mapped_to(&self, warehause: EntityId) -> DomainResult<Vec<EntityId>> {
        (**self).productdefs_mapped_to(warehause)
    }
}
