//! Durable-store boundary for the ledger.
//!
//! The engine only needs CRUD plus a handful of filtered queries; schema
//! migration and query execution belong to the store implementation.

use std::sync::Arc;

use warehause_core::{DomainResult, EntityId};

use crate::product::{Product, ProductDef};

/// Storage for product definitions.
pub trait ProductDefStore: Send + Sync {
    fn insert(&self, dfn: ProductDef) -> DomainResult<()>;
    fn update(&self, dfn: &ProductDef) -> DomainResult<()>;
    fn get(&self, id: EntityId) -> DomainResult<Option<ProductDef>>;
    /// Cascades to child definitions and to every manufactured instance.
    fn delete(&self, id: EntityId) -> DomainResult<()>;
}

/// Storage for product instances.
pub trait ProductStore: Send + Sync {
    fn insert(&self, product: Product) -> DomainResult<()>;
    fn update(&self, product: &Product) -> DomainResult<()>;
    fn get(&self, id: EntityId) -> DomainResult<Option<Product>>;
    /// Cascades to split-provenance children.
    fn delete(&self, id: EntityId) -> DomainResult<()>;
    fn children_of(&self, id: EntityId) -> DomainResult<Vec<Product>>;
    /// Rows held by a warehause, ordered by (dfn, created_at, id) so
    /// repeated calls under concurrent mutation observe a stable candidate
    /// ordering.
    fn stock_at(&self, warehause: EntityId) -> DomainResult<Vec<Product>>;
    /// Garbage-collection candidates: virtual rows whose status is Destroy.
    fn virtual_destroyed(&self) -> DomainResult<Vec<Product>>;
}

impl<S> ProductDefStore for Arc<S>
where
    S: ProductDefStore + ?Sized,
{
    fn insert(&self, dfn: ProductDef) -> DomainResult<()> {
        (**self).insert(dfn)
    }
    fn update(&self, dfn: &ProductDef) -> DomainResult<()> {
        (**self).update(dfn)
    }
    fn get(&self, id: EntityId) -> DomainResult<Option<ProductDef>> {
        (**self).get(id)
    }
    fn delete(&self, id: EntityId) -> DomainResult<()> {
        (**self).delete(id)
    }
}

impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    fn insert(&self, product: Product) -> DomainResult<()> {
        (**self).insert(product)
    }
    fn update(&self, product: &Product) -> DomainResult<()> {
        (**self).update(product)
    }
    fn get(&self, id: EntityId) -> DomainResult<Option<Product>> {
        (**self).get(id)
    }
    fn delete(&self, id: EntityId) -> DomainResult<()> {
        (**self).delete(id)
    }
    fn children_of(&self, id: EntityId) -> DomainResult<Vec<Product>> {
        (**self).children_of(id)
    }
    fn stock_at(&self, warehause: EntityId) -> DomainResult<Vec<Product>> {
        (**self).stock_at(warehause)
    }
    fn virtual_destroyed(&self) -> DomainResult<Vec<Product>> {
        (**self).virtual_destroyed()
    }
}
