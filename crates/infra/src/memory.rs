//! In-memory implementation of every store boundary.
//!
//! Intended for tests/dev. Not optimized for performance: queries scan, and
//! the whole store lives behind per-family `RwLock`s. Cascade and
//! foreign-key-protection semantics mirror what a relational backing store
//! would enforce:
//!
//! - deleting a definition deletes its child definitions and every
//!   manufactured instance;
//! - deleting a parent instance deletes its children;
//! - deleting a warehause is REFUSED while product rows still point at it
//!   (`Referenced`), and detaches referencing events otherwise.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use warehause_container::{Warehause, WarehauseDef, WarehauseDefStore, WarehauseStore};
use warehause_core::{DomainError, DomainResult, Entity, EntityId, Status};
use warehause_events::{Event, EventDef, EventDefStore, EventStore};
use warehause_ledger::{Product, ProductDef, ProductDefStore, ProductStore};

/// Map-backed store satisfying all six store traits plus the
/// productdef↔warehause mapping.
#[derive(Default)]
pub struct MemoryStore {
    warehause_defs: RwLock<HashMap<EntityId, WarehauseDef>>,
    warehauses: RwLock<HashMap<EntityId, Warehause>>,
    product_defs: RwLock<HashMap<EntityId, ProductDef>>,
    products: RwLock<HashMap<EntityId, Product>>,
    event_defs: RwLock<HashMap<EntityId, EventDef>>,
    events: RwLock<HashMap<EntityId, Event>>,
    /// (productdef, warehause) whitelist pairs.
    mappings: RwLock<HashSet<(EntityId, EntityId)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn read<T>(lock: &RwLock<T>) -> DomainResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| DomainError::storage("store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> DomainResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| DomainError::storage("store lock poisoned"))
}

fn insert_new<T: Entity>(map: &mut HashMap<EntityId, T>, entity: T) -> DomainResult<()> {
    let id = entity.id();
    if map.contains_key(&id) {
        return Err(DomainError::storage(format!("duplicate id {id}")));
    }
    map.insert(id, entity);
    Ok(())
}

fn update_existing<T: Entity + Clone>(
    map: &mut HashMap<EntityId, T>,
    entity: &T,
) -> DomainResult<()> {
    let id = entity.id();
    if !map.contains_key(&id) {
        return Err(DomainError::NotFound { id });
    }
    map.insert(id, entity.clone());
    Ok(())
}

/// Ids of `root` and everything below it through the parent links.
/// Cycle-safe.
fn subtree_ids<T: Entity>(map: &HashMap<EntityId, T>, root: EntityId) -> HashSet<EntityId> {
    let mut seen: HashSet<EntityId> = HashSet::new();
    seen.insert(root);
    let mut queue = vec![root];
    while let Some(current) = queue.pop() {
        for (id, item) in map.iter() {
            if item.parent_id() == Some(current) && seen.insert(*id) {
                queue.push(*id);
            }
        }
    }
    seen
}

/// Grow `removed` with every row whose parent chain leads into it.
fn absorb_orphans<T: Entity>(map: &HashMap<EntityId, T>, removed: &mut HashSet<EntityId>) {
    loop {
        let orphans: Vec<EntityId> = map
            .iter()
            .filter(|(id, item)| {
                !removed.contains(id)
                    && item
                        .parent_id()
                        .map(|p| removed.contains(&p))
                        .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect();
        if orphans.is_empty() {
            break;
        }
        removed.extend(orphans);
    }
}

// --- products ---------------------------------------------------------------

impl ProductDefStore for MemoryStore {
    fn insert(&self, dfn: ProductDef) -> DomainResult<()> {
        insert_new(&mut *write(&self.product_defs)?, dfn)
    }

    fn update(&self, dfn: &ProductDef) -> DomainResult<()> {
        update_existing(&mut *write(&self.product_defs)?, dfn)
    }

    fn get(&self, id: EntityId) -> DomainResult<Option<ProductDef>> {
        Ok(read(&self.product_defs)?.get(&id).cloned())
    }

    fn delete(&self, id: EntityId) -> DomainResult<()> {
        let mut defs = write(&self.product_defs)?;
        if !defs.contains_key(&id) {
            return Err(DomainError::NotFound { id });
        }
        let dead_defs = subtree_ids(&defs, id);
        defs.retain(|def_id, _| !dead_defs.contains(def_id));
        drop(defs);

        let mut products = write(&self.products)?;
        let mut dead: HashSet<EntityId> = products
            .iter()
            .filter(|(_, p)| dead_defs.contains(&p.dfn))
            .map(|(pid, _)| *pid)
            .collect();
        absorb_orphans(&products, &mut dead);
        products.retain(|pid, _| !dead.contains(pid));

        let mut mappings = write(&self.mappings)?;
        mappings.retain(|(dfn, _)| !dead_defs.contains(dfn));
        Ok(())
    }
}

impl ProductStore for MemoryStore {
    fn insert(&self, product: Product) -> DomainResult<()> {
        insert_new(&mut *write(&self.products)?, product)
    }

    fn update(&self, product: &Product) -> DomainResult<()> {
        update_existing(&mut *write(&self.products)?, product)
    }

    fn get(&self, id: EntityId) -> DomainResult<Option<Product>> {
        Ok(read(&self.products)?.get(&id).cloned())
    }

    fn delete(&self, id: EntityId) -> DomainResult<()> {
        let mut products = write(&self.products)?;
        if !products.contains_key(&id) {
            return Err(DomainError::NotFound { id });
        }
        let dead = subtree_ids(&products, id);
        products.retain(|pid, _| !dead.contains(pid));
        Ok(())
    }

    fn children_of(&self, id: EntityId) -> DomainResult<Vec<Product>> {
        Ok(read(&self.products)?
            .values()
            .filter(|p| p.parent == Some(id))
            .cloned()
            .collect())
    }

    fn stock_at(&self, warehause: EntityId) -> DomainResult<Vec<Product>> {
        let mut rows: Vec<Product> = read(&self.products)?
            .values()
            .filter(|p| p.warehause == Some(warehause))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.dfn, a.meta.created_at, a.id()).cmp(&(b.dfn, b.meta.created_at, b.id()))
        });
        Ok(rows)
    }

    fn virtual_destroyed(&self) -> DomainResult<Vec<Product>> {
        Ok(read(&self.products)?
            .values()
            .filter(|p| p.meta.is_virtual && p.status == Status::Destroy)
            .cloned()
            .collect())
    }
}

// --- warehauses -------------------------------------------------------------

impl WarehauseDefStore for MemoryStore {
    fn insert(&self, dfn: WarehauseDef) -> DomainResult<()> {
        insert_new(&mut *write(&self.warehause_defs)?, dfn)
    }

    fn update(&self, dfn: &WarehauseDef) -> DomainResult<()> {
        update_existing(&mut *write(&self.warehause_defs)?, dfn)
    }

    fn get(&self, id: EntityId) -> DomainResult<Option<WarehauseDef>> {
        Ok(read(&self.warehause_defs)?.get(&id).cloned())
    }

    fn delete(&self, id: EntityId) -> DomainResult<()> {
        let mut defs = write(&self.warehause_defs)?;
        if !defs.contains_key(&id) {
            return Err(DomainError::NotFound { id });
        }
        let dead_defs = subtree_ids(&defs, id);

        let mut warehauses = write(&self.warehauses)?;
        let mut dead: HashSet<EntityId> = warehauses
            .iter()
            .filter(|(_, w)| dead_defs.contains(&w.dfn))
            .map(|(wid, _)| *wid)
            .collect();
        absorb_orphans(&warehauses, &mut dead);

        // instances being deleted must not strand stock; check before any
        // removal so a refused delete leaves the store untouched
        let products = read(&self.products)?;
        let referenced = products
            .values()
            .filter(|p| p.warehause.map(|w| dead.contains(&w)).unwrap_or(false))
            .count();
        if referenced > 0 {
            return Err(DomainError::Referenced { id, by: referenced });
        }
        drop(products);

        defs.retain(|def_id, _| !dead_defs.contains(def_id));
        drop(defs);
        warehauses.retain(|wid, _| !dead.contains(wid));
        drop(warehauses);

        let mut events = write(&self.events)?;
        for event in events.values_mut() {
            if event.warehause.map(|w| dead.contains(&w)).unwrap_or(false) {
                event.warehause = None;
            }
        }
        drop(events);

        let mut mappings = write(&self.mappings)?;
        mappings.retain(|(_, warehause)| !dead.contains(warehause));
        Ok(())
    }
}

impl WarehauseStore for MemoryStore {
    fn insert(&self, warehause: Warehause) -> DomainResult<()> {
        insert_new(&mut *write(&self.warehauses)?, warehause)
    }

    fn update(&self, warehause: &Warehause) -> DomainResult<()> {
        update_existing(&mut *write(&self.warehauses)?, warehause)
    }

    fn get(&self, id: EntityId) -> DomainResult<Option<Warehause>> {
        Ok(read(&self.warehauses)?.get(&id).cloned())
    }

    fn delete(&self, id: EntityId) -> DomainResult<()> {
        let mut warehauses = write(&self.warehauses)?;
        if !warehauses.contains_key(&id) {
            return Err(DomainError::NotFound { id });
        }
        let dead = subtree_ids(&warehauses, id);

        let products = read(&self.products)?;
        let referenced = products
            .values()
            .filter(|p| p.warehause.map(|w| dead.contains(&w)).unwrap_or(false))
            .count();
        if referenced > 0 {
            return Err(DomainError::Referenced { id, by: referenced });
        }
        drop(products);
        warehauses.retain(|wid, _| !dead.contains(wid));
        drop(warehauses);

        // events pointing here lose the association, not their lives
        let mut events = write(&self.events)?;
        for event in events.values_mut() {
            if event.warehause.map(|w| dead.contains(&w)).unwrap_or(false) {
                event.warehause = None;
            }
        }

        let mut mappings = write(&self.mappings)?;
        mappings.retain(|(_, warehause)| !dead.contains(warehause));
        Ok(())
    }

    fn children_of(&self, id: EntityId) -> DomainResult<Vec<Warehause>> {
        Ok(read(&self.warehauses)?
            .values()
            .filter(|w| w.parent == Some(id))
            .cloned()
            .collect())
    }

    fn virtual_destroyed(&self) -> DomainResult<Vec<Warehause>> {
        Ok(read(&self.warehauses)?
            .values()
            .filter(|w| w.meta.is_virtual && w.status == Status::Destroy)
            .cloned()
            .collect())
    }

    fn map_productdef(&self, dfn: EntityId, warehause: EntityId) -> DomainResult<()> {
        write(&self.mappings)?.insert((dfn, warehause));
        Ok(())
    }

    fn unmap_productdef(&self, dfn: EntityId, warehause: EntityId) -> DomainResult<()> {
        write(&self.mappings)?.remove(&(dfn, warehause));
        Ok(())
    }

    fn productdefs_mapped_to(&self, warehause: EntityId) -> DomainResult<Vec<EntityId>> {
        Ok(read(&self.mappings)?
            .iter()
            .filter(|(_, w)| *w == warehause)
            .map(|(dfn, _)| *dfn)
            .collect())
    }
}

// --- events -----------------------------------------------------------------

impl EventDefStore for MemoryStore {
    fn insert(&self, dfn: EventDef) -> DomainResult<()> {
        insert_new(&mut *write(&self.event_defs)?, dfn)
    }

    fn update(&self, dfn: &EventDef) -> DomainResult<()> {
        update_existing(&mut *write(&self.event_defs)?, dfn)
    }

    fn get(&self, id: EntityId) -> DomainResult<Option<EventDef>> {
        Ok(read(&self.event_defs)?.get(&id).cloned())
    }

    fn delete(&self, id: EntityId) -> DomainResult<()> {
        let mut defs = write(&self.event_defs)?;
        if !defs.contains_key(&id) {
            return Err(DomainError::NotFound { id });
        }
        let dead_defs = subtree_ids(&defs, id);
        defs.retain(|def_id, _| !dead_defs.contains(def_id));
        drop(defs);

        let mut events = write(&self.events)?;
        let mut dead: HashSet<EntityId> = events
            .iter()
            .filter(|(_, e)| dead_defs.contains(&e.dfn))
            .map(|(eid, _)| *eid)
            .collect();
        absorb_orphans(&events, &mut dead);
        events.retain(|eid, _| !dead.contains(eid));
        Ok(())
    }
}

impl EventStore for MemoryStore {
    fn insert(&self, event: Event) -> DomainResult<()> {
        insert_new(&mut *write(&self.events)?, event)
    }

    fn update(&self, event: &Event) -> DomainResult<()> {
        update_existing(&mut *write(&self.events)?, event)
    }

    fn get(&self, id: EntityId) -> DomainResult<Option<Event>> {
        Ok(read(&self.events)?.get(&id).cloned())
    }

    fn delete(&self, id: EntityId) -> DomainResult<()> {
        let mut events = write(&self.events)?;
        if !events.contains_key(&id) {
            return Err(DomainError::NotFound { id });
        }
        let dead = subtree_ids(&events, id);
        events.retain(|eid, _| !dead.contains(eid));
        Ok(())
    }

    fn children_of(&self, id: EntityId) -> DomainResult<Vec<Event>> {
        Ok(read(&self.events)?
            .values()
            .filter(|e| e.parent == Some(id))
            .cloned()
            .collect())
    }

    fn open_batched(&self) -> DomainResult<Vec<Event>> {
        let mut batch: Vec<Event> = read(&self.events)?
            .values()
            .filter(|e| e.is_batched() && e.status == Status::Open)
            .cloned()
            .collect();
        batch.sort_by_key(|e| (e.meta.created_at, e.id()));
        Ok(batch)
    }

    fn stale_processing(&self, cutoff: DateTime<Utc>) -> DomainResult<Vec<Event>> {
        Ok(read(&self.events)?
            .values()
            .filter(|e| {
                e.status == Status::Processing
                    && e.proc_start.map(|t| t < cutoff).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    fn virtual_destroyed(&self) -> DomainResult<Vec<Event>> {
        Ok(read(&self.events)?
            .values()
            .filter(|e| e.meta.is_virtual && e.status == Status::Destroy)
            .cloned()
            .collect())
    }
}
