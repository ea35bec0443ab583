//! Container operations: receive, dispatch, reserve, transfer.
//!
//! The yard orchestrates the ledger primitives and runs every check through
//! the hook system. Quantity mutations are locked inside the ledger; the
//! yard re-reads stock state per operation rather than trusting values read
//! earlier (another transfer can interleave between two locked sections).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use warehause_core::{document, hierarchy, DomainError, DomainResult, Entity, EntityId, Status};
use warehause_ledger::hooks as product_hooks;
use warehause_ledger::{Ledger, Measurement, Product, ProductStore, SplitOutcome};

use crate::hooks::{
    DefaultWarehauseHook, DispatchContext, ReceiveContext, StockReserveContext, TransferContext,
    WarehauseHook,
};
use crate::store::{WarehauseDefStore, WarehauseStore};
use crate::warehause::{UsageReport, Warehause, WarehausePatch};

/// Result of a dispatch: the detached product plus the reduced stock row
/// (when one remained).
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub product: Product,
    pub stock: Option<Product>,
}

/// Warehause operations over a durable store.
pub struct Yard {
    warehauses: Arc<dyn WarehauseStore>,
    dfns: Arc<dyn WarehauseDefStore>,
    products: Arc<dyn ProductStore>,
    ledger: Arc<Ledger>,
    hooks: Arc<dyn WarehauseHook>,
}

impl Yard {
    pub fn new(
        warehauses: Arc<dyn WarehauseStore>,
        dfns: Arc<dyn WarehauseDefStore>,
        products: Arc<dyn ProductStore>,
        ledger: Arc<Ledger>,
    ) -> Self {
        Self {
            warehauses,
            dfns,
            products,
            ledger,
            hooks: Arc::new(DefaultWarehauseHook),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn WarehauseHook>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn warehauses(&self) -> Arc<dyn WarehauseStore> {
        Arc::clone(&self.warehauses)
    }

    pub fn ledger(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger)
    }

    fn fetch(&self, id: EntityId) -> DomainResult<Warehause> {
        self.warehauses.get(id)?.ok_or(DomainError::NotFound { id })
    }

    /// Containment chain, self first. One store pass reused by the checks.
    fn chain(&self, warehause: &Warehause) -> Vec<Warehause> {
        hierarchy::ancestors(warehause, |id| self.warehauses.get(id).ok().flatten(), true)
    }

    /// Own status reduced by every ancestor's.
    pub fn effective_status(&self, warehause_id: EntityId) -> DomainResult<Status> {
        let warehause = self.fetch(warehause_id)?;
        Ok(hierarchy::effective_status(&warehause, |id| {
            self.warehauses.get(id).ok().flatten()
        }))
    }

    /// Manufacture an unpersisted instance through its definition.
    pub fn create_instance(
        &self,
        dfn_id: EntityId,
        patch: &WarehausePatch,
        hook: Option<&dyn WarehauseHook>,
    ) -> DomainResult<Warehause> {
        let dfn = self
            .dfns
            .get(dfn_id)?
            .ok_or(DomainError::NotFound { id: dfn_id })?;
        let hook = hook.unwrap_or(&*self.hooks);

        if let Err(e) = hook.pre_create_instance(&dfn, patch) {
            hook.post_create_instance(&dfn, None, Some(&e));
            return Err(e);
        }

        let ancestors = hierarchy::ancestors(&dfn, |id| self.dfns.get(id).ok().flatten(), false);
        let warehause = dfn.create_instance(&ancestors, patch);

        hook.post_create_instance(&dfn, Some(&warehause), None);
        info!(warehause = %warehause.id(), dfn = %dfn_id, "manufactured warehause instance");
        Ok(warehause)
    }

    /// Persist: pre-save hook, document validation, timestamp stamping, then
    /// the store write. The post-save hook fires on failure too.
    pub fn save(&self, warehause: &mut Warehause) -> DomainResult<()> {
        let result = self.persist(warehause);
        self.hooks.post_save(warehause, result.as_ref().err());
        result
    }

    fn persist(&self, warehause: &mut Warehause) -> DomainResult<()> {
        self.hooks.pre_save(warehause)?;
        document::validate_against(
            warehause.meta.options.as_ref(),
            warehause.meta.schema.as_ref(),
        )?;

        if warehause.is_saved() {
            warehause.meta.updated_at = Some(Utc::now());
            self.warehauses.update(warehause)?;
        } else {
            warehause.meta.created_at = Some(Utc::now());
            if let Err(e) = self.warehauses.insert(warehause.clone()) {
                warehause.meta.created_at = None;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Aggregate utilization: `measure()` summed over all directly held
    /// stock rows, alongside the configured maxima. Pure read.
    pub fn usage(&self, warehause_id: EntityId) -> DomainResult<UsageReport> {
        let warehause = self.fetch(warehause_id)?;
        let rows = self.products.stock_at(warehause_id)?;
        Ok(build_usage(&warehause, &rows))
    }

    /// Union, across self and all ancestors, of product definitions mapped
    /// for storage here. Empty means no restriction.
    pub fn mapped_productdefs(&self, warehause_id: EntityId) -> DomainResult<HashSet<EntityId>> {
        let warehause = self.fetch(warehause_id)?;
        self.mapped_for_chain(&self.chain(&warehause))
    }

    fn mapped_for_chain(&self, chain: &[Warehause]) -> DomainResult<HashSet<EntityId>> {
        let mut mapped = HashSet::new();
        for node in chain {
            mapped.extend(self.warehauses.productdefs_mapped_to(node.id())?);
        }
        Ok(mapped)
    }

    /// Whitelist `dfn` for storage at `warehause_id`.
    pub fn map_productdef(&self, dfn: EntityId, warehause_id: EntityId) -> DomainResult<()> {
        self.fetch(warehause_id)?;
        self.warehauses.map_productdef(dfn, warehause_id)
    }

    /// Stock rows of `dfn` at the warehause: only the canonical parentless
    /// seed rows when `seed_only`, every row otherwise. Ordering follows the
    /// store's (dfn, created_at, id) ordering and is stable across calls.
    pub fn get_stock(
        &self,
        warehause_id: EntityId,
        dfn: EntityId,
        seed_only: bool,
    ) -> DomainResult<Vec<Product>> {
        let rows = self.products.stock_at(warehause_id)?;
        Ok(rows
            .into_iter()
            .filter(|row| row.dfn == dfn && (!seed_only || row.is_seed()))
            .collect())
    }

    fn seed_row(rows: &[Product], dfn: EntityId, expires: Option<chrono::NaiveDate>) -> Option<Product> {
        rows.iter()
            .find(|row| row.is_seed() && row.dfn == dfn && row.expires == expires)
            .cloned()
    }

    /// Accept a product into this warehause: merge into existing seed stock
    /// of the same definition and expiry, or attach as new top-level stock.
    pub fn receive(&self, warehause_id: EntityId, mut product: Product) -> DomainResult<Product> {
        let warehause = self.fetch(warehause_id)?;
        let chain = self.chain(&warehause);
        let rows = self.products.stock_at(warehause_id)?;
        let mapped = self.mapped_for_chain(&chain)?;
        let usage = build_usage(&warehause, &rows);
        let effective_status = chain
            .iter()
            .fold(Status::Open, |acc, w| acc.min(w.status()));
        let effective_permissive = chain.iter().any(|w| w.dims.is_permissive);

        {
            let ctx = ReceiveContext {
                warehause: &warehause,
                product: &product,
                effective_status,
                effective_permissive,
                stock: &rows,
                mapped_dfns: &mapped,
                usage: &usage,
            };
            if let Err(e) = self.hooks.pre_receive(&ctx) {
                self.hooks.post_receive(&warehause, None, Some(&e));
                return Err(e);
            }
        }

        let target = Self::seed_row(&rows, product.dfn, product.expires);
        let result = match target {
            Some(seed) => self.ledger.join(seed.id(), product),
            None => {
                product.warehause = Some(warehause_id);
                product.parent = None; // becomes seed stock here
                self.ledger.save(&mut product).map(|_| product)
            }
        };

        match &result {
            Ok(stock) => {
                self.hooks.post_receive(&warehause, Some(stock), None);
                info!(warehause = %warehause_id, stock = %stock.id(), quantity = stock.quantity, "received product");
            }
            Err(e) => self.hooks.post_receive(&warehause, None, Some(e)),
        }
        result
    }

    /// Remove `quantity` of `dfn` from this warehause: a mutex-protected
    /// split on the located seed row. The returned product is detached
    /// (`warehause = None`), ready to transfer elsewhere.
    pub fn dispatch(
        &self,
        warehause_id: EntityId,
        dfn: EntityId,
        quantity: f64,
    ) -> DomainResult<Dispatch> {
        let warehause = self.fetch(warehause_id)?;
        let chain = self.chain(&warehause);
        let rows = self.products.stock_at(warehause_id)?;
        let effective_status = chain
            .iter()
            .fold(Status::Open, |acc, w| acc.min(w.status()));
        let seed = rows
            .iter()
            .find(|row| row.is_seed() && row.dfn == dfn)
            .cloned();

        {
            let ctx = DispatchContext {
                warehause: &warehause,
                dfn,
                quantity,
                effective_status,
                stock: seed.as_ref(),
            };
            if let Err(e) = self.hooks.pre_dispatch(&ctx) {
                self.hooks.post_dispatch(&warehause, None, Some(&e));
                return Err(e);
            }
        }

        let seed =
            seed.ok_or_else(|| DomainError::none_not_allowed("stock of requested product definition"))?;

        let outcome = match self.ledger.split(seed.id(), quantity) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.hooks.post_dispatch(&warehause, None, Some(&e));
                return Err(e);
            }
        };

        let (stock, mut taken) = match outcome {
            SplitOutcome::Partial { stock, taken } => (Some(stock), taken),
            SplitOutcome::Whole(whole) => (None, whole),
        };

        taken.warehause = None; // in transit until received elsewhere
        if taken.is_saved() {
            if let Err(e) = self.ledger.save(&mut taken) {
                self.hooks.post_dispatch(&warehause, None, Some(&e));
                return Err(e);
            }
        }

        self.hooks.post_dispatch(&warehause, Some(&taken), None);
        info!(warehause = %warehause_id, dfn = %dfn, quantity, product = %taken.id(), "dispatched product");
        Ok(Dispatch {
            product: taken,
            stock,
        })
    }

    /// Hold `quantity` of `dfn` pending confirmation. The reservation is a
    /// persisted split child of the seed row.
    pub fn reserve(
        &self,
        warehause_id: EntityId,
        dfn: EntityId,
        quantity: f64,
    ) -> DomainResult<Product> {
        let warehause = self.fetch(warehause_id)?;
        let chain = self.chain(&warehause);
        let rows = self.products.stock_at(warehause_id)?;
        let effective_status = chain
            .iter()
            .fold(Status::Open, |acc, w| acc.min(w.status()));
        let seed = rows
            .iter()
            .find(|row| row.is_seed() && row.dfn == dfn)
            .cloned();

        {
            let ctx = StockReserveContext {
                warehause: &warehause,
                dfn,
                quantity,
                effective_status,
                product: seed.as_ref(),
            };
            if let Err(e) = self.hooks.pre_reserve(&ctx) {
                self.hooks.post_reserve(&warehause, None, Some(&e));
                return Err(e);
            }
        }

        let seed =
            seed.ok_or_else(|| DomainError::none_not_allowed("stock of requested product definition"))?;

        match self.ledger.reserve(seed.id(), quantity) {
            Ok(reservation) => {
                self.hooks.post_reserve(&warehause, Some(&reservation), None);
                info!(warehause = %warehause_id, reservation = %reservation.id(), quantity, "reserved stock");
                Ok(reservation)
            }
            Err(e) => {
                self.hooks.post_reserve(&warehause, None, Some(&e));
                Err(e)
            }
        }
    }

    /// Release a reservation held at this warehause, joining it back into
    /// its seed row.
    pub fn unreserve(
        &self,
        warehause_id: EntityId,
        reservation_id: EntityId,
    ) -> DomainResult<Product> {
        let warehause = self.fetch(warehause_id)?;
        let effective_status = hierarchy::effective_status(&warehause, |id| {
            self.warehauses.get(id).ok().flatten()
        });
        let reservation = self
            .ledger
            .products()
            .get(reservation_id)?
            .filter(|row| row.warehause == Some(warehause_id));

        {
            let ctx = StockReserveContext {
                warehause: &warehause,
                dfn: reservation.as_ref().map(|r| r.dfn).unwrap_or(reservation_id),
                quantity: reservation.as_ref().map(|r| r.quantity).unwrap_or(0.0),
                effective_status,
                product: reservation.as_ref(),
            };
            if let Err(e) = self.hooks.pre_unreserve(&ctx) {
                self.hooks.post_unreserve(&warehause, None, Some(&e));
                return Err(e);
            }
        }

        let reservation = reservation
            .ok_or_else(|| DomainError::none_not_allowed("reservation at this warehause"))?;

        match self.ledger.unreserve(reservation.id()) {
            Ok(restored) => {
                self.hooks.post_unreserve(&warehause, Some(&restored), None);
                info!(warehause = %warehause_id, seed = %restored.id(), "released reservation");
                Ok(restored)
            }
            Err(e) => {
                self.hooks.post_unreserve(&warehause, None, Some(&e));
                Err(e)
            }
        }
    }

    /// Dispatch from one warehause and receive into another. The two locked
    /// sections are independent; there is no cross-entity rollback (callers
    /// needing atomicity wrap the sequence in a store transaction).
    pub fn transfer(
        &self,
        from_id: EntityId,
        to_id: EntityId,
        dfn: EntityId,
        quantity: f64,
    ) -> DomainResult<Product> {
        let from = self.fetch(from_id)?;
        let to = self.fetch(to_id)?;

        {
            let ctx = TransferContext {
                from: &from,
                to: &to,
                dfn,
                quantity,
            };
            if let Err(e) = self.hooks.pre_transfer(&ctx) {
                self.hooks.post_transfer(&ctx, None, Some(&e));
                return Err(e);
            }
        }

        let dispatched = self.dispatch(from_id, dfn, quantity)?;
        let result = self.receive(to_id, dispatched.product);

        {
            let ctx = TransferContext {
                from: &from,
                to: &to,
                dfn,
                quantity,
            };
            match &result {
                Ok(stock) => {
                    self.hooks.post_transfer(&ctx, Some(stock), None);
                    info!(from = %from_id, to = %to_id, dfn = %dfn, quantity, "transferred stock");
                }
                Err(e) => self.hooks.post_transfer(&ctx, None, Some(e)),
            }
        }
        result
    }

    /// Merge-compatibility probe used by callers that join rows directly.
    pub fn check_join_compatible(into: &Product, from: &Product) -> DomainResult<()> {
        product_hooks::check_join_compatible(into, from)
    }
}

fn build_usage(warehause: &Warehause, rows: &[Product]) -> UsageReport {
    let mut totals = Measurement::default();
    for row in rows {
        totals += row.measure();
    }
    UsageReport {
        totals,
        stock_rows: rows.len(),
        stock_min: warehause.stock_min,
        stock_max: warehause.stock_max,
        max_weight: warehause.dims.max_weight,
        max_height: warehause.dims.max_height,
        max_width: warehause.dims.max_width,
        max_length: warehause.dims.max_length,
    }
}
