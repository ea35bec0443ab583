//! Atomic quantity transfer primitives.
//!
//! Every operation that mutates a row's quantity acquires the row's advisory
//! lock first and re-fetches the row under it; values read before the lock
//! are treated as stale probes only.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use warehause_core::{
    document, hierarchy, DomainError, DomainResult, Entity, EntityId, LockManager, LockPolicy,
};

use crate::hooks::{
    DefaultProductHook, JoinContext, ProductHook, ReserveContext, SplitContext, UnreserveContext,
};
use crate::product::{Product, ProductDef, ProductPatch};
use crate::store::{ProductDefStore, ProductStore};

/// Result of a split.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitOutcome {
    /// The full quantity was requested; the row itself is returned untouched
    /// instead of leaving behind an empty parent.
    Whole(Product),
    /// The stored row kept the remainder; `taken` is the carved-off child
    /// (`parent` links back to `stock`), not yet persisted.
    Partial { stock: Product, taken: Product },
}

impl SplitOutcome {
    pub fn taken(&self) -> &Product {
        match self {
            SplitOutcome::Whole(product) => product,
            SplitOutcome::Partial { taken, .. } => taken,
        }
    }

    pub fn into_taken(self) -> Product {
        match self {
            SplitOutcome::Whole(product) => product,
            SplitOutcome::Partial { taken, .. } => taken,
        }
    }

    /// The reduced stock row, when one remained.
    pub fn stock(&self) -> Option<&Product> {
        match self {
            SplitOutcome::Whole(_) => None,
            SplitOutcome::Partial { stock, .. } => Some(stock),
        }
    }
}

/// Product operations over a durable store.
pub struct Ledger {
    products: Arc<dyn ProductStore>,
    dfns: Arc<dyn ProductDefStore>,
    locks: Arc<dyn LockManager>,
    policy: LockPolicy,
    hooks: Arc<dyn ProductHook>,
}

impl Ledger {
    pub fn new(
        products: Arc<dyn ProductStore>,
        dfns: Arc<dyn ProductDefStore>,
        locks: Arc<dyn LockManager>,
    ) -> Self {
        Self {
            products,
            dfns,
            locks,
            policy: LockPolicy::default(),
            hooks: Arc::new(DefaultProductHook),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ProductHook>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn products(&self) -> Arc<dyn ProductStore> {
        Arc::clone(&self.products)
    }

    pub fn dfns(&self) -> Arc<dyn ProductDefStore> {
        Arc::clone(&self.dfns)
    }

    fn fetch(&self, id: EntityId) -> DomainResult<Product> {
        self.products.get(id)?.ok_or(DomainError::NotFound { id })
    }

    /// Manufacture an unpersisted instance through its definition, folding
    /// template-chain defaults under the caller's overrides.
    pub fn create_instance(
        &self,
        dfn_id: EntityId,
        patch: &ProductPatch,
        hook: Option<&dyn ProductHook>,
    ) -> DomainResult<Product> {
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
        let product = dfn.create_instance(&ancestors, patch);

        hook.post_create_instance(&dfn, Some(&product), None);
        info!(product = %product.id(), dfn = %dfn_id, "manufactured product instance");
        Ok(product)
    }

    /// Persist: pre-save hook, document validation, timestamp stamping, then
    /// the store write. The post-save hook fires on failure too.
    pub fn save(&self, product: &mut Product) -> DomainResult<()> {
        let result = self.persist(product);
        self.hooks.post_save(product, result.as_ref().err());
        result
    }

    fn persist(&self, product: &mut Product) -> DomainResult<()> {
        self.hooks.pre_save(product)?;
        document::validate_against(product.meta.options.as_ref(), product.meta.schema.as_ref())?;

        if product.is_saved() {
            product.meta.updated_at = Some(Utc::now());
            self.products.update(product)?;
        } else {
            product.meta.created_at = Some(Utc::now());
            if let Err(e) = self.products.insert(product.clone()) {
                product.meta.created_at = None;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Carve `quantity` off the stored row under its lock.
    pub fn split(&self, product_id: EntityId, quantity: f64) -> DomainResult<SplitOutcome> {
        let probe = self.fetch(product_id)?;
        let _guard = self.locks.acquire(&probe.lock_name(), self.policy.timeout)?;

        let mut product = self.fetch(product_id)?;
        match self.split_locked(&mut product, quantity)? {
            None => Ok(SplitOutcome::Whole(product)),
            Some(taken) => Ok(SplitOutcome::Partial {
                stock: product,
                taken,
            }),
        }
    }

    /// Split body; the caller holds the product's lock. `None` means the
    /// full quantity was requested (identity return).
    fn split_locked(&self, product: &mut Product, quantity: f64) -> DomainResult<Option<Product>> {
        {
            let ctx = SplitContext { product, quantity };
            if let Err(e) = self.hooks.pre_split(&ctx) {
                self.hooks.post_split(product, quantity, None, Some(&e));
                return Err(e);
            }
        }

        if quantity == product.quantity {
            self.hooks.post_split(product, quantity, None, None);
            return Ok(None);
        }

        product.quantity -= quantity;
        let taken = product.carve(quantity);

        if let Err(e) = self.save(product) {
            product.quantity += quantity; // nothing was persisted
            self.hooks.post_split(product, quantity, None, Some(&e));
            return Err(e);
        }

        self.hooks.post_split(product, quantity, Some(&taken), None);
        info!(stock = %product.id(), taken = %taken.id(), quantity, "split product");
        Ok(Some(taken))
    }

    /// Merge `from` into the stored row `into_id` and delete `from`.
    ///
    /// Identity (dfn/expiry) is the caller's responsibility; see
    /// `hooks::check_join_compatible`.
    pub fn join(&self, into_id: EntityId, from: Product) -> DomainResult<Product> {
        if from.id() == into_id {
            // merging a row into itself is a no-op
            return Ok(from);
        }

        let probe = self.fetch(into_id)?;
        let _guard = self.locks.acquire(&probe.lock_name(), self.policy.timeout)?;

        let mut into = self.fetch(into_id)?;
        self.join_locked(&mut into, from)?;
        Ok(into)
    }

    fn join_locked(&self, into: &mut Product, from: Product) -> DomainResult<()> {
        {
            let ctx = JoinContext { into, from: &from };
            if let Err(e) = self.hooks.pre_join(&ctx) {
                self.hooks.post_join(into, Some(&e));
                return Err(e);
            }
        }

        into.quantity += from.quantity;
        if let Err(e) = self.save(into) {
            into.quantity -= from.quantity;
            self.hooks.post_join(into, Some(&e));
            return Err(e);
        }

        if from.is_saved() {
            if let Err(e) = self.products.delete(from.id()) {
                // partial mutation; the caller owns transactional wrapping
                self.hooks.post_join(into, Some(&e));
                return Err(e);
            }
        }

        self.hooks.post_join(into, None);
        info!(into = %into.id(), from = %from.id(), quantity = from.quantity, "joined product rows");
        Ok(())
    }

    /// Reserve `quantity`: a split whose child is persisted and retained.
    /// The child's `parent` link marks it as carved out of the seed row.
    pub fn reserve(&self, product_id: EntityId, quantity: f64) -> DomainResult<Product> {
        let probe = self.fetch(product_id)?;
        let _guard = self.locks.acquire(&probe.lock_name(), self.policy.timeout)?;

        let mut product = self.fetch(product_id)?;
        {
            let ctx = ReserveContext {
                product: &product,
                quantity,
            };
            if let Err(e) = self.hooks.pre_reserve(&ctx) {
                self.hooks.post_reserve(None, Some(&e));
                return Err(e);
            }
        }

        match self.split_locked(&mut product, quantity) {
            Ok(None) => {
                // whole row requested: the seed itself is the reservation
                self.hooks.post_reserve(Some(&product), None);
                Ok(product)
            }
            Ok(Some(mut taken)) => {
                if let Err(e) = self.save(&mut taken) {
                    self.hooks.post_reserve(None, Some(&e));
                    return Err(e);
                }
                self.hooks.post_reserve(Some(&taken), None);
                info!(reservation = %taken.id(), quantity, "reserved stock");
                Ok(taken)
            }
            Err(e) => {
                self.hooks.post_reserve(None, Some(&e));
                Err(e)
            }
        }
    }

    /// Release a reservation by joining the child back into its seed row.
    /// A parentless row is already unreserved seed stock (no-op).
    pub fn unreserve(&self, reservation_id: EntityId) -> DomainResult<Product> {
        let reservation = self.fetch(reservation_id)?;
        {
            let ctx = UnreserveContext {
                reservation: &reservation,
            };
            if let Err(e) = self.hooks.pre_unreserve(&ctx) {
                self.hooks.post_unreserve(None, Some(&e));
                return Err(e);
            }
        }

        let Some(seed_id) = reservation.parent else {
            self.hooks.post_unreserve(Some(&reservation), None);
            return Ok(reservation);
        };

        match self.join(seed_id, reservation) {
            Ok(restored) => {
                self.hooks.post_unreserve(Some(&restored), None);
                info!(seed = %restored.id(), "released reservation");
                Ok(restored)
            }
            Err(e) => {
                self.hooks.post_unreserve(None, Some(&e));
                Err(e)
            }
        }
    }
}
