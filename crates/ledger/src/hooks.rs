//! Product lifecycle hooks.
//!
//! Every mutating ledger operation calls `pre_<op>` before and `post_<op>`
//! after; the post hook always receives the captured error so observers can
//! react uniformly to success and failure.
//!
//! The baseline validation lives in the trait's DEFAULT method bodies. A
//! custom hook keeps every check it does not explicitly override; weakening
//! a check therefore requires writing the override, which keeps the decision
//! visible at the `impl` site.

use warehause_core::{DomainError, DomainResult, Entity};

use crate::product::{Product, ProductDef, ProductPatch};

/// Facts for a split decision.
#[derive(Debug)]
pub struct SplitContext<'a> {
    pub product: &'a Product,
    pub quantity: f64,
}

/// Facts for a join decision. Identity (dfn/expiry) is NOT validated here;
/// the container engine enforces compatibility before merging so the ledger
/// primitive stays reusable for arbitrary merges.
#[derive(Debug)]
pub struct JoinContext<'a> {
    pub into: &'a Product,
    pub from: &'a Product,
}

/// Facts for a reservation.
#[derive(Debug)]
pub struct ReserveContext<'a> {
    pub product: &'a Product,
    pub quantity: f64,
}

/// Facts for releasing a reservation.
#[derive(Debug)]
pub struct UnreserveContext<'a> {
    pub reservation: &'a Product,
}

/// Interception points around product mutations.
///
/// Product status checks use the row's OWN status: a product's parent chain
/// records split provenance, not containment, so ancestor statuses do not
/// propagate here.
pub trait ProductHook: Send + Sync {
    fn pre_create_instance(&self, dfn: &ProductDef, patch: &ProductPatch) -> DomainResult<()> {
        let _ = (dfn, patch);
        Ok(())
    }

    fn post_create_instance(
        &self,
        dfn: &ProductDef,
        product: Option<&Product>,
        outcome: Option<&DomainError>,
    ) {
        let _ = (dfn, product, outcome);
    }

    fn pre_save(&self, product: &Product) -> DomainResult<()> {
        let _ = product;
        Ok(())
    }

    fn post_save(&self, product: &Product, outcome: Option<&DomainError>) {
        let _ = (product, outcome);
    }

    fn pre_split(&self, ctx: &SplitContext<'_>) -> DomainResult<()> {
        check_own_status_open(ctx.product)?;
        check_positive(ctx.quantity)?;
        check_available(ctx.product, ctx.quantity)
    }

    fn post_split(
        &self,
        stock: &Product,
        quantity: f64,
        taken: Option<&Product>,
        outcome: Option<&DomainError>,
    ) {
        let _ = (stock, quantity, taken, outcome);
    }

    fn pre_join(&self, ctx: &JoinContext<'_>) -> DomainResult<()> {
        check_own_status_open(ctx.into)
    }

    fn post_join(&self, into: &Product, outcome: Option<&DomainError>) {
        let _ = (into, outcome);
    }

    fn pre_reserve(&self, ctx: &ReserveContext<'_>) -> DomainResult<()> {
        check_own_status_open(ctx.product)?;
        check_positive(ctx.quantity)?;
        if !ctx.product.is_saved() {
            return Err(DomainError::NotSaved {
                id: ctx.product.id(),
            });
        }
        check_available(ctx.product, ctx.quantity)
    }

    fn post_reserve(&self, reservation: Option<&Product>, outcome: Option<&DomainError>) {
        let _ = (reservation, outcome);
    }

    fn pre_unreserve(&self, ctx: &UnreserveContext<'_>) -> DomainResult<()> {
        check_own_status_open(ctx.reservation)
    }

    fn post_unreserve(&self, restored: Option<&Product>, outcome: Option<&DomainError>) {
        let _ = (restored, outcome);
    }
}

/// Baseline hook: exactly the default trait behaviour.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProductHook;

impl ProductHook for DefaultProductHook {}

pub fn check_own_status_open(product: &Product) -> DomainResult<()> {
    if !product.status.is_open() {
        return Err(DomainError::StatusNotOpen {
            id: product.id(),
            status: product.status,
            effective: product.status,
        });
    }
    Ok(())
}

pub fn check_positive(quantity: f64) -> DomainResult<()> {
    if !(quantity > 0.0) {
        return Err(DomainError::QuantityNotPositive { quantity });
    }
    Ok(())
}

pub fn check_available(product: &Product, quantity: f64) -> DomainResult<()> {
    if quantity > product.quantity {
        return Err(DomainError::InsufficientStock {
            id: product.id(),
            requested: quantity,
            available: product.quantity,
        });
    }
    Ok(())
}

/// Same definition and same expiry date. Callers that merge rows (the
/// container engine, custom hooks) run this before `join`.
pub fn check_join_compatible(into: &Product, from: &Product) -> DomainResult<()> {
    if into.dfn != from.dfn {
        return Err(DomainError::DefMismatch {
            left: into.dfn,
            right: from.dfn,
        });
    }
    if into.expires != from.expires {
        return Err(DomainError::ExpiryMismatch {
            left: into.expires,
            right: from.expires,
        });
    }
    Ok(())
}
