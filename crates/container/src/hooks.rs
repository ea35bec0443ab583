//! Warehause lifecycle hooks: compatibility and capacity policy.
//!
//! As with the product hooks, the baseline validation is the DEFAULT method
//! bodies; overriding a method replaces its checks explicitly. Context
//! structs carry pre-gathered facts (effective status, current stock, mapped
//! definitions, usage) so hook implementations stay pure.

use std::collections::HashSet;

use warehause_core::{
    Dimension, DomainError, DomainResult, Entity, EntityId, Overcapacity, Status,
};
use warehause_ledger::hooks::check_positive;
use warehause_ledger::Product;

use crate::warehause::{UsageReport, Warehause, WarehauseDef, WarehausePatch};

/// Facts for a receive decision.
#[derive(Debug)]
pub struct ReceiveContext<'a> {
    pub warehause: &'a Warehause,
    pub product: &'a Product,
    /// Own status reduced by every ancestor's.
    pub effective_status: Status,
    /// True when this warehause or any ancestor is permissive.
    pub effective_permissive: bool,
    /// Rows currently held, reserved children included.
    pub stock: &'a [Product],
    /// Union of mapped definitions across self and ancestors; empty means
    /// unrestricted.
    pub mapped_dfns: &'a HashSet<EntityId>,
    pub usage: &'a UsageReport,
}

/// Facts for a dispatch decision.
#[derive(Debug)]
pub struct DispatchContext<'a> {
    pub warehause: &'a Warehause,
    pub dfn: EntityId,
    pub quantity: f64,
    pub effective_status: Status,
    /// The located seed row, when one exists.
    pub stock: Option<&'a Product>,
}

/// Facts for a warehause-level reserve/unreserve.
#[derive(Debug)]
pub struct StockReserveContext<'a> {
    pub warehause: &'a Warehause,
    pub dfn: EntityId,
    pub quantity: f64,
    pub effective_status: Status,
    pub product: Option<&'a Product>,
}

/// Facts for a transfer.
#[derive(Debug)]
pub struct TransferContext<'a> {
    pub from: &'a Warehause,
    pub to: &'a Warehause,
    pub dfn: EntityId,
    pub quantity: f64,
}

/// Interception points around container mutations.
pub trait WarehauseHook: Send + Sync {
    fn pre_create_instance(&self, dfn: &WarehauseDef, patch: &WarehausePatch) -> DomainResult<()> {
        let _ = (dfn, patch);
        Ok(())
    }

    fn post_create_instance(
        &self,
        dfn: &WarehauseDef,
        warehause: Option<&Warehause>,
        outcome: Option<&DomainError>,
    ) {
        let _ = (dfn, warehause, outcome);
    }

    fn pre_save(&self, warehause: &Warehause) -> DomainResult<()> {
        let _ = warehause;
        Ok(())
    }

    fn post_save(&self, warehause: &Warehause, outcome: Option<&DomainError>) {
        let _ = (warehause, outcome);
    }

    fn pre_receive(&self, ctx: &ReceiveContext<'_>) -> DomainResult<()> {
        check_effective_open(ctx.warehause, ctx.effective_status)?;
        check_permissive(ctx)?;
        check_mapped(ctx)?;
        check_has_capacity(ctx)
    }

    fn post_receive(&self, warehause: &Warehause, stock: Option<&Product>, outcome: Option<&DomainError>) {
        let _ = (warehause, stock, outcome);
    }

    fn pre_dispatch(&self, ctx: &DispatchContext<'_>) -> DomainResult<()> {
        check_effective_open(ctx.warehause, ctx.effective_status)?;
        check_positive(ctx.quantity)?;
        let stock = ctx.stock.ok_or_else(|| DomainError::none_not_allowed("stock of requested product definition"))?;
        if stock.quantity < ctx.quantity {
            return Err(DomainError::InsufficientStock {
                id: stock.id(),
                requested: ctx.quantity,
                available: stock.quantity,
            });
        }
        Ok(())
    }

    fn post_dispatch(&self, warehause: &Warehause, product: Option<&Product>, outcome: Option<&DomainError>) {
        let _ = (warehause, product, outcome);
    }

    fn pre_reserve(&self, ctx: &StockReserveContext<'_>) -> DomainResult<()> {
        check_effective_open(ctx.warehause, ctx.effective_status)?;
        check_positive(ctx.quantity)?;
        if ctx.product.is_none() {
            return Err(DomainError::none_not_allowed(
                "stock of requested product definition",
            ));
        }
        Ok(())
    }

    fn post_reserve(&self, warehause: &Warehause, reservation: Option<&Product>, outcome: Option<&DomainError>) {
        let _ = (warehause, reservation, outcome);
    }

    fn pre_unreserve(&self, ctx: &StockReserveContext<'_>) -> DomainResult<()> {
        check_effective_open(ctx.warehause, ctx.effective_status)?;
        if ctx.product.is_none() {
            return Err(DomainError::none_not_allowed("reservation"));
        }
        Ok(())
    }

    fn post_unreserve(&self, warehause: &Warehause, restored: Option<&Product>, outcome: Option<&DomainError>) {
        let _ = (warehause, restored, outcome);
    }

    fn pre_transfer(&self, ctx: &TransferContext<'_>) -> DomainResult<()> {
        let _ = ctx;
        Ok(())
    }

    fn post_transfer(&self, ctx: &TransferContext<'_>, stock: Option<&Product>, outcome: Option<&DomainError>) {
        let _ = (ctx, stock, outcome);
    }
}

/// Baseline hook: exactly the default trait behaviour.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultWarehauseHook;

impl WarehauseHook for DefaultWarehauseHook {}

pub fn check_effective_open(warehause: &Warehause, effective: Status) -> DomainResult<()> {
    if effective != Status::Open {
        return Err(DomainError::StatusNotOpen {
            id: warehause.id(),
            status: warehause.status,
            effective,
        });
    }
    Ok(())
}

/// A non-permissive warehause may hold stock of at most one product
/// definition, unless an ancestor container permits mixing.
pub fn check_permissive(ctx: &ReceiveContext<'_>) -> DomainResult<()> {
    if ctx.effective_permissive {
        return Ok(());
    }
    if let Some(other) = ctx.stock.iter().find(|row| row.dfn != ctx.product.dfn) {
        return Err(DomainError::DefMismatch {
            left: ctx.product.dfn,
            right: other.dfn,
        });
    }
    Ok(())
}

/// When a definition map is configured, only mapped definitions are stored.
pub fn check_mapped(ctx: &ReceiveContext<'_>) -> DomainResult<()> {
    if ctx.mapped_dfns.is_empty() || ctx.mapped_dfns.contains(&ctx.product.dfn) {
        return Ok(());
    }
    Err(DomainError::DefNotMapped {
        warehause: ctx.warehause.id(),
        dfn: ctx.product.dfn,
    })
}

/// Compare `usage + incoming` against each configured maximum; collect every
/// exceeded dimension into the overload report. Unset maxima impose no
/// limit.
pub fn check_has_capacity(ctx: &ReceiveContext<'_>) -> DomainResult<()> {
    let incoming = ctx.product.measure();
    let current = &ctx.usage.totals;
    let dims = &ctx.warehause.dims;

    let mut overcap = Vec::new();
    let mut check = |dimension: Dimension, limit: Option<f64>, current: f64, incoming: f64| {
        if let Some(limit) = limit {
            if limit < current + incoming {
                overcap.push(Overcapacity {
                    dimension,
                    limit,
                    current,
                    incoming,
                });
            }
        }
    };

    check(Dimension::Weight, dims.max_weight, current.weight, incoming.weight);
    check(Dimension::Height, dims.max_height, current.height, incoming.height);
    check(Dimension::Width, dims.max_width, current.width, incoming.width);
    check(Dimension::Length, dims.max_length, current.length, incoming.length);
    check(
        Dimension::Stock,
        ctx.warehause.stock_max,
        current.quantity,
        incoming.quantity,
    );

    if overcap.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Overload {
            warehause: ctx.warehause.id(),
            overcap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehause::{WarehauseDef, WarehauseDims, WarehausePatch};
    use warehause_core::{EntityMeta, OwnerId};
    use warehause_ledger::{Measurement, ProductDef, ProductDims, ProductPatch};

    fn warehause(dims: WarehauseDims, stock_max: Option<f64>) -> Warehause {
        let dfn = WarehauseDef::new(EntityMeta::new(OwnerId::new(), "W-1"), dims);
        dfn.create_instance(
            &[],
            &WarehausePatch {
                stock_max,
                ..WarehausePatch::default()
            },
        )
    }

    fn product(quantity: f64, weight: Option<f64>) -> Product {
        let dfn = ProductDef::new(
            EntityMeta::new(OwnerId::new(), "P-1"),
            ProductDims {
                weight,
                ..ProductDims::default()
            },
        );
        dfn.create_instance(
            &[],
            &ProductPatch {
                quantity: Some(quantity),
                ..ProductPatch::default()
            },
        )
    }

    fn usage(totals: Measurement, warehause: &Warehause) -> UsageReport {
        UsageReport {
            totals,
            stock_rows: 0,
            stock_min: warehause.stock_min,
            stock_max: warehause.stock_max,
            max_weight: warehause.dims.max_weight,
            max_height: warehause.dims.max_height,
            max_width: warehause.dims.max_width,
            max_length: warehause.dims.max_length,
        }
    }

    #[test]
    fn capacity_reports_each_exceeded_dimension() {
        let w = warehause(
            WarehauseDims {
                max_weight: Some(100.0),
                max_height: Some(10.0),
                ..WarehauseDims::default()
            },
            Some(50.0),
        );
        let p = product(60.0, Some(2.0)); // weight 120 > 100, quantity 60 > 50
        let report = usage(Measurement::default(), &w);
        let mapped = HashSet::new();

        let err = check_has_capacity(&ReceiveContext {
            warehause: &w,
            product: &p,
            effective_status: Status::Open,
            effective_permissive: false,
            stock: &[],
            mapped_dfns: &mapped,
            usage: &report,
        })
        .unwrap_err();

        match err {
            DomainError::Overload { overcap, .. } => {
                assert_eq!(overcap.len(), 2);
                let dims: Vec<_> = overcap.iter().map(|o| o.dimension).collect();
                assert!(dims.contains(&Dimension::Weight));
                assert!(dims.contains(&Dimension::Stock));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unset_maxima_impose_no_limit() {
        let w = warehause(WarehauseDims::default(), None);
        let p = product(1_000_000.0, Some(9.0));
        let report = usage(Measurement::default(), &w);
        let mapped = HashSet::new();

        assert!(check_has_capacity(&ReceiveContext {
            warehause: &w,
            product: &p,
            effective_status: Status::Open,
            effective_permissive: false,
            stock: &[],
            mapped_dfns: &mapped,
            usage: &report,
        })
        .is_ok());
    }

    #[test]
    fn non_permissive_rejects_second_definition() {
        let w = warehause(WarehauseDims::default(), None);
        let held = product(5.0, None);
        let incoming = product(5.0, None); // different dfn
        let report = usage(Measurement::default(), &w);
        let mapped = HashSet::new();

        let ctx = ReceiveContext {
            warehause: &w,
            product: &incoming,
            effective_status: Status::Open,
            effective_permissive: false,
            stock: std::slice::from_ref(&held),
            mapped_dfns: &mapped,
            usage: &report,
        };
        assert_eq!(check_permissive(&ctx).unwrap_err().code(), "dfn_mismatch");
    }

    #[test]
    fn permissive_ancestor_allows_mixing() {
        let w = warehause(WarehauseDims::default(), None);
        let held = product(5.0, None);
        let incoming = product(5.0, None);
        let report = usage(Measurement::default(), &w);
        let mapped = HashSet::new();

        let ctx = ReceiveContext {
            warehause: &w,
            product: &incoming,
            effective_status: Status::Open,
            effective_permissive: true,
            stock: std::slice::from_ref(&held),
            mapped_dfns: &mapped,
            usage: &report,
        };
        assert!(check_permissive(&ctx).is_ok());
    }

    #[test]
    fn mapped_set_restricts_definitions() {
        let w = warehause(WarehauseDims::default(), None);
        let p = product(1.0, None);
        let report = usage(Measurement::default(), &w);

        let mut mapped = HashSet::new();
        mapped.insert(EntityId::new()); // some other definition

        let ctx = ReceiveContext {
            warehause: &w,
            product: &p,
            effective_status: Status::Open,
            effective_permissive: false,
            stock: &[],
            mapped_dfns: &mapped,
            usage: &report,
        };
        assert_eq!(check_mapped(&ctx).unwrap_err().code(), "dfn_not_mapped");
    }

    #[test]
    fn baseline_dispatch_requires_stock_and_quantity() {
        let hook = DefaultWarehauseHook;
        let w = warehause(WarehauseDims::default(), None);

        let err = hook
            .pre_dispatch(&DispatchContext {
                warehause: &w,
                dfn: EntityId::new(),
                quantity: 1.0,
                effective_status: Status::Open,
                stock: None,
            })
            .unwrap_err();
        assert_eq!(err.code(), "none_not_allowed");

        let stock = product(2.0, None);
        let err = hook
            .pre_dispatch(&DispatchContext {
                warehause: &w,
                dfn: stock.dfn,
                quantity: 3.0,
                effective_status: Status::Open,
                stock: Some(&stock),
            })
            .unwrap_err();
        assert_eq!(err.code(), "insufficient_stock");
    }

    #[test]
    fn effectively_closed_warehause_rejects_receive() {
        let hook = DefaultWarehauseHook;
        let w = warehause(WarehauseDims::default(), None);
        let p = product(1.0, None);
        let report = usage(Measurement::default(), &w);
        let mapped = HashSet::new();

        let err = hook
            .pre_receive(&ReceiveContext {
                warehause: &w,
                product: &p,
                effective_status: Status::Closed, // ancestor closed
                effective_permissive: false,
                stock: &[],
                mapped_dfns: &mapped,
                usage: &report,
            })
            .unwrap_err();
        assert_eq!(err.code(), "status_not_open");
    }
}
