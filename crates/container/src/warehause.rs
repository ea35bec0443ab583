//! Warehause definitions, instances, and the usage report.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use warehause_core::{document, Entity, EntityId, EntityMeta, Status, UserId};
use warehause_ledger::Measurement;

/// Capacity and handling attributes shared by `WarehauseDef` and `Warehause`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehauseDims {
    /// May directly hold goods. When false the warehause only stores through
    /// child warehauses.
    pub is_storage: bool,
    /// A mobile container such as a forklift, conveyor, or picker.
    pub is_mobile: bool,
    /// May hold more than one product definition concurrently.
    pub is_permissive: bool,
    /// Maximum total dimensions of stored product (arbitrary units); `None`
    /// imposes no limit.
    pub max_weight: Option<f64>,
    pub max_height: Option<f64>,
    pub max_width: Option<f64>,
    pub max_length: Option<f64>,
    /// Empty (tare) dimensions of the container itself.
    pub tare_weight: Option<f64>,
    pub tare_height: Option<f64>,
    pub tare_width: Option<f64>,
    pub tare_length: Option<f64>,
}

impl Default for WarehauseDims {
    fn default() -> Self {
        Self {
            is_storage: true,
            is_mobile: false,
            is_permissive: false,
            max_weight: None,
            max_height: None,
            max_width: None,
            max_length: None,
            tare_weight: None,
            tare_height: None,
            tare_width: None,
            tare_length: None,
        }
    }
}

/// Template entity from which warehause instances are manufactured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehauseDef {
    pub meta: EntityMeta,
    /// Template hierarchy; defaults are inherited root-first at instantiation.
    pub parent: Option<EntityId>,
    pub status: Status,
    pub dims: WarehauseDims,
}

impl WarehauseDef {
    pub fn new(meta: EntityMeta, dims: WarehauseDims) -> Self {
        Self {
            meta,
            parent: None,
            status: Status::Open,
            dims,
        }
    }

    /// Manufacture an instance; `ancestors` is the template chain
    /// nearest-first. The result is unpersisted.
    pub fn create_instance(&self, ancestors: &[WarehauseDef], patch: &WarehausePatch) -> Warehause {
        let mut meta = EntityMeta::new(
            self.meta.owner,
            patch
                .barcode
                .clone()
                .unwrap_or_else(|| self.meta.barcode.clone()),
        );
        meta.external_id = patch
            .external_id
            .clone()
            .or_else(|| self.meta.external_id.clone());
        meta.descr = patch.descr.clone().or_else(|| self.meta.descr.clone());
        meta.schema = patch.schema.clone().or_else(|| self.meta.schema.clone());
        meta.is_virtual = patch.is_virtual.unwrap_or(self.meta.is_virtual);
        meta.options = document::fold_options(
            ancestors
                .iter()
                .rev()
                .chain(core::iter::once(self))
                .map(|dfn| dfn.meta.options.as_ref()),
            patch.options.as_ref(),
        );

        Warehause {
            meta,
            parent: patch.parent,
            status: Status::Open,
            dfn: self.meta.id,
            user: patch.user,
            dims: patch.dims.clone().unwrap_or_else(|| self.dims.clone()),
            stock_min: patch.stock_min,
            stock_max: patch.stock_max,
        }
    }
}

impl Entity for WarehauseDef {
    const KIND: &'static str = "warehausedef";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
    fn status(&self) -> Status {
        self.status
    }
    fn set_status(&mut self, status: Status) {
        self.status = status;
    }
    fn parent_id(&self) -> Option<EntityId> {
        self.parent
    }
}

/// A concrete container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehause {
    pub meta: EntityMeta,
    /// Physical containment: this warehause may itself sit inside another.
    pub parent: Option<EntityId>,
    pub status: Status,
    pub dfn: EntityId,
    pub user: Option<UserId>,
    pub dims: WarehauseDims,
    /// Replenishment is requested when stock falls below this.
    pub stock_min: Option<f64>,
    /// Quantity ceiling enforced by the capacity check.
    pub stock_max: Option<f64>,
}

impl Entity for Warehause {
    const KIND: &'static str = "warehause";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
    fn status(&self) -> Status {
        self.status
    }
    fn set_status(&mut self, status: Status) {
        self.status = status;
    }
    fn parent_id(&self) -> Option<EntityId> {
        self.parent
    }
}

/// Caller-supplied overrides for the factory operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarehausePatch {
    pub external_id: Option<String>,
    pub barcode: Option<String>,
    pub descr: Option<String>,
    pub schema: Option<Value>,
    pub options: Option<Value>,
    pub is_virtual: Option<bool>,
    pub parent: Option<EntityId>,
    pub user: Option<UserId>,
    pub dims: Option<WarehauseDims>,
    pub stock_min: Option<f64>,
    pub stock_max: Option<f64>,
}

/// Aggregate utilization of a warehause: measured stock totals alongside the
/// configured maxima. A pure read used by capacity checks and reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub totals: Measurement,
    pub stock_rows: usize,
    pub stock_min: Option<f64>,
    pub stock_max: Option<f64>,
    pub max_weight: Option<f64>,
    pub max_height: Option<f64>,
    pub max_width: Option<f64>,
    pub max_length: Option<f64>,
}
