//! Product definitions, product instances, and measurement arithmetic.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use warehause_core::document;
use warehause_core::{Entity, EntityId, EntityMeta, Status};

/// How instances of a product are counted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMode {
    /// Discrete instance counting.
    Instance,
    /// Weight unit counting (pounds, grams, ...).
    WeightUnit,
    /// Volume unit counting (litres, cubic metres, ...).
    VolumeUnit,
}

/// Per-unit attributes shared by `ProductDef` and `Product`.
///
/// A `None` dimension denotes an irregular product measured individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDims {
    pub code_count: CountMode,
    /// Measuring units contained per instance when this is a bundle.
    pub atomic: Option<f64>,
    pub is_fragile: bool,
    /// Must be stored in a particular orientation ("this way up").
    pub is_up: bool,
    /// Has a shelf life; instances carry an `expires` date.
    pub is_expires: bool,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub width: Option<f64>,
    pub length: Option<f64>,
}

impl Default for ProductDims {
    fn default() -> Self {
        Self {
            code_count: CountMode::Instance,
            atomic: None,
            is_fragile: false,
            is_up: false,
            is_expires: false,
            weight: None,
            height: None,
            width: None,
            length: None,
        }
    }
}

/// Dimensions occupied by a quantity of product.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize)]
pub struct Measurement {
    pub quantity: f64,
    pub weight: f64,
    pub height: f64,
    pub width: f64,
    pub length: f64,
}

impl core::ops::Add for Measurement {
    type Output = Measurement;

    fn add(self, rhs: Measurement) -> Measurement {
        Measurement {
            quantity: self.quantity + rhs.quantity,
            weight: self.weight + rhs.weight,
            height: self.height + rhs.height,
            width: self.width + rhs.width,
            length: self.length + rhs.length,
        }
    }
}

impl core::ops::AddAssign for Measurement {
    fn add_assign(&mut self, rhs: Measurement) {
        *self = *self + rhs;
    }
}

/// Template entity from which product instances are manufactured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDef {
    pub meta: EntityMeta,
    /// Template hierarchy; defaults are inherited root-first at instantiation.
    pub parent: Option<EntityId>,
    pub status: Status,
    pub dims: ProductDims,
}

impl ProductDef {
    pub fn new(meta: EntityMeta, dims: ProductDims) -> Self {
        Self {
            meta,
            parent: None,
            status: Status::Open,
            dims,
        }
    }

    /// Manufacture an instance: ancestor option documents fold root-first,
    /// this definition's values come next, caller overrides win last.
    ///
    /// `ancestors` is the template chain nearest-first (as produced by
    /// `hierarchy::ancestors`); the result is unpersisted.
    pub fn create_instance(&self, ancestors: &[ProductDef], patch: &ProductPatch) -> Product {
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

        Product {
            meta,
            parent: patch.parent,
            status: Status::Open,
            dfn: self.meta.id,
            warehause: patch.warehause,
            dims: patch.dims.clone().unwrap_or_else(|| self.dims.clone()),
            quantity: patch.quantity.unwrap_or(1.0),
            expires: patch.expires,
            is_damaged: patch.is_damaged.unwrap_or(false),
        }
    }
}

impl Entity for ProductDef {
    const KIND: &'static str = "productdef";

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

/// A concrete quantity of one product definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub meta: EntityMeta,
    /// Split provenance only (NOT physical containment): a child is a
    /// quantity carved out of its parent's stock.
    pub parent: Option<EntityId>,
    pub status: Status,
    pub dfn: EntityId,
    /// Warehause currently holding this row, if any.
    pub warehause: Option<EntityId>,
    pub dims: ProductDims,
    pub quantity: f64,
    pub expires: Option<NaiveDate>,
    pub is_damaged: bool,
}

impl Product {
    /// Dimensions occupied: per-unit dimension × quantity, 0 when unset.
    /// Pure, no side effects.
    pub fn measure(&self) -> Measurement {
        let scaled = |dim: Option<f64>| dim.map(|v| v * self.quantity).unwrap_or(0.0);
        Measurement {
            quantity: self.quantity,
            weight: scaled(self.dims.weight),
            height: scaled(self.dims.height),
            width: scaled(self.dims.width),
            length: scaled(self.dims.length),
        }
    }

    /// Top-level stock row: the canonical unreserved quantity of its
    /// definition at a warehause.
    pub fn is_seed(&self) -> bool {
        self.parent.is_none()
    }

    /// Copy of this row carrying `quantity`, with fresh identity, cleared
    /// timestamps, and `parent` pointing back here. Unpersisted.
    pub(crate) fn carve(&self, quantity: f64) -> Product {
        let mut child = self.clone();
        child.meta.id = EntityId::new();
        child.meta.created_at = None;
        child.meta.updated_at = None;
        child.parent = Some(self.meta.id);
        child.quantity = quantity;
        child
    }
}

impl Entity for Product {
    const KIND: &'static str = "product";

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
///
/// `Some` overrides the definition's default; the options document merges
/// key-wise with JSON `null` deleting a key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    pub external_id: Option<String>,
    pub barcode: Option<String>,
    pub descr: Option<String>,
    pub schema: Option<Value>,
    pub options: Option<Value>,
    pub is_virtual: Option<bool>,
    pub parent: Option<EntityId>,
    pub warehause: Option<EntityId>,
    pub dims: Option<ProductDims>,
    pub quantity: Option<f64>,
    pub expires: Option<NaiveDate>,
    pub is_damaged: Option<bool>,
}
