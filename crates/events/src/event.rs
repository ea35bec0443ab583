//! Event definitions and instances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use warehause_core::{document, Entity, EntityId, EntityMeta, Status, UserId};

/// Processing attributes shared by `EventDef` and `Event`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDims {
    /// Deferred: left OPEN for the batch scheduler instead of processing
    /// inside the creating call.
    pub is_batched: bool,
    /// Dotted task identifier resolved in the owner's registry namespace.
    pub proc_name: Option<String>,
}

/// Template entity from which event instances are manufactured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDef {
    pub meta: EntityMeta,
    /// Template hierarchy; defaults are inherited root-first at instantiation.
    pub parent: Option<EntityId>,
    pub status: Status,
    pub dims: EventDims,
}

impl EventDef {
    pub fn new(meta: EntityMeta, dims: EventDims) -> Self {
        Self {
            meta,
            parent: None,
            status: Status::Open,
            dims,
        }
    }

    /// Manufacture an instance; `ancestors` is the template chain
    /// nearest-first. The result is unpersisted.
    pub fn create_instance(&self, ancestors: &[EventDef], patch: &EventPatch) -> Event {
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

        Event {
            meta,
            parent: patch.parent,
            status: Status::Open,
            dfn: self.meta.id,
            warehause: patch.warehause,
            user: patch.user,
            dims: EventDims {
                is_batched: patch.is_batched.unwrap_or(self.dims.is_batched),
                proc_name: patch
                    .proc_name
                    .clone()
                    .or_else(|| self.dims.proc_name.clone()),
            },
            proc_start: None,
            proc_end: None,
        }
    }
}

impl Entity for EventDef {
    const KIND: &'static str = "eventdef";

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

/// A concrete work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub meta: EntityMeta,
    /// Causal/organizational hierarchy of events.
    pub parent: Option<EntityId>,
    pub status: Status,
    pub dfn: EntityId,
    /// Warehause the event acts on, if any.
    pub warehause: Option<EntityId>,
    /// Acting user, if any.
    pub user: Option<UserId>,
    pub dims: EventDims,
    pub proc_start: Option<DateTime<Utc>>,
    pub proc_end: Option<DateTime<Utc>>,
}

impl Event {
    pub fn is_batched(&self) -> bool {
        self.dims.is_batched
    }

    pub fn proc_name(&self) -> Option<&str> {
        self.dims.proc_name.as_deref()
    }
}

impl Entity for Event {
    const KIND: &'static str = "event";

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
pub struct EventPatch {
    pub external_id: Option<String>,
    pub barcode: Option<String>,
    pub descr: Option<String>,
    pub schema: Option<Value>,
    pub options: Option<Value>,
    pub is_virtual: Option<bool>,
    pub parent: Option<EntityId>,
    pub warehause: Option<EntityId>,
    pub user: Option<UserId>,
    pub is_batched: Option<bool>,
    pub proc_name: Option<String>,
}
