//! Shared entity attributes and the entity interface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{EntityId, OwnerId};
use crate::status::Status;

/// Attribute block embedded in every definition and instance struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: EntityId,
    /// Identifier assigned by an external system, if any.
    pub external_id: Option<String>,
    /// Human-readable key; unique within a definition family.
    pub barcode: String,
    pub descr: Option<String>,
    /// Set on first successful persist. `None` means not yet persisted.
    pub created_at: Option<DateTime<Utc>>,
    /// Stamped on every save after the first.
    pub updated_at: Option<DateTime<Utc>>,
    /// Optional document schema; `options` is validated against it at save time.
    pub schema: Option<Value>,
    /// Tenant-defined key-value document.
    pub options: Option<Value>,
    /// Flagged entities transition to `Destroy` after their single intended
    /// use and are removed by the garbage-collection sweep.
    pub is_virtual: bool,
    pub owner: OwnerId,
}

impl EntityMeta {
    pub fn new(owner: OwnerId, barcode: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            external_id: None,
            barcode: barcode.into(),
            descr: None,
            created_at: None,
            updated_at: None,
            schema: None,
            options: None,
            is_virtual: false,
            owner,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.created_at.is_some()
    }

    /// Set an option key. `None` deletes the key.
    pub fn set_option(&mut self, key: &str, value: Option<Value>) {
        match value {
            None => {
                if let Some(Value::Object(map)) = self.options.as_mut() {
                    map.remove(key);
                }
            }
            Some(v) => {
                let options = self
                    .options
                    .get_or_insert_with(|| Value::Object(Default::default()));
                if let Value::Object(map) = options {
                    map.insert(key.to_string(), v);
                }
            }
        }
    }

    /// Append a value to a list-valued option, creating the list if missing.
    pub fn append_option(&mut self, key: &str, value: Value) {
        let options = self
            .options
            .get_or_insert_with(|| Value::Object(Default::default()));
        if let Value::Object(map) = options {
            let slot = map.entry(key.to_string()).or_insert_with(|| Value::Array(vec![]));
            if let Value::Array(items) = slot {
                items.push(value);
            }
        }
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.as_ref().and_then(|o| o.get(key))
    }
}

/// Minimal interface every definition and instance implements.
///
/// `KIND` is the stable lock-name prefix; `lock_name()` yields the advisory
/// mutex name for this specific entity.
pub trait Entity {
    const KIND: &'static str;

    fn meta(&self) -> &EntityMeta;
    fn meta_mut(&mut self) -> &mut EntityMeta;
    fn status(&self) -> Status;
    fn set_status(&mut self, status: Status);
    /// Self-referencing parent link (template, containment, provenance, or
    /// causality depending on the family).
    fn parent_id(&self) -> Option<EntityId>;

    fn id(&self) -> EntityId {
        self.meta().id
    }

    fn owner(&self) -> OwnerId {
        self.meta().owner
    }

    fn is_saved(&self) -> bool {
        self.meta().is_saved()
    }

    fn lock_name(&self) -> String {
        format!("{}:{}", Self::KIND, self.id())
    }
}
