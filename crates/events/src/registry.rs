//! Owner-scoped task registry.
//!
//! Tasks are registered at startup per tenant namespace and resolved by
//! (owner, dotted name) at process time, with a typed not-found error. The
//! engine never enumerates tasks; it only resolves by name.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use warehause_container::Yard;
use warehause_core::{DomainError, DomainResult, OwnerId};
use warehause_ledger::Ledger;

use crate::event::Event;
use crate::store::EventStore;

/// Handles a task uses to call back into the engines. Tasks may mutate the
/// event's status and options and trigger arbitrary ledger/container
/// operations, closing the loop.
#[derive(Clone)]
pub struct TaskContext {
    pub ledger: Arc<Ledger>,
    pub yard: Arc<Yard>,
    pub events: Arc<dyn EventStore>,
}

/// Business-logic entry point invoked with the event being processed.
pub type TaskFn = dyn Fn(&TaskContext, &mut Event) -> DomainResult<()> + Send + Sync;

/// Registry mapping `(owner, name)` to task functions.
///
/// Names may contain dots to disambiguate modules (`"demo.inbound.putaway"`);
/// resolution is by exact string.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<(OwnerId, String), Arc<TaskFn>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, owner: OwnerId, name: impl Into<String>, task: F)
    where
        F: Fn(&TaskContext, &mut Event) -> DomainResult<()> + Send + Sync + 'static,
    {
        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        tasks.insert((owner, name.into()), Arc::new(task));
    }

    pub fn resolve(&self, owner: OwnerId, name: &str) -> DomainResult<Arc<TaskFn>> {
        let tasks = self
            .tasks
            .read()
            .map_err(|_| DomainError::storage("task registry lock poisoned"))?;
        tasks
            .get(&(owner, name.to_string()))
            .cloned()
            .ok_or_else(|| DomainError::TaskNotFound {
                owner,
                name: name.to_string(),
            })
    }
}

impl core::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let count = self.tasks.read().map(|t| t.len()).unwrap_or(0);
        f.debug_struct("TaskRegistry").field("tasks", &count).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_dotted_names() {
        let registry = TaskRegistry::new();
        let owner = OwnerId::new();

        registry.register(owner, "demo.inbound.putaway", |_ctx, _event| Ok(()));

        assert!(registry.resolve(owner, "demo.inbound.putaway").is_ok());
    }

    #[test]
    fn unknown_name_is_a_typed_error() {
        let registry = TaskRegistry::new();
        let owner = OwnerId::new();

        let err = registry.resolve(owner, "missing").err().unwrap();
        assert_eq!(err.code(), "task_not_found");
    }

    #[test]
    fn namespaces_are_owner_scoped() {
        let registry = TaskRegistry::new();
        let owner_a = OwnerId::new();
        let owner_b = OwnerId::new();

        registry.register(owner_a, "pick", |_ctx, _event| Ok(()));

        assert!(registry.resolve(owner_a, "pick").is_ok());
        assert_eq!(
            registry.resolve(owner_b, "pick").err().unwrap().code(),
            "task_not_found"
        );
    }
}
