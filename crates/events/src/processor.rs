//! Event processing: factory, save discipline, and the process state
//! machine.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info};

use warehause_container::Yard;
use warehause_core::{
    document, hierarchy, DomainError, DomainResult, Entity, EntityId, LockManager, LockPolicy,
    Status,
};
use warehause_ledger::Ledger;

use crate::event::{Event, EventPatch};
use crate::hooks::{DefaultEventHook, EventHook};
use crate::registry::{TaskContext, TaskRegistry};
use crate::store::{EventDefStore, EventStore};

/// Event operations over a durable store.
///
/// Processing a single event is serialized by its advisory lock; different
/// events proceed in full parallel.
pub struct Processor {
    events: Arc<dyn EventStore>,
    dfns: Arc<dyn EventDefStore>,
    locks: Arc<dyn LockManager>,
    policy: LockPolicy,
    registry: Arc<TaskRegistry>,
    context: TaskContext,
    hooks: Arc<dyn EventHook>,
}

impl Processor {
    pub fn new(
        events: Arc<dyn EventStore>,
        dfns: Arc<dyn EventDefStore>,
        locks: Arc<dyn LockManager>,
        registry: Arc<TaskRegistry>,
        ledger: Arc<Ledger>,
        yard: Arc<Yard>,
    ) -> Self {
        let context = TaskContext {
            ledger,
            yard,
            events: Arc::clone(&events),
        };
        Self {
            events,
            dfns,
            locks,
            policy: LockPolicy::default(),
            registry,
            context,
            hooks: Arc::new(DefaultEventHook),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn EventHook>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn events(&self) -> Arc<dyn EventStore> {
        Arc::clone(&self.events)
    }

    fn fetch(&self, id: EntityId) -> DomainResult<Event> {
        self.events.get(id)?.ok_or(DomainError::NotFound { id })
    }

    /// Manufacture and persist an instance through its definition. Events
    /// that are not batched are processed synchronously inside this call;
    /// `None` means the event processed to self-deletion.
    pub fn create_instance(
        &self,
        dfn_id: EntityId,
        patch: &EventPatch,
        hook: Option<&dyn EventHook>,
    ) -> DomainResult<Option<Event>> {
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
        let mut event = dfn.create_instance(&ancestors, patch);
        hook.post_create_instance(&dfn, Some(&event), None);

        self.save(&mut event)?;
        info!(event = %event.id(), dfn = %dfn_id, batched = event.is_batched(), "manufactured event instance");

        if event.is_batched() {
            Ok(Some(event))
        } else {
            self.process(event.id())
        }
    }

    /// Persist: pre-save hook, document validation, timestamp stamping, then
    /// the store write. The post-save hook fires on failure too.
    pub fn save(&self, event: &mut Event) -> DomainResult<()> {
        let result = self.persist(event);
        self.hooks.post_save(event, result.as_ref().err());
        result
    }

    fn persist(&self, event: &mut Event) -> DomainResult<()> {
        self.hooks.pre_save(event)?;
        document::validate_against(event.meta.options.as_ref(), event.meta.schema.as_ref())?;

        if event.is_saved() {
            event.meta.updated_at = Some(Utc::now());
            self.events.update(event)?;
        } else {
            event.meta.created_at = Some(Utc::now());
            if let Err(e) = self.events.insert(event.clone()) {
                event.meta.created_at = None;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Run the event's task under the event's advisory lock.
    ///
    /// No `proc_name` is a no-op return. An unresolvable task closes the
    /// event with the failure recorded in its options and surfaces the typed
    /// error. Otherwise: stamp `proc_start`, transition to PROCESSING,
    /// persist, invoke the task, stamp `proc_end` on both paths, persist.
    /// The task owns the terminal status; DESTROY on a virtual event deletes
    /// it (`Ok(None)`).
    pub fn process(&self, event_id: EntityId) -> DomainResult<Option<Event>> {
        let probe = self.fetch(event_id)?;
        let _guard = self.locks.acquire(&probe.lock_name(), self.policy.timeout)?;

        let mut event = self.fetch(event_id)?;

        if let Err(e) = self.hooks.pre_process(&event) {
            self.hooks.post_process(&event, Some(&e));
            return Err(e);
        }

        let Some(proc_name) = event.dims.proc_name.clone() else {
            self.hooks.post_process(&event, None);
            return Ok(Some(event));
        };

        let task = match self.registry.resolve(event.owner(), &proc_name) {
            Ok(task) => task,
            Err(e) => {
                event
                    .meta
                    .append_option("errors", json!(format!("unable to resolve task '{proc_name}'")));
                event.set_status(Status::Closed);
                if let Err(save_err) = self.save(&mut event) {
                    error!(event = %event_id, error = %save_err, "failed to record task resolution failure");
                }
                self.hooks.post_process(&event, Some(&e));
                return Err(e);
            }
        };

        event.proc_start = Some(Utc::now());
        event.set_status(Status::Processing);
        if let Err(e) = self.save(&mut event) {
            self.hooks.post_process(&event, Some(&e));
            return Err(e);
        }

        info!(event = %event_id, task = %proc_name, "processing event");
        let task_result = task(&self.context, &mut event);
        event.proc_end = Some(Utc::now());

        match task_result {
            Ok(()) => {
                if event.status() == Status::Destroy && event.meta.is_virtual {
                    if let Err(e) = self.events.delete(event.id()) {
                        // leave it for the garbage-collection sweep
                        error!(event = %event_id, error = %e, "self-delete blocked; deferring to sweep");
                        let _ = self.save(&mut event);
                        self.hooks.post_process(&event, None);
                        return Ok(Some(event));
                    }
                    self.hooks.post_process(&event, None);
                    info!(event = %event_id, "event processed and deleted");
                    return Ok(None);
                }

                if let Err(e) = self.save(&mut event) {
                    self.hooks.post_process(&event, Some(&e));
                    return Err(e);
                }
                self.hooks.post_process(&event, None);
                info!(event = %event_id, status = %event.status(), "event processed");
                Ok(Some(event))
            }
            Err(task_err) => {
                // persist proc_end even on failure, then surface the task's
                // own error kind unchanged
                if let Err(save_err) = self.save(&mut event) {
                    error!(event = %event_id, error = %save_err, "failed to persist after task failure");
                }
                self.hooks.post_process(&event, Some(&task_err));
                Err(task_err)
            }
        }
    }
}
