//! Event lifecycle hooks.

use warehause_core::{DomainError, DomainResult};

use crate::event::{Event, EventDef, EventPatch};

/// Interception points around event mutations and processing.
pub trait EventHook: Send + Sync {
    fn pre_create_instance(&self, dfn: &EventDef, patch: &EventPatch) -> DomainResult<()> {
        let _ = (dfn, patch);
        Ok(())
    }

    fn post_create_instance(
        &self,
        dfn: &EventDef,
        event: Option<&Event>,
        outcome: Option<&DomainError>,
    ) {
        let _ = (dfn, event, outcome);
    }

    fn pre_save(&self, event: &Event) -> DomainResult<()> {
        let _ = event;
        Ok(())
    }

    fn post_save(&self, event: &Event, outcome: Option<&DomainError>) {
        let _ = (event, outcome);
    }

    fn pre_process(&self, event: &Event) -> DomainResult<()> {
        let _ = event;
        Ok(())
    }

    /// Fires after processing on success and failure alike, including task
    /// resolution failures.
    fn post_process(&self, event: &Event, outcome: Option<&DomainError>) {
        let _ = (event, outcome);
    }
}

/// Baseline hook: exactly the default trait behaviour.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEventHook;

impl EventHook for DefaultEventHook {}
