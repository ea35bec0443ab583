//! Parent-chain traversal shared by every entity family.
//!
//! The store cannot prevent a malformed cycle at the schema level, so every
//! walk carries a visited set and stops on the first repeated id.

use std::collections::HashSet;

use crate::entity::Entity;
use crate::id::EntityId;
use crate::status::Status;

/// Collect the ancestors of `start`, nearest first, by following the parent
/// chain through `fetch`. Deduplicated and cycle-safe; a dangling parent id
/// ends the walk.
pub fn ancestors<T, F>(start: &T, mut fetch: F, include_self: bool) -> Vec<T>
where
    T: Entity + Clone,
    F: FnMut(EntityId) -> Option<T>,
{
    let mut seen: HashSet<EntityId> = HashSet::new();
    seen.insert(start.id());

    let mut out = Vec::new();
    if include_self {
        out.push(start.clone());
    }

    let mut cursor = start.parent_id();
    while let Some(pid) = cursor {
        if !seen.insert(pid) {
            break;
        }
        match fetch(pid) {
            Some(parent) => {
                cursor = parent.parent_id();
                out.push(parent);
            }
            None => break,
        }
    }

    out
}

/// Own status reduced by `min` over every ancestor's status.
///
/// An ancestor in `Closed` forces all descendants effectively closed even if
/// their own status field says `Open`.
pub fn effective_status<T, F>(entity: &T, fetch: F) -> Status
where
    T: Entity + Clone,
    F: FnMut(EntityId) -> Option<T>,
{
    ancestors(entity, fetch, false)
        .iter()
        .fold(entity.status(), |acc, p| acc.min(p.status()))
}

/// Highest ancestor in the chain, or a clone of `entity` when it has none.
pub fn top_parent<T, F>(entity: &T, fetch: F) -> T
where
    T: Entity + Clone,
    F: FnMut(EntityId) -> Option<T>,
{
    ancestors(entity, fetch, true)
        .into_iter()
        .last()
        .expect("ancestors(include_self) is never empty")
}
