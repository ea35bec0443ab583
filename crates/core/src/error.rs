//! Domain error model.
//!
//! One variant per machine-checkable error kind. Every variant carries the
//! entities and values involved so the excluded API layer can translate a
//! failure without re-querying the store. `code()` returns the stable kind
//! string for wire formats and log fields.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::id::{EntityId, OwnerId};
use crate::status::Status;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Physical dimension named by a capacity failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Weight,
    Height,
    Width,
    Length,
    /// The `stock_max` quantity ceiling.
    Stock,
}

/// One exceeded maximum inside a capacity-overload report.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Overcapacity {
    pub dimension: Dimension,
    pub limit: f64,
    pub current: f64,
    pub incoming: f64,
}

impl Overcapacity {
    /// Amount by which the configured maximum would be exceeded.
    pub fn excess(&self) -> f64 {
        self.current + self.incoming - self.limit
    }
}

/// Domain-level error.
///
/// Validation kinds abort an operation before any mutation is persisted.
/// `LockBusy` is recoverable (retry); `LockFailure` is not.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("{what} must not be none")]
    NoneNotAllowed { what: String },

    #[error("entity {id} is not persisted")]
    NotSaved { id: EntityId },

    #[error("entity {id} status is not open (own {status:?}, effective {effective:?})")]
    StatusNotOpen {
        id: EntityId,
        status: Status,
        effective: Status,
    },

    #[error("quantity must be positive (got {quantity})")]
    QuantityNotPositive { quantity: f64 },

    #[error("insufficient stock in {id}: requested {requested}, available {available}")]
    InsufficientStock {
        id: EntityId,
        requested: f64,
        available: f64,
    },

    #[error("warehause {warehause} overload ({} dimension(s) exceeded)", overcap.len())]
    Overload {
        warehause: EntityId,
        overcap: Vec<Overcapacity>,
    },

    #[error("product definition mismatch ({left} vs {right})")]
    DefMismatch { left: EntityId, right: EntityId },

    #[error("not allowed to mix stock with mismatching expiry ({left:?} vs {right:?})")]
    ExpiryMismatch {
        left: Option<NaiveDate>,
        right: Option<NaiveDate>,
    },

    #[error("product definition {dfn} is not mapped to warehause {warehause}")]
    DefNotMapped { warehause: EntityId, dfn: EntityId },

    #[error("unable to secure mutex '{name}' within {waited_ms}ms")]
    LockBusy { name: String, waited_ms: u64 },

    #[error("mutex backend failure on '{name}': {detail}")]
    LockFailure { name: String, detail: String },

    #[error("options do not conform to schema: {violations:?}")]
    SchemaViolation { violations: Vec<String> },

    #[error("entity {id} not found")]
    NotFound { id: EntityId },

    #[error("entity {id} is still referenced by {by} other object(s)")]
    Referenced { id: EntityId, by: usize },

    #[error("task '{name}' is not registered for owner {owner}")]
    TaskNotFound { owner: OwnerId, name: String },

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("storage failure: {detail}")]
    Storage { detail: String },
}

impl DomainError {
    /// Stable machine-checkable kind code.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NoneNotAllowed { .. } => "none_not_allowed",
            DomainError::NotSaved { .. } => "not_saved",
            DomainError::StatusNotOpen { .. } => "status_not_open",
            DomainError::QuantityNotPositive { .. } => "quantity_not_positive",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::Overload { .. } => "capacity_overload",
            DomainError::DefMismatch { .. } => "dfn_mismatch",
            DomainError::ExpiryMismatch { .. } => "expiry_mismatch",
            DomainError::DefNotMapped { .. } => "dfn_not_mapped",
            DomainError::LockBusy { .. } => "lock_busy",
            DomainError::LockFailure { .. } => "lock_failure",
            DomainError::SchemaViolation { .. } => "schema_violation",
            DomainError::NotFound { .. } => "not_found",
            DomainError::Referenced { .. } => "referenced",
            DomainError::TaskNotFound { .. } => "task_not_found",
            DomainError::InvalidId(_) => "invalid_id",
            DomainError::Storage { .. } => "storage",
        }
    }

    /// True for failures a caller should retry rather than surface.
    pub fn is_retriable(&self) -> bool {
        matches!(self, DomainError::LockBusy { .. })
    }

    pub fn none_not_allowed(what: impl Into<String>) -> Self {
        Self::NoneNotAllowed { what: what.into() }
    }

    pub fn storage(detail: impl Into<String>) -> Self {
        Self::Storage {
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            DomainError::QuantityNotPositive { quantity: -1.0 }.code(),
            "quantity_not_positive"
        );
        assert_eq!(
            DomainError::LockBusy {
                name: "product:x".into(),
                waited_ms: 5000
            }
            .code(),
            "lock_busy"
        );
    }

    #[test]
    fn lock_busy_is_retriable_lock_failure_is_not() {
        let busy = DomainError::LockBusy {
            name: "event:x".into(),
            waited_ms: 100,
        };
        let broken = DomainError::LockFailure {
            name: "event:x".into(),
            detail: "poisoned".into(),
        };
        assert!(busy.is_retriable());
        assert!(!broken.is_retriable());
    }

    #[test]
    fn overcapacity_excess() {
        let over = Overcapacity {
            dimension: Dimension::Weight,
            limit: 100.0,
            current: 90.0,
            incoming: 25.0,
        };
        assert!((over.excess() - 15.0).abs() < f64::EPSILON);
    }
}
