//! Ordered status codes shared by every entity family.

use serde::{Deserialize, Serialize};

/// Lifecycle status.
///
/// The numeric order is load-bearing: an entity's effective status is the
/// `min` of its own status and every ancestor's, so `Destroy < Closed <
/// Processing < OnHold < Open` must hold. Warehauses and Products use only
/// `Destroy`/`Closed`/`Open`; Events use all five.
#[repr(i8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Destroy = -1,
    Closed = 0,
    Processing = 1,
    OnHold = 2,
    Open = 3,
}

impl Status {
    /// Numeric code as stored by external systems.
    pub fn code(self) -> i8 {
        self as i8
    }

    pub fn is_open(self) -> bool {
        self == Status::Open
    }

    /// Terminal states are never left again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Destroy | Status::Closed)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Open
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Status::Destroy => "destroy",
            Status::Closed => "closed",
            Status::Processing => "processing",
            Status::OnHold => "on_hold",
            Status::Open => "open",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_codes() {
        assert!(Status::Destroy < Status::Closed);
        assert!(Status::Closed < Status::Processing);
        assert!(Status::Processing < Status::OnHold);
        assert!(Status::OnHold < Status::Open);
        assert_eq!(Status::Destroy.code(), -1);
        assert_eq!(Status::Open.code(), 3);
    }

    #[test]
    fn min_reduces_toward_destroy() {
        assert_eq!(Status::Open.min(Status::Closed), Status::Closed);
        assert_eq!(Status::Closed.min(Status::Destroy), Status::Destroy);
    }
}
