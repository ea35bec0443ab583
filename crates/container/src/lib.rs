//! `warehause-container` — physical containment, capacity, and
//! compatibility policy over warehauses.
//!
//! A `Warehause` is a container (a building, an aisle, a pallet bay, a
//! forklift); containment nests through the self-referencing parent link.
//! Receive and dispatch orchestrate the ledger primitives and run the whole
//! check sequence through the hook system.

pub mod hooks;
pub mod store;
pub mod warehause;
pub mod yard;

pub use hooks::{
    DefaultWarehauseHook, DispatchContext, ReceiveContext, StockReserveContext, TransferContext,
    WarehauseHook,
};
pub use store::{WarehauseDefStore, WarehauseStore};
pub use warehause::{UsageReport, Warehause, WarehauseDef, WarehauseDims, WarehausePatch};
pub use yard::{Dispatch, Yard};
