//! `warehause-ledger` — quantity-bearing product stock and the atomic
//! transfer primitives over it.
//!
//! A `Product` row is a quantity of one `ProductDef` at (at most) one
//! warehause. Reservation and dispatch are both expressed through
//! `split`/`join`: a reservation is a split whose child is retained, later
//! joined back or consumed. All quantity mutations run under the product's
//! advisory lock.

pub mod hooks;
pub mod ledger;
pub mod product;
pub mod store;

pub use hooks::{
    DefaultProductHook, JoinContext, ProductHook, ReserveContext, SplitContext, UnreserveContext,
};
pub use ledger::{Ledger, SplitOutcome};
pub use product::{CountMode, Measurement, Product, ProductDef, ProductDims, ProductPatch};
pub use store::{ProductDefStore, ProductStore};
