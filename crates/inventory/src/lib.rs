//! Inventory domain module.
//!
//! This crate contains business rules for physical stock and derived bundle
//! availability, implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage). Stores apply these rules; they do not re-derive them.

pub mod adjustment;
pub mod availability;
pub mod record;
pub mod reservation;
pub mod warehouse;

pub use adjustment::{Direction, PlannedAdjustment, StockLine, expand_line};
pub use availability::{BundleAvailability, ComponentAvailability, resolve_bundle};
pub use record::{InventoryRecord, sort_by_deficit};
pub use reservation::StockReservations;
pub use warehouse::Warehouse;
