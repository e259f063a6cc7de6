//! Sales orders domain module.
//!
//! This crate contains the order model and its fulfillment state machine,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod order;

pub use order::{Order, OrderItem, OrderStatus, inventory_effect};
