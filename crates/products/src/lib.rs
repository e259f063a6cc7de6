//! Products domain module.
//!
//! This crate contains business rules for the catalog (simple and bundle products,
//! bundle composition), implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage).

pub mod bundle;
pub mod product;

pub use bundle::{BundleComponent, ensure_acyclic, sort_components};
pub use product::{Product, ProductKind};
