//! Inventory, catalog and order storage boundary.
//!
//! The traits here are the only way the fulfillment engine touches state. Two
//! backends implement them: an in-memory store for tests/dev and a Postgres
//! store for persistent deployments.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use r#trait::{
    CatalogStore, EngineStore, InventoryStore, OrderStore, OrderTransaction, StockLedger,
    StockMovement, StoreError, StoreResult,
};
