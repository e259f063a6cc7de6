use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockflow_core::{DomainError, OrderId, ProductId, WarehouseId};
use stockflow_inventory::{Direction, InventoryRecord, Warehouse};
use stockflow_products::{BundleComponent, Product};
use stockflow_sales::{Order, OrderStatus};

/// Storage-level failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A referenced product, warehouse, order or inventory record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional stock update would have driven the quantity negative.
    #[error(
        "insufficient stock for product {product_id} at warehouse {warehouse_id} \
         (on hand: {available}, requested change: {delta})"
    )]
    InsufficientStock {
        product_id: ProductId,
        warehouse_id: WarehouseId,
        available: i64,
        delta: i64,
    },

    /// The row changed underneath the caller (status compare-and-set, unique key,
    /// serialization failure).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The write violates a domain or schema rule.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Backend failure (connection, poisoned lock, unexpected SQL error).
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => StoreError::Invalid(msg),
            DomainError::NotFound(msg) => StoreError::NotFound(msg),
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Audit entry written in the same transaction as the stock change it records.
///
/// Per order, the signed sum of `delta` over all movements is the quantity the
/// order currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub delta: i64,
    pub direction: Direction,
    pub recorded_at: DateTime<Utc>,
}

/// Per-(product, warehouse) quantity ledger.
///
/// `adjust` is the only path that changes a quantity once a record exists, and
/// it is a single conditional update: check and write happen atomically in the
/// backend, never as a client-side read-compare-write.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn get(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> StoreResult<Option<InventoryRecord>>;

    async fn get_all_for_product(&self, product_id: ProductId) -> StoreResult<Vec<InventoryRecord>>;

    /// `quantity += delta`; `InsufficientStock` if the result would be negative.
    async fn adjust(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        delta: i64,
    ) -> StoreResult<InventoryRecord>;

    /// Records with `quantity < min_quantity`, largest deficit first.
    async fn list_below_minimum(&self, limit: usize) -> StoreResult<Vec<InventoryRecord>>;

    /// Inventory assignment: create or overwrite the record for a simple product.
    async fn assign(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: i64,
        min_quantity: i64,
    ) -> StoreResult<InventoryRecord>;
}

/// Products, bundle definitions and warehouses.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// `Conflict` if the SKU is taken.
    async fn create_product(&self, product: Product) -> StoreResult<Product>;

    async fn product(&self, product_id: ProductId) -> StoreResult<Option<Product>>;

    /// Components in resolution order (`sort_order`, then insertion order).
    async fn bundle_components(&self, bundle_id: ProductId) -> StoreResult<Vec<BundleComponent>>;

    /// Validates the new line against the bundle's current definition.
    async fn add_bundle_component(
        &self,
        bundle_id: ProductId,
        component_id: ProductId,
        quantity_per_bundle: u32,
        sort_order: i32,
    ) -> StoreResult<BundleComponent>;

    async fn create_warehouse(&self, warehouse: Warehouse) -> StoreResult<Warehouse>;

    async fn warehouse(&self, warehouse_id: WarehouseId) -> StoreResult<Option<Warehouse>>;
}

/// Orders and the transactions that change their status.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, order: Order) -> StoreResult<Order>;

    async fn order(&self, order_id: OrderId) -> StoreResult<Option<Order>>;

    async fn movements_for_order(&self, order_id: OrderId) -> StoreResult<Vec<StockMovement>>;

    /// Open a unit of work scoping one order's status change and stock effect.
    async fn begin(&self) -> StoreResult<Box<dyn OrderTransaction>>;
}

/// Stock writes available inside a unit of work.
#[async_trait]
pub trait StockLedger: Send {
    /// Same contract as [`InventoryStore::adjust`], scoped to the unit of work.
    async fn adjust(
        &mut self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        delta: i64,
    ) -> StoreResult<InventoryRecord>;

    async fn record_movement(&mut self, movement: StockMovement) -> StoreResult<()>;

    /// The order's journal as seen from inside the unit of work.
    async fn movements(&mut self, order_id: OrderId) -> StoreResult<Vec<StockMovement>>;
}

/// One order's status change plus its inventory effect.
///
/// Nothing is visible to other callers until `commit`; `rollback` (or dropping
/// the transaction uncommitted) discards every write.
#[async_trait]
pub trait OrderTransaction: StockLedger {
    /// Compare-and-set: `Conflict` unless the order is still in `expected`.
    async fn update_status(
        &mut self,
        order_id: OrderId,
        expected: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Everything the fulfillment engine needs from one backend.
pub trait EngineStore: InventoryStore + CatalogStore + OrderStore {}

impl<T> EngineStore for T where T: InventoryStore + CatalogStore + OrderStore + ?Sized {}
