//! Postgres-backed store implementation.
//!
//! ## Atomic stock updates
//!
//! `adjust` is one conditional statement:
//!
//! ```sql
//! UPDATE inventory_records
//!    SET quantity = quantity + $3, updated_at = now()
//!  WHERE product_id = $1 AND warehouse_id = $2 AND quantity + $3 >= 0
//! RETURNING ...
//! ```
//!
//! Zero rows back means either the record is missing or the change would drive
//! it negative; a follow-up read tells the two apart for the error. The
//! `quantity >= 0` CHECK constraint backs the same rule at the schema level.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Invalid` |
//! | Database (check constraint violation) | `23514` | `Invalid` |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Conflict` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed, IO, TLS, ... | N/A | `Backend` |

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, PgConnection, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockflow_core::{OrderId, ProductId, WarehouseId};
use stockflow_inventory::{Direction, InventoryRecord, Warehouse};
use stockflow_products::{BundleComponent, Product, ProductKind, ensure_acyclic};
use stockflow_sales::{Order, OrderItem, OrderStatus};

use super::r#trait::{
    CatalogStore, InventoryStore, OrderStore, OrderTransaction, StockLedger, StockMovement,
    StoreError, StoreResult,
};

const SCHEMA: &str = include_str!("schema.sql");

/// Postgres-backed store.
///
/// `Send + Sync`; all connection management is left to the SQLx pool. Each
/// order transaction holds one pooled connection for its lifetime.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn acquire(&self, operation: &str) -> StoreResult<sqlx::pool::PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }
}

// Statements shared by pooled calls and order transactions.

const RECORD_COLUMNS: &str = "product_id, warehouse_id, quantity, min_quantity, updated_at";

async fn adjust_on(
    conn: &mut PgConnection,
    product_id: ProductId,
    warehouse_id: WarehouseId,
    delta: i64,
) -> StoreResult<InventoryRecord> {
    if delta == 0 {
        return Err(StoreError::Invalid("delta cannot be zero".to_string()));
    }

    let updated = sqlx::query_as::<_, InventoryRow>(&format!(
        "UPDATE inventory_records \
            SET quantity = quantity + $3, updated_at = now() \
          WHERE product_id = $1 AND warehouse_id = $2 AND quantity + $3 >= 0 \
        RETURNING {RECORD_COLUMNS}"
    ))
    .bind(product_id.as_uuid())
    .bind(warehouse_id.as_uuid())
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("adjust", e))?;

    if let Some(row) = updated {
        return Ok(row.into());
    }

    let current: Option<i64> = sqlx::query_scalar(
        "SELECT quantity FROM inventory_records WHERE product_id = $1 AND warehouse_id = $2",
    )
    .bind(product_id.as_uuid())
    .bind(warehouse_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("adjust", e))?;

    match current {
        Some(available) => Err(StoreError::InsufficientStock {
            product_id,
            warehouse_id,
            available,
            delta,
        }),
        None => Err(StoreError::NotFound(format!(
            "inventory record for product {product_id} at warehouse {warehouse_id}"
        ))),
    }
}

async fn record_movement_on(conn: &mut PgConnection, movement: &StockMovement) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO stock_movements \
            (order_id, product_id, warehouse_id, delta, direction, recorded_at) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(movement.order_id.as_uuid())
    .bind(movement.product_id.as_uuid())
    .bind(movement.warehouse_id.as_uuid())
    .bind(movement.delta)
    .bind(movement.direction.as_str())
    .bind(movement.recorded_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("record_movement", e))?;
    Ok(())
}

async fn load_order_on(
    conn: &mut PgConnection,
    order_id: OrderId,
    lock: bool,
) -> StoreResult<Option<Order>> {
    let sql = if lock {
        "SELECT id, status, created_at, updated_at FROM orders WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT id, status, created_at, updated_at FROM orders WHERE id = $1"
    };

    let Some(row) = sqlx::query_as::<_, OrderRow>(sql)
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_order", e))?
    else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, OrderItemRow>(
        "SELECT product_id, warehouse_id, quantity, price \
           FROM order_items WHERE order_id = $1 ORDER BY position",
    )
    .bind(order_id.as_uuid())
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("load_order", e))?;

    let items = items
        .into_iter()
        .map(OrderItem::try_from)
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(Some(Order::from_parts(
        OrderId::from_uuid(row.id),
        parse_status(&row.status)?,
        items,
        row.created_at,
        row.updated_at,
    )))
}

async fn load_product_on(
    conn: &mut PgConnection,
    product_id: ProductId,
    lock: bool,
) -> StoreResult<Option<Product>> {
    let sql = if lock {
        "SELECT id, sku, name, is_bundle, is_active FROM products WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT id, sku, name, is_bundle, is_active FROM products WHERE id = $1"
    };

    let row = sqlx::query_as::<_, ProductRow>(sql)
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_product", e))?;
    Ok(row.map(Product::from))
}

async fn load_components_on(
    conn: &mut PgConnection,
    bundle_id: ProductId,
) -> StoreResult<Vec<BundleComponent>> {
    let rows = sqlx::query_as::<_, ComponentRow>(
        "SELECT bundle_id, component_id, quantity_per_bundle, sort_order \
           FROM bundle_components WHERE bundle_id = $1 ORDER BY sort_order, id",
    )
    .bind(bundle_id.as_uuid())
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("bundle_components", e))?;

    rows.into_iter().map(BundleComponent::try_from).collect()
}

async fn movements_on(conn: &mut PgConnection, order_id: OrderId) -> StoreResult<Vec<StockMovement>> {
    let rows = sqlx::query_as::<_, MovementRow>(
        "SELECT order_id, product_id, warehouse_id, delta, direction, recorded_at \
           FROM stock_movements WHERE order_id = $1 ORDER BY id",
    )
    .bind(order_id.as_uuid())
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("movements", e))?;

    rows.into_iter().map(StockMovement::try_from).collect()
}

#[async_trait]
impl InventoryStore for PostgresStore {
    #[instrument(skip(self), fields(product_id = %product_id, warehouse_id = %warehouse_id), err)]
    async fn get(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> StoreResult<Option<InventoryRecord>> {
        let row = sqlx::query_as::<_, InventoryRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_records \
              WHERE product_id = $1 AND warehouse_id = $2"
        ))
        .bind(product_id.as_uuid())
        .bind(warehouse_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;
        Ok(row.map(InventoryRecord::from))
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn get_all_for_product(&self, product_id: ProductId) -> StoreResult<Vec<InventoryRecord>> {
        let rows = sqlx::query_as::<_, InventoryRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_records \
              WHERE product_id = $1 ORDER BY warehouse_id"
        ))
        .bind(product_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_all_for_product", e))?;
        Ok(rows.into_iter().map(InventoryRecord::from).collect())
    }

    #[instrument(skip(self), fields(product_id = %product_id, warehouse_id = %warehouse_id), err)]
    async fn adjust(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        delta: i64,
    ) -> StoreResult<InventoryRecord> {
        let mut conn = self.acquire("adjust").await?;
        adjust_on(&mut conn, product_id, warehouse_id, delta).await
    }

    #[instrument(skip(self), err)]
    async fn list_below_minimum(&self, limit: usize) -> StoreResult<Vec<InventoryRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, InventoryRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_records \
              WHERE quantity < min_quantity \
              ORDER BY (min_quantity - quantity) DESC, product_id, warehouse_id \
              LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_below_minimum", e))?;
        Ok(rows.into_iter().map(InventoryRecord::from).collect())
    }

    #[instrument(skip(self), fields(product_id = %product_id, warehouse_id = %warehouse_id), err)]
    async fn assign(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: i64,
        min_quantity: i64,
    ) -> StoreResult<InventoryRecord> {
        let mut conn = self.acquire("assign").await?;

        let product = load_product_on(&mut conn, product_id, false)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("product {product_id}")))?;
        product.ensure_stockable()?;

        let warehouse_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM warehouses WHERE id = $1)")
                .bind(warehouse_id.as_uuid())
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| map_sqlx_error("assign", e))?;
        if !warehouse_exists {
            return Err(StoreError::NotFound(format!("warehouse {warehouse_id}")));
        }

        let record =
            InventoryRecord::new(product_id, warehouse_id, quantity, min_quantity, Utc::now())?;

        let row = sqlx::query_as::<_, InventoryRow>(&format!(
            "INSERT INTO inventory_records ({RECORD_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (product_id, warehouse_id) DO UPDATE \
                SET quantity = EXCLUDED.quantity, \
                    min_quantity = EXCLUDED.min_quantity, \
                    updated_at = EXCLUDED.updated_at \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(record.product_id.as_uuid())
        .bind(record.warehouse_id.as_uuid())
        .bind(record.quantity)
        .bind(record.min_quantity)
        .bind(record.updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("assign", e))?;

        Ok(row.into())
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    #[instrument(skip(self, product), fields(product_id = %product.id_typed(), sku = product.sku()), err)]
    async fn create_product(&self, product: Product) -> StoreResult<Product> {
        sqlx::query(
            "INSERT INTO products (id, sku, name, is_bundle, is_active) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(product.id_typed().as_uuid())
        .bind(product.sku())
        .bind(product.name())
        .bind(product.is_bundle())
        .bind(product.is_active())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_product", e))?;
        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn product(&self, product_id: ProductId) -> StoreResult<Option<Product>> {
        let mut conn = self.acquire("product").await?;
        load_product_on(&mut conn, product_id, false).await
    }

    #[instrument(skip(self), fields(bundle_id = %bundle_id), err)]
    async fn bundle_components(&self, bundle_id: ProductId) -> StoreResult<Vec<BundleComponent>> {
        let mut conn = self.acquire("bundle_components").await?;
        load_components_on(&mut conn, bundle_id).await
    }

    #[instrument(skip(self), fields(bundle_id = %bundle_id, component_id = %component_id), err)]
    async fn add_bundle_component(
        &self,
        bundle_id: ProductId,
        component_id: ProductId,
        quantity_per_bundle: u32,
        sort_order: i32,
    ) -> StoreResult<BundleComponent> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("add_bundle_component", e))?;

        // Row lock on the bundle serializes concurrent edits of one definition.
        let bundle = load_product_on(&mut tx, bundle_id, true)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("product {bundle_id}")))?;
        let component = load_product_on(&mut tx, component_id, false)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("product {component_id}")))?;
        let existing = load_components_on(&mut tx, bundle_id).await?;

        let line = BundleComponent::new(&bundle, &component, quantity_per_bundle, sort_order, &existing)?;

        let edges: Vec<(Uuid, Uuid)> =
            sqlx::query_as("SELECT bundle_id, component_id FROM bundle_components")
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("add_bundle_component", e))?;
        let mut graph: HashMap<ProductId, Vec<ProductId>> = HashMap::new();
        for (bundle, component) in edges {
            graph
                .entry(ProductId::from_uuid(bundle))
                .or_default()
                .push(ProductId::from_uuid(component));
        }
        ensure_acyclic(bundle_id, component_id, |id| {
            graph.get(&id).cloned().unwrap_or_default()
        })?;

        let quantity = i32::try_from(line.quantity_per_bundle)
            .map_err(|_| StoreError::Invalid("quantity_per_bundle is too large".to_string()))?;

        sqlx::query(
            "INSERT INTO bundle_components (bundle_id, component_id, quantity_per_bundle, sort_order) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(line.bundle_id.as_uuid())
        .bind(line.component_id.as_uuid())
        .bind(quantity)
        .bind(line.sort_order)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("add_bundle_component", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("add_bundle_component", e))?;
        Ok(line)
    }

    #[instrument(skip(self, warehouse), fields(warehouse_id = %warehouse.id), err)]
    async fn create_warehouse(&self, warehouse: Warehouse) -> StoreResult<Warehouse> {
        sqlx::query("INSERT INTO warehouses (id, name) VALUES ($1, $2)")
            .bind(warehouse.id.as_uuid())
            .bind(&warehouse.name)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_warehouse", e))?;
        Ok(warehouse)
    }

    #[instrument(skip(self), fields(warehouse_id = %warehouse_id), err)]
    async fn warehouse(&self, warehouse_id: WarehouseId) -> StoreResult<Option<Warehouse>> {
        let row = sqlx::query_as::<_, WarehouseRow>("SELECT id, name FROM warehouses WHERE id = $1")
            .bind(warehouse_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("warehouse", e))?;
        Ok(row.map(Warehouse::from))
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[instrument(skip(self, order), fields(order_id = %order.id_typed()), err)]
    async fn create_order(&self, order: Order) -> StoreResult<Order> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("create_order", e))?;

        sqlx::query("INSERT INTO orders (id, status, created_at, updated_at) VALUES ($1, $2, $3, $4)")
            .bind(order.id_typed().as_uuid())
            .bind(order.status().as_str())
            .bind(order.created_at())
            .bind(order.updated_at())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_order", e))?;

        for (position, item) in order.items().iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| StoreError::Invalid("too many order items".to_string()))?;
            let price = i64::try_from(item.price)
                .map_err(|_| StoreError::Invalid("price is too large".to_string()))?;

            sqlx::query(
                "INSERT INTO order_items (order_id, position, product_id, warehouse_id, quantity, price) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(order.id_typed().as_uuid())
            .bind(position)
            .bind(item.product_id.as_uuid())
            .bind(item.warehouse_id.map(Uuid::from))
            .bind(item.quantity)
            .bind(price)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_order", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("create_order", e))?;
        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %order_id), err)]
    async fn order(&self, order_id: OrderId) -> StoreResult<Option<Order>> {
        let mut conn = self.acquire("order").await?;
        load_order_on(&mut conn, order_id, false).await
    }

    #[instrument(skip(self), fields(order_id = %order_id), err)]
    async fn movements_for_order(&self, order_id: OrderId) -> StoreResult<Vec<StockMovement>> {
        let mut conn = self.acquire("movements_for_order").await?;
        movements_on(&mut conn, order_id).await
    }

    #[instrument(skip(self), err)]
    async fn begin(&self) -> StoreResult<Box<dyn OrderTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(Box::new(PgOrderTransaction { tx }))
    }
}

/// One database transaction. SQLx rolls it back if dropped uncommitted.
pub struct PgOrderTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StockLedger for PgOrderTransaction {
    async fn adjust(
        &mut self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        delta: i64,
    ) -> StoreResult<InventoryRecord> {
        adjust_on(&mut self.tx, product_id, warehouse_id, delta).await
    }

    async fn record_movement(&mut self, movement: StockMovement) -> StoreResult<()> {
        record_movement_on(&mut self.tx, &movement).await
    }

    async fn movements(&mut self, order_id: OrderId) -> StoreResult<Vec<StockMovement>> {
        movements_on(&mut self.tx, order_id).await
    }
}

#[async_trait]
impl OrderTransaction for PgOrderTransaction {
    async fn update_status(
        &mut self,
        order_id: OrderId,
        expected: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut order = load_order_on(&mut self.tx, order_id, true)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;

        if order.status() != expected {
            return Err(StoreError::Conflict(format!(
                "order {order_id} is {}, expected {expected}",
                order.status()
            )));
        }
        order.transition_to(to, at)?;

        let result = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 AND status = $4",
        )
        .bind(order_id.as_uuid())
        .bind(to.as_str())
        .bind(at)
        .bind(expected.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_status", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "order {order_id} changed status concurrently"
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Map SQLx errors to `StoreError` (see module docs for the table).
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                Some("23503") | Some("23514") => StoreError::Invalid(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

fn parse_status(raw: &str) -> StoreResult<OrderStatus> {
    OrderStatus::parse(raw).map_err(|e| StoreError::Backend(format!("corrupt order status: {e}")))
}

fn parse_direction(raw: &str) -> StoreResult<Direction> {
    match raw {
        "decrement" => Ok(Direction::Decrement),
        "restore" => Ok(Direction::Restore),
        other => Err(StoreError::Backend(format!("corrupt movement direction '{other}'"))),
    }
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    is_bundle: bool,
    is_active: bool,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            sku: row.try_get("sku")?,
            name: row.try_get("name")?,
            is_bundle: row.try_get("is_bundle")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        let kind = if row.is_bundle {
            ProductKind::Bundle
        } else {
            ProductKind::Simple
        };
        Product::from_parts(ProductId::from_uuid(row.id), row.sku, row.name, kind, row.is_active)
    }
}

#[derive(Debug)]
struct ComponentRow {
    bundle_id: Uuid,
    component_id: Uuid,
    quantity_per_bundle: i32,
    sort_order: i32,
}

impl<'r> FromRow<'r, PgRow> for ComponentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ComponentRow {
            bundle_id: row.try_get("bundle_id")?,
            component_id: row.try_get("component_id")?,
            quantity_per_bundle: row.try_get("quantity_per_bundle")?,
            sort_order: row.try_get("sort_order")?,
        })
    }
}

impl TryFrom<ComponentRow> for BundleComponent {
    type Error = StoreError;

    fn try_from(row: ComponentRow) -> Result<Self, Self::Error> {
        let quantity_per_bundle = u32::try_from(row.quantity_per_bundle).map_err(|_| {
            StoreError::Backend(format!(
                "corrupt quantity_per_bundle {}",
                row.quantity_per_bundle
            ))
        })?;
        Ok(BundleComponent {
            bundle_id: ProductId::from_uuid(row.bundle_id),
            component_id: ProductId::from_uuid(row.component_id),
            quantity_per_bundle,
            sort_order: row.sort_order,
        })
    }
}

#[derive(Debug)]
struct InventoryRow {
    product_id: Uuid,
    warehouse_id: Uuid,
    quantity: i64,
    min_quantity: i64,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for InventoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(InventoryRow {
            product_id: row.try_get("product_id")?,
            warehouse_id: row.try_get("warehouse_id")?,
            quantity: row.try_get("quantity")?,
            min_quantity: row.try_get("min_quantity")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<InventoryRow> for InventoryRecord {
    fn from(row: InventoryRow) -> Self {
        InventoryRecord {
            product_id: ProductId::from_uuid(row.product_id),
            warehouse_id: WarehouseId::from_uuid(row.warehouse_id),
            quantity: row.quantity,
            min_quantity: row.min_quantity,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug)]
struct WarehouseRow {
    id: Uuid,
    name: String,
}

impl<'r> FromRow<'r, PgRow> for WarehouseRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(WarehouseRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Warehouse {
            id: WarehouseId::from_uuid(row.id),
            name: row.name,
        }
    }
}

#[derive(Debug)]
struct OrderRow {
    id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for OrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug)]
struct OrderItemRow {
    product_id: Uuid,
    warehouse_id: Option<Uuid>,
    quantity: i64,
    price: i64,
}

impl<'r> FromRow<'r, PgRow> for OrderItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderItemRow {
            product_id: row.try_get("product_id")?,
            warehouse_id: row.try_get("warehouse_id")?,
            quantity: row.try_get("quantity")?,
            price: row.try_get("price")?,
        })
    }
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = StoreError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let price = u64::try_from(row.price)
            .map_err(|_| StoreError::Backend(format!("corrupt item price {}", row.price)))?;
        Ok(OrderItem {
            product_id: ProductId::from_uuid(row.product_id),
            warehouse_id: row.warehouse_id.map(WarehouseId::from_uuid),
            quantity: row.quantity,
            price,
        })
    }
}

#[derive(Debug)]
struct MovementRow {
    order_id: Uuid,
    product_id: Uuid,
    warehouse_id: Uuid,
    delta: i64,
    direction: String,
    recorded_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for MovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            order_id: row.try_get("order_id")?,
            product_id: row.try_get("product_id")?,
            warehouse_id: row.try_get("warehouse_id")?,
            delta: row.try_get("delta")?,
            direction: row.try_get("direction")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(StockMovement {
            order_id: OrderId::from_uuid(row.order_id),
            product_id: ProductId::from_uuid(row.product_id),
            warehouse_id: WarehouseId::from_uuid(row.warehouse_id),
            delta: row.delta,
            direction: parse_direction(&row.direction)?,
            recorded_at: row.recorded_at,
        })
    }
}
