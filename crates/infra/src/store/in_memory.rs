use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockflow_core::{DomainError, OrderId, ProductId, WarehouseId};
use stockflow_inventory::{InventoryRecord, Warehouse, sort_by_deficit};
use stockflow_products::{BundleComponent, Product, ensure_acyclic, sort_components};
use stockflow_sales::{Order, OrderStatus};

use super::r#trait::{
    CatalogStore, InventoryStore, OrderStore, OrderTransaction, StockLedger, StockMovement,
    StoreError, StoreResult,
};

type RecordKey = (ProductId, WarehouseId);

/// State that order transactions write: stock, order status, movement journal.
#[derive(Debug, Default)]
struct LedgerState {
    records: HashMap<RecordKey, InventoryRecord>,
    orders: HashMap<OrderId, Order>,
    movements: Vec<StockMovement>,
}

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<ProductId, Product>,
    skus: HashMap<String, ProductId>,
    /// Insertion order per bundle; sorted by `sort_order` on read.
    components: HashMap<ProductId, Vec<BundleComponent>>,
    warehouses: HashMap<WarehouseId, Warehouse>,
}

/// In-memory store.
///
/// Intended for tests/dev. Every ledger write (including a whole order
/// transaction) runs under one async mutex, so check-and-write is atomic and
/// transactions are serialized.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    ledger: Arc<Mutex<LedgerState>>,
    catalog: Arc<RwLock<CatalogState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn catalog_read(&self) -> StoreResult<RwLockReadGuard<'_, CatalogState>> {
        self.catalog
            .read()
            .map_err(|_| StoreError::Backend("catalog lock poisoned".to_string()))
    }

    fn catalog_write(&self) -> StoreResult<RwLockWriteGuard<'_, CatalogState>> {
        self.catalog
            .write()
            .map_err(|_| StoreError::Backend("catalog lock poisoned".to_string()))
    }
}

fn record_not_found(product_id: ProductId, warehouse_id: WarehouseId) -> StoreError {
    StoreError::NotFound(format!(
        "inventory record for product {product_id} at warehouse {warehouse_id}"
    ))
}

/// Conditional `quantity += delta` on one record. Returns the record as it was
/// before the change and as it is after.
fn apply_adjustment(
    records: &mut HashMap<RecordKey, InventoryRecord>,
    product_id: ProductId,
    warehouse_id: WarehouseId,
    delta: i64,
    at: DateTime<Utc>,
) -> StoreResult<(InventoryRecord, InventoryRecord)> {
    let record = records
        .get_mut(&(product_id, warehouse_id))
        .ok_or_else(|| record_not_found(product_id, warehouse_id))?;

    let before = record.clone();
    record.apply_delta(delta, at).map_err(|err| match err {
        DomainError::InvariantViolation(_) => StoreError::InsufficientStock {
            product_id,
            warehouse_id,
            available: before.quantity,
            delta,
        },
        other => other.into(),
    })?;

    Ok((before, record.clone()))
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn get(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> StoreResult<Option<InventoryRecord>> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.records.get(&(product_id, warehouse_id)).cloned())
    }

    async fn get_all_for_product(&self, product_id: ProductId) -> StoreResult<Vec<InventoryRecord>> {
        let ledger = self.ledger.lock().await;
        let mut records: Vec<_> = ledger
            .records
            .values()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.warehouse_id);
        Ok(records)
    }

    async fn adjust(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        delta: i64,
    ) -> StoreResult<InventoryRecord> {
        let mut ledger = self.ledger.lock().await;
        let (_, after) =
            apply_adjustment(&mut ledger.records, product_id, warehouse_id, delta, Utc::now())?;
        Ok(after)
    }

    async fn list_below_minimum(&self, limit: usize) -> StoreResult<Vec<InventoryRecord>> {
        let ledger = self.ledger.lock().await;
        let mut records: Vec<_> = ledger
            .records
            .values()
            .filter(|r| r.is_below_minimum())
            .cloned()
            .collect();
        sort_by_deficit(&mut records);
        records.truncate(limit);
        Ok(records)
    }

    async fn assign(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: i64,
        min_quantity: i64,
    ) -> StoreResult<InventoryRecord> {
        {
            let catalog = self.catalog_read()?;
            let product = catalog
                .products
                .get(&product_id)
                .ok_or_else(|| StoreError::NotFound(format!("product {product_id}")))?;
            product.ensure_stockable()?;
            if !catalog.warehouses.contains_key(&warehouse_id) {
                return Err(StoreError::NotFound(format!("warehouse {warehouse_id}")));
            }
        }

        let record =
            InventoryRecord::new(product_id, warehouse_id, quantity, min_quantity, Utc::now())?;

        let mut ledger = self.ledger.lock().await;
        ledger
            .records
            .insert((product_id, warehouse_id), record.clone());
        Ok(record)
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn create_product(&self, product: Product) -> StoreResult<Product> {
        let mut catalog = self.catalog_write()?;
        let id = product.id_typed();

        if catalog.products.contains_key(&id) {
            return Err(StoreError::Conflict(format!("product {id} already exists")));
        }
        if catalog.skus.contains_key(product.sku()) {
            return Err(StoreError::Conflict(format!(
                "SKU '{}' already exists",
                product.sku()
            )));
        }

        catalog.skus.insert(product.sku().to_string(), id);
        catalog.products.insert(id, product.clone());
        Ok(product)
    }

    async fn product(&self, product_id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.catalog_read()?.products.get(&product_id).cloned())
    }

    async fn bundle_components(&self, bundle_id: ProductId) -> StoreResult<Vec<BundleComponent>> {
        let mut components = self
            .catalog_read()?
            .components
            .get(&bundle_id)
            .cloned()
            .unwrap_or_default();
        sort_components(&mut components);
        Ok(components)
    }

    async fn add_bundle_component(
        &self,
        bundle_id: ProductId,
        component_id: ProductId,
        quantity_per_bundle: u32,
        sort_order: i32,
    ) -> StoreResult<BundleComponent> {
        let mut catalog = self.catalog_write()?;

        let bundle = catalog
            .products
            .get(&bundle_id)
            .ok_or_else(|| StoreError::NotFound(format!("product {bundle_id}")))?;
        let component = catalog
            .products
            .get(&component_id)
            .ok_or_else(|| StoreError::NotFound(format!("product {component_id}")))?;
        let existing = catalog
            .components
            .get(&bundle_id)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let line = BundleComponent::new(bundle, component, quantity_per_bundle, sort_order, existing)?;

        ensure_acyclic(bundle_id, component_id, |id| {
            catalog
                .components
                .get(&id)
                .map(|lines| lines.iter().map(|c| c.component_id).collect())
                .unwrap_or_default()
        })?;

        catalog
            .components
            .entry(bundle_id)
            .or_default()
            .push(line.clone());
        Ok(line)
    }

    async fn create_warehouse(&self, warehouse: Warehouse) -> StoreResult<Warehouse> {
        let mut catalog = self.catalog_write()?;
        if catalog.warehouses.contains_key(&warehouse.id) {
            return Err(StoreError::Conflict(format!(
                "warehouse {} already exists",
                warehouse.id
            )));
        }
        catalog.warehouses.insert(warehouse.id, warehouse.clone());
        Ok(warehouse)
    }

    async fn warehouse(&self, warehouse_id: WarehouseId) -> StoreResult<Option<Warehouse>> {
        Ok(self.catalog_read()?.warehouses.get(&warehouse_id).cloned())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn create_order(&self, order: Order) -> StoreResult<Order> {
        {
            let catalog = self.catalog_read()?;
            for item in order.items() {
                if !catalog.products.contains_key(&item.product_id) {
                    return Err(StoreError::Invalid(format!(
                        "unknown product {}",
                        item.product_id
                    )));
                }
                if let Some(warehouse_id) = item.warehouse_id {
                    if !catalog.warehouses.contains_key(&warehouse_id) {
                        return Err(StoreError::Invalid(format!(
                            "unknown warehouse {warehouse_id}"
                        )));
                    }
                }
            }
        }

        let mut ledger = self.ledger.lock().await;
        let id = order.id_typed();
        if ledger.orders.contains_key(&id) {
            return Err(StoreError::Conflict(format!("order {id} already exists")));
        }
        ledger.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn order(&self, order_id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.ledger.lock().await.orders.get(&order_id).cloned())
    }

    async fn movements_for_order(&self, order_id: OrderId) -> StoreResult<Vec<StockMovement>> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .movements
            .iter()
            .filter(|m| m.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn begin(&self) -> StoreResult<Box<dyn OrderTransaction>> {
        let state = Arc::clone(&self.ledger).lock_owned().await;
        Ok(Box::new(InMemoryOrderTransaction {
            state,
            undo: Vec::new(),
            finished: false,
        }))
    }
}

#[derive(Debug)]
enum Undo {
    Record(InventoryRecord),
    Order(Order),
    Movement,
}

/// Exclusive hold on the ledger plus an undo journal.
///
/// Writes are applied in place; rollback (explicit or on drop) replays the
/// journal backwards.
pub struct InMemoryOrderTransaction {
    state: OwnedMutexGuard<LedgerState>,
    undo: Vec<Undo>,
    finished: bool,
}

impl InMemoryOrderTransaction {
    fn undo_all(&mut self) {
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::Record(previous) => {
                    self.state
                        .records
                        .insert((previous.product_id, previous.warehouse_id), previous);
                }
                Undo::Order(previous) => {
                    self.state.orders.insert(previous.id_typed(), previous);
                }
                Undo::Movement => {
                    self.state.movements.pop();
                }
            }
        }
    }
}

impl Drop for InMemoryOrderTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.undo_all();
        }
    }
}

#[async_trait]
impl StockLedger for InMemoryOrderTransaction {
    async fn adjust(
        &mut self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        delta: i64,
    ) -> StoreResult<InventoryRecord> {
        let (before, after) = apply_adjustment(
            &mut self.state.records,
            product_id,
            warehouse_id,
            delta,
            Utc::now(),
        )?;
        self.undo.push(Undo::Record(before));
        Ok(after)
    }

    async fn record_movement(&mut self, movement: StockMovement) -> StoreResult<()> {
        self.state.movements.push(movement);
        self.undo.push(Undo::Movement);
        Ok(())
    }

    async fn movements(&mut self, order_id: OrderId) -> StoreResult<Vec<StockMovement>> {
        Ok(self
            .state
            .movements
            .iter()
            .filter(|m| m.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderTransaction for InMemoryOrderTransaction {
    async fn update_status(
        &mut self,
        order_id: OrderId,
        expected: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let order = self
            .state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;

        if order.status() != expected {
            return Err(StoreError::Conflict(format!(
                "order {order_id} is {}, expected {expected}",
                order.status()
            )));
        }

        let previous = order.clone();
        order.transition_to(to, at)?;
        self.undo.push(Undo::Order(previous));
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.undo.clear();
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        self.undo_all();
        self.finished = true;
        Ok(())
    }
}
