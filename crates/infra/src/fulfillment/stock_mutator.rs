use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, warn};

use stockflow_core::{OrderId, ProductId, WarehouseId};
use stockflow_inventory::{Direction, expand_line};
use stockflow_sales::OrderItem;

use super::{FulfillmentError, FulfillmentResult};
use crate::store::{CatalogStore, StockLedger, StockMovement};

/// Net change per inventory record, ordered by `(product, warehouse)`.
///
/// Applying writes in key order keeps concurrent order transactions from
/// locking the same rows in opposite orders.
pub type StockPlan = BTreeMap<(ProductId, WarehouseId), i64>;

/// Applies an order's stock effect through an open unit of work.
pub struct StockMutator<'a, S: ?Sized> {
    catalog: &'a S,
}

impl<'a, S> StockMutator<'a, S>
where
    S: CatalogStore + ?Sized,
{
    pub fn new(catalog: &'a S) -> Self {
        Self { catalog }
    }

    /// Expand `items` into per-record changes. Bundles expand into their
    /// components at the line's warehouse.
    pub async fn plan(&self, items: &[OrderItem], direction: Direction) -> FulfillmentResult<StockPlan> {
        let mut plan = StockPlan::new();

        for (idx, item) in items.iter().enumerate() {
            let line = item.stock_line().ok_or_else(|| {
                FulfillmentError::Validation(format!(
                    "Line item {}: missing warehouse_id",
                    idx + 1
                ))
            })?;
            let product = self
                .catalog
                .product(item.product_id)
                .await?
                .ok_or_else(|| FulfillmentError::NotFound(format!("product {}", item.product_id)))?;
            let components = if product.is_bundle() {
                self.catalog.bundle_components(item.product_id).await?
            } else {
                Vec::new()
            };

            for adj in expand_line(&line, &product, &components, direction)? {
                *plan.entry((adj.product_id, adj.warehouse_id)).or_insert(0) += adj.delta;
            }
        }

        plan.retain(|_, delta| *delta != 0);
        Ok(plan)
    }

    /// Consume stock for `items`.
    pub async fn decrement<L>(
        &self,
        ledger: &mut L,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> FulfillmentResult<Vec<StockMovement>>
    where
        L: StockLedger + ?Sized,
    {
        let plan = self.plan(items, Direction::Decrement).await?;
        apply(ledger, order_id, Direction::Decrement, plan).await
    }

    /// Return stock for `items`: the same traversal as [`Self::decrement`] with
    /// the sign inverted.
    ///
    /// When the order's movement journal disagrees with the plan (a bundle
    /// definition changed while the order was fulfilled), the journal wins so
    /// that exactly what was taken is put back.
    pub async fn restore<L>(
        &self,
        ledger: &mut L,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> FulfillmentResult<Vec<StockMovement>>
    where
        L: StockLedger + ?Sized,
    {
        let planned = self.plan(items, Direction::Restore).await?;
        let held = held_by_order(&ledger.movements(order_id).await?);

        let plan = if held.is_empty() || held == planned {
            planned
        } else {
            warn!(
                order_id = %order_id,
                "bundle definition changed since fulfillment; restoring from movement journal"
            );
            held
        };

        apply(ledger, order_id, Direction::Restore, plan).await
    }
}

/// What an order currently holds, expressed as the restore that releases it.
fn held_by_order(movements: &[StockMovement]) -> StockPlan {
    let mut held = StockPlan::new();
    for m in movements {
        *held.entry((m.product_id, m.warehouse_id)).or_insert(0) -= m.delta;
    }
    held.retain(|_, delta| *delta > 0);
    held
}

async fn apply<L>(
    ledger: &mut L,
    order_id: OrderId,
    direction: Direction,
    plan: StockPlan,
) -> FulfillmentResult<Vec<StockMovement>>
where
    L: StockLedger + ?Sized,
{
    let mut movements = Vec::with_capacity(plan.len());

    for ((product_id, warehouse_id), delta) in plan {
        let record = ledger.adjust(product_id, warehouse_id, delta).await?;
        debug!(
            order_id = %order_id,
            product_id = %product_id,
            warehouse_id = %warehouse_id,
            delta,
            quantity = record.quantity,
            "stock adjusted"
        );

        let movement = StockMovement {
            order_id,
            product_id,
            warehouse_id,
            delta,
            direction,
            recorded_at: Utc::now(),
        };
        ledger.record_movement(movement.clone()).await?;
        movements.push(movement);
    }

    Ok(movements)
}

#[cfg(test)]
mod tests {
    use stockflow_inventory::Warehouse;
    use stockflow_products::{Product, ProductKind};
    use stockflow_sales::Order;

    use super::*;
    use crate::store::{InMemoryStore, InventoryStore, OrderStore, StoreError};

    struct Fixture {
        store: InMemoryStore,
        bundle: ProductId,
        part_a: ProductId,
        part_b: ProductId,
        warehouse: WarehouseId,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let mut ids = Vec::new();
        for (sku, kind) in [
            ("X", ProductKind::Bundle),
            ("A", ProductKind::Simple),
            ("B", ProductKind::Simple),
        ] {
            let p = Product::new(ProductId::new(), sku, sku, kind).unwrap();
            ids.push(store.create_product(p).await.unwrap().id_typed());
        }
        let w = store
            .create_warehouse(Warehouse::new(WarehouseId::new(), "Main").unwrap())
            .await
            .unwrap()
            .id;
        store.assign(ids[1], w, 10, 0).await.unwrap();
        store.assign(ids[2], w, 4, 0).await.unwrap();
        store.add_bundle_component(ids[0], ids[1], 2, 0).await.unwrap();
        store.add_bundle_component(ids[0], ids[2], 1, 1).await.unwrap();

        Fixture {
            store,
            bundle: ids[0],
            part_a: ids[1],
            part_b: ids[2],
            warehouse: w,
        }
    }

    async fn quantity(f: &Fixture, product: ProductId) -> i64 {
        f.store.get(product, f.warehouse).await.unwrap().unwrap().quantity
    }

    #[tokio::test]
    async fn plan_merges_lines_touching_the_same_record() {
        let f = fixture().await;
        let items = vec![
            OrderItem::new(f.bundle, Some(f.warehouse), 1, 0).unwrap(),
            OrderItem::new(f.part_a, Some(f.warehouse), 3, 0).unwrap(),
        ];
        let plan = StockMutator::new(&f.store)
            .plan(&items, Direction::Decrement)
            .await
            .unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[&(f.part_a, f.warehouse)], -5);
        assert_eq!(plan[&(f.part_b, f.warehouse)], -1);
    }

    #[tokio::test]
    async fn decrement_then_restore_is_identity() {
        let f = fixture().await;
        let order = Order::new(
            OrderId::new(),
            vec![OrderItem::new(f.bundle, Some(f.warehouse), 2, 0).unwrap()],
            chrono::Utc::now(),
        )
        .unwrap();
        let order_id = order.id_typed();
        f.store.create_order(order.clone()).await.unwrap();
        let mutator = StockMutator::new(&f.store);

        let mut tx = f.store.begin().await.unwrap();
        let taken = mutator.decrement(&mut *tx, order_id, order.items()).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(taken.len(), 2);
        assert_eq!(quantity(&f, f.part_a).await, 6);
        assert_eq!(quantity(&f, f.part_b).await, 2);

        let mut tx = f.store.begin().await.unwrap();
        mutator.restore(&mut *tx, order_id, order.items()).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(quantity(&f, f.part_a).await, 10);
        assert_eq!(quantity(&f, f.part_b).await, 4);

        let net: i64 = f
            .store
            .movements_for_order(order_id)
            .await
            .unwrap()
            .iter()
            .map(|m| m.delta)
            .sum();
        assert_eq!(net, 0);
    }

    #[tokio::test]
    async fn failing_adjustment_surfaces_insufficient_stock() {
        let f = fixture().await;
        let items = vec![OrderItem::new(f.bundle, Some(f.warehouse), 5, 0).unwrap()];
        let mutator = StockMutator::new(&f.store);

        let mut tx = f.store.begin().await.unwrap();
        let err = mutator
            .decrement(&mut *tx, OrderId::new(), &items)
            .await
            .unwrap_err();
        tx.rollback().await.unwrap();

        assert!(matches!(
            err,
            FulfillmentError::Store(StoreError::InsufficientStock { .. })
        ));
        assert_eq!(quantity(&f, f.part_a).await, 10);
        assert_eq!(quantity(&f, f.part_b).await, 4);
    }

    #[tokio::test]
    async fn restore_follows_journal_when_bundle_definition_changed() {
        let f = fixture().await;
        let items = vec![OrderItem::new(f.bundle, Some(f.warehouse), 1, 0).unwrap()];
        let order_id = OrderId::new();
        let mutator = StockMutator::new(&f.store);

        let mut tx = f.store.begin().await.unwrap();
        mutator.decrement(&mut *tx, order_id, &items).await.unwrap();
        tx.commit().await.unwrap();

        // Add a third component after fulfillment.
        let extra = Product::new(ProductId::new(), "C", "C", ProductKind::Simple).unwrap();
        let extra = f.store.create_product(extra).await.unwrap().id_typed();
        f.store.assign(extra, f.warehouse, 1, 0).await.unwrap();
        f.store.add_bundle_component(f.bundle, extra, 1, 2).await.unwrap();

        let mut tx = f.store.begin().await.unwrap();
        mutator.restore(&mut *tx, order_id, &items).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(quantity(&f, f.part_a).await, 10);
        assert_eq!(quantity(&f, f.part_b).await, 4);
        assert_eq!(quantity(&f, extra).await, 1);
    }
}
