//! Pre-flight checks for orders entering `Complete`.
//!
//! Nothing here writes. Quantities requested earlier in the same pass are
//! reserved against the stock they would consume, so a batch is checked as a
//! whole and not order by order.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, instrument};

use stockflow_core::{OrderId, ProductId, WarehouseId};
use stockflow_inventory::{StockReservations, resolve_bundle};
use stockflow_products::{BundleComponent, Product};
use stockflow_sales::{Order, OrderItem};

use super::{BundleResolver, FulfillmentResult};
use crate::store::{CatalogStore, InventoryStore};

/// Outcome of validating one set of line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Outcome of validating a batch of orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchValidation {
    /// Orders with at least one line item lacking a warehouse.
    pub missing_warehouse: Vec<OrderId>,
    /// Stock failures per order.
    pub insufficient: BTreeMap<OrderId, Vec<String>>,
}

impl BatchValidation {
    pub fn is_valid(&self) -> bool {
        self.missing_warehouse.is_empty() && self.insufficient.is_empty()
    }
}

pub struct FulfillmentValidator<'a, S: ?Sized> {
    store: &'a S,
}

/// Lookups memoized for one validation pass.
#[derive(Default)]
struct Pass {
    reservations: StockReservations,
    stock: HashMap<(ProductId, WarehouseId), i64>,
    products: HashMap<ProductId, Option<Product>>,
    components: HashMap<ProductId, Result<Vec<BundleComponent>, String>>,
}

impl<'a, S> FulfillmentValidator<'a, S>
where
    S: InventoryStore + CatalogStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Check `items` against current stock. Every item is checked and every
    /// failure reported.
    pub async fn validate(&self, items: &[OrderItem]) -> FulfillmentResult<ValidationReport> {
        let mut pass = Pass::default();
        let errors = self.check_items(items, &mut pass).await?;
        Ok(ValidationReport {
            valid: errors.is_empty(),
            errors,
        })
    }

    /// Check every order of a batch, in order, against stock net of what the
    /// orders before it (and earlier lines of the same order) request.
    ///
    /// Orders with missing warehouses are listed in `missing_warehouse` and
    /// reserve nothing. An order that fails releases the stock its passing
    /// lines reserved, so later orders are judged only against orders that pass.
    #[instrument(skip_all, fields(orders = orders.len()), err)]
    pub async fn validate_batch(&self, orders: &[Order]) -> FulfillmentResult<BatchValidation> {
        let mut pass = Pass::default();
        let mut result = BatchValidation::default();

        for order in orders {
            if !order.items_missing_warehouse().is_empty() {
                result.missing_warehouse.push(order.id_typed());
                continue;
            }

            let checkpoint = pass.reservations.clone();
            let errors = self.check_items(order.items(), &mut pass).await?;
            if !errors.is_empty() {
                pass.reservations = checkpoint;
                debug!(order_id = %order.id_typed(), failures = errors.len(), "order failed stock check");
                result.insufficient.insert(order.id_typed(), errors);
            }
        }

        Ok(result)
    }

    async fn check_items(
        &self,
        items: &[OrderItem],
        pass: &mut Pass,
    ) -> FulfillmentResult<Vec<String>> {
        let mut errors = Vec::new();

        for (idx, item) in items.iter().enumerate() {
            let line = idx + 1;

            let Some(warehouse_id) = item.warehouse_id else {
                errors.push(format!("Line item {line}: missing warehouse_id"));
                continue;
            };

            let Some(product) = self.product(item.product_id, pass).await? else {
                errors.push(format!(
                    "Line item {line}: product {} not found",
                    item.product_id
                ));
                continue;
            };

            if product.is_bundle() {
                if let Some(error) = self
                    .check_bundle(line, &product, warehouse_id, item.quantity, pass)
                    .await?
                {
                    errors.push(error);
                }
                continue;
            }

            let on_hand = self.on_hand(item.product_id, warehouse_id, pass).await?;
            let available = pass
                .reservations
                .remaining(item.product_id, warehouse_id, on_hand)
                .max(0);

            if available < item.quantity {
                errors.push(format!(
                    "Line item {line}: insufficient stock for {} at warehouse {warehouse_id} \
                     (requested {}, available {available})",
                    product.sku(),
                    item.quantity
                ));
            } else {
                pass.reservations
                    .reserve(item.product_id, warehouse_id, item.quantity);
            }
        }

        Ok(errors)
    }

    async fn check_bundle(
        &self,
        line: usize,
        bundle: &Product,
        warehouse_id: WarehouseId,
        quantity: i64,
        pass: &mut Pass,
    ) -> FulfillmentResult<Option<String>> {
        let bundle_id = bundle.id_typed();

        if !pass.components.contains_key(&bundle_id) {
            let resolved = BundleResolver::new(self.store)
                .components(bundle_id)
                .await
                .map_err(|e| e.to_string());
            pass.components.insert(bundle_id, resolved);
        }
        let components = match pass.components.get(&bundle_id) {
            Some(Ok(components)) => components.clone(),
            Some(Err(reason)) => return Ok(Some(format!("Line item {line}: {reason}"))),
            None => Vec::new(),
        };

        for c in &components {
            self.on_hand(c.component_id, warehouse_id, pass).await?;
        }

        let availability = resolve_bundle(bundle_id, Some(warehouse_id), &components, |id| {
            let on_hand = pass.stock.get(&(id, warehouse_id)).copied().unwrap_or(0);
            pass.reservations.remaining(id, warehouse_id, on_hand)
        })?;

        if availability.available_quantity < quantity {
            return Ok(Some(format!(
                "Line item {line}: insufficient availability for bundle {} at warehouse {warehouse_id} \
                 (requested {quantity}, available {}, limited by component {})",
                bundle.sku(),
                availability.available_quantity,
                availability.limiting_component_id
            )));
        }

        for c in &components {
            pass.reservations
                .reserve(c.component_id, warehouse_id, c.required_for(quantity));
        }
        Ok(None)
    }

    async fn product(
        &self,
        product_id: ProductId,
        pass: &mut Pass,
    ) -> FulfillmentResult<Option<Product>> {
        if let Some(cached) = pass.products.get(&product_id) {
            return Ok(cached.clone());
        }
        let product = self.store.product(product_id).await?;
        pass.products.insert(product_id, product.clone());
        Ok(product)
    }

    async fn on_hand(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        pass: &mut Pass,
    ) -> FulfillmentResult<i64> {
        if let Some(quantity) = pass.stock.get(&(product_id, warehouse_id)) {
            return Ok(*quantity);
        }
        let quantity = self
            .store
            .get(product_id, warehouse_id)
            .await?
            .map(|r| r.quantity)
            .unwrap_or(0);
        pass.stock.insert((product_id, warehouse_id), quantity);
        Ok(quantity)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use stockflow_inventory::Warehouse;
    use stockflow_products::ProductKind;

    use super::*;
    use crate::store::InMemoryStore;

    struct Fixture {
        store: InMemoryStore,
        simple: ProductId,
        bundle: ProductId,
        part_a: ProductId,
        part_b: ProductId,
        warehouse: WarehouseId,
    }

    /// Simple product with 10 on hand; bundle = 2×A + 1×B with A=10, B=4.
    async fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let mut ids = Vec::new();
        for (sku, kind) in [
            ("P", ProductKind::Simple),
            ("X", ProductKind::Bundle),
            ("A", ProductKind::Simple),
            ("B", ProductKind::Simple),
        ] {
            let p = Product::new(ProductId::new(), sku, sku, kind).unwrap();
            ids.push(store.create_product(p).await.unwrap().id_typed());
        }
        let warehouse = Warehouse::new(WarehouseId::new(), "Main").unwrap();
        let w = store.create_warehouse(warehouse).await.unwrap().id;

        store.assign(ids[0], w, 10, 0).await.unwrap();
        store.assign(ids[2], w, 10, 0).await.unwrap();
        store.assign(ids[3], w, 4, 0).await.unwrap();
        store.add_bundle_component(ids[1], ids[2], 2, 0).await.unwrap();
        store.add_bundle_component(ids[1], ids[3], 1, 1).await.unwrap();

        Fixture {
            store,
            simple: ids[0],
            bundle: ids[1],
            part_a: ids[2],
            part_b: ids[3],
            warehouse: w,
        }
    }

    fn item(product: ProductId, warehouse: Option<WarehouseId>, quantity: i64) -> OrderItem {
        OrderItem::new(product, warehouse, quantity, 100).unwrap()
    }

    fn order(items: Vec<OrderItem>) -> Order {
        Order::new(OrderId::new(), items, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn collects_every_failure() {
        let f = fixture().await;
        let validator = FulfillmentValidator::new(&f.store);

        let report = validator
            .validate(&[
                item(f.simple, None, 1),
                item(f.simple, Some(f.warehouse), 11),
                item(f.bundle, Some(f.warehouse), 5),
            ])
            .await
            .unwrap();

        assert!(!report.valid);
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors[0].contains("missing warehouse_id"));
    }

    #[tokio::test]
    async fn passes_when_stock_covers_request() {
        let f = fixture().await;
        let validator = FulfillmentValidator::new(&f.store);

        let report = validator
            .validate(&[
                item(f.simple, Some(f.warehouse), 10),
                item(f.bundle, Some(f.warehouse), 4),
            ])
            .await
            .unwrap();
        assert!(report.valid, "{:?}", report.errors);
    }

    #[tokio::test]
    async fn batch_reserves_stock_across_orders() {
        let f = fixture().await;
        let validator = FulfillmentValidator::new(&f.store);

        let first = order(vec![item(f.simple, Some(f.warehouse), 6)]);
        let second = order(vec![item(f.simple, Some(f.warehouse), 5)]);

        let alone = validator.validate_batch(&[second.clone()]).await.unwrap();
        assert!(alone.is_valid());

        let both = validator
            .validate_batch(&[first.clone(), second.clone()])
            .await
            .unwrap();
        assert!(!both.is_valid());
        assert!(!both.insufficient.contains_key(&first.id_typed()));
        assert!(both.insufficient.contains_key(&second.id_typed()));
    }

    #[tokio::test]
    async fn bundle_and_component_orders_share_reservations() {
        let f = fixture().await;
        let validator = FulfillmentValidator::new(&f.store);

        // 3 bundles claim 6×A and 3×B, leaving B=1.
        let kits = order(vec![item(f.bundle, Some(f.warehouse), 3)]);
        let loose_b = order(vec![item(f.part_b, Some(f.warehouse), 2)]);
        let loose_a = order(vec![item(f.part_a, Some(f.warehouse), 4)]);

        let result = validator
            .validate_batch(&[kits, loose_b.clone(), loose_a.clone()])
            .await
            .unwrap();
        assert_eq!(result.insufficient.len(), 1);
        assert!(result.insufficient.contains_key(&loose_b.id_typed()));
    }

    #[tokio::test]
    async fn failed_order_releases_its_reservations() {
        let f = fixture().await;
        let validator = FulfillmentValidator::new(&f.store);

        // Line 1 fits (6 of 10), line 2 does not (5 bundles, only 4 buildable).
        let failing = order(vec![
            item(f.simple, Some(f.warehouse), 6),
            item(f.bundle, Some(f.warehouse), 5),
        ]);
        let later = order(vec![item(f.simple, Some(f.warehouse), 5)]);

        let result = validator
            .validate_batch(&[failing.clone(), later.clone()])
            .await
            .unwrap();
        assert!(result.insufficient.contains_key(&failing.id_typed()));
        assert!(
            !result.insufficient.contains_key(&later.id_typed()),
            "{:?}",
            result.insufficient
        );
    }

    #[tokio::test]
    async fn missing_warehouse_orders_are_listed() {
        let f = fixture().await;
        let validator = FulfillmentValidator::new(&f.store);

        let missing = order(vec![item(f.simple, None, 1)]);
        let result = validator.validate_batch(&[missing.clone()]).await.unwrap();
        assert_eq!(result.missing_warehouse, vec![missing.id_typed()]);
        assert!(result.insufficient.is_empty());
    }
}
