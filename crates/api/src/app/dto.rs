use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::json;

use stockflow_infra::fulfillment::BulkStatusOutcome;
use stockflow_infra::store::StockMovement;
use stockflow_inventory::{BundleAvailability, InventoryRecord, Warehouse};
use stockflow_products::{BundleComponent, Product};
use stockflow_sales::{Order, OrderItem};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub is_bundle: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddComponentRequest {
    pub component_id: String,
    pub quantity_per_bundle: u32,
    /// Defaults to appending after the existing components.
    pub sort_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateWarehouseRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignInventoryRequest {
    pub quantity: i64,
    #[serde(default)]
    pub min_quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: String,
    pub warehouse_id: Option<String>,
    pub quantity: i64,
    #[serde(default)]
    pub price: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatusRequest {
    pub order_ids: Vec<String>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub warehouse_id: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn product_to_json(product: &Product, components: &[BundleComponent]) -> serde_json::Value {
    json!({
        "id": product.id_typed().to_string(),
        "sku": product.sku(),
        "name": product.name(),
        "isBundle": product.is_bundle(),
        "isActive": product.is_active(),
        "components": components.iter().map(component_to_json).collect::<Vec<_>>(),
    })
}

pub fn component_to_json(component: &BundleComponent) -> serde_json::Value {
    json!({
        "bundleId": component.bundle_id.to_string(),
        "componentId": component.component_id.to_string(),
        "quantityPerBundle": component.quantity_per_bundle,
        "sortOrder": component.sort_order,
    })
}

pub fn warehouse_to_json(warehouse: &Warehouse) -> serde_json::Value {
    json!({
        "id": warehouse.id.to_string(),
        "name": warehouse.name,
    })
}

pub fn inventory_to_json(record: &InventoryRecord) -> serde_json::Value {
    json!({
        "productId": record.product_id.to_string(),
        "warehouseId": record.warehouse_id.to_string(),
        "quantity": record.quantity,
        "minQuantity": record.min_quantity,
        "updatedAt": record.updated_at.to_rfc3339(),
    })
}

pub fn order_to_json(order: &Order) -> serde_json::Value {
    json!({
        "id": order.id_typed().to_string(),
        "status": order.status().as_str(),
        "items": order.items().iter().map(order_item_to_json).collect::<Vec<_>>(),
        "createdAt": order.created_at().to_rfc3339(),
        "updatedAt": order.updated_at().to_rfc3339(),
    })
}

fn order_item_to_json(item: &OrderItem) -> serde_json::Value {
    json!({
        "productId": item.product_id.to_string(),
        "warehouseId": item.warehouse_id.map(|w| w.to_string()),
        "quantity": item.quantity,
        "price": item.price,
    })
}

pub fn movement_to_json(movement: &StockMovement) -> serde_json::Value {
    json!({
        "orderId": movement.order_id.to_string(),
        "productId": movement.product_id.to_string(),
        "warehouseId": movement.warehouse_id.to_string(),
        "delta": movement.delta,
        "direction": movement.direction.as_str(),
        "recordedAt": movement.recorded_at.to_rfc3339(),
    })
}

pub fn availability_to_json(availability: &BundleAvailability) -> serde_json::Value {
    json!({
        "bundleId": availability.bundle_id.to_string(),
        "warehouseId": availability.warehouse_id.map(|w| w.to_string()),
        "availableQuantity": availability.available_quantity,
        "limitingComponent": availability.limiting_component_id.to_string(),
        "componentInventory": availability
            .components
            .iter()
            .map(|c| json!({
                "componentId": c.component_id.to_string(),
                "requiredQuantity": c.required_quantity,
                "availableQuantity": c.available_quantity,
                "bundlesAvailable": c.bundles_available,
                "isLimiting": c.is_limiting,
            }))
            .collect::<Vec<_>>(),
    })
}

pub fn bulk_outcome_to_json(outcome: &BulkStatusOutcome) -> serde_json::Value {
    let mut body = json!({
        "message": outcome.message(),
        "updatedCount": outcome.updated_count(),
    });
    if !outcome.failed.is_empty() {
        let failures: BTreeMap<String, &String> = outcome
            .failed
            .iter()
            .map(|(id, reason)| (id.to_string(), reason))
            .collect();
        body["failures"] = json!(failures);
    }
    body
}
