use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};

use stockflow_core::{ProductId, WarehouseId};
use stockflow_infra::store::InventoryStore;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/low-stock", get(low_stock))
        .route("/:product_id", get(get_for_product))
        .route("/:product_id/:warehouse_id", put(assign_inventory))
}

/// Records below their reorder minimum, largest deficit first.
pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::LowStockQuery>,
) -> axum::response::Response {
    let limit = query.limit.unwrap_or(services.low_stock_default_limit());

    match services.store().list_below_minimum(limit).await {
        Ok(records) => (
            StatusCode::OK,
            Json(records.iter().map(dto::inventory_to_json).collect::<Vec<_>>()),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_for_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&product_id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.store().get_all_for_product(product_id).await {
        Ok(records) => (
            StatusCode::OK,
            Json(records.iter().map(dto::inventory_to_json).collect::<Vec<_>>()),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn assign_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Path((product_id, warehouse_id)): Path<(String, String)>,
    Json(body): Json<dto::AssignInventoryRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&product_id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let warehouse_id: WarehouseId = match errors::parse_id(&warehouse_id, "warehouse") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .store()
        .assign(product_id, warehouse_id, body.quantity, body.min_quantity)
        .await
    {
        Ok(record) => (StatusCode::OK, Json(dto::inventory_to_json(&record))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
