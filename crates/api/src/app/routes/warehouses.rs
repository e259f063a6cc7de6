use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockflow_core::WarehouseId;
use stockflow_infra::store::CatalogStore;
use stockflow_inventory::Warehouse;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_warehouse))
        .route("/:id", get(get_warehouse))
}

pub async fn create_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateWarehouseRequest>,
) -> axum::response::Response {
    let warehouse = match Warehouse::new(WarehouseId::new(), body.name) {
        Ok(w) => w,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };

    match services.store().create_warehouse(warehouse).await {
        Ok(w) => (StatusCode::CREATED, Json(dto::warehouse_to_json(&w))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let warehouse_id: WarehouseId = match errors::parse_id(&id, "warehouse") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.store().warehouse(warehouse_id).await {
        Ok(Some(w)) => (StatusCode::OK, Json(dto::warehouse_to_json(&w))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "warehouse not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}
