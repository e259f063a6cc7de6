use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use stockflow_core::{OrderId, ProductId, WarehouseId};
use stockflow_infra::store::OrderStore;
use stockflow_sales::{Order, OrderItem, OrderStatus};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order))
        .route("/status", post(bulk_update_status))
        .route("/:id", get(get_order))
        .route("/:id/movements", get(get_movements))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let mut items = Vec::with_capacity(body.items.len());
    for line in body.items {
        let product_id: ProductId = match errors::parse_id(&line.product_id, "product") {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        let warehouse_id: Option<WarehouseId> = match line.warehouse_id.as_deref() {
            None => None,
            Some(raw) => match errors::parse_id(raw, "warehouse") {
                Ok(v) => Some(v),
                Err(resp) => return resp,
            },
        };
        match OrderItem::new(product_id, warehouse_id, line.quantity, line.price) {
            Ok(item) => items.push(item),
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string());
            }
        }
    }

    let order = match Order::new(OrderId::new(), items, Utc::now()) {
        Ok(o) => o,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };

    match services.store().create_order(order).await {
        Ok(o) => (StatusCode::CREATED, Json(dto::order_to_json(&o))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Move a batch of orders to one status, applying the inventory effect of
/// entering or leaving `Complete`.
pub async fn bulk_update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::BulkStatusRequest>,
) -> axum::response::Response {
    let status = match OrderStatus::parse(&body.status) {
        Ok(s) => s,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };

    let mut order_ids = Vec::with_capacity(body.order_ids.len());
    for raw in &body.order_ids {
        match errors::parse_id::<OrderId>(raw, "order") {
            Ok(id) => order_ids.push(id),
            Err(resp) => return resp,
        }
    }

    match services
        .coordinator()
        .bulk_update_status(&order_ids, status)
        .await
    {
        Ok(outcome) => {
            let code = if outcome.all_failed() {
                StatusCode::CONFLICT
            } else {
                StatusCode::OK
            };
            (code, Json(dto::bulk_outcome_to_json(&outcome))).into_response()
        }
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.store().order(order_id).await {
        Ok(Some(o)) => (StatusCode::OK, Json(dto::order_to_json(&o))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// The order's stock movement journal, oldest first.
pub async fn get_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let store = services.store();
    match store.order(order_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
        Err(e) => return errors::store_error_to_response(e),
    }

    match store.movements_for_order(order_id).await {
        Ok(movements) => (
            StatusCode::OK,
            Json(movements.iter().map(dto::movement_to_json).collect::<Vec<_>>()),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
