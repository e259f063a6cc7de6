use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockflow_core::{ProductId, WarehouseId};
use stockflow_infra::fulfillment::BundleResolver;
use stockflow_infra::store::CatalogStore;
use stockflow_products::{Product, ProductKind};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product))
        .route("/:id", get(get_product))
        .route("/:id/components", post(add_component))
        .route("/:id/bundle-availability", get(bundle_availability))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let kind = if body.is_bundle {
        ProductKind::Bundle
    } else {
        ProductKind::Simple
    };
    let product = match Product::new(ProductId::new(), body.sku, body.name, kind) {
        Ok(p) => p,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };

    match services.store().create_product(product).await {
        Ok(p) => (StatusCode::CREATED, Json(dto::product_to_json(&p, &[]))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let store = services.store();
    let product = match store.product(product_id).await {
        Ok(Some(p)) => p,
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        Err(e) => return errors::store_error_to_response(e),
    };
    let components = if product.is_bundle() {
        match store.bundle_components(product_id).await {
            Ok(c) => c,
            Err(e) => return errors::store_error_to_response(e),
        }
    } else {
        Vec::new()
    };

    (StatusCode::OK, Json(dto::product_to_json(&product, &components))).into_response()
}

pub async fn add_component(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddComponentRequest>,
) -> axum::response::Response {
    let bundle_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let component_id: ProductId = match errors::parse_id(&body.component_id, "component") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let store = services.store();
    let sort_order = match body.sort_order {
        Some(s) => s,
        None => match store.bundle_components(bundle_id).await {
            Ok(existing) => i32::try_from(existing.len()).unwrap_or(i32::MAX),
            Err(e) => return errors::store_error_to_response(e),
        },
    };

    match store
        .add_bundle_component(bundle_id, component_id, body.quantity_per_bundle, sort_order)
        .await
    {
        Ok(c) => (StatusCode::CREATED, Json(dto::component_to_json(&c))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Sellable quantity of a bundle, derived from component stock. Without
/// `warehouseId` component quantities are summed across warehouses.
pub async fn bundle_availability(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::AvailabilityQuery>,
) -> axum::response::Response {
    let bundle_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let warehouse_id: Option<WarehouseId> = match query.warehouse_id.as_deref() {
        None => None,
        Some(raw) => match errors::parse_id(raw, "warehouse") {
            Ok(v) => Some(v),
            Err(resp) => return resp,
        },
    };

    match BundleResolver::new(services.store())
        .resolve_availability(bundle_id, warehouse_id)
        .await
    {
        Ok(availability) => {
            (StatusCode::OK, Json(dto::availability_to_json(&availability))).into_response()
        }
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}
