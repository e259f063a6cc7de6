use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockflow_infra::fulfillment::FulfillmentError;
use stockflow_infra::store::StoreError;

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        e @ StoreError::InsufficientStock { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock", e.to_string())
        }
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Invalid(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        StoreError::Backend(msg) => {
            tracing::error!(error = %msg, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

/// Batch rejections keep their own body shape (`error` is the human message and
/// the offending `orderIds` are listed); everything else uses the house format.
pub fn fulfillment_error_to_response(err: FulfillmentError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        FulfillmentError::MissingWarehouse { order_ids } => batch_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": message, "orderIds": id_strings(&order_ids) }),
        ),
        FulfillmentError::InsufficientInventory { details } => {
            let details: serde_json::Map<String, serde_json::Value> = details
                .iter()
                .map(|(id, errors)| (id.to_string(), json!(errors)))
                .collect();
            batch_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": message,
                    "orderIds": details.keys().cloned().collect::<Vec<_>>(),
                    "details": details,
                }),
            )
        }
        FulfillmentError::OrdersNotFound { order_ids } => batch_error(
            StatusCode::NOT_FOUND,
            json!({ "error": message, "orderIds": id_strings(&order_ids) }),
        ),
        FulfillmentError::Validation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg)
        }
        FulfillmentError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        FulfillmentError::Consistency { .. } => {
            json_error(StatusCode::CONFLICT, "consistency_error", message)
        }
        FulfillmentError::Store(e) => store_error_to_response(e),
    }
}

fn batch_error(status: StatusCode, body: serde_json::Value) -> axum::response::Response {
    (status, axum::Json(body)).into_response()
}

fn id_strings<T: ToString>(ids: &[T]) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path or body id, answering 400 `invalid_id` on failure.
pub fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.parse::<T>().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}
