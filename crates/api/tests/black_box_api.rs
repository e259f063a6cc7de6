use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use stockflow_api::app::services::AppServices;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory stores, ephemeral port.
        let app = stockflow_api::app::build_app(Arc::new(AppServices::in_memory()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> (StatusCode, Value) {
        let res = req.send().await.unwrap();
        let status = res.status();
        let body = res.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(self.client.get(format!("{}{}", self.base_url, path)))
            .await
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.client.post(format!("{}{}", self.base_url, path)).json(&body))
            .await
    }

    async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.client.put(format!("{}{}", self.base_url, path)).json(&body))
            .await
    }

    async fn product(&self, sku: &str, is_bundle: bool) -> String {
        let (status, body) = self
            .post(
                "/products",
                json!({ "sku": sku, "name": format!("{sku} product"), "isBundle": is_bundle }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn warehouse(&self, name: &str) -> String {
        let (status, body) = self.post("/warehouses", json!({ "name": name })).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn stock(&self, product: &str, warehouse: &str, quantity: i64, min_quantity: i64) {
        let (status, body) = self
            .put(
                &format!("/inventory/{product}/{warehouse}"),
                json!({ "quantity": quantity, "minQuantity": min_quantity }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    async fn component(&self, bundle: &str, component: &str, quantity_per_bundle: u32) {
        let (status, body) = self
            .post(
                &format!("/products/{bundle}/components"),
                json!({ "componentId": component, "quantityPerBundle": quantity_per_bundle }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    async fn order(&self, items: Value) -> String {
        let (status, body) = self.post("/orders", json!({ "items": items })).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn set_status(&self, order_ids: &[&str], status: &str) -> (StatusCode, Value) {
        self.post(
            "/orders/status",
            json!({ "orderIds": order_ids, "status": status }),
        )
        .await
    }

    async fn quantity(&self, product: &str, warehouse: &str) -> i64 {
        let (status, body) = self.get(&format!("/inventory/{product}")).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body.as_array()
            .unwrap()
            .iter()
            .find(|r| r["warehouseId"] == warehouse)
            .map(|r| r["quantity"].as_i64().unwrap())
            .unwrap_or(0)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_reports_backend() {
    let server = TestServer::spawn().await;

    let (status, body) = server.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "in_memory");
}

#[tokio::test]
async fn completing_orders_decrements_stock() {
    let server = TestServer::spawn().await;
    let w = server.warehouse("Main").await;
    let p = server.product("SKU-1", false).await;
    server.stock(&p, &w, 10, 0).await;

    let order = server
        .order(json!([{ "productId": p, "warehouseId": w, "quantity": 3, "price": 500 }]))
        .await;

    let (status, body) = server.set_status(&[&order], "Complete").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["updatedCount"], 1);
    assert_eq!(body["message"], "Updated 1 order(s) to Complete");
    assert!(body.get("failures").is_none());

    assert_eq!(server.quantity(&p, &w).await, 7);

    let (_, order_body) = server.get(&format!("/orders/{order}")).await;
    assert_eq!(order_body["status"], "Complete");

    let (status, movements) = server.get(&format!("/orders/{order}/movements")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(movements.as_array().unwrap().len(), 1);
    assert_eq!(movements[0]["delta"], -3);
    assert_eq!(movements[0]["direction"], "decrement");
}

#[tokio::test]
async fn insufficient_inventory_rejects_whole_batch() {
    let server = TestServer::spawn().await;
    let w = server.warehouse("Main").await;
    let p = server.product("SKU-1", false).await;
    server.stock(&p, &w, 5, 0).await;

    let first = server
        .order(json!([{ "productId": p, "warehouseId": w, "quantity": 3 }]))
        .await;
    let second = server
        .order(json!([{ "productId": p, "warehouseId": w, "quantity": 3 }]))
        .await;

    let (status, body) = server.set_status(&[&first, &second], "Complete").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["error"], "Insufficient inventory for one or more orders");
    assert_eq!(body["orderIds"], json!([second]));
    assert!(body["details"][&second].as_array().unwrap()[0]
        .as_str()
        .unwrap()
        .contains("insufficient stock"));

    assert_eq!(server.quantity(&p, &w).await, 5);
    let (_, order_body) = server.get(&format!("/orders/{first}")).await;
    assert_eq!(order_body["status"], "Proposed");
}

#[tokio::test]
async fn missing_warehouse_is_rejected() {
    let server = TestServer::spawn().await;
    let w = server.warehouse("Main").await;
    let p = server.product("SKU-1", false).await;
    server.stock(&p, &w, 5, 0).await;

    let order = server.order(json!([{ "productId": p, "quantity": 1 }])).await;

    let (status, body) = server.set_status(&[&order], "Complete").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["error"], "Each line item must have a warehouse_id");
    assert_eq!(body["orderIds"], json!([order]));

    // Statuses without inventory effect don't need a warehouse.
    let (status, body) = server.set_status(&[&order], "Paid").await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn unknown_orders_are_not_found() {
    let server = TestServer::spawn().await;
    let w = server.warehouse("Main").await;
    let p = server.product("SKU-1", false).await;
    server.stock(&p, &w, 5, 0).await;
    let known = server
        .order(json!([{ "productId": p, "warehouseId": w, "quantity": 1 }]))
        .await;
    let unknown = "01890000-0000-7000-8000-000000000000";

    let (status, body) = server.set_status(&[&known, unknown], "Complete").await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");
    assert_eq!(body["error"], "Order not found");
    assert_eq!(body["orderIds"], json!([unknown]));
    assert_eq!(server.quantity(&p, &w).await, 5);
}

#[tokio::test]
async fn malformed_requests_are_bad_requests() {
    let server = TestServer::spawn().await;

    let (status, body) = server.set_status(&["not-a-uuid"], "Complete").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, body) = server.set_status(&[], "Shipped").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = server.set_status(&[], "Complete").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updatedCount"], 0);
}

#[tokio::test]
async fn bundle_availability_and_round_trip() {
    let server = TestServer::spawn().await;
    let w = server.warehouse("Main").await;
    let kit = server.product("KIT", true).await;
    let a = server.product("A", false).await;
    let b = server.product("B", false).await;
    server.stock(&a, &w, 10, 0).await;
    server.stock(&b, &w, 3, 0).await;
    server.component(&kit, &a, 2).await;
    server.component(&kit, &b, 1).await;

    let (status, body) = server
        .get(&format!("/products/{kit}/bundle-availability?warehouseId={w}"))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["bundleId"], kit);
    assert_eq!(body["availableQuantity"], 3);
    assert_eq!(body["limitingComponent"], b);
    let components = body["componentInventory"].as_array().unwrap();
    assert_eq!(components.len(), 2);
    assert_eq!(components[0]["componentId"], a);
    assert_eq!(components[0]["bundlesAvailable"], 5);
    assert_eq!(components[1]["isLimiting"], true);

    let (_, product) = server.get(&format!("/products/{kit}")).await;
    assert_eq!(product["components"].as_array().unwrap().len(), 2);

    let order = server
        .order(json!([{ "productId": kit, "warehouseId": w, "quantity": 2 }]))
        .await;

    let (status, _) = server.set_status(&[&order], "Complete").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.quantity(&a, &w).await, 6);
    assert_eq!(server.quantity(&b, &w).await, 1);

    let (status, _) = server.set_status(&[&order], "Cancelled").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.quantity(&a, &w).await, 10);
    assert_eq!(server.quantity(&b, &w).await, 3);
}

#[tokio::test]
async fn bundle_configuration_errors() {
    let server = TestServer::spawn().await;
    let kit = server.product("KIT", true).await;
    let other_kit = server.product("KIT-2", true).await;
    let plain = server.product("P", false).await;

    let (status, _) = server
        .get(&format!("/products/{kit}/bundle-availability"))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = server
        .get(&format!("/products/{plain}/bundle-availability"))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = server
        .post(
            &format!("/products/{kit}/components"),
            json!({ "componentId": other_kit, "quantityPerBundle": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = server.post("/products", json!({ "sku": "P", "name": "dup" })).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[tokio::test]
async fn low_stock_lists_largest_deficit_first() {
    let server = TestServer::spawn().await;
    let w = server.warehouse("Main").await;
    let ok = server.product("OK", false).await;
    let low = server.product("LOW", false).await;
    let lower = server.product("LOWER", false).await;
    server.stock(&ok, &w, 10, 5).await;
    server.stock(&low, &w, 4, 5).await;
    server.stock(&lower, &w, 1, 8).await;

    let (status, body) = server.get("/inventory/low-stock").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["productId"], lower);
    assert_eq!(rows[1]["productId"], low);

    let (_, body) = server.get("/inventory/low-stock?limit=1").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn batch_with_every_commit_failing_is_a_conflict() {
    let server = TestServer::spawn().await;
    let w = server.warehouse("Main").await;
    let p = server.product("SKU-1", false).await;
    let q = server.product("SKU-2", false).await;
    server.stock(&p, &w, 10, 0).await;
    server.stock(&q, &w, 10, 0).await;

    let a = server
        .order(json!([{ "productId": p, "warehouseId": w, "quantity": 3 }]))
        .await;
    let b = server
        .order(json!([{ "productId": q, "warehouseId": w, "quantity": 4 }]))
        .await;
    let (status, _) = server.set_status(&[&a, &b], "Complete").await;
    assert_eq!(status, StatusCode::OK);

    // Returning either order's stock would overflow.
    server.stock(&p, &w, i64::MAX, 0).await;
    server.stock(&q, &w, i64::MAX - 1, 0).await;

    let (status, body) = server.set_status(&[&a, &b], "Cancelled").await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["updatedCount"], 0);
    assert_eq!(body["message"], "Updated 0 order(s) to Cancelled; 2 failed");
    assert!(body["failures"][&a].as_str().unwrap().contains("overflow"));
    assert!(body["failures"][&b].is_string());

    for order in [&a, &b] {
        let (_, order_body) = server.get(&format!("/orders/{order}")).await;
        assert_eq!(order_body["status"], "Complete");
    }
    assert_eq!(server.quantity(&p, &w).await, i64::MAX);
}

#[tokio::test]
async fn partial_commit_failure_lists_failures() {
    let server = TestServer::spawn().await;
    let w = server.warehouse("Main").await;
    let p = server.product("SKU-1", false).await;
    let q = server.product("SKU-2", false).await;
    server.stock(&p, &w, 10, 0).await;
    server.stock(&q, &w, 10, 0).await;

    let a = server
        .order(json!([{ "productId": p, "warehouseId": w, "quantity": 3 }]))
        .await;
    let b = server
        .order(json!([{ "productId": q, "warehouseId": w, "quantity": 4 }]))
        .await;
    let (status, _) = server.set_status(&[&a, &b], "Complete").await;
    assert_eq!(status, StatusCode::OK);

    server.stock(&p, &w, i64::MAX - 1, 0).await;

    let (status, body) = server.set_status(&[&a, &b], "Cancelled").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["updatedCount"], 1);
    let failures = body["failures"].as_object().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures.contains_key(&a));
    assert_eq!(server.quantity(&q, &w).await, 10);
}
