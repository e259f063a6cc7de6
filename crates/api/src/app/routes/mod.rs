use axum::Router;

pub mod inventory;
pub mod orders;
pub mod products;
pub mod system;
pub mod warehouses;

pub fn router() -> Router {
    Router::new()
        .nest("/orders", orders::router())
        .nest("/products", products::router())
        .nest("/inventory", inventory::router())
        .nest("/warehouses", warehouses::router())
}
