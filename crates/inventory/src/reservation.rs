//! In-flight claims on stock during a validation pass.
//!
//! When several orders are validated together, each one must be checked against
//! what the earlier ones in the same batch would leave behind, otherwise two
//! orders that each fit alone would both pass while together exceeding stock.

use std::collections::HashMap;

use stockflow_core::{ProductId, WarehouseId};

/// Quantities claimed so far, per `(product, warehouse)`.
#[derive(Debug, Clone, Default)]
pub struct StockReservations {
    claimed: HashMap<(ProductId, WarehouseId), i64>,
}

impl StockReservations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, product_id: ProductId, warehouse_id: WarehouseId, quantity: i64) {
        *self.claimed.entry((product_id, warehouse_id)).or_insert(0) += quantity;
    }

    pub fn claimed(&self, product_id: ProductId, warehouse_id: WarehouseId) -> i64 {
        self.claimed
            .get(&(product_id, warehouse_id))
            .copied()
            .unwrap_or(0)
    }

    /// `on_hand` minus what is already claimed (may be negative).
    pub fn remaining(&self, product_id: ProductId, warehouse_id: WarehouseId, on_hand: i64) -> i64 {
        on_hand - self.claimed(product_id, warehouse_id)
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}
