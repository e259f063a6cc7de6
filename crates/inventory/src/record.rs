use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, ProductId, WarehouseId};

/// Physical stock of one simple product in one warehouse.
///
/// `(product_id, warehouse_id)` is unique. `quantity` and `min_quantity` are never
/// negative; `min_quantity` is a reorder watermark, not a hard floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub min_quantity: i64,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    pub fn new(
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: i64,
        min_quantity: i64,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        if min_quantity < 0 {
            return Err(DomainError::validation("min_quantity cannot be negative"));
        }

        Ok(Self {
            product_id,
            warehouse_id,
            quantity,
            min_quantity,
            updated_at,
        })
    }

    /// Quantity after applying `delta`, or an error if it would go negative.
    pub fn checked_quantity(&self, delta: i64) -> DomainResult<i64> {
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        let next = self
            .quantity
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;

        if next < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }

        Ok(next)
    }

    /// Apply `delta` in place. Leaves the record untouched on error.
    pub fn apply_delta(&mut self, delta: i64, at: DateTime<Utc>) -> DomainResult<()> {
        self.quantity = self.checked_quantity(delta)?;
        self.updated_at = at;
        Ok(())
    }

    pub fn is_below_minimum(&self) -> bool {
        self.quantity < self.min_quantity
    }

    /// How far below the watermark this record sits (0 when at or above it).
    pub fn deficit(&self) -> i64 {
        (self.min_quantity - self.quantity).max(0)
    }
}

/// Low-stock ordering: largest deficit first, then product id, then warehouse id.
pub fn sort_by_deficit(records: &mut [InventoryRecord]) {
    records.sort_by(|a, b| {
        b.deficit()
            .cmp(&a.deficit())
            .then_with(|| a.product_id.cmp(&b.product_id))
            .then_with(|| a.warehouse_id.cmp(&b.warehouse_id))
    });
}
