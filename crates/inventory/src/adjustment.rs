//! Expansion of order lines into per-record stock adjustments.
//!
//! Decrement and restore share one traversal; only the sign differs, which is
//! what keeps them exact inverses of each other.

use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, ProductId, WarehouseId};
use stockflow_products::{BundleComponent, Product};

/// Which way stock moves for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Order enters the fulfilled state: stock is consumed.
    Decrement,
    /// Order leaves the fulfilled state: consumed stock is returned.
    Restore,
}

impl Direction {
    pub fn sign(self) -> i64 {
        match self {
            Direction::Decrement => -1,
            Direction::Restore => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Decrement => "decrement",
            Direction::Restore => "restore",
        }
    }
}

/// An order line with its warehouse already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
}

/// One signed change to one inventory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAdjustment {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub delta: i64,
    /// The ordered product this adjustment stems from (the bundle for component rows).
    pub source_product_id: ProductId,
}

/// Expand one line into the adjustments it implies.
///
/// Simple products adjust their own record; bundles adjust every component by
/// `quantity × quantity_per_bundle` at the line's warehouse.
pub fn expand_line(
    line: &StockLine,
    product: &Product,
    components: &[BundleComponent],
    direction: Direction,
) -> DomainResult<Vec<PlannedAdjustment>> {
    if line.quantity <= 0 {
        return Err(DomainError::validation("line quantity must be positive"));
    }
    if product.id_typed() != line.product_id {
        return Err(DomainError::invariant("product does not match line"));
    }

    let sign = direction.sign();

    if !product.is_bundle() {
        return Ok(vec![PlannedAdjustment {
            product_id: line.product_id,
            warehouse_id: line.warehouse_id,
            delta: sign * line.quantity,
            source_product_id: line.product_id,
        }]);
    }

    if components.is_empty() {
        return Err(DomainError::validation(format!(
            "bundle {} has no components",
            line.product_id
        )));
    }

    components
        .iter()
        .map(|c| {
            if c.bundle_id != line.product_id {
                return Err(DomainError::invariant(format!(
                    "component {} does not belong to bundle {}",
                    c.component_id, line.product_id
                )));
            }
            Ok(PlannedAdjustment {
                product_id: c.component_id,
                warehouse_id: line.warehouse_id,
                delta: sign * c.required_for(line.quantity),
                source_product_id: line.product_id,
            })
        })
        .collect()
}
