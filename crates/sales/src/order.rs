use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, OrderId, ProductId, WarehouseId};
use stockflow_inventory::{Direction, StockLine};

/// Order fulfillment lifecycle.
///
/// Only `Complete` counts as fulfilled for inventory purposes; every other state
/// is equivalent to "not fulfilled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Proposed,
    Scheduled,
    Paid,
    Complete,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Proposed,
        OrderStatus::Scheduled,
        OrderStatus::Paid,
        OrderStatus::Complete,
        OrderStatus::Cancelled,
    ];

    pub fn is_fulfilled(self) -> bool {
        self == OrderStatus::Complete
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Proposed => "Proposed",
            OrderStatus::Scheduled => "Scheduled",
            OrderStatus::Paid => "Paid",
            OrderStatus::Complete => "Complete",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "status must be one of: Cancelled, Complete, Paid, Proposed, Scheduled (got '{s}')"
                ))
            })
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inventory side effect of moving an order from `from` to `to`.
///
/// Entering `Complete` consumes stock, leaving it returns stock, and every other
/// pair (including `Complete -> Complete`) has no effect.
pub fn inventory_effect(from: OrderStatus, to: OrderStatus) -> Option<Direction> {
    match (from.is_fulfilled(), to.is_fulfilled()) {
        (false, true) => Some(Direction::Decrement),
        (true, false) => Some(Direction::Restore),
        _ => None,
    }
}

/// Order line: product, optional warehouse, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub warehouse_id: Option<WarehouseId>,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub price: u64,
}

impl OrderItem {
    pub fn new(
        product_id: ProductId,
        warehouse_id: Option<WarehouseId>,
        quantity: i64,
        price: u64,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(Self {
            product_id,
            warehouse_id,
            quantity,
            price,
        })
    }

    /// The line as a stock movement, if a warehouse is assigned.
    pub fn stock_line(&self) -> Option<StockLine> {
        self.warehouse_id.map(|warehouse_id| StockLine {
            product_id: self.product_id,
            warehouse_id,
            quantity: self.quantity,
        })
    }
}

/// Customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    status: OrderStatus,
    items: Vec<OrderItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// New orders start as `Proposed`.
    pub fn new(id: OrderId, items: Vec<OrderItem>, at: DateTime<Utc>) -> DomainResult<Self> {
        validate_items(&items)?;
        Ok(Self {
            id,
            status: OrderStatus::Proposed,
            items,
            created_at: at,
            updated_at: at,
        })
    }

    /// Rebuild an order from persisted columns (no validation).
    pub fn from_parts(
        id: OrderId,
        status: OrderStatus,
        items: Vec<OrderItem>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            status,
            items,
            created_at,
            updated_at,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_fulfilled(&self) -> bool {
        self.status.is_fulfilled()
    }

    /// Positions of items without a warehouse assignment.
    pub fn items_missing_warehouse(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.warehouse_id.is_none())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Every line must name a warehouse before the order can be fulfilled.
    pub fn ensure_fulfillable(&self) -> DomainResult<()> {
        let missing = self.items_missing_warehouse();
        if missing.is_empty() {
            return Ok(());
        }
        Err(DomainError::validation(format!(
            "order {} has {} line item(s) without a warehouse_id",
            self.id,
            missing.len()
        )))
    }

    /// Move to `to`, returning the inventory effect the move implies.
    pub fn transition_to(
        &mut self,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<Option<Direction>> {
        if to.is_fulfilled() && !self.status.is_fulfilled() {
            self.ensure_fulfillable()?;
        }

        let effect = inventory_effect(self.status, to);
        self.status = to;
        self.updated_at = at;
        Ok(effect)
    }
}

fn validate_items(items: &[OrderItem]) -> DomainResult<()> {
    for (idx, item) in items.iter().enumerate() {
        if item.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "line {} quantity must be positive",
                idx + 1
            )));
        }
    }
    Ok(())
}
