use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use stockflow_core::OrderId;
use stockflow_inventory::Direction;
use stockflow_sales::{Order, OrderStatus, inventory_effect};

use super::{FulfillmentError, FulfillmentResult, FulfillmentValidator, StockMutator};
use crate::store::{EngineStore, OrderTransaction};

/// Result of a batch status change that passed pre-flight validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkStatusOutcome {
    pub status: OrderStatus,
    /// Orders whose unit of work committed, in request order.
    pub updated: Vec<OrderId>,
    /// Orders whose unit of work was rolled back, with the reason.
    pub failed: BTreeMap<OrderId, String>,
}

impl BulkStatusOutcome {
    pub fn updated_count(&self) -> usize {
        self.updated.len()
    }

    /// True when there was work to do and none of it committed.
    pub fn all_failed(&self) -> bool {
        self.updated.is_empty() && !self.failed.is_empty()
    }

    pub fn message(&self) -> String {
        if self.failed.is_empty() {
            format!("Updated {} order(s) to {}", self.updated.len(), self.status)
        } else {
            format!(
                "Updated {} order(s) to {}; {} failed",
                self.updated.len(),
                self.status,
                self.failed.len()
            )
        }
    }
}

/// Drives batch status changes and their inventory effect.
///
/// Orders entering `Complete` are validated as one batch before anything is
/// written; after that every order commits or rolls back on its own.
pub struct OrderFulfillmentCoordinator<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for OrderFulfillmentCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> OrderFulfillmentCoordinator<S>
where
    S: EngineStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Move every order in `order_ids` to `status`.
    ///
    /// Fails without side effects when an id is unknown, or when an order
    /// entering `Complete` lacks a warehouse or stock. Duplicate ids count once.
    #[instrument(skip(self, order_ids), fields(orders = order_ids.len(), status = %status), err)]
    pub async fn bulk_update_status(
        &self,
        order_ids: &[OrderId],
        status: OrderStatus,
    ) -> FulfillmentResult<BulkStatusOutcome> {
        let mut seen = HashSet::with_capacity(order_ids.len());
        let order_ids: Vec<OrderId> = order_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let orders = self.load_orders(&order_ids).await?;

        let entering: Vec<Order> = orders
            .iter()
            .filter(|o| inventory_effect(o.status(), status) == Some(Direction::Decrement))
            .cloned()
            .collect();

        if !entering.is_empty() {
            let validation = FulfillmentValidator::new(&*self.store)
                .validate_batch(&entering)
                .await?;

            if !validation.missing_warehouse.is_empty() {
                warn!(
                    orders = validation.missing_warehouse.len(),
                    "batch rejected: line items without warehouse"
                );
                return Err(FulfillmentError::MissingWarehouse {
                    order_ids: validation.missing_warehouse,
                });
            }
            if !validation.insufficient.is_empty() {
                warn!(
                    orders = validation.insufficient.len(),
                    "batch rejected: insufficient inventory"
                );
                return Err(FulfillmentError::InsufficientInventory {
                    details: validation.insufficient,
                });
            }
        }

        let mut outcome = BulkStatusOutcome {
            status,
            updated: Vec::with_capacity(orders.len()),
            failed: BTreeMap::new(),
        };

        for order in &orders {
            match self.commit_one(order, status).await {
                Ok(()) => outcome.updated.push(order.id_typed()),
                Err(err) => {
                    warn!(order_id = %order.id_typed(), error = %err, "order status change rolled back");
                    outcome.failed.insert(order.id_typed(), err.to_string());
                }
            }
        }

        info!(
            updated = outcome.updated.len(),
            failed = outcome.failed.len(),
            "bulk status change finished"
        );
        Ok(outcome)
    }

    async fn load_orders(&self, order_ids: &[OrderId]) -> FulfillmentResult<Vec<Order>> {
        let mut orders = Vec::with_capacity(order_ids.len());
        let mut missing = Vec::new();

        for id in order_ids {
            match self.store.order(*id).await? {
                Some(order) => orders.push(order),
                None => missing.push(*id),
            }
        }

        if !missing.is_empty() {
            return Err(FulfillmentError::OrdersNotFound { order_ids: missing });
        }
        Ok(orders)
    }

    /// One order's unit of work: compare-and-set status plus stock effect.
    async fn commit_one(&self, order: &Order, to: OrderStatus) -> FulfillmentResult<()> {
        let order_id = order.id_typed();
        let mut tx = self.store.begin().await?;

        match self.apply_transition(&mut *tx, order, to).await {
            Ok(()) => tx.commit().await.map_err(|e| FulfillmentError::Consistency {
                order_id,
                reason: e.to_string(),
            }),
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(order_id = %order_id, error = %rollback_err, "rollback failed");
                }
                Err(FulfillmentError::Consistency {
                    order_id,
                    reason: err.to_string(),
                })
            }
        }
    }

    async fn apply_transition(
        &self,
        tx: &mut dyn OrderTransaction,
        order: &Order,
        to: OrderStatus,
    ) -> FulfillmentResult<()> {
        let from = order.status();
        tx.update_status(order.id_typed(), from, to, Utc::now())
            .await?;

        let mutator = StockMutator::new(&*self.store);
        match inventory_effect(from, to) {
            Some(Direction::Decrement) => {
                mutator.decrement(tx, order.id_typed(), order.items()).await?;
            }
            Some(Direction::Restore) => {
                mutator.restore(tx, order.id_typed(), order.items()).await?;
            }
            None => {}
        }
        Ok(())
    }
}
