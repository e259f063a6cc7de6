//! Order fulfillment engine.
//!
//! - [`BundleResolver`]: derived bundle availability from component stock
//! - [`FulfillmentValidator`]: read-only pre-flight checks before completion
//! - [`StockMutator`]: decrement/restore through an open order transaction
//! - [`OrderFulfillmentCoordinator`]: batch status changes with their stock effects
//!
//! Everything here talks to state through the traits in [`crate::store`].

use std::collections::BTreeMap;

use thiserror::Error;

use stockflow_core::{DomainError, OrderId};

use crate::store::StoreError;

pub mod bundle_resolver;
pub mod coordinator;
pub mod stock_mutator;
pub mod validator;

pub use bundle_resolver::BundleResolver;
pub use coordinator::{BulkStatusOutcome, OrderFulfillmentCoordinator};
pub use stock_mutator::StockMutator;
pub use validator::{BatchValidation, FulfillmentValidator, ValidationReport};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error("{0}")]
    Validation(String),

    /// Entering `Complete` with line items that have no warehouse.
    #[error("Each line item must have a warehouse_id")]
    MissingWarehouse { order_ids: Vec<OrderId> },

    /// Pre-flight stock check failed for at least one order in the batch.
    #[error("Insufficient inventory for one or more orders")]
    InsufficientInventory {
        details: BTreeMap<OrderId, Vec<String>>,
    },

    /// Some ids of a batch request do not exist.
    #[error("Order not found")]
    OrdersNotFound { order_ids: Vec<OrderId> },

    #[error("not found: {0}")]
    NotFound(String),

    /// One order's unit of work failed and was rolled back.
    #[error("order {order_id} was not updated: {reason}")]
    Consistency { order_id: OrderId, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DomainError> for FulfillmentError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::NotFound(msg) => FulfillmentError::NotFound(msg),
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg)
            | DomainError::Conflict(msg) => FulfillmentError::Validation(msg),
        }
    }
}

pub type FulfillmentResult<T> = Result<T, FulfillmentError>;
