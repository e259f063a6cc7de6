use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, WarehouseId};

/// Physical stock location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
}

impl Warehouse {
    pub fn new(id: WarehouseId, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("warehouse name cannot be empty"));
        }
        Ok(Self {
            id,
            name: name.trim().to_string(),
        })
    }
}
