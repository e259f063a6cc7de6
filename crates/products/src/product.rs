use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, ProductId};

/// Whether a product is stocked directly or derived from components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    /// Physically stocked; owns zero or more inventory records.
    Simple,
    /// Virtual product composed of other products; never owns inventory records.
    Bundle,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Simple => "simple",
            ProductKind::Bundle => "bundle",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "simple" => Ok(ProductKind::Simple),
            "bundle" => Ok(ProductKind::Bundle),
            other => Err(DomainError::validation(format!("unknown product kind '{other}'"))),
        }
    }
}

/// Catalog product.
///
/// The kind is fixed at creation: converting a stocked product into a bundle (or
/// back) would orphan inventory records or bundle definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    kind: ProductKind,
    is_active: bool,
}

impl Product {
    /// Create a new, active product.
    pub fn new(
        id: ProductId,
        sku: impl Into<String>,
        name: impl Into<String>,
        kind: ProductKind,
    ) -> DomainResult<Self> {
        let sku = sku.into();
        let name = name.into();

        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        if sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }

        // SKU uniqueness needs the store; the domain only enforces non-empty.
        Ok(Self {
            id,
            sku: sku.trim().to_string(),
            name: name.trim().to_string(),
            kind,
            is_active: true,
        })
    }

    /// Rebuild a product from persisted columns (no validation).
    pub fn from_parts(
        id: ProductId,
        sku: String,
        name: String,
        kind: ProductKind,
        is_active: bool,
    ) -> Self {
        Self {
            id,
            sku,
            name,
            kind,
            is_active,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ProductKind {
        self.kind
    }

    pub fn is_bundle(&self) -> bool {
        self.kind == ProductKind::Bundle
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Bundles never hold stock of their own.
    pub fn ensure_stockable(&self) -> DomainResult<()> {
        if self.is_bundle() {
            return Err(DomainError::invariant(format!(
                "bundle product {} cannot own inventory records",
                self.id
            )));
        }
        Ok(())
    }
}
