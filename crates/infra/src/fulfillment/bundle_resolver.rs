use std::collections::HashMap;

use tracing::instrument;

use stockflow_core::{ProductId, WarehouseId};
use stockflow_inventory::{BundleAvailability, resolve_bundle};
use stockflow_products::BundleComponent;

use super::{FulfillmentError, FulfillmentResult};
use crate::store::{CatalogStore, InventoryStore};

/// Read-only bundle availability against current store quantities.
pub struct BundleResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> BundleResolver<'a, S>
where
    S: InventoryStore + CatalogStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The bundle's components in resolution order.
    ///
    /// Fails for unknown products, non-bundles, bundles without components and
    /// components that are bundles themselves.
    pub async fn components(&self, bundle_id: ProductId) -> FulfillmentResult<Vec<BundleComponent>> {
        let bundle = self
            .store
            .product(bundle_id)
            .await?
            .ok_or_else(|| FulfillmentError::NotFound(format!("product {bundle_id}")))?;
        if !bundle.is_bundle() {
            return Err(FulfillmentError::Validation(format!(
                "product {bundle_id} is not a bundle"
            )));
        }

        let components = self.store.bundle_components(bundle_id).await?;
        if components.is_empty() {
            return Err(FulfillmentError::Validation(format!(
                "bundle {bundle_id} has no components"
            )));
        }

        for line in &components {
            let component = self.store.product(line.component_id).await?.ok_or_else(|| {
                FulfillmentError::NotFound(format!("component product {}", line.component_id))
            })?;
            if component.is_bundle() {
                return Err(FulfillmentError::Validation(format!(
                    "component {} of bundle {bundle_id} is itself a bundle; nested bundles are not supported",
                    line.component_id
                )));
            }
        }

        Ok(components)
    }

    /// Bundle availability at `warehouse_id`, or summed over every warehouse
    /// when `None`. Missing inventory records count as zero.
    #[instrument(skip(self), fields(bundle_id = %bundle_id), err)]
    pub async fn resolve_availability(
        &self,
        bundle_id: ProductId,
        warehouse_id: Option<WarehouseId>,
    ) -> FulfillmentResult<BundleAvailability> {
        let components = self.components(bundle_id).await?;

        let mut on_hand = HashMap::with_capacity(components.len());
        for line in &components {
            let quantity = match warehouse_id {
                Some(warehouse_id) => self
                    .store
                    .get(line.component_id, warehouse_id)
                    .await?
                    .map(|r| r.quantity)
                    .unwrap_or(0),
                None => self
                    .store
                    .get_all_for_product(line.component_id)
                    .await?
                    .iter()
                    .map(|r| r.quantity)
                    .sum(),
            };
            on_hand.insert(line.component_id, quantity);
        }

        let availability = resolve_bundle(bundle_id, warehouse_id, &components, |id| {
            on_hand.get(&id).copied().unwrap_or(0)
        })?;
        Ok(availability)
    }
}
