//! Derived bundle availability.
//!
//! A bundle's sellable quantity is never stored. It is recomputed from component
//! stock every time:
//!
//! ```text
//! units(c)  = floor(available(c) / quantity_per_bundle(c))
//! bundle    = min over components of units(c)
//! limiting  = first component (in component order) reaching the minimum
//! ```
//!
//! `available(c)` is supplied by the caller, so the same algorithm serves display
//! (raw store quantities, one warehouse or summed across all of them) and
//! pre-flight validation (quantities net of what the current batch already claims).

use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, ProductId, WarehouseId};
use stockflow_products::BundleComponent;

/// Per-component breakdown of a bundle resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentAvailability {
    pub component_id: ProductId,
    pub required_quantity: u32,
    pub available_quantity: i64,
    pub bundles_available: i64,
    pub is_limiting: bool,
}

/// Result of resolving a bundle against component stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleAvailability {
    pub bundle_id: ProductId,
    /// `None` when quantities were summed across all warehouses.
    pub warehouse_id: Option<WarehouseId>,
    pub available_quantity: i64,
    pub limiting_component_id: ProductId,
    pub components: Vec<ComponentAvailability>,
}

/// Resolve `bundle_id` from its `components` (already in component order).
///
/// A bundle without components has no defined availability and is rejected
/// rather than reported as zero or unbounded.
pub fn resolve_bundle(
    bundle_id: ProductId,
    warehouse_id: Option<WarehouseId>,
    components: &[BundleComponent],
    mut available: impl FnMut(ProductId) -> i64,
) -> DomainResult<BundleAvailability> {
    if components.is_empty() {
        return Err(DomainError::validation(format!(
            "bundle {bundle_id} has no components; availability is undefined"
        )));
    }

    let mut breakdown = Vec::with_capacity(components.len());
    let mut limiting: Option<(usize, i64)> = None;

    for (idx, component) in components.iter().enumerate() {
        if component.bundle_id != bundle_id {
            return Err(DomainError::invariant(format!(
                "component {} belongs to bundle {}, not {bundle_id}",
                component.component_id, component.bundle_id
            )));
        }
        if component.quantity_per_bundle == 0 {
            return Err(DomainError::validation(format!(
                "component {} has quantity_per_bundle 0",
                component.component_id
            )));
        }

        let on_hand = available(component.component_id).max(0);
        let units = on_hand / i64::from(component.quantity_per_bundle);

        // Strict `<` keeps the first component on ties.
        if limiting.is_none_or(|(_, min)| units < min) {
            limiting = Some((idx, units));
        }

        breakdown.push(ComponentAvailability {
            component_id: component.component_id,
            required_quantity: component.quantity_per_bundle,
            available_quantity: on_hand,
            bundles_available: units,
            is_limiting: false,
        });
    }

    // Non-empty input guarantees a limiting component.
    let (limiting_idx, available_quantity) = limiting.unwrap_or((0, 0));
    breakdown[limiting_idx].is_limiting = true;

    Ok(BundleAvailability {
        bundle_id,
        warehouse_id,
        available_quantity,
        limiting_component_id: breakdown[limiting_idx].component_id,
        components: breakdown,
    })
}
