//! Bundle composition rules.
//!
//! A bundle is a virtual product made of fixed quantities of other products. Its
//! configuration is validated when components are added so that availability can
//! always be resolved from one level of component stock:
//!
//! - the parent must be a bundle
//! - a bundle never contains itself
//! - components must be simple products (nested bundles are rejected)
//! - `quantity_per_bundle` is strictly positive
//! - each component product appears at most once per bundle
//! - the component graph stays acyclic

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, ProductId};

use crate::product::Product;

/// One line of a bundle definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleComponent {
    pub bundle_id: ProductId,
    pub component_id: ProductId,
    pub quantity_per_bundle: u32,
    pub sort_order: i32,
}

impl BundleComponent {
    /// Validate and build a new component line for `bundle`.
    ///
    /// `existing` are the bundle's current components.
    pub fn new(
        bundle: &Product,
        component: &Product,
        quantity_per_bundle: u32,
        sort_order: i32,
        existing: &[BundleComponent],
    ) -> DomainResult<Self> {
        let bundle_id = bundle.id_typed();
        let component_id = component.id_typed();

        if !bundle.is_bundle() {
            return Err(DomainError::validation(format!(
                "product {bundle_id} is not a bundle"
            )));
        }

        if bundle_id == component_id {
            return Err(DomainError::invariant("a bundle cannot contain itself"));
        }

        if component.is_bundle() {
            return Err(DomainError::validation(format!(
                "component {component_id} is itself a bundle; nested bundles are not supported"
            )));
        }

        if quantity_per_bundle == 0 {
            return Err(DomainError::validation(
                "quantity_per_bundle must be positive",
            ));
        }

        if existing.iter().any(|c| c.component_id == component_id) {
            return Err(DomainError::conflict(format!(
                "product {component_id} is already a component of bundle {bundle_id}"
            )));
        }

        Ok(Self {
            bundle_id,
            component_id,
            quantity_per_bundle,
            sort_order,
        })
    }

    /// Units of this component consumed by `bundles` bundle units.
    pub fn required_for(&self, bundles: i64) -> i64 {
        bundles * i64::from(self.quantity_per_bundle)
    }
}

/// Order components for resolution: by `sort_order`, stable for ties.
pub fn sort_components(components: &mut [BundleComponent]) {
    components.sort_by_key(|c| c.sort_order);
}

/// Reject a new `bundle_id -> component_id` edge that would make the
/// component graph cyclic.
///
/// `components_of` returns the direct component ids of a product (empty for
/// simple products).
pub fn ensure_acyclic(
    bundle_id: ProductId,
    component_id: ProductId,
    components_of: impl Fn(ProductId) -> Vec<ProductId>,
) -> DomainResult<()> {
    let mut stack = vec![component_id];
    let mut seen = HashSet::new();

    while let Some(current) = stack.pop() {
        if current == bundle_id {
            return Err(DomainError::invariant(format!(
                "adding component {component_id} to bundle {bundle_id} would create a cycle"
            )));
        }
        if seen.insert(current) {
            stack.extend(components_of(current));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::product::ProductKind;

    fn simple(sku: &str) -> Product {
        Product::new(ProductId::new(), sku, sku, ProductKind::Simple).unwrap()
    }

    fn bundle(sku: &str) -> Product {
        Product::new(ProductId::new(), sku, sku, ProductKind::Bundle).unwrap()
    }

    #[test]
    fn accepts_simple_component() {
        let b = bundle("B");
        let a = simple("A");
        let c = BundleComponent::new(&b, &a, 2, 0, &[]).unwrap();
        assert_eq!(c.bundle_id, b.id_typed());
        assert_eq!(c.component_id, a.id_typed());
        assert_eq!(c.required_for(3), 6);
    }

    #[test]
    fn rejects_non_bundle_parent() {
        let err = BundleComponent::new(&simple("S"), &simple("A"), 1, 0, &[]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_self_reference() {
        let b = bundle("B");
        let err = BundleComponent::new(&b, &b, 1, 0, &[]).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn rejects_nested_bundle() {
        let err = BundleComponent::new(&bundle("B"), &bundle("C"), 1, 0, &[]).unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("nested bundles")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_quantity() {
        let err = BundleComponent::new(&bundle("B"), &simple("A"), 0, 0, &[]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_duplicate_component() {
        let b = bundle("B");
        let a = simple("A");
        let first = BundleComponent::new(&b, &a, 1, 0, &[]).unwrap();
        let err = BundleComponent::new(&b, &a, 3, 1, &[first]).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn sort_is_stable_for_equal_sort_order() {
        let b = bundle("B");
        let (a, c, d) = (simple("A"), simple("C"), simple("D"));
        let mut lines = vec![
            BundleComponent::new(&b, &a, 1, 5, &[]).unwrap(),
            BundleComponent::new(&b, &c, 1, 1, &[]).unwrap(),
            BundleComponent::new(&b, &d, 1, 5, &[]).unwrap(),
        ];
        sort_components(&mut lines);
        let ids: Vec<_> = lines.iter().map(|l| l.component_id).collect();
        assert_eq!(ids, vec![c.id_typed(), a.id_typed(), d.id_typed()]);
    }

    #[test]
    fn detects_cycle_through_graph() {
        let (x, y, z) = (ProductId::new(), ProductId::new(), ProductId::new());
        let graph: HashMap<ProductId, Vec<ProductId>> =
            HashMap::from([(y, vec![z]), (z, vec![x])]);
        let lookup = |id: ProductId| graph.get(&id).cloned().unwrap_or_default();

        assert!(ensure_acyclic(x, y, lookup).is_err());
        assert!(ensure_acyclic(y, ProductId::new(), lookup).is_ok());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a chain graph never accepts an edge from its tail back to its head.
            #[test]
            fn chain_back_edge_is_always_a_cycle(len in 1usize..20) {
                let ids: Vec<ProductId> = (0..=len).map(|_| ProductId::new()).collect();
                let lookup = |id: ProductId| {
                    ids.iter()
                        .position(|p| *p == id)
                        .and_then(|i| ids.get(i + 1).copied())
                        .into_iter()
                        .collect::<Vec<_>>()
                };

                let head = ids[0];
                let tail = ids[len];
                prop_assert!(ensure_acyclic(tail, head, lookup).is_err());
                prop_assert!(ensure_acyclic(head, ProductId::new(), lookup).is_ok());
            }
        }
    }
}
