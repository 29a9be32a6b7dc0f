use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::catalog::{PriceTier, SkuCatalog};
use crate::error::{PricingError, PricingResult};
use crate::regions::RegionTable;

/// Price and free quota of a SKU in one region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitPrice {
    pub unit_price: f64,
    pub free_quota: f64,
}

/// Resolves raw unit prices against the catalog
///
/// Callers compose fully-qualified SKU names before calling in; the only
/// fallback applied here is aggregate region -> its declared default region.
#[derive(Clone)]
pub struct PriceResolver {
    catalog: Arc<dyn SkuCatalog>,
    regions: Arc<RegionTable>,
}

impl PriceResolver {
    pub fn new(catalog: Arc<dyn SkuCatalog>, regions: Arc<RegionTable>) -> Self {
        Self { catalog, regions }
    }

    pub fn catalog(&self) -> &dyn SkuCatalog {
        self.catalog.as_ref()
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }

    /// Look up `(sku, region)`, retrying once with the concrete default of an
    /// aggregate region code
    pub fn resolve_unit_price(&self, sku: &str, region: &str) -> PricingResult<UnitPrice> {
        let lookup = |region: &str| {
            self.catalog.unit_price(sku, region).map(|unit_price| UnitPrice {
                unit_price,
                free_quota: self.catalog.free_quota(sku, region).unwrap_or(0.0),
            })
        };

        if let Some(price) = lookup(region) {
            return Ok(price);
        }

        if let Some(fallback) = self.fallback_region(region) {
            if let Some(price) = lookup(fallback) {
                debug!(sku = sku, region = region, fallback = fallback, "Resolved via aggregate fallback");
                return Ok(price);
            }
        }

        debug!(sku = sku, region = region, "SKU not found");
        Err(PricingError::sku_not_found(sku, region))
    }

    /// Volume bands with the same fallback rule; `None` when the SKU is flat
    pub fn resolve_tiers(&self, sku: &str, region: &str) -> Option<Vec<PriceTier>> {
        self.catalog.tiers(sku, region).or_else(|| {
            self.fallback_region(region)
                .and_then(|fallback| self.catalog.tiers(sku, fallback))
        })
    }

    /// Free quota with the same fallback rule; `0.0` when none is declared
    pub fn resolve_free_quota(&self, sku: &str, region: &str) -> f64 {
        self.catalog
            .free_quota(sku, region)
            .or_else(|| {
                self.fallback_region(region)
                    .and_then(|fallback| self.catalog.free_quota(sku, fallback))
            })
            .unwrap_or(0.0)
    }

    pub fn is_available(&self, sku: &str, region: &str) -> bool {
        self.resolve_unit_price(sku, region).is_ok()
    }

    fn fallback_region<'a>(&'a self, region: &'a str) -> Option<&'a str> {
        self.regions
            .concrete(region)
            .ok()
            .filter(|concrete| *concrete != region)
    }
}

impl std::fmt::Debug for PriceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceResolver")
            .field("skus", &self.catalog.sku_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, MockSkuCatalog};
    use mockall::predicate::eq;

    fn resolver_with(catalog: impl SkuCatalog + 'static) -> PriceResolver {
        PriceResolver::new(Arc::new(catalog), Arc::new(RegionTable::builtin().unwrap()))
    }

    #[test]
    fn test_direct_lookup() {
        let catalog = InMemoryCatalog::builder()
            .price("X", "us-central1", 2.0)
            .price("Y", "us-central1", 1.0)
            .free_quota("Y", "us-central1", 5.0)
            .build()
            .unwrap();
        let resolver = resolver_with(catalog);

        let x = resolver.resolve_unit_price("X", "us-central1").unwrap();
        assert_eq!(x, UnitPrice { unit_price: 2.0, free_quota: 0.0 });

        let y = resolver.resolve_unit_price("Y", "us-central1").unwrap();
        assert_eq!(y, UnitPrice { unit_price: 1.0, free_quota: 5.0 });
    }

    #[test]
    fn test_no_cross_region_substitution() {
        let catalog = InMemoryCatalog::builder()
            .price("X", "us-central1", 2.0)
            .build()
            .unwrap();
        let resolver = resolver_with(catalog);

        let result = resolver.resolve_unit_price("X", "europe-west1");
        assert!(matches!(
            result,
            Err(PricingError::SkuNotFound { ref sku, ref region })
                if sku == "X" && region == "europe-west1"
        ));
        assert!(!resolver.is_available("X", "europe-west1"));
    }

    #[test]
    fn test_aggregate_region_falls_back_to_default() {
        let catalog = InMemoryCatalog::builder()
            .price("X", "us-central1", 2.0)
            .build()
            .unwrap();
        let resolver = resolver_with(catalog);

        let price = resolver.resolve_unit_price("X", "us").unwrap();
        assert_eq!(price.unit_price, 2.0);
    }

    #[test]
    fn test_aggregate_region_prefers_own_price() {
        let catalog = InMemoryCatalog::builder()
            .price("X", "us-central1", 2.0)
            .price("X", "us", 2.6)
            .build()
            .unwrap();
        let resolver = resolver_with(catalog);

        assert_eq!(resolver.resolve_unit_price("X", "us").unwrap().unit_price, 2.6);
    }

    #[test]
    fn test_lookup_uses_catalog_seam() {
        let mut catalog = MockSkuCatalog::new();
        catalog
            .expect_unit_price()
            .with(eq("CP-MOCK"), eq("europe-west4"))
            .times(1)
            .returning(|_, _| Some(0.5));
        catalog
            .expect_free_quota()
            .with(eq("CP-MOCK"), eq("europe-west4"))
            .times(1)
            .returning(|_, _| None);

        let resolver = resolver_with(catalog);
        let price = resolver.resolve_unit_price("CP-MOCK", "europe-west4").unwrap();
        assert_eq!(price.unit_price, 0.5);
        assert_eq!(price.free_quota, 0.0);
    }

    #[test]
    fn test_missing_tiers() {
        let catalog = InMemoryCatalog::builder()
            .price("X", "us-central1", 2.0)
            .build()
            .unwrap();
        let resolver = resolver_with(catalog);
        assert!(resolver.resolve_tiers("X", "us-central1").is_none());
    }

    #[test]
    fn test_tiered_sku_quota_via_aggregate() {
        let catalog = InMemoryCatalog::builder()
            .tiers(
                "T",
                "europe-west1",
                vec![PriceTier { up_to: None, unit_price: 0.1 }],
            )
            .free_quota("T", "europe-west1", 5.0)
            .build()
            .unwrap();
        let resolver = resolver_with(catalog);

        assert!(resolver.resolve_tiers("T", "europe").is_some());
        assert_eq!(resolver.resolve_free_quota("T", "europe"), 5.0);
        assert_eq!(resolver.resolve_free_quota("T", "asia-east1"), 0.0);
    }
}
