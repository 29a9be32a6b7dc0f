use serde::{Deserialize, Serialize};

use crate::engine::{pricing_variant, CommitmentTerm};
use crate::error::{PricingError, PricingResult};
use crate::resolver::PriceResolver;

const BUILTIN_GPUS: &str = include_str!("../../data/gpus.json");

/// An attachable accelerator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuType {
    pub name: String,
    pub display_name: String,
    /// On-demand SKU; preemptible and committed variants are suffixes of it
    pub sku: String,
    pub supported_counts: Vec<u32>,
}

impl GpuType {
    pub fn sku_for(&self, preemptible: bool, commitment: CommitmentTerm) -> String {
        pricing_variant(&self.sku, preemptible, commitment)
    }
}

#[derive(Debug, Clone)]
pub struct GpuTable {
    gpus: Vec<GpuType>,
}

impl GpuTable {
    pub fn new(gpus: Vec<GpuType>) -> Self {
        Self { gpus }
    }

    pub fn builtin() -> PricingResult<Self> {
        let gpus: Vec<GpuType> = serde_json::from_str(BUILTIN_GPUS)
            .map_err(|e| PricingError::Catalog(format!("Malformed GPU table: {}", e)))?;
        Ok(Self::new(gpus))
    }

    pub fn all(&self) -> &[GpuType] {
        &self.gpus
    }

    pub fn get(&self, name: &str) -> PricingResult<&GpuType> {
        self.gpus
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| PricingError::InvalidShape(format!("Unknown GPU type {}", name)))
    }

    /// GPU types whose on-demand SKU is priced in `region`
    pub fn available_in<'a>(&'a self, resolver: &PriceResolver, region: &str) -> Vec<&'a GpuType> {
        self.gpus
            .iter()
            .filter(|g| resolver.is_available(&g.sku, region))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::regions::RegionTable;
    use std::sync::Arc;

    #[test]
    fn test_builtin_gpus() {
        let table = GpuTable::builtin().unwrap();
        let t4 = table.get("nvidia-tesla-t4").unwrap();
        assert_eq!(t4.supported_counts, vec![1, 2, 4]);
        assert!(table.get("nvidia-geforce").is_err());
    }

    #[test]
    fn test_sku_variants() {
        let table = GpuTable::builtin().unwrap();
        let v100 = table.get("nvidia-tesla-v100").unwrap();
        assert_eq!(v100.sku_for(false, CommitmentTerm::None), "CP-COMPUTEENGINE-GPU-V100");
        assert_eq!(
            v100.sku_for(true, CommitmentTerm::None),
            "CP-COMPUTEENGINE-GPU-V100-PREEMPTIBLE"
        );
        assert_eq!(
            v100.sku_for(false, CommitmentTerm::ThreeYears),
            "CP-COMPUTEENGINE-GPU-V100-CUD-3-YEAR"
        );
    }

    #[test]
    fn test_regional_availability() {
        let catalog = InMemoryCatalog::builder()
            .price("CP-COMPUTEENGINE-GPU-T4", "us-central1", 0.35)
            .price("CP-COMPUTEENGINE-GPU-K80", "europe-west1", 0.49)
            .build()
            .unwrap();
        let resolver = PriceResolver::new(
            Arc::new(catalog),
            Arc::new(RegionTable::builtin().unwrap()),
        );
        let table = GpuTable::builtin().unwrap();

        let names: Vec<&str> = table
            .available_in(&resolver, "us-central1")
            .iter()
            .map(|g| g.name.as_str())
            .collect();
        assert_eq!(names, vec!["nvidia-tesla-t4"]);
    }
}
