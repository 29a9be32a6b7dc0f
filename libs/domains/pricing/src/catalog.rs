//! SKU catalog
//!
//! Read-only mapping from SKU and region to unit price, free quota and
//! volume tiers. Loaded once per process and shared between sessions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PricingError, PricingResult};

/// One volume band of a tiered SKU
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTier {
    /// Inclusive upper bound in base units (None = unbounded)
    pub up_to: Option<f64>,
    /// Marginal price per base unit inside this band
    pub unit_price: f64,
}

/// A priced unit, keyed by region
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuEntry {
    #[serde(default)]
    pub sku: String,
    #[serde(default, rename = "prices")]
    pub unit_price_by_region: HashMap<String, f64>,
    #[serde(default, rename = "freeQuota")]
    pub free_quota_by_region: HashMap<String, f64>,
    #[serde(default, rename = "tiers")]
    pub tiers_by_region: HashMap<String, Vec<PriceTier>>,
}

impl SkuEntry {
    pub fn new(sku: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            ..Default::default()
        }
    }

    fn validate(&self) -> PricingResult<()> {
        for (region, price) in &self.unit_price_by_region {
            if !price.is_finite() || *price < 0.0 {
                return Err(PricingError::Catalog(format!(
                    "{} has invalid price {} in {}",
                    self.sku, price, region
                )));
            }
        }
        for (region, quota) in &self.free_quota_by_region {
            if !quota.is_finite() || *quota < 0.0 {
                return Err(PricingError::Catalog(format!(
                    "{} has invalid free quota {} in {}",
                    self.sku, quota, region
                )));
            }
        }
        for (region, tiers) in &self.tiers_by_region {
            validate_tiers(&self.sku, region, tiers)?;
        }
        Ok(())
    }
}

fn validate_tiers(sku: &str, region: &str, tiers: &[PriceTier]) -> PricingResult<()> {
    let mut previous = 0.0;
    for (i, tier) in tiers.iter().enumerate() {
        if !tier.unit_price.is_finite() || tier.unit_price < 0.0 {
            return Err(PricingError::Catalog(format!(
                "{} tier {} in {} has invalid price",
                sku, i, region
            )));
        }
        match tier.up_to {
            Some(bound) if bound <= previous => {
                return Err(PricingError::Catalog(format!(
                    "{} tiers in {} are not ascending",
                    sku, region
                )));
            }
            Some(bound) => previous = bound,
            None if i + 1 != tiers.len() => {
                return Err(PricingError::Catalog(format!(
                    "{} has an unbounded tier before the last one in {}",
                    sku, region
                )));
            }
            None => {}
        }
    }
    Ok(())
}

/// Version information carried by a catalog document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub version: Option<String>,
    pub updated: Option<NaiveDate>,
}

/// On-disk catalog layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub updated: Option<NaiveDate>,
    #[serde(default)]
    pub skus: HashMap<String, SkuEntry>,
}

/// Read access to SKU prices
///
/// Implementations must be safe for unsynchronized concurrent reads.
#[cfg_attr(test, mockall::automock)]
pub trait SkuCatalog: Send + Sync {
    /// Unit price of `sku` in exactly `region`
    fn unit_price(&self, sku: &str, region: &str) -> Option<f64>;

    /// Free quota of `sku` in exactly `region`
    fn free_quota(&self, sku: &str, region: &str) -> Option<f64>;

    /// Volume bands of `sku` in exactly `region`
    fn tiers(&self, sku: &str, region: &str) -> Option<Vec<PriceTier>>;

    /// Whether the SKU exists in any region
    fn contains(&self, sku: &str) -> bool;

    /// Number of SKUs
    fn sku_count(&self) -> usize;

    /// Distinct regions priced by at least one SKU
    fn regions(&self) -> Vec<String>;
}

/// Catalog held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    entries: HashMap<String, SkuEntry>,
    metadata: CatalogMetadata,
}

impl InMemoryCatalog {
    /// Build from the plain price and free-quota mappings
    pub fn from_maps(
        prices: HashMap<String, HashMap<String, f64>>,
        free_quotas: HashMap<String, HashMap<String, f64>>,
    ) -> PricingResult<Self> {
        let mut entries: HashMap<String, SkuEntry> = HashMap::new();

        for (sku, by_region) in prices {
            entries
                .entry(sku.clone())
                .or_insert_with(|| SkuEntry::new(sku))
                .unit_price_by_region = by_region;
        }
        for (sku, by_region) in free_quotas {
            entries
                .entry(sku.clone())
                .or_insert_with(|| SkuEntry::new(sku))
                .free_quota_by_region = by_region;
        }

        Self::from_entries(entries, CatalogMetadata::default())
    }

    pub fn from_document(document: CatalogDocument) -> PricingResult<Self> {
        let entries = document
            .skus
            .into_iter()
            .map(|(sku, mut entry)| {
                entry.sku = sku.clone();
                (sku, entry)
            })
            .collect();

        Self::from_entries(
            entries,
            CatalogMetadata {
                version: document.version,
                updated: document.updated,
            },
        )
    }

    pub fn from_json_str(json: &str) -> PricingResult<Self> {
        let document: CatalogDocument = serde_json::from_str(json)
            .map_err(|e| PricingError::Catalog(format!("Malformed catalog document: {}", e)))?;
        Self::from_document(document)
    }

    pub fn from_path(path: impl AsRef<Path>) -> PricingResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PricingError::Catalog(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_json_str(&json)?;

        info!(
            path = %path.display(),
            skus = catalog.entries.len(),
            version = ?catalog.metadata.version,
            "Catalog loaded"
        );

        Ok(catalog)
    }

    fn from_entries(
        entries: HashMap<String, SkuEntry>,
        metadata: CatalogMetadata,
    ) -> PricingResult<Self> {
        for entry in entries.values() {
            entry.validate()?;
        }
        debug!(skus = entries.len(), "Catalog validated");
        Ok(Self { entries, metadata })
    }

    pub fn metadata(&self) -> &CatalogMetadata {
        &self.metadata
    }

    pub fn entry(&self, sku: &str) -> Option<&SkuEntry> {
        self.entries.get(sku)
    }

    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }
}

impl SkuCatalog for InMemoryCatalog {
    fn unit_price(&self, sku: &str, region: &str) -> Option<f64> {
        self.entries
            .get(sku)
            .and_then(|e| e.unit_price_by_region.get(region).copied())
    }

    fn free_quota(&self, sku: &str, region: &str) -> Option<f64> {
        self.entries
            .get(sku)
            .and_then(|e| e.free_quota_by_region.get(region).copied())
    }

    fn tiers(&self, sku: &str, region: &str) -> Option<Vec<PriceTier>> {
        self.entries
            .get(sku)
            .and_then(|e| e.tiers_by_region.get(region).cloned())
    }

    fn contains(&self, sku: &str) -> bool {
        self.entries.contains_key(sku)
    }

    fn sku_count(&self) -> usize {
        self.entries.len()
    }

    fn regions(&self) -> Vec<String> {
        self.entries
            .values()
            .flat_map(|e| e.unit_price_by_region.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Fluent constructor, mostly for tests and fixtures
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entries: HashMap<String, SkuEntry>,
    metadata: CatalogMetadata,
}

impl CatalogBuilder {
    fn entry(&mut self, sku: &str) -> &mut SkuEntry {
        self.entries
            .entry(sku.to_string())
            .or_insert_with(|| SkuEntry::new(sku))
    }

    pub fn price(mut self, sku: &str, region: &str, unit_price: f64) -> Self {
        self.entry(sku)
            .unit_price_by_region
            .insert(region.to_string(), unit_price);
        self
    }

    /// Same unit price in several regions
    pub fn price_in(mut self, sku: &str, regions: &[&str], unit_price: f64) -> Self {
        let entry = self.entry(sku);
        for region in regions {
            entry
                .unit_price_by_region
                .insert(region.to_string(), unit_price);
        }
        self
    }

    pub fn free_quota(mut self, sku: &str, region: &str, quota: f64) -> Self {
        self.entry(sku)
            .free_quota_by_region
            .insert(region.to_string(), quota);
        self
    }

    pub fn tiers(mut self, sku: &str, region: &str, tiers: Vec<PriceTier>) -> Self {
        self.entry(sku)
            .tiers_by_region
            .insert(region.to_string(), tiers);
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.metadata.version = Some(version.to_string());
        self
    }

    pub fn build(self) -> PricingResult<InMemoryCatalog> {
        InMemoryCatalog::from_entries(self.entries, self.metadata)
    }
}
