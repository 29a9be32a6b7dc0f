//! Region vocabulary and regional SKU composition
//!
//! The region list is static data (`data/regions.json`); SKU composition is a
//! pure string function of a base SKU and a region.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

use crate::error::{PricingError, PricingResult};

const BUILTIN_REGIONS: &str = include_str!("../data/regions.json");

/// Continent code used in regional SKU suffixes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum Continent {
    #[serde(rename = "NA")]
    #[strum(serialize = "NA")]
    NorthAmerica,
    #[serde(rename = "EUROPE")]
    #[strum(serialize = "EUROPE")]
    Europe,
    #[serde(rename = "APAC")]
    #[strum(serialize = "APAC")]
    AsiaPacific,
    #[serde(rename = "SA")]
    #[strum(serialize = "SA")]
    SouthAmerica,
    #[serde(rename = "AUS")]
    #[strum(serialize = "AUS")]
    Australia,
}

/// What kind of location a region code denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Region,
    DualRegion,
    MultiRegion,
    /// Legacy aggregate code (`us`, `europe`, `asia`) with a concrete default
    Aggregate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionInfo {
    pub code: String,
    pub continent: Continent,
    pub kind: RegionKind,
    #[serde(default)]
    pub default_region: Option<String>,
    #[serde(default)]
    pub free_tier: bool,
}

/// Closed set of known region codes
#[derive(Debug, Clone)]
pub struct RegionTable {
    regions: Vec<RegionInfo>,
    index: HashMap<String, usize>,
}

impl RegionTable {
    pub fn new(regions: Vec<RegionInfo>) -> PricingResult<Self> {
        let index: HashMap<String, usize> = regions
            .iter()
            .enumerate()
            .map(|(i, r)| (r.code.clone(), i))
            .collect();

        for region in &regions {
            if region.kind == RegionKind::Aggregate {
                let target = region.default_region.as_deref().ok_or_else(|| {
                    PricingError::Catalog(format!(
                        "Aggregate region {} has no default region",
                        region.code
                    ))
                })?;
                if !index.contains_key(target) {
                    return Err(PricingError::Catalog(format!(
                        "Aggregate region {} points at unknown region {}",
                        region.code, target
                    )));
                }
            }
        }

        Ok(Self { regions, index })
    }

    /// The region list shipped with the crate
    pub fn builtin() -> PricingResult<Self> {
        let regions: Vec<RegionInfo> = serde_json::from_str(BUILTIN_REGIONS)
            .map_err(|e| PricingError::Catalog(format!("Malformed region table: {}", e)))?;
        Self::new(regions)
    }

    pub fn get(&self, code: &str) -> PricingResult<&RegionInfo> {
        self.index
            .get(code)
            .map(|&i| &self.regions[i])
            .ok_or_else(|| PricingError::UnknownRegion(code.to_string()))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn all(&self) -> &[RegionInfo] {
        &self.regions
    }

    pub fn continent_of(&self, code: &str) -> PricingResult<Continent> {
        Ok(self.get(code)?.continent)
    }

    /// Aggregate codes map to their default region; everything else is itself
    pub fn concrete<'a>(&'a self, code: &'a str) -> PricingResult<&'a str> {
        let info = self.get(code)?;
        match (info.kind, info.default_region.as_deref()) {
            (RegionKind::Aggregate, Some(target)) => Ok(target),
            _ => Ok(code),
        }
    }

    /// Locations spanning more than one region
    pub fn is_multi_regional(&self, code: &str) -> PricingResult<bool> {
        Ok(!matches!(self.get(code)?.kind, RegionKind::Region))
    }

    /// `<base>-<CONTINENT>`
    pub fn sku_with_continent(&self, base: &str, region: &str) -> PricingResult<String> {
        Ok(format!("{}-{}", base, self.continent_of(region)?))
    }

    /// `<base>-MULTI_REGIONAL` / `<base>-DUAL_REGIONAL` for non-single-region locations
    pub fn sku_with_location_kind(&self, base: &str, region: &str) -> PricingResult<String> {
        let suffix = match self.get(region)?.kind {
            RegionKind::Region => return Ok(base.to_string()),
            RegionKind::DualRegion => "DUAL_REGIONAL",
            RegionKind::MultiRegion | RegionKind::Aggregate => "MULTI_REGIONAL",
        };
        Ok(format!("{}-{}", base, suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_builtin_table_loads() {
        let table = RegionTable::builtin().unwrap();
        assert!(table.contains("us-central1"));
        assert!(table.contains("nam4"));
        assert!(!table.contains("mars-north1"));
    }

    #[test]
    fn test_aggregate_fallback() {
        let table = RegionTable::builtin().unwrap();
        assert_eq!(table.concrete("us").unwrap(), "us-central1");
        assert_eq!(table.concrete("europe").unwrap(), "europe-west1");
        assert_eq!(table.concrete("asia").unwrap(), "asia-east1");
        assert_eq!(table.concrete("europe-west4").unwrap(), "europe-west4");
    }

    #[test]
    fn test_unknown_region() {
        let table = RegionTable::builtin().unwrap();
        assert!(matches!(
            table.get("mars-north1"),
            Err(PricingError::UnknownRegion(_))
        ));
    }

    #[test]
    fn test_continent_suffix() {
        let table = RegionTable::builtin().unwrap();
        assert_eq!(
            table.sku_with_continent("CP-SNAPSHOT", "asia-northeast1").unwrap(),
            "CP-SNAPSHOT-APAC"
        );
        assert_eq!(
            table
                .sku_with_continent("CP-SNAPSHOT", "australia-southeast1")
                .unwrap(),
            "CP-SNAPSHOT-AUS"
        );
    }

    #[test]
    fn test_location_kind_suffix() {
        let table = RegionTable::builtin().unwrap();
        assert_eq!(
            table.sku_with_location_kind("CP-GCS", "us-east1").unwrap(),
            "CP-GCS"
        );
        assert_eq!(
            table.sku_with_location_kind("CP-GCS", "us").unwrap(),
            "CP-GCS-MULTI_REGIONAL"
        );
        assert_eq!(
            table.sku_with_location_kind("CP-GCS", "eur4").unwrap(),
            "CP-GCS-DUAL_REGIONAL"
        );
        assert!(table.is_multi_regional("asia1").unwrap());
        assert!(!table.is_multi_regional("asia-east1").unwrap());
    }

    #[test]
    fn test_continent_parse() {
        assert_eq!(Continent::from_str("EUROPE").unwrap(), Continent::Europe);
        assert_eq!(Continent::AsiaPacific.to_string(), "APAC");
    }

    #[test]
    fn test_aggregate_without_default_rejected() {
        let result = RegionTable::new(vec![RegionInfo {
            code: "us".to_string(),
            continent: Continent::NorthAmerica,
            kind: RegionKind::Aggregate,
            default_region: None,
            free_tier: false,
        }]);
        assert!(matches!(result, Err(PricingError::Catalog(_))));
    }
}
