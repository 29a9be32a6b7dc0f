//! Read-only views of the machine table and the loaded catalog

use chrono::NaiveDate;
use domain_pricing::machine::GpuType;
use domain_pricing::{
    CompositionContext, InMemoryCatalog, MachineConfigurator, MachineFamilyTable,
    MachineSelection, MachineShape, PricingError, ResolvedMachine, SeriesConfig, SkuCatalog,
};
use eyre::{eyre, Result};
use serde::Serialize;

/// A series with the shape picked for the requested core count
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSummary {
    pub family: String,
    pub series: SeriesConfig,
    pub machine: ResolvedMachine,
    pub local_ssd_options: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_ram_range_gb: Option<(f64, f64)>,
    /// GPU types priced in the region, when one was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpus: Option<Vec<GpuType>>,
}

/// Describe `series`, sized to `cores` when given
///
/// A core count no predefined type offers falls back to a custom shape when
/// the series has one.
pub fn describe_series(
    table: &MachineFamilyTable,
    series: &str,
    cores: Option<u32>,
) -> Result<SeriesSummary> {
    let config = table.series(series)?;
    let family = table
        .family_of(series)
        .ok_or_else(|| eyre!("Series {} belongs to no family", series))?;

    let selection = MachineSelection {
        family: family.name.clone(),
        series: config.name.clone(),
        shape: config.minimal_shape()?,
        extended_memory: false,
    };
    let mut configurator = MachineConfigurator::from_selection(table, selection)?;

    if let Some(cores) = cores {
        let predefined = config
            .supported_types
            .iter()
            .find(|t| t.supports(cores))
            .map(|t| t.name.clone());
        match predefined {
            Some(machine_type) => {
                configurator.select_type(&machine_type)?;
                configurator.set_cores(cores)?;
            }
            None if config.is_custom_core_available => {
                configurator.switch_to_custom()?;
                configurator.set_cores(cores)?;
            }
            None => {
                return Err(PricingError::InvalidShape(format!(
                    "Series {} offers no machine with {} vCPUs",
                    series, cores
                ))
                .into());
            }
        }
    }

    let custom_ram_range_gb = if configurator.selection().shape.is_custom() {
        Some(configurator.custom_ram_range()?)
    } else {
        None
    };

    Ok(SeriesSummary {
        family: family.name.clone(),
        series: config.clone(),
        machine: configurator.resolve()?,
        local_ssd_options: configurator.local_ssd_options()?,
        custom_ram_range_gb,
        gpus: None,
    })
}

/// Add the GPU types attachable to the summarized machine in `region`
pub fn with_gpus(
    mut summary: SeriesSummary,
    context: &CompositionContext,
    region: &str,
) -> Result<SeriesSummary> {
    context.regions().get(region)?;
    let selection = MachineSelection {
        family: summary.family.clone(),
        series: summary.machine.series.clone(),
        shape: match &summary.machine.machine_type {
            Some(machine_type) => MachineShape::Predefined {
                machine_type: machine_type.clone(),
                cores: summary.machine.vcpus,
            },
            None => MachineShape::Custom {
                cores: summary.machine.vcpus,
                ram_gb: summary.machine.ram_gb,
            },
        },
        extended_memory: summary.machine.extended_ram_gb > 0.0,
    };
    let configurator = MachineConfigurator::from_selection(&context.machines, selection)?;
    let gpus = configurator
        .gpu_options(&context.resolver, region, &context.gpus)?
        .into_iter()
        .cloned()
        .collect();
    summary.gpus = Some(gpus);
    Ok(summary)
}

/// Catalog metadata and coverage
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    pub version: Option<String>,
    pub updated: Option<NaiveDate>,
    pub skus: usize,
    pub regions: Vec<String>,
}

pub fn describe_catalog(catalog: &InMemoryCatalog) -> CatalogSummary {
    let metadata = catalog.metadata();
    CatalogSummary {
        version: metadata.version.clone(),
        updated: metadata.updated,
        skus: catalog.sku_count(),
        regions: catalog.regions(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn table() -> MachineFamilyTable {
        MachineFamilyTable::builtin().unwrap()
    }

    #[test]
    fn test_describe_minimal_shape() {
        let summary = describe_series(&table(), "n1", None).unwrap();
        assert_eq!(summary.family, "gp");
        assert_eq!(summary.machine.name, "n1-standard-1");
        assert!(summary.custom_ram_range_gb.is_none());
        assert!(summary.local_ssd_options.contains(&0));
    }

    #[test]
    fn test_describe_predefined_cores() {
        let summary = describe_series(&table(), "n2d", Some(8)).unwrap();
        assert_eq!(summary.machine.vcpus, 8);
        assert!(!summary.machine.custom);
    }

    #[test]
    fn test_describe_falls_back_to_custom() {
        let summary = describe_series(&table(), "n2d", Some(6)).unwrap();
        assert!(summary.machine.custom);
        assert_eq!(summary.machine.vcpus, 6);
        let (min, max) = summary.custom_ram_range_gb.unwrap();
        assert!(min <= summary.machine.ram_gb && summary.machine.ram_gb <= max);
    }

    #[test]
    fn test_describe_rejects_unoffered_cores() {
        assert!(describe_series(&table(), "c2", Some(6)).is_err());
        assert!(describe_series(&table(), "z9", None).is_err());
    }

    #[test]
    fn test_gpus_need_a_priced_region() {
        let catalog = InMemoryCatalog::builder().build().unwrap();
        let context = CompositionContext::builtin(Arc::new(catalog)).unwrap();
        let summary = describe_series(&table(), "n1", Some(4)).unwrap();

        let summary = with_gpus(summary, &context, "us-central1").unwrap();
        assert_eq!(summary.gpus, Some(Vec::new()));

        let summary = describe_series(&table(), "n1", Some(4)).unwrap();
        assert!(with_gpus(summary, &context, "mars-north1").is_err());
    }

    #[test]
    fn test_describe_catalog() {
        let catalog = InMemoryCatalog::builder()
            .version("2024-06")
            .price("A", "us-central1", 1.0)
            .price("B", "europe-west1", 2.0)
            .build()
            .unwrap();
        let summary = describe_catalog(&catalog);
        assert_eq!(summary.version.as_deref(), Some("2024-06"));
        assert_eq!(summary.skus, 2);
        assert_eq!(summary.regions, vec!["europe-west1", "us-central1"]);
    }
}
