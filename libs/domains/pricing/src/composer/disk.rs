use serde_json::json;

use super::{unexpected_spec, Composer, ComponentPricer, Composition, CompositionContext};
use crate::error::PricingResult;
use crate::units::{bytes, UnitScale};
use crate::usage::{Product, ProductUsage, UsageSpec};

const SNAPSHOT_SKU: &str = "CP-COMPUTEENGINE-STORAGE-PD-SNAPSHOT";

/// Persistent disk capacity and its snapshot storage, per GiB-month
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskComposer;

impl Composer for DiskComposer {
    fn product(&self) -> Product {
        Product::PersistentDisk
    }

    fn compose(&self, ctx: &CompositionContext, spec: &UsageSpec) -> PricingResult<Composition> {
        let UsageSpec::PersistentDisk(usage) = spec else {
            return Err(unexpected_spec(Product::PersistentDisk, spec));
        };
        usage.validate_inputs()?;
        let region = usage.region.as_str();
        let snapshot_sku = ctx.regions().sku_with_continent(SNAPSHOT_SKU, region)?;

        let size_gib = usage.size.to_base(bytes::GIB, UnitScale::Binary);
        let snapshot_gib = usage.snapshot_size.to_base(bytes::GIB, UnitScale::Binary);

        let mut pricer = ComponentPricer::new(&ctx.resolver, region);
        pricer.add_primary(
            "capacity",
            &usage.disk_type.capacity_sku(usage.regional),
            size_gib,
            "GiB",
            true,
        )?;
        pricer.add("snapshot", &snapshot_sku, snapshot_gib, "GiB", true)?;
        if snapshot_gib > 0.0 {
            pricer.note("snapshotGib", json!(snapshot_gib));
        }

        let description = format!(
            "{} {} GiB{}",
            usage.disk_type,
            size_gib,
            if usage.regional { ", regional" } else { "" }
        );
        pricer.finish(spec, description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::error::PricingError;
    use crate::units::Quantity;
    use crate::usage::{DiskType, DiskUsage};
    use std::sync::Arc;

    fn context() -> CompositionContext {
        let catalog = InMemoryCatalog::builder()
            .price("CP-COMPUTEENGINE-STORAGE-PD-SSD", "us-central1", 0.17)
            .price("CP-COMPUTEENGINE-STORAGE-PD-SSD-REGIONAL", "us-central1", 0.34)
            .price("CP-COMPUTEENGINE-STORAGE-PD-SNAPSHOT-NA", "us-central1", 0.026)
            .price("CP-COMPUTEENGINE-STORAGE-PD-CAPACITY", "europe-west1", 0.044)
            .build()
            .unwrap();
        CompositionContext::builtin(Arc::new(catalog)).unwrap()
    }

    fn ssd(size: Quantity) -> DiskUsage {
        DiskUsage {
            disk_type: DiskType::Ssd,
            size,
            ..Default::default()
        }
    }

    #[test]
    fn test_capacity_only_is_flat() {
        let composition = DiskComposer.compose(&context(), &ssd(Quantity::gib(100.0)).into()).unwrap();
        let item = &composition.items[0];
        assert_eq!(item.sku, "CP-COMPUTEENGINE-STORAGE-PD-SSD");
        assert_eq!(item.price, None);
        assert_eq!(item.total(), 0.17 * 100.0);
    }

    #[test]
    fn test_tib_normalized_to_gib() {
        let composition = DiskComposer
            .compose(&context(), &ssd(Quantity::new(1.0, bytes::TIB)).into())
            .unwrap();
        assert_eq!(composition.items[0].quantity, 1024.0);
    }

    #[test]
    fn test_regional_with_snapshot() {
        let usage = DiskUsage {
            regional: true,
            snapshot_size: Quantity::gib(50.0),
            ..ssd(Quantity::gib(100.0))
        };
        let item = &DiskComposer.compose(&context(), &usage.into()).unwrap().items[0];
        assert_eq!(item.sku, "CP-COMPUTEENGINE-STORAGE-PD-SSD-REGIONAL");
        assert_eq!(item.price, Some(0.34 * 100.0 + 0.026 * 50.0));
    }

    #[test]
    fn test_missing_snapshot_sku_skipped() {
        let usage = DiskUsage {
            region: "europe-west1".to_string(),
            size: Quantity::gib(10.0),
            snapshot_size: Quantity::gib(5.0),
            ..Default::default()
        };
        let composition = DiskComposer.compose(&context(), &usage.into()).unwrap();
        assert_eq!(composition.items[0].total(), 0.044 * 10.0);
        assert_eq!(
            composition.flags.skipped[0].sku.as_deref(),
            Some("CP-COMPUTEENGINE-STORAGE-PD-SNAPSHOT-EUROPE")
        );
    }

    #[test]
    fn test_snapshot_only_is_primary() {
        let usage = DiskUsage {
            snapshot_size: Quantity::gib(50.0),
            ..Default::default()
        };
        let item = &DiskComposer.compose(&context(), &usage.into()).unwrap().items[0];
        assert_eq!(item.sku, "CP-COMPUTEENGINE-STORAGE-PD-SNAPSHOT-NA");
    }

    #[test]
    fn test_missing_capacity_sku_aborts() {
        let usage = DiskUsage {
            region: "europe-west1".to_string(),
            snapshot_size: Quantity::gib(5.0),
            ..ssd(Quantity::gib(10.0))
        };
        assert!(matches!(
            DiskComposer.compose(&context(), &usage.into()),
            Err(PricingError::SkuNotFound { .. })
        ));
    }

    #[test]
    fn test_snapshot_only_miss_leaves_nothing_to_bill() {
        // Capacity is zero, so the missing snapshot rate is skipped, not fatal
        let usage = DiskUsage {
            region: "europe-west1".to_string(),
            snapshot_size: Quantity::gib(5.0),
            ..Default::default()
        };
        assert!(matches!(
            DiskComposer.compose(&context(), &usage.into()),
            Err(PricingError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_empty_disk() {
        assert!(matches!(
            DiskComposer.compose(&context(), &DiskUsage::default().into()),
            Err(PricingError::EmptyInput(_))
        ));
    }
}
