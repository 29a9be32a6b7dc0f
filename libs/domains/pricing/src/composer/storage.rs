use serde_json::json;

use super::{unexpected_spec, Composer, ComponentPricer, Composition, CompositionContext};
use crate::error::PricingResult;
use crate::units::{bytes, counts, UnitScale};
use crate::usage::{Product, ProductUsage, StorageClass, UsageSpec};

/// Object storage: capacity, class A/B operations and retrieval
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageComposer;

impl Composer for StorageComposer {
    fn product(&self) -> Product {
        Product::CloudStorage
    }

    fn compose(&self, ctx: &CompositionContext, spec: &UsageSpec) -> PricingResult<Composition> {
        let UsageSpec::CloudStorage(usage) = spec else {
            return Err(unexpected_spec(Product::CloudStorage, spec));
        };
        usage.validate_inputs()?;
        let region = usage.region.as_str();
        let location = ctx.regions().get(region)?;
        let class = usage.storage_class.sku_token();

        // The always-free allowance covers standard storage in a few US regions
        let free_tier = usage.free_tier
            && location.free_tier
            && usage.storage_class == StorageClass::Standard;

        let capacity_sku = ctx
            .regions()
            .sku_with_location_kind(&format!("CP-BIGSTORE-STORAGE-{}", class), region)?;

        let mut pricer = ComponentPricer::new(&ctx.resolver, region);
        pricer.add_primary(
            "capacity",
            &capacity_sku,
            usage.size.to_base(bytes::GIB, UnitScale::Binary),
            "GiB",
            free_tier,
        )?;
        pricer.add(
            "classA",
            &format!("CP-BIGSTORE-CLASS-A-REQUEST-{}", class),
            usage.class_a_operations.to_base(counts::UNITS, UnitScale::Decimal),
            "operations",
            free_tier,
        )?;
        pricer.add(
            "classB",
            &format!("CP-BIGSTORE-CLASS-B-REQUEST-{}", class),
            usage.class_b_operations.to_base(counts::UNITS, UnitScale::Decimal),
            "operations",
            free_tier,
        )?;
        if usage.storage_class.has_retrieval_fee() {
            pricer.add(
                "retrieval",
                &format!("CP-BIGSTORE-RETRIEVAL-{}", class),
                usage.retrieval.to_base(bytes::GIB, UnitScale::Binary),
                "GiB",
                false,
            )?;
        }
        pricer.note("freeTier", json!(free_tier));

        let description = format!("{} storage in {}", usage.storage_class, region);
        pricer.finish(spec, description)
    }
}
