use serde_json::json;

use super::{unexpected_spec, Composer, ComponentPricer, Composition, CompositionContext};
use crate::error::{PricingError, PricingResult};
use crate::units::{bytes, counts, UnitScale};
use crate::usage::{function_cpu_ghz, Product, ProductUsage, UsageSpec};

const INVOCATIONS_SKU: &str = "CP-FUNCTIONS-EXECUTIONS";
const MEMORY_SKU: &str = "CP-FUNCTIONS-GB-SECONDS";
const CPU_SKU: &str = "CP-FUNCTIONS-GHZ-SECONDS";
const EGRESS_SKU: &str = "CP-FUNCTIONS-EGRESS";

/// Serverless functions: invocations, compute time and outbound data
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionsComposer;

impl Composer for FunctionsComposer {
    fn product(&self) -> Product {
        Product::CloudFunctions
    }

    fn compose(&self, ctx: &CompositionContext, spec: &UsageSpec) -> PricingResult<Composition> {
        let UsageSpec::CloudFunctions(usage) = spec else {
            return Err(unexpected_spec(Product::CloudFunctions, spec));
        };
        usage.validate_inputs()?;
        let region = usage.region.as_str();
        ctx.regions().get(region)?;
        let ghz = function_cpu_ghz(usage.memory_mb).ok_or_else(|| {
            PricingError::InvalidInput(format!("{} MB is not an offered memory size", usage.memory_mb))
        })?;

        let invocations = usage.invocations.to_base(counts::UNITS, UnitScale::Decimal);
        let seconds = invocations * usage.execution_time_ms / 1000.0;
        let gb_seconds = seconds * usage.memory_mb as f64 / 1024.0;
        let ghz_seconds = seconds * ghz;

        let mut pricer = ComponentPricer::new(&ctx.resolver, region);
        pricer.add_primary("invocations", INVOCATIONS_SKU, invocations, "invocations", usage.free_tier)?;
        pricer.add("memory", MEMORY_SKU, gb_seconds, "GB-seconds", usage.free_tier)?;
        pricer.add("cpu", CPU_SKU, ghz_seconds, "GHz-seconds", usage.free_tier)?;
        pricer.add(
            "egress",
            EGRESS_SKU,
            usage.egress.to_base(bytes::GIB, UnitScale::Binary),
            "GiB",
            usage.free_tier,
        )?;
        pricer.note("gbSeconds", json!(gb_seconds));
        pricer.note("ghzSeconds", json!(ghz_seconds));

        let description = format!("{} MB / {} GHz functions", usage.memory_mb, ghz);
        pricer.finish(spec, description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::units::Quantity;
    use crate::usage::FunctionsUsage;
    use std::sync::Arc;

    fn context() -> CompositionContext {
        let catalog = InMemoryCatalog::builder()
            .price(INVOCATIONS_SKU, "us-central1", 0.0000004)
            .free_quota(INVOCATIONS_SKU, "us-central1", 2_000_000.0)
            .price(MEMORY_SKU, "us-central1", 0.0000025)
            .free_quota(MEMORY_SKU, "us-central1", 400_000.0)
            .price(CPU_SKU, "us-central1", 0.00001)
            .free_quota(CPU_SKU, "us-central1", 200_000.0)
            .build()
            .unwrap();
        CompositionContext::builtin(Arc::new(catalog)).unwrap()
    }

    fn usage(free_tier: bool) -> FunctionsUsage {
        FunctionsUsage {
            invocations: Quantity::millions(10.0),
            execution_time_ms: 200.0,
            memory_mb: 256,
            free_tier,
            ..Default::default()
        }
    }

    #[test]
    fn test_compute_time_derivation() {
        let item = &FunctionsComposer.compose(&context(), &usage(false).into()).unwrap().items[0];
        // 10M invocations x 0.2 s = 2M seconds
        assert_eq!(item.items["gbSeconds"], 500_000.0);
        assert!((item.items["ghzSeconds"].as_f64().unwrap() - 800_000.0).abs() < 1e-6);
        assert_eq!(item.sku, INVOCATIONS_SKU);
        assert_eq!(item.quantity, 10_000_000.0);
    }

    #[test]
    fn test_free_tier_reduces_total() {
        let ctx = context();
        let paid = FunctionsComposer.compose(&ctx, &usage(false).into()).unwrap();
        let free = FunctionsComposer.compose(&ctx, &usage(true).into()).unwrap();

        let invocations_free = free.items[0].items["invocations"].as_f64().unwrap();
        assert!((invocations_free - 8_000_000.0 * 0.0000004).abs() < 1e-9);
        assert!(free.total() < paid.total());
        assert!(free.total() >= 0.0);
    }

    #[test]
    fn test_missing_egress_rate_skipped() {
        let spec = FunctionsUsage {
            egress: Quantity::gib(5.0),
            ..usage(false)
        };
        let composition = FunctionsComposer.compose(&context(), &spec.into()).unwrap();
        assert_eq!(composition.flags.skipped[0].component, "egress");
    }

    #[test]
    fn test_missing_invocation_rate_aborts() {
        let spec = FunctionsUsage {
            region: "europe-west1".to_string(),
            ..usage(false)
        };
        assert!(matches!(
            FunctionsComposer.compose(&context(), &spec.into()),
            Err(PricingError::SkuNotFound { .. })
        ));
    }

    #[test]
    fn test_unknown_region_rejected() {
        let spec = FunctionsUsage {
            region: "mars-north1".to_string(),
            ..usage(false)
        };
        assert!(matches!(
            FunctionsComposer.compose(&context(), &spec.into()),
            Err(PricingError::UnknownRegion(_))
        ));
    }

    #[test]
    fn test_unsupported_memory_rejected() {
        let spec = FunctionsUsage {
            memory_mb: 300,
            ..usage(false)
        };
        assert!(matches!(
            FunctionsComposer.compose(&context(), &spec.into()),
            Err(PricingError::InvalidInput(_))
        ));
    }
}
