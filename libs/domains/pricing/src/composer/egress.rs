use super::{unexpected_spec, Composer, ComponentPricer, Composition, CompositionContext};
use crate::error::PricingResult;
use crate::units::{bytes, UnitScale};
use crate::usage::{Product, ProductUsage, UsageSpec};

const EGRESS_SKU: &str = "CP-COMPUTEENGINE-INTERNET-EGRESS";

/// Internet egress by destination, tiered by monthly volume
#[derive(Debug, Clone, Copy, Default)]
pub struct EgressComposer;

impl Composer for EgressComposer {
    fn product(&self) -> Product {
        Product::NetworkEgress
    }

    fn compose(&self, ctx: &CompositionContext, spec: &UsageSpec) -> PricingResult<Composition> {
        let UsageSpec::NetworkEgress(usage) = spec else {
            return Err(unexpected_spec(Product::NetworkEgress, spec));
        };
        usage.validate_inputs()?;
        let region = usage.region.as_str();
        let source = ctx.regions().sku_with_continent(EGRESS_SKU, region)?;

        let mut pricer = ComponentPricer::new(&ctx.resolver, region);
        pricer.add_primary(
            "worldwide",
            &format!("{}-WW", source),
            usage.worldwide.to_base(bytes::GIB, UnitScale::Binary),
            "GiB",
            true,
        )?;

        let destinations = [("china", "CN", &usage.china), ("australia", "AU", &usage.australia)];
        for (key, token, quantity) in destinations {
            pricer.add(
                key,
                &format!("{}-{}", source, token),
                quantity.to_base(bytes::GIB, UnitScale::Binary),
                "GiB",
                true,
            )?;
        }

        pricer.finish(spec, format!("Internet egress from {}", region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, PriceTier};
    use crate::error::PricingError;
    use crate::units::Quantity;
    use crate::usage::EgressUsage;
    use std::sync::Arc;

    fn context() -> CompositionContext {
        let catalog = InMemoryCatalog::builder()
            .tiers(
                "CP-COMPUTEENGINE-INTERNET-EGRESS-NA-WW",
                "us-central1",
                vec![
                    PriceTier { up_to: Some(1024.0), unit_price: 0.12 },
                    PriceTier { up_to: Some(10240.0), unit_price: 0.11 },
                    PriceTier { up_to: None, unit_price: 0.08 },
                ],
            )
            .price("CP-COMPUTEENGINE-INTERNET-EGRESS-NA-CN", "us-central1", 0.23)
            .build()
            .unwrap();
        CompositionContext::builtin(Arc::new(catalog)).unwrap()
    }

    #[test]
    fn test_worldwide_is_tiered() {
        let usage = EgressUsage {
            worldwide: Quantity::new(2.0, bytes::TIB),
            ..Default::default()
        };
        let item = &EgressComposer.compose(&context(), &usage.into()).unwrap().items[0];
        assert_eq!(item.sku, "CP-COMPUTEENGINE-INTERNET-EGRESS-NA-WW");
        assert_eq!(item.quantity, 2048.0);
        assert_eq!(item.unit_price, 0.12);
        let expected = 1024.0 * 0.12 + 1024.0 * 0.11;
        assert!((item.total() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_destinations_summed() {
        let usage = EgressUsage {
            worldwide: Quantity::gib(100.0),
            china: Quantity::gib(10.0),
            ..Default::default()
        };
        let item = &EgressComposer.compose(&context(), &usage.into()).unwrap().items[0];
        assert!((item.total() - (100.0 * 0.12 + 10.0 * 0.23)).abs() < 1e-9);
    }

    #[test]
    fn test_missing_australia_rate_skipped() {
        let usage = EgressUsage {
            worldwide: Quantity::gib(1.0),
            australia: Quantity::gib(1.0),
            ..Default::default()
        };
        let composition = EgressComposer.compose(&context(), &usage.into()).unwrap();
        assert_eq!(composition.flags.skipped.len(), 1);
        assert_eq!(composition.flags.skipped[0].component, "australia");
    }

    #[test]
    fn test_optional_miss_skipped_when_worldwide_is_zero() {
        let catalog = InMemoryCatalog::builder()
            .price("CP-COMPUTEENGINE-INTERNET-EGRESS-NA-AU", "us-central1", 0.19)
            .build()
            .unwrap();
        let ctx = CompositionContext::builtin(Arc::new(catalog)).unwrap();
        let usage = EgressUsage {
            china: Quantity::gib(10.0),
            australia: Quantity::gib(5.0),
            ..Default::default()
        };

        let composition = EgressComposer.compose(&ctx, &usage.into()).unwrap();
        let item = &composition.items[0];
        assert_eq!(item.sku, "CP-COMPUTEENGINE-INTERNET-EGRESS-NA-AU");
        assert!((item.total() - 5.0 * 0.19).abs() < 1e-9);
        assert_eq!(composition.flags.skipped.len(), 1);
        assert_eq!(composition.flags.skipped[0].component, "china");
    }

    #[test]
    fn test_missing_worldwide_rate_aborts() {
        let usage = EgressUsage {
            region: "europe-west1".to_string(),
            worldwide: Quantity::gib(1.0),
            ..Default::default()
        };
        assert!(matches!(
            EgressComposer.compose(&context(), &usage.into()),
            Err(PricingError::SkuNotFound { .. })
        ));
    }

    #[test]
    fn test_nothing_to_bill() {
        assert!(matches!(
            EgressComposer.compose(&context(), &EgressUsage::default().into()),
            Err(PricingError::EmptyInput(_))
        ));
    }
}
