//! Line-item composition
//!
//! ```text
//! UsageSpec ──► ComposerRegistry ──► Composer (per product)
//!                     │                  ├── MachineFamilyTable (compute)
//!                     │                  ├── engine (flat / tiered / SUD / CUD / resource)
//!                     │                  └── PriceResolver ──► SkuCatalog
//!                     └── accompanying specs (boot disk) ──► same registry
//! ```
//!
//! Each composer names one primary sub-quantity (machine, disk capacity,
//! storage capacity, worldwide egress, invocations): a catalog miss there
//! aborts the composition. Every other sub-quantity is optional and a miss
//! only skips it, whether or not the primary was billable.

mod compute;
mod disk;
mod egress;
mod functions;
mod storage;

pub use compute::ComputeComposer;
pub use disk::DiskComposer;
pub use egress::EgressComposer;
pub use functions::FunctionsComposer;
pub use storage::StorageComposer;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::SkuCatalog;
use crate::engine::{flat_price, tiered_price_after_quota, SudPolicy};
use crate::error::{PricingError, PricingResult};
use crate::line_item::LineItem;
use crate::machine::{GpuTable, MachineFamilyTable};
use crate::regions::RegionTable;
use crate::resolver::PriceResolver;
use crate::usage::{Product, ProductUsage, UsageSpec};

/// Shared, read-only inputs of every composer
#[derive(Debug, Clone)]
pub struct CompositionContext {
    pub resolver: PriceResolver,
    pub machines: Arc<MachineFamilyTable>,
    pub gpus: Arc<GpuTable>,
    pub sud_policy: SudPolicy,
}

impl CompositionContext {
    pub fn new(resolver: PriceResolver, machines: Arc<MachineFamilyTable>, gpus: Arc<GpuTable>) -> Self {
        Self {
            resolver,
            machines,
            gpus,
            sud_policy: SudPolicy::default(),
        }
    }

    /// Built-in regions, machine families and GPUs over `catalog`
    pub fn builtin(catalog: Arc<dyn SkuCatalog>) -> PricingResult<Self> {
        let regions = Arc::new(RegionTable::builtin()?);
        Ok(Self::new(
            PriceResolver::new(catalog, regions),
            Arc::new(MachineFamilyTable::builtin()?),
            Arc::new(GpuTable::builtin()?),
        ))
    }

    pub fn with_sud_policy(mut self, policy: SudPolicy) -> Self {
        self.sud_policy = policy;
        self
    }

    pub fn regions(&self) -> &RegionTable {
        self.resolver.regions()
    }
}

/// An optional component that could not be priced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedComponent {
    pub component: String,
    pub sku: Option<String>,
    pub region: String,
    pub reason: String,
}

/// Non-fatal conditions surfaced alongside a composition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionFlags {
    /// A commitment was requested for a shape that cannot hold one and was dropped
    pub cud_ineligible: bool,
    pub skipped: Vec<SkippedComponent>,
}

impl CompositionFlags {
    pub fn merge(&mut self, other: CompositionFlags) {
        self.cud_ineligible |= other.cud_ineligible;
        self.skipped.extend(other.skipped);
    }

    pub fn is_clean(&self) -> bool {
        !self.cud_ineligible && self.skipped.is_empty()
    }
}

/// Line items produced by one product invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub items: Vec<LineItem>,
    pub flags: CompositionFlags,
}

impl Composition {
    pub fn single(item: LineItem, flags: CompositionFlags) -> Self {
        Self {
            items: vec![item],
            flags,
        }
    }

    pub fn total(&self) -> f64 {
        self.items.iter().map(LineItem::total).sum()
    }
}

/// Turns one product's usage spec into priced line items
pub trait Composer: Send + Sync {
    fn product(&self) -> Product;

    fn compose(&self, ctx: &CompositionContext, spec: &UsageSpec) -> PricingResult<Composition>;

    /// Specs of resources priced alongside the primary item
    fn accompanying(&self, _spec: &UsageSpec) -> Vec<UsageSpec> {
        Vec::new()
    }
}

pub(crate) fn unexpected_spec(expected: Product, spec: &UsageSpec) -> PricingError {
    PricingError::InvalidInput(format!(
        "{} composer cannot price {} usage",
        expected,
        spec.product()
    ))
}

/// Product -> composer lookup
pub struct ComposerRegistry {
    composers: HashMap<Product, Box<dyn Composer>>,
}

impl ComposerRegistry {
    pub fn new() -> Self {
        Self {
            composers: HashMap::new(),
        }
    }

    /// Every built-in product
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ComputeComposer));
        registry.register(Box::new(DiskComposer));
        registry.register(Box::new(StorageComposer));
        registry.register(Box::new(EgressComposer));
        registry.register(Box::new(FunctionsComposer));
        registry
    }

    pub fn register(&mut self, composer: Box<dyn Composer>) {
        self.composers.insert(composer.product(), composer);
    }

    pub fn get(&self, product: Product) -> PricingResult<&dyn Composer> {
        self.composers
            .get(&product)
            .map(|c| c.as_ref())
            .ok_or_else(|| PricingError::UnknownProduct(product.to_string()))
    }

    pub fn products(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self.composers.keys().copied().collect();
        products.sort();
        products
    }

    /// Compose a spec and its accompanying resources
    ///
    /// Accompanying items share the primary's `group_id` and are marked
    /// readonly; their failure is recorded in the flags instead of aborting.
    pub fn compose(&self, ctx: &CompositionContext, spec: &UsageSpec) -> PricingResult<Composition> {
        let product = spec.product();
        let composer = self.get(product)?;
        let mut composition = composer.compose(ctx, spec)?;

        let companions = composer.accompanying(spec);
        if !companions.is_empty() {
            let group_id = Uuid::new_v4();
            for item in &mut composition.items {
                item.group_id = Some(group_id);
            }

            for companion in companions {
                let result = self
                    .get(companion.product())
                    .and_then(|c| c.compose(ctx, &companion));
                match result {
                    Ok(accompanying) => {
                        for mut item in accompanying.items {
                            item.group_id = Some(group_id);
                            item.readonly = true;
                            composition.items.push(item);
                        }
                        composition.flags.merge(accompanying.flags);
                    }
                    Err(PricingError::EmptyInput(_)) => {}
                    Err(e) => {
                        warn!(
                            product = %product,
                            companion = %companion.product(),
                            error = %e,
                            "Accompanying resource not priced"
                        );
                        let sku = match &e {
                            PricingError::SkuNotFound { sku, .. } => Some(sku.clone()),
                            _ => None,
                        };
                        composition.flags.skipped.push(SkippedComponent {
                            component: companion.product().tab().to_string(),
                            sku,
                            region: companion.region().to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            product = %product,
            region = %spec.region(),
            items = composition.items.len(),
            total = composition.total(),
            "Composition complete"
        );
        Ok(composition)
    }
}

impl Default for ComposerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for ComposerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposerRegistry")
            .field("products", &self.products())
            .finish()
    }
}

// ============================================================================
// Component pricing helpers
// ============================================================================

/// Cost of a metered quantity of one SKU
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeteredCost {
    /// Catalog unit price (first band for tiered SKUs)
    pub unit_price: f64,
    /// Free quota actually deducted
    pub free_quota: f64,
    pub cost: f64,
    pub tiered: bool,
}

/// Tiered when the SKU declares bands in the region, flat otherwise
pub fn metered_cost(
    resolver: &PriceResolver,
    sku: &str,
    region: &str,
    quantity: f64,
    apply_free_quota: bool,
) -> PricingResult<MeteredCost> {
    if let Some(tiers) = resolver.resolve_tiers(sku, region) {
        let free_quota = if apply_free_quota {
            resolver.resolve_free_quota(sku, region)
        } else {
            0.0
        };
        return Ok(MeteredCost {
            unit_price: tiers.first().map_or(0.0, |t| t.unit_price),
            free_quota,
            cost: tiered_price_after_quota(quantity, free_quota, &tiers),
            tiered: true,
        });
    }

    let price = resolver.resolve_unit_price(sku, region)?;
    let free_quota = if apply_free_quota { price.free_quota } else { 0.0 };
    Ok(MeteredCost {
        unit_price: price.unit_price,
        free_quota,
        cost: flat_price(quantity, free_quota, price.unit_price),
        tiered: false,
    })
}

/// Record a catalog miss of an optional component instead of failing
pub(crate) fn skip_missing<T>(
    flags: &mut CompositionFlags,
    component: &str,
    result: PricingResult<T>,
) -> PricingResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(PricingError::SkuNotFound { sku, region }) => {
            warn!(component = component, sku = %sku, region = %region, "Optional component not priced");
            flags.skipped.push(SkippedComponent {
                component: component.to_string(),
                sku: Some(sku.clone()),
                reason: PricingError::SkuNotFound {
                    sku,
                    region: region.clone(),
                }
                .to_string(),
                region,
            });
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

struct PricedComponent {
    sku: String,
    quantity: f64,
    label: String,
    unit_price: f64,
    /// Cost is exactly `unit_price * quantity`
    linear: bool,
}

/// Accumulates the sub-quantities of one product into a line item
pub(crate) struct ComponentPricer<'c> {
    resolver: &'c PriceResolver,
    region: &'c str,
    /// First priced component; it labels the line item
    primary: Option<PricedComponent>,
    priced: usize,
    total: f64,
    costs: BTreeMap<String, Value>,
    flags: CompositionFlags,
}

impl<'c> ComponentPricer<'c> {
    pub(crate) fn new(resolver: &'c PriceResolver, region: &'c str) -> Self {
        Self {
            resolver,
            region,
            primary: None,
            priced: 0,
            total: 0.0,
            costs: BTreeMap::new(),
            flags: CompositionFlags::default(),
        }
    }

    /// Price the primary sub-quantity; a catalog miss is an error
    pub(crate) fn add_primary(
        &mut self,
        key: &str,
        sku: &str,
        quantity: f64,
        label: &str,
        apply_free_quota: bool,
    ) -> PricingResult<()> {
        self.add_metered(key, sku, quantity, label, apply_free_quota, true)
    }

    /// Price an optional sub-quantity; a catalog miss is skipped and flagged
    pub(crate) fn add(
        &mut self,
        key: &str,
        sku: &str,
        quantity: f64,
        label: &str,
        apply_free_quota: bool,
    ) -> PricingResult<()> {
        self.add_metered(key, sku, quantity, label, apply_free_quota, false)
    }

    /// Non-positive quantities are never looked up
    fn add_metered(
        &mut self,
        key: &str,
        sku: &str,
        quantity: f64,
        label: &str,
        apply_free_quota: bool,
        required: bool,
    ) -> PricingResult<()> {
        if !(quantity.is_finite() && quantity > 0.0) {
            return Ok(());
        }

        let result = metered_cost(self.resolver, sku, self.region, quantity, apply_free_quota);
        let cost = if required {
            result?
        } else {
            match self.optional(key, result)? {
                Some(cost) => cost,
                None => return Ok(()),
            }
        };
        let linear = !cost.tiered && cost.free_quota == 0.0;
        let component = PricedComponent {
            sku: sku.to_string(),
            quantity,
            label: label.to_string(),
            unit_price: cost.unit_price,
            linear,
        };
        self.record(key, component, cost.cost);
        Ok(())
    }

    /// Record a component whose cost the caller derived from its unit price
    pub(crate) fn add_computed(
        &mut self,
        key: &str,
        sku: &str,
        quantity: f64,
        label: &str,
        unit_price: f64,
        cost: f64,
    ) {
        let component = PricedComponent {
            sku: sku.to_string(),
            quantity,
            label: label.to_string(),
            unit_price,
            linear: false,
        };
        self.record(key, component, cost);
    }

    /// Lookup of an optional component; a catalog miss becomes `None`
    pub(crate) fn optional<T>(
        &mut self,
        key: &str,
        result: PricingResult<T>,
    ) -> PricingResult<Option<T>> {
        skip_missing(&mut self.flags, key, result)
    }

    pub(crate) fn flags_mut(&mut self) -> &mut CompositionFlags {
        &mut self.flags
    }

    /// Extra breakdown detail
    pub(crate) fn note(&mut self, key: &str, value: Value) {
        self.costs.insert(key.to_string(), value);
    }

    fn record(&mut self, key: &str, component: PricedComponent, cost: f64) {
        debug!(
            component = key,
            sku = %component.sku,
            quantity = component.quantity,
            cost = cost,
            "Component priced"
        );
        self.total += cost;
        self.priced += 1;
        self.costs.insert(key.to_string(), json!(cost));

        if self.primary.is_none() {
            self.primary = Some(component);
        }
    }

    /// Build the line item; `EmptyInput` when nothing was billable
    pub(crate) fn finish(
        self,
        spec: &UsageSpec,
        description: String,
    ) -> PricingResult<Composition> {
        let primary = self
            .primary
            .ok_or_else(|| PricingError::EmptyInput(spec.product().to_string()))?;

        let price = if self.priced == 1 && primary.linear {
            None
        } else {
            Some(self.total)
        };

        let item = LineItem::new(spec, primary.sku)
            .with_quantity(primary.quantity, primary.label)
            .with_display(spec.product().display_name(), description)
            .with_unit_price(primary.unit_price)
            .with_price(price)
            .with_items(self.costs);

        Ok(Composition::single(item, self.flags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, PriceTier};
    use crate::usage::DiskUsage;

    fn context(catalog: InMemoryCatalog) -> CompositionContext {
        CompositionContext::builtin(Arc::new(catalog)).unwrap()
    }

    #[test]
    fn test_metered_flat_and_quota() {
        let ctx = context(
            InMemoryCatalog::builder()
                .price("Y", "us-central1", 1.0)
                .free_quota("Y", "us-central1", 5.0)
                .build()
                .unwrap(),
        );
        let with_quota = metered_cost(&ctx.resolver, "Y", "us-central1", 8.0, true).unwrap();
        assert_eq!(with_quota.cost, 3.0);
        let without_quota = metered_cost(&ctx.resolver, "Y", "us-central1", 8.0, false).unwrap();
        assert_eq!(without_quota.cost, 8.0);
        assert_eq!(without_quota.free_quota, 0.0);
    }

    #[test]
    fn test_metered_tiered() {
        let ctx = context(
            InMemoryCatalog::builder()
                .tiers(
                    "T",
                    "us-central1",
                    vec![
                        PriceTier { up_to: Some(10.0), unit_price: 1.0 },
                        PriceTier { up_to: None, unit_price: 0.5 },
                    ],
                )
                .build()
                .unwrap(),
        );
        let cost = metered_cost(&ctx.resolver, "T", "us-central1", 20.0, true).unwrap();
        assert!(cost.tiered);
        assert_eq!(cost.cost, 15.0);
        assert_eq!(cost.unit_price, 1.0);
    }

    #[test]
    fn test_metered_miss() {
        let ctx = context(InMemoryCatalog::default());
        assert!(matches!(
            metered_cost(&ctx.resolver, "NOPE", "us-central1", 1.0, true),
            Err(PricingError::SkuNotFound { .. })
        ));
    }

    #[test]
    fn test_skip_missing_records_flag() {
        let mut flags = CompositionFlags::default();
        let result: PricingResult<f64> = Err(PricingError::sku_not_found("S", "asia-east1"));
        assert_eq!(skip_missing(&mut flags, "snapshot", result).unwrap(), None);
        assert_eq!(flags.skipped.len(), 1);
        assert_eq!(flags.skipped[0].sku.as_deref(), Some("S"));
        assert!(!flags.is_clean());

        let fatal: PricingResult<f64> = Err(PricingError::InvalidShape("bad".to_string()));
        assert!(skip_missing(&mut flags, "gpu", fatal).is_err());
    }

    #[test]
    fn test_pricer_single_flat_item_leaves_price_null() {
        let ctx = context(
            InMemoryCatalog::builder()
                .price("X", "us-central1", 2.0)
                .build()
                .unwrap(),
        );
        let spec = UsageSpec::default_for(Product::PersistentDisk);
        let mut pricer = ComponentPricer::new(&ctx.resolver, "us-central1");
        pricer.add_primary("capacity", "X", 10.0, "GiB", true).unwrap();
        let composition = pricer.finish(&spec, String::new()).unwrap();

        let item = &composition.items[0];
        assert_eq!(item.price, None);
        assert_eq!(item.total(), 20.0);
    }

    #[test]
    fn test_pricer_empty_input() {
        let ctx = context(InMemoryCatalog::default());
        let spec = UsageSpec::default_for(Product::NetworkEgress);
        let mut pricer = ComponentPricer::new(&ctx.resolver, "us-central1");
        pricer.add_primary("worldwide", "W", 0.0, "GiB", true).unwrap();
        pricer.add("china", "C", f64::NAN, "GiB", true).unwrap();
        assert!(matches!(
            pricer.finish(&spec, String::new()),
            Err(PricingError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_pricer_primary_miss_aborts() {
        let ctx = context(
            InMemoryCatalog::builder()
                .price("X", "us-central1", 2.0)
                .build()
                .unwrap(),
        );
        let mut pricer = ComponentPricer::new(&ctx.resolver, "us-central1");
        assert!(matches!(
            pricer.add_primary("capacity", "MISSING", 1.0, "GiB", true),
            Err(PricingError::SkuNotFound { .. })
        ));
    }

    #[test]
    fn test_pricer_optional_miss_skipped_without_primary() {
        let ctx = context(
            InMemoryCatalog::builder()
                .price("X", "us-central1", 2.0)
                .build()
                .unwrap(),
        );
        let spec = UsageSpec::default_for(Product::NetworkEgress);
        let mut pricer = ComponentPricer::new(&ctx.resolver, "us-central1");
        pricer.add_primary("worldwide", "MISSING-W", 0.0, "GiB", true).unwrap();
        pricer.add("china", "MISSING-C", 3.0, "GiB", true).unwrap();
        pricer.add("australia", "X", 4.0, "GiB", true).unwrap();
        let composition = pricer.finish(&spec, String::new()).unwrap();

        assert_eq!(composition.items[0].sku, "X");
        assert_eq!(composition.items[0].total(), 8.0);
        assert_eq!(composition.flags.skipped.len(), 1);
        assert_eq!(composition.flags.skipped[0].component, "china");
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ComposerRegistry::standard();
        assert_eq!(registry.products().len(), 5);
        assert!(registry.get(Product::CloudFunctions).is_ok());
        assert!(matches!(
            ComposerRegistry::new().get(Product::CloudFunctions),
            Err(PricingError::UnknownProduct(_))
        ));
    }

    #[test]
    fn test_registry_rejects_mismatched_spec() {
        let ctx = context(InMemoryCatalog::default());
        let registry = ComposerRegistry::standard();
        let disk: UsageSpec = DiskUsage::default().into();
        let egress = registry.get(Product::NetworkEgress).unwrap();
        assert!(matches!(
            egress.compose(&ctx, &disk),
            Err(PricingError::InvalidInput(_))
        ));
    }
}
