//! Estimate sessions
//!
//! A session owns one editable usage spec per product and a cart. Specs are
//! composed on submit; cart entries can be pulled back into their product's
//! slot for editing through the snapshot each item carries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cart::{CartAccumulator, InMemoryCart};
use crate::composer::{ComposerRegistry, CompositionContext, CompositionFlags};
use crate::error::{PricingError, PricingResult};
use crate::line_item::EditHook;
use crate::usage::{Product, ProductUsage, UsageSpec, DEFAULT_REGION};

/// Result of submitting a product's spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Items were added to the cart, primary first
    Added { ids: Vec<Uuid> },
    /// Every billable quantity was zero or blank
    NothingToAdd,
    /// The primary SKU has no price in the region
    Unsupported { sku: String, region: String },
    /// The inputs failed validation
    Rejected { reason: String },
}

impl SubmitOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, SubmitOutcome::Added { .. })
    }
}

pub struct EstimateSession<C: CartAccumulator = InMemoryCart> {
    context: CompositionContext,
    registry: Arc<ComposerRegistry>,
    specs: HashMap<Product, UsageSpec>,
    cart: C,
    default_region: String,
    last_flags: CompositionFlags,
}

impl EstimateSession<InMemoryCart> {
    pub fn new(context: CompositionContext, registry: Arc<ComposerRegistry>) -> Self {
        Self::with_cart(context, registry, InMemoryCart::new())
    }
}

impl<C: CartAccumulator> EstimateSession<C> {
    pub fn with_cart(context: CompositionContext, registry: Arc<ComposerRegistry>, cart: C) -> Self {
        Self {
            context,
            registry,
            specs: HashMap::new(),
            cart,
            default_region: DEFAULT_REGION.to_string(),
            last_flags: CompositionFlags::default(),
        }
    }

    /// Region given to fresh and reset specs
    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = region.into();
        self
    }

    pub fn context(&self) -> &CompositionContext {
        &self.context
    }

    pub fn cart(&self) -> &C {
        &self.cart
    }

    pub fn into_cart(self) -> C {
        self.cart
    }

    /// Non-fatal conditions of the most recent submit
    pub fn last_flags(&self) -> &CompositionFlags {
        &self.last_flags
    }

    pub fn spec(&self, product: Product) -> Option<&UsageSpec> {
        self.specs.get(&product)
    }

    /// The product's spec, created in its reset state if missing
    pub fn spec_mut(&mut self, product: Product) -> &mut UsageSpec {
        let fresh = self.fresh_spec(product);
        self.specs.entry(product).or_insert(fresh)
    }

    /// Replace the spec of `spec.product()`; a blank region takes the session default
    pub fn set_spec(&mut self, mut spec: UsageSpec) {
        if spec.region().trim().is_empty() {
            spec.set_region(&self.default_region);
        }
        self.specs.insert(spec.product(), spec);
    }

    fn fresh_spec(&self, product: Product) -> UsageSpec {
        let mut spec = UsageSpec::default_for(product);
        spec.set_region(&self.default_region);
        spec
    }

    /// Compose the product's spec and add the resulting items to the cart
    ///
    /// Nothing reaches the cart unless the whole composition succeeded. Input
    /// and catalog problems are reported as outcomes; only broken static
    /// data or snapshots surface as errors.
    pub fn submit(&mut self, product: Product) -> PricingResult<SubmitOutcome> {
        let spec = self.spec_mut(product).clone();
        self.last_flags = CompositionFlags::default();

        let composition = match self.registry.compose(&self.context, &spec) {
            Ok(composition) => composition,
            Err(PricingError::EmptyInput(_)) => return Ok(SubmitOutcome::NothingToAdd),
            Err(PricingError::SkuNotFound { sku, region }) => {
                warn!(product = %product, sku = %sku, region = %region, "Unsupported in region");
                return Ok(SubmitOutcome::Unsupported { sku, region });
            }
            Err(
                e @ (PricingError::InvalidShape(_)
                | PricingError::InvalidInput(_)
                | PricingError::UnknownRegion(_)
                | PricingError::IneligibleDiscount(_)),
            ) => {
                warn!(product = %product, error = %e, "Submission rejected");
                return Ok(SubmitOutcome::Rejected {
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let ids: Vec<Uuid> = composition
            .items
            .into_iter()
            .map(|item| self.cart.add_item(item, None))
            .collect();
        self.last_flags = composition.flags;

        let fresh = self.fresh_spec(product);
        self.specs.insert(product, fresh);

        info!(product = %product, items = ids.len(), "Submitted to cart");
        Ok(SubmitOutcome::Added { ids })
    }

    /// Pull an entry out of the cart and load its inputs back into the session
    pub fn edit(&mut self, unique_id: Uuid) -> PricingResult<Product> {
        let index = self
            .cart
            .get()
            .iter()
            .position(|i| i.unique_id == Some(unique_id))
            .ok_or_else(|| PricingError::CartEntryNotFound(unique_id.to_string()))?;
        if self.cart.get()[index].readonly {
            return Err(PricingError::InvalidInput(
                "Accompanying items are edited through their primary item".to_string(),
            ));
        }

        let item = self.cart.remove(index)?;
        let spec = item.edit_hook.restore();
        let product = spec.product();
        self.specs.insert(product, spec);
        Ok(product)
    }

    /// Load a stored edit hook, normalizing legacy snapshots
    pub fn restore(&mut self, hook: Value) -> PricingResult<Product> {
        let hook = EditHook::from_value(hook, &self.context.machines)?;
        let product = hook.product;
        self.set_spec(hook.restore());
        Ok(product)
    }
}

impl<C: CartAccumulator + std::fmt::Debug> std::fmt::Debug for EstimateSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstimateSession")
            .field("specs", &self.specs.keys().collect::<Vec<_>>())
            .field("cart", &self.cart)
            .field("default_region", &self.default_region)
            .finish()
    }
}
