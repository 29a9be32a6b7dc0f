//! Estimate Runner
//!
//! Replays a batch of usage specs and stored edit snapshots through an
//! estimate session and reports the resulting cart.

use chrono::{DateTime, Utc};
use core_config::EstimatorConfig;
use domain_pricing::{
    CartAccumulator, ComposerRegistry, CompositionContext, CompositionFlags, EstimateSession,
    InMemoryCatalog, LineItem, Product, ProductSubtotal, ProductUsage, SkuCatalog, SubmitOutcome,
    UsageSpec,
};
use eyre::{Result, WrapErr};
use observability::{CompositionTimer, EstimatorMetrics};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Input document of the `estimate` command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRequest {
    /// Region for specs that leave theirs blank
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub specs: Vec<UsageSpec>,
    /// Edit snapshots saved with earlier estimates; legacy shapes are accepted
    #[serde(default)]
    pub snapshots: Vec<Value>,
}

impl EstimateRequest {
    /// Parse a request document; a bare array is read as its specs
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Array(specs) => Ok(Self {
                specs: serde_json::from_value(Value::Array(specs))?,
                ..Default::default()
            }),
            other => serde_json::from_value(other),
        }
    }
}

/// What happened to one submitted spec
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOutcome {
    pub product: Product,
    pub outcome: SubmitOutcome,
    #[serde(skip_serializing_if = "CompositionFlags::is_clean")]
    pub flags: CompositionFlags,
}

/// Result of an estimate run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateReport {
    pub catalog_version: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub outcomes: Vec<ProductOutcome>,
    pub items: Vec<LineItem>,
    pub subtotals: Vec<ProductSubtotal>,
    pub total: f64,
    pub duration_ms: u64,
}

/// Prices estimate requests against one loaded catalog
pub struct EstimateRunner {
    context: CompositionContext,
    registry: Arc<ComposerRegistry>,
    default_region: String,
    catalog_version: Option<String>,
}

impl EstimateRunner {
    pub fn new(catalog: InMemoryCatalog, default_region: &str) -> Result<Self> {
        let catalog_version = catalog.metadata().version.clone();
        EstimatorMetrics::set_catalog_size(catalog.sku_count());

        let context = CompositionContext::builtin(Arc::new(catalog))
            .wrap_err("Failed to load built-in machine and region data")?;

        Ok(Self {
            context,
            registry: Arc::new(ComposerRegistry::standard()),
            default_region: default_region.to_string(),
            catalog_version,
        })
    }

    pub fn from_config(config: &EstimatorConfig) -> Result<Self> {
        let catalog = InMemoryCatalog::from_path(&config.catalog_path).wrap_err_with(|| {
            format!("Failed to load catalog {}", config.catalog_path.display())
        })?;
        Self::new(catalog, &config.default_region)
    }

    pub fn context(&self) -> &CompositionContext {
        &self.context
    }

    /// Submit every snapshot, then every spec, in order
    pub fn run(&self, request: EstimateRequest) -> Result<EstimateReport> {
        let start = Instant::now();
        let region = request
            .region
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| self.default_region.clone());

        let mut session = EstimateSession::new(self.context.clone(), Arc::clone(&self.registry))
            .with_default_region(&region);
        let mut outcomes = Vec::with_capacity(request.snapshots.len() + request.specs.len());

        for (index, snapshot) in request.snapshots.into_iter().enumerate() {
            let product = session
                .restore(snapshot)
                .wrap_err_with(|| format!("Snapshot {} could not be restored", index))?;
            outcomes.push(Self::submit(&mut session, product)?);
        }

        for spec in request.specs {
            let product = spec.product();
            session.set_spec(spec);
            outcomes.push(Self::submit(&mut session, product)?);
        }

        let cart = session.into_cart();
        let total = cart.total();
        EstimatorMetrics::set_cart_state(cart.len(), total);

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            items = cart.len(),
            total = total,
            duration_ms = duration_ms,
            "Estimate complete"
        );

        Ok(EstimateReport {
            catalog_version: self.catalog_version.clone(),
            generated_at: Utc::now(),
            outcomes,
            subtotals: cart.grouped(),
            items: cart.get().to_vec(),
            total,
            duration_ms,
        })
    }

    fn submit(session: &mut EstimateSession, product: Product) -> Result<ProductOutcome> {
        let label = product.to_string();
        let mut timer = CompositionTimer::new(&label);
        let outcome = session
            .submit(product)
            .wrap_err_with(|| format!("Failed to price {}", product.display_name()))?;
        timer.stop();

        let (status, items) = match &outcome {
            SubmitOutcome::Added { ids } => ("added", ids.len()),
            SubmitOutcome::NothingToAdd => ("nothing_to_add", 0),
            SubmitOutcome::Unsupported { region, .. } => {
                EstimatorMetrics::record_sku_miss(&label, region);
                ("unsupported", 0)
            }
            SubmitOutcome::Rejected { reason } => {
                warn!(product = %product, reason = %reason, "Spec rejected");
                ("rejected", 0)
            }
        };
        EstimatorMetrics::record_composition(&label, status, items);

        Ok(ProductOutcome {
            product,
            outcome,
            flags: session.last_flags().clone(),
        })
    }
}
