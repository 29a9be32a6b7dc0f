//! Observability utilities for the cost estimator.
//!
//! This crate provides:
//! - Prometheus metrics recording and text export
//! - Estimator metrics for compositions, catalog misses and the cart
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, render_metrics, EstimatorMetrics};
//!
//! // Initialize metrics recorder
//! init_metrics()?;
//!
//! // Record estimator operations
//! EstimatorMetrics::record_composition("compute_engine", "added", 2);
//! EstimatorMetrics::set_cart_state(2, 143.81);
//!
//! // Dump in the Prometheus text format
//! println!("{}", render_metrics());
//! ```

pub mod estimator;

pub use estimator::{CompositionTimer, EstimatorMetrics};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// Installs the global recorder on the first call; later calls return the
/// same handle.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;

        info!("Prometheus metrics recorder initialized");

        // Register metric descriptions
        register_metric_descriptions();

        Ok(handle)
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Current metrics in the Prometheus text format
pub fn render_metrics() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Register metric descriptions for documentation
fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    // Composition metrics
    describe_counter!(
        "estimator_compositions_total",
        "Usage specs composed, by product and outcome"
    );
    describe_histogram!(
        "estimator_composition_duration_seconds",
        "Time to compose one usage spec"
    );
    describe_counter!(
        "estimator_line_items_total",
        "Line items produced, by product"
    );

    // Catalog metrics
    describe_counter!(
        "estimator_sku_misses_total",
        "SKUs without a price in the requested region"
    );
    describe_gauge!(
        "estimator_catalog_skus",
        "SKUs in the loaded catalog"
    );

    // Cart metrics
    describe_gauge!(
        "estimator_cart_items",
        "Line items currently in the cart"
    );
    describe_gauge!(
        "estimator_cart_total_usd",
        "Monthly total of the cart in USD"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        let first = init_metrics().unwrap() as *const PrometheusHandle;
        let second = init_metrics().unwrap() as *const PrometheusHandle;
        assert_eq!(first, second);
    }
}
