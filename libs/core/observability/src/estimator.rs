//! Estimator-specific metrics.

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Estimator metrics recorder
pub struct EstimatorMetrics;

impl EstimatorMetrics {
    // =========================================================================
    // Composition Metrics
    // =========================================================================

    /// Record one submitted spec; `outcome` is the submit status
    pub fn record_composition(product: &str, outcome: &str, items: usize) {
        counter!(
            "estimator_compositions_total",
            "product" => product.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
        counter!("estimator_line_items_total", "product" => product.to_string())
            .increment(items as u64);

        tracing::debug!(
            product = product,
            outcome = outcome,
            items = items,
            "Recorded composition"
        );
    }

    /// Record a SKU without a price in the requested region
    pub fn record_sku_miss(product: &str, region: &str) {
        counter!(
            "estimator_sku_misses_total",
            "product" => product.to_string(),
            "region" => region.to_string()
        )
        .increment(1);
    }

    // =========================================================================
    // Gauge Metrics (Current State)
    // =========================================================================

    pub fn set_catalog_size(skus: usize) {
        gauge!("estimator_catalog_skus").set(skus as f64);
    }

    /// Set the cart's item count and monthly total
    pub fn set_cart_state(items: usize, total_usd: f64) {
        gauge!("estimator_cart_items").set(items as f64);
        gauge!("estimator_cart_total_usd").set(total_usd);
    }
}

/// Timer guard for automatic duration recording.
///
/// Records the duration when `stop()` is called or when dropped.
pub struct CompositionTimer {
    start: Instant,
    product: String,
    stopped: bool,
}

impl CompositionTimer {
    /// Start a new timer for composing one product's spec
    pub fn new(product: &str) -> Self {
        Self {
            start: Instant::now(),
            product: product.to_string(),
            stopped: false,
        }
    }

    /// Stop the timer and record the duration. Returns duration in milliseconds.
    pub fn stop(&mut self) -> u64 {
        if self.stopped {
            return 0;
        }
        self.stopped = true;

        let duration = self.start.elapsed();
        histogram!(
            "estimator_composition_duration_seconds",
            "product" => self.product.clone()
        )
        .record(duration.as_secs_f64());

        duration.as_millis() as u64
    }
}

impl Drop for CompositionTimer {
    fn drop(&mut self) {
        // Record on drop if not explicitly stopped
        if !self.stopped {
            self.stop();
        }
    }
}
