//! Shared test utilities for domain testing
//!
//! This crate provides reusable test infrastructure for all domain crates:
//! - `TestDataBuilder`: Deterministic test data generation
//! - `assertions`: Custom assertion helpers (float prices, ranges)
//!
//! # Usage
//!
//! ```rust
//! use test_utils::TestDataBuilder;
//!
//! let builder = TestDataBuilder::from_test_name("tiered_price_is_monotonic");
//!
//! // Same test name, same samples
//! let quantities = builder.quantities(32, 10_000.0);
//! assert_eq!(quantities, builder.quantities(32, 10_000.0));
//! ```

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

/// Builder for test data with deterministic randomization
///
/// This ensures tests are reproducible by using seeded random data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// This is the recommended way to create a builder for consistent test data.
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_compose_disk");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    fn rng(&self, stream: u64) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// `count` quantities in `[0, max)`, always including `0`
    pub fn quantities(&self, count: usize, max: f64) -> Vec<f64> {
        let mut rng = self.rng(1);
        let mut values = vec![0.0];
        values.extend((1..count).map(|_| rng.random_range(0.0..max)));
        values
    }

    /// `count` ratios in `[0, 1]`, always including both ends
    pub fn ratios(&self, count: usize) -> Vec<f64> {
        let mut rng = self.rng(2);
        let mut values = vec![0.0, 1.0];
        values.extend((2..count).map(|_| rng.random_range(0.0..=1.0)));
        values
    }

    /// `count` integers in `[min, max]`
    pub fn counts(&self, count: usize, min: u32, max: u32) -> Vec<u32> {
        let mut rng = self.rng(3);
        (0..count).map(|_| rng.random_range(min..=max)).collect()
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Absolute tolerance for monthly price comparisons
    pub const PRICE_TOLERANCE: f64 = 1e-9;

    /// Assert that two prices agree within `PRICE_TOLERANCE` (relative for large values)
    pub fn assert_price_eq(actual: f64, expected: f64, context: &str) {
        let tolerance = PRICE_TOLERANCE * expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= tolerance,
            "{}: expected price {}, got {}",
            context,
            expected,
            actual
        );
    }

    /// Assert that `value` lies in `[min, max]`
    pub fn assert_within(value: f64, min: f64, max: f64, context: &str) {
        assert!(
            value >= min - PRICE_TOLERANCE && value <= max + PRICE_TOLERANCE,
            "{}: expected {} to be within [{}, {}]",
            context,
            value,
            min,
            max
        );
    }
}
