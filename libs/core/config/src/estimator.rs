use crate::{env_bool, env_or_default, env_required, ConfigError, FromEnv};
use std::path::PathBuf;

/// Region used when a usage spec leaves it blank
pub const DEFAULT_REGION: &str = "us-central1";

/// Settings shared by every estimator entry point
#[derive(Clone, Debug)]
pub struct EstimatorConfig {
    /// JSON catalog document with per-region SKU prices
    pub catalog_path: PathBuf,
    pub default_region: String,
    /// Render Prometheus metrics after each run
    pub metrics_enabled: bool,
}

impl EstimatorConfig {
    pub fn new(catalog_path: impl Into<PathBuf>) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            default_region: DEFAULT_REGION.to_string(),
            metrics_enabled: false,
        }
    }

    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = region.into();
        self
    }
}

impl FromEnv for EstimatorConfig {
    /// Reads from environment variables:
    /// - CATALOG_PATH: required
    /// - DEFAULT_REGION: defaults to us-central1
    /// - METRICS_ENABLED: defaults to false
    fn from_env() -> Result<Self, ConfigError> {
        let catalog_path = PathBuf::from(env_required("CATALOG_PATH")?);
        let default_region = env_or_default("DEFAULT_REGION", DEFAULT_REGION);
        if default_region.trim().is_empty() {
            return Err(ConfigError::ParseError {
                key: "DEFAULT_REGION".to_string(),
                details: "must not be blank".to_string(),
            });
        }
        let metrics_enabled = env_bool("METRICS_ENABLED", false)?;

        Ok(Self {
            catalog_path,
            default_region,
            metrics_enabled,
        })
    }
}
