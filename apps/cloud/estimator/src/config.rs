//! Configuration for the estimator

use core_config::{env_bool, env_or_default, EstimatorConfig, FromEnv, DEFAULT_REGION};
use eyre::Result;
use std::path::PathBuf;

/// Load configuration from environment variables
///
/// `--catalog` on the command line takes the place of `CATALOG_PATH`; the
/// other settings still come from the environment.
pub fn load(catalog_override: Option<PathBuf>) -> Result<EstimatorConfig> {
    let Some(path) = catalog_override else {
        return Ok(EstimatorConfig::from_env()?);
    };

    let mut config = EstimatorConfig::new(path)
        .with_default_region(env_or_default("DEFAULT_REGION", DEFAULT_REGION));
    config.metrics_enabled = env_bool("METRICS_ENABLED", false)?;
    Ok(config)
}
