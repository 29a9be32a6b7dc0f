use thiserror::Error;

/// Result type for pricing operations
pub type PricingResult<T> = Result<T, PricingError>;

/// Errors that can occur while resolving prices and composing line items
#[derive(Debug, Error)]
pub enum PricingError {
    /// The (sku, region) pair is absent from the catalog
    #[error("SKU {sku} is not available in region {region}")]
    SkuNotFound { sku: String, region: String },

    /// Region code outside the known vocabulary
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    /// A machine shape violates the declared per-series bounds
    #[error("Invalid machine shape: {0}")]
    InvalidShape(String),

    /// A discount was requested for a shape that cannot receive it
    #[error("Discount not available: {0}")]
    IneligibleDiscount(String),

    /// Every billable sub-quantity was zero or blank
    #[error("Nothing to price for {0}")]
    EmptyInput(String),

    /// Invalid usage input (failed field validation)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No composer is registered for the product
    #[error("No composer registered for product {0}")]
    UnknownProduct(String),

    /// Catalog or static data could not be loaded
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Cart lookup failed
    #[error("Cart entry not found: {0}")]
    CartEntryNotFound(String),

    /// Snapshot (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PricingError {
    pub fn sku_not_found(sku: impl Into<String>, region: impl Into<String>) -> Self {
        PricingError::SkuNotFound {
            sku: sku.into(),
            region: region.into(),
        }
    }

    /// Whether the caller should surface "unsupported in this region"
    pub fn is_unsupported_region(&self) -> bool {
        matches!(self, PricingError::SkuNotFound { .. })
    }
}

impl From<validator::ValidationErrors> for PricingError {
    fn from(err: validator::ValidationErrors) -> Self {
        PricingError::InvalidInput(err.to_string())
    }
}
