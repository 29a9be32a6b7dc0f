//! Pricing Domain
//!
//! Cloud cost estimation: resolves catalog prices for usage specs and
//! composes them into priced line items for an estimate cart.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ EstimateSession  │  ← Per-product usage specs, cart, edit-reload
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │ ComposerRegistry │  ← One composer per product, accompanying items
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐     ┌───────────────────┐
//! │ Pricing engine   │ ◄── │ Machine families  │  ← Static series data
//! └────────┬─────────┘     └───────────────────┘
//!          │
//! ┌────────▼─────────┐     ┌───────────────────┐
//! │ PriceResolver    │ ◄── │ Regions           │  ← Static region data
//! └────────┬─────────┘     └───────────────────┘
//!          │
//! ┌────────▼─────────┐
//! │ SkuCatalog       │  ← Read-only (sku, region) prices
//! └──────────────────┘
//! ```
//!
//! Everything below the session is synchronous and side-effect free; the
//! catalog is shared read-only and each session owns its specs and cart.

pub mod cart;
pub mod catalog;
pub mod composer;
pub mod engine;
pub mod error;
pub mod line_item;
pub mod machine;
pub mod migration;
pub mod regions;
pub mod resolver;
pub mod session;
pub mod units;
pub mod usage;

// Re-export commonly used types
pub use cart::{CartAccumulator, InMemoryCart, ProductSubtotal};
pub use catalog::{CatalogBuilder, CatalogDocument, InMemoryCatalog, PriceTier, SkuCatalog, SkuEntry};
pub use composer::{
    Composer, ComposerRegistry, Composition, CompositionContext, CompositionFlags,
    SkippedComponent,
};
pub use engine::{CommitmentTerm, SudPolicy, HOURS_PER_MONTH};
pub use error::{PricingError, PricingResult};
pub use line_item::{EditHook, LineItem};
pub use machine::{
    GpuTable, MachineConfigurator, MachineFamilyTable, MachineSelection, MachineShape,
    ResolvedMachine, SeriesConfig,
};
pub use regions::{Continent, RegionKind, RegionTable};
pub use resolver::{PriceResolver, UnitPrice};
pub use session::{EstimateSession, SubmitOutcome};
pub use units::{Quantity, UnitScale};
pub use usage::{
    ComputeUsage, DiskUsage, EgressUsage, FunctionsUsage, Product, ProductUsage, StorageUsage,
    UsageSpec,
};
