//! Per-product usage specs
//!
//! A `UsageSpec` is the editable input of one product form. It is tagged by
//! product so composers, sessions and edit hooks can carry any of them
//! without string-keyed field access.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use validator::{Validate, ValidationError};

use crate::engine::{CommitmentTerm, HOURS_PER_MONTH};
use crate::error::{PricingError, PricingResult};
use crate::machine::MachineSelection;
use crate::units::{bytes, counts, Quantity};

/// Region used by freshly reset specs
pub const DEFAULT_REGION: &str = "us-central1";

/// Hours in a week
const HOURS_PER_WEEK: f64 = 168.0;

/// Products with a registered composer
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Product {
    ComputeEngine,
    PersistentDisk,
    CloudStorage,
    NetworkEgress,
    CloudFunctions,
}

impl Product {
    /// Form tab that produced an item
    pub fn tab(&self) -> &'static str {
        match self {
            Product::ComputeEngine => "compute-engine",
            Product::PersistentDisk => "persistent-disk",
            Product::CloudStorage => "cloud-storage",
            Product::NetworkEgress => "network-egress",
            Product::CloudFunctions => "cloud-functions",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Product::ComputeEngine => "Compute Engine",
            Product::PersistentDisk => "Persistent Disk",
            Product::CloudStorage => "Cloud Storage",
            Product::NetworkEgress => "Network Egress",
            Product::CloudFunctions => "Cloud Functions",
        }
    }
}

/// Capabilities every usage spec exposes to the generic pipeline
pub trait ProductUsage {
    fn product(&self) -> Product;

    fn region(&self) -> &str;

    fn set_region(&mut self, region: &str);

    fn commitment(&self) -> CommitmentTerm {
        CommitmentTerm::None
    }

    /// Field-level validation (bounds, required fields)
    fn validate_inputs(&self) -> PricingResult<()>;
}

// ============================================================================
// Shared input types
// ============================================================================

/// Running time of a resource
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UsageTime {
    #[validate(range(min = 0.0, max = 24.0))]
    pub hours_per_day: f64,
    #[validate(range(min = 0.0, max = 7.0))]
    pub days_per_week: f64,
}

impl UsageTime {
    pub fn full_month() -> Self {
        Self {
            hours_per_day: 24.0,
            days_per_week: 7.0,
        }
    }

    /// Billed hours in a month, capped at a full month
    pub fn monthly_hours(&self) -> f64 {
        (self.hours_per_day * self.days_per_week * HOURS_PER_MONTH / HOURS_PER_WEEK)
            .min(HOURS_PER_MONTH)
    }
}

impl Default for UsageTime {
    fn default() -> Self {
        Self::full_month()
    }
}

/// Premium operating system license
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OsLicense {
    /// Free images (Debian, CentOS, CoreOS, Ubuntu, ...)
    #[default]
    Free,
    /// Windows Server, billed per vCPU
    Windows,
    /// Red Hat Enterprise Linux, billed per instance by size class
    Rhel,
    /// SUSE Linux Enterprise Server, billed per instance
    Sles,
}

/// How a license SKU scales
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseBasis {
    PerCore,
    PerInstance,
}

impl OsLicense {
    /// License SKU for a machine with `vcpus`, or nothing for free images
    pub fn license_sku(&self, vcpus: u32) -> Option<(String, LicenseBasis)> {
        match self {
            OsLicense::Free => None,
            OsLicense::Windows => Some((
                "CP-COMPUTEENGINE-OS-WINDOWS".to_string(),
                LicenseBasis::PerCore,
            )),
            OsLicense::Rhel if vcpus <= 4 => Some((
                "CP-COMPUTEENGINE-OS-RHEL-SMALL".to_string(),
                LicenseBasis::PerInstance,
            )),
            OsLicense::Rhel => Some((
                "CP-COMPUTEENGINE-OS-RHEL-LARGE".to_string(),
                LicenseBasis::PerInstance,
            )),
            OsLicense::Sles => Some((
                "CP-COMPUTEENGINE-OS-SLES".to_string(),
                LicenseBasis::PerInstance,
            )),
        }
    }
}

/// Accelerators attached to every instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuSelection {
    pub gpu_type: String,
    pub count: u32,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiskType {
    #[default]
    Standard,
    Balanced,
    Ssd,
}

impl DiskType {
    pub fn capacity_sku(&self, regional: bool) -> String {
        let base = match self {
            DiskType::Standard => "CP-COMPUTEENGINE-STORAGE-PD-CAPACITY",
            DiskType::Balanced => "CP-COMPUTEENGINE-STORAGE-PD-BALANCED",
            DiskType::Ssd => "CP-COMPUTEENGINE-STORAGE-PD-SSD",
        };
        if regional {
            format!("{}-REGIONAL", base)
        } else {
            base.to_string()
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StorageClass {
    #[default]
    Standard,
    Nearline,
    Coldline,
    Archive,
}

impl StorageClass {
    pub fn sku_token(&self) -> &'static str {
        match self {
            StorageClass::Standard => "STANDARD",
            StorageClass::Nearline => "NEARLINE",
            StorageClass::Coldline => "COLDLINE",
            StorageClass::Archive => "ARCHIVE",
        }
    }

    /// Only colder classes charge for reading data back
    pub fn has_retrieval_fee(&self) -> bool {
        !matches!(self, StorageClass::Standard)
    }
}

fn check_region(region: &str) -> PricingResult<()> {
    if region.trim().is_empty() {
        return Err(PricingError::InvalidInput("region is required".to_string()));
    }
    Ok(())
}

/// Byte quantities are expressed in B through PiB
fn byte_unit(quantity: &Quantity) -> Result<(), ValidationError> {
    if (bytes::B..=bytes::PIB).contains(&quantity.unit) {
        Ok(())
    } else {
        Err(ValidationError::new("byte_unit"))
    }
}

/// Counts are expressed in units through billions
fn count_unit(quantity: &Quantity) -> Result<(), ValidationError> {
    if (counts::UNITS..=counts::BILLION).contains(&quantity.unit) {
        Ok(())
    } else {
        Err(ValidationError::new("count_unit"))
    }
}

// ============================================================================
// Compute Engine
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ComputeUsage {
    #[serde(default)]
    pub region: String,
    pub instances: u32,
    #[validate(nested)]
    pub usage: UsageTime,
    pub machine: MachineSelection,
    pub preemptible: bool,
    pub commitment: CommitmentTerm,
    pub os: OsLicense,
    pub gpu: Option<GpuSelection>,
    pub local_ssd_count: u32,
    /// External IP addresses per instance
    pub external_ips: u32,
    /// Priced as an accompanying persistent disk
    #[validate(nested)]
    pub boot_disk: Option<DiskUsage>,
}

impl Default for ComputeUsage {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            instances: 1,
            usage: UsageTime::default(),
            machine: MachineSelection::default(),
            preemptible: false,
            commitment: CommitmentTerm::None,
            os: OsLicense::Free,
            gpu: None,
            local_ssd_count: 0,
            external_ips: 0,
            boot_disk: None,
        }
    }
}

impl ProductUsage for ComputeUsage {
    fn product(&self) -> Product {
        Product::ComputeEngine
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn set_region(&mut self, region: &str) {
        self.region = region.to_string();
    }

    fn commitment(&self) -> CommitmentTerm {
        self.commitment
    }

    fn validate_inputs(&self) -> PricingResult<()> {
        check_region(&self.region)?;
        self.validate()?;
        Ok(())
    }
}

// ============================================================================
// Persistent Disk
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct DiskUsage {
    #[serde(default)]
    pub region: String,
    pub disk_type: DiskType,
    /// Synchronously replicated across two zones
    pub regional: bool,
    #[validate(custom(function = "byte_unit"))]
    pub size: Quantity,
    #[validate(custom(function = "byte_unit"))]
    pub snapshot_size: Quantity,
}

impl Default for DiskUsage {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            disk_type: DiskType::Standard,
            regional: false,
            size: Quantity::zero(bytes::GIB),
            snapshot_size: Quantity::zero(bytes::GIB),
        }
    }
}

impl ProductUsage for DiskUsage {
    fn product(&self) -> Product {
        Product::PersistentDisk
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn set_region(&mut self, region: &str) {
        self.region = region.to_string();
    }

    fn validate_inputs(&self) -> PricingResult<()> {
        check_region(&self.region)?;
        self.validate()?;
        Ok(())
    }
}

// ============================================================================
// Cloud Storage
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageUsage {
    #[serde(default)]
    pub region: String,
    pub storage_class: StorageClass,
    #[validate(custom(function = "byte_unit"))]
    pub size: Quantity,
    #[validate(custom(function = "count_unit"))]
    pub class_a_operations: Quantity,
    #[validate(custom(function = "count_unit"))]
    pub class_b_operations: Quantity,
    #[validate(custom(function = "byte_unit"))]
    pub retrieval: Quantity,
    /// Opt in to the always-free allowance where the location has one
    pub free_tier: bool,
}

impl Default for StorageUsage {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            storage_class: StorageClass::Standard,
            size: Quantity::zero(bytes::GIB),
            class_a_operations: Quantity::zero(counts::UNITS),
            class_b_operations: Quantity::zero(counts::UNITS),
            retrieval: Quantity::zero(bytes::GIB),
            free_tier: false,
        }
    }
}

impl ProductUsage for StorageUsage {
    fn product(&self) -> Product {
        Product::CloudStorage
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn set_region(&mut self, region: &str) {
        self.region = region.to_string();
    }

    fn validate_inputs(&self) -> PricingResult<()> {
        check_region(&self.region)?;
        self.validate()?;
        Ok(())
    }
}

// ============================================================================
// Network Egress
// ============================================================================

/// Internet egress by destination, sourced from `region`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct EgressUsage {
    #[serde(default)]
    pub region: String,
    #[validate(custom(function = "byte_unit"))]
    pub worldwide: Quantity,
    #[validate(custom(function = "byte_unit"))]
    pub china: Quantity,
    #[validate(custom(function = "byte_unit"))]
    pub australia: Quantity,
}

impl Default for EgressUsage {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            worldwide: Quantity::zero(bytes::GIB),
            china: Quantity::zero(bytes::GIB),
            australia: Quantity::zero(bytes::GIB),
        }
    }
}

impl ProductUsage for EgressUsage {
    fn product(&self) -> Product {
        Product::NetworkEgress
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn set_region(&mut self, region: &str) {
        self.region = region.to_string();
    }

    fn validate_inputs(&self) -> PricingResult<()> {
        check_region(&self.region)?;
        self.validate()?;
        Ok(())
    }
}

// ============================================================================
// Cloud Functions
// ============================================================================

/// Memory tiers and the CPU clock that comes with them
const FUNCTION_TIERS: [(u32, f64); 7] = [
    (128, 0.2),
    (256, 0.4),
    (512, 0.8),
    (1024, 1.4),
    (2048, 2.4),
    (4096, 4.8),
    (8192, 4.8),
];

/// CPU clock (GHz) provisioned with `memory_mb`
pub fn function_cpu_ghz(memory_mb: u32) -> Option<f64> {
    FUNCTION_TIERS
        .iter()
        .find(|(mb, _)| *mb == memory_mb)
        .map(|(_, ghz)| *ghz)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct FunctionsUsage {
    #[serde(default)]
    pub region: String,
    #[validate(custom(function = "count_unit"))]
    pub invocations: Quantity,
    /// Average execution time per invocation
    #[validate(range(min = 0.0))]
    pub execution_time_ms: f64,
    pub memory_mb: u32,
    #[validate(custom(function = "byte_unit"))]
    pub egress: Quantity,
    pub free_tier: bool,
}

impl Default for FunctionsUsage {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            invocations: Quantity::zero(counts::MILLION),
            execution_time_ms: 0.0,
            memory_mb: 256,
            egress: Quantity::zero(bytes::GIB),
            free_tier: false,
        }
    }
}

impl ProductUsage for FunctionsUsage {
    fn product(&self) -> Product {
        Product::CloudFunctions
    }

    fn region(&self) -> &str {
        &self.region
    }

    fn set_region(&mut self, region: &str) {
        self.region = region.to_string();
    }

    fn validate_inputs(&self) -> PricingResult<()> {
        check_region(&self.region)?;
        self.validate()?;
        if function_cpu_ghz(self.memory_mb).is_none() {
            return Err(PricingError::InvalidInput(format!(
                "{} MB is not an offered function memory size",
                self.memory_mb
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tagged spec
// ============================================================================

/// Usage of any product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "product", rename_all = "snake_case")]
pub enum UsageSpec {
    ComputeEngine(ComputeUsage),
    PersistentDisk(DiskUsage),
    CloudStorage(StorageUsage),
    NetworkEgress(EgressUsage),
    CloudFunctions(FunctionsUsage),
}

impl UsageSpec {
    /// Reset state of a product form
    pub fn default_for(product: Product) -> Self {
        match product {
            Product::ComputeEngine => UsageSpec::ComputeEngine(ComputeUsage::default()),
            Product::PersistentDisk => UsageSpec::PersistentDisk(DiskUsage::default()),
            Product::CloudStorage => UsageSpec::CloudStorage(StorageUsage::default()),
            Product::NetworkEgress => UsageSpec::NetworkEgress(EgressUsage::default()),
            Product::CloudFunctions => UsageSpec::CloudFunctions(FunctionsUsage::default()),
        }
    }

    fn as_usage(&self) -> &dyn ProductUsage {
        match self {
            UsageSpec::ComputeEngine(spec) => spec,
            UsageSpec::PersistentDisk(spec) => spec,
            UsageSpec::CloudStorage(spec) => spec,
            UsageSpec::NetworkEgress(spec) => spec,
            UsageSpec::CloudFunctions(spec) => spec,
        }
    }

    fn as_usage_mut(&mut self) -> &mut dyn ProductUsage {
        match self {
            UsageSpec::ComputeEngine(spec) => spec,
            UsageSpec::PersistentDisk(spec) => spec,
            UsageSpec::CloudStorage(spec) => spec,
            UsageSpec::NetworkEgress(spec) => spec,
            UsageSpec::CloudFunctions(spec) => spec,
        }
    }
}

impl ProductUsage for UsageSpec {
    fn product(&self) -> Product {
        self.as_usage().product()
    }

    fn region(&self) -> &str {
        self.as_usage().region()
    }

    fn set_region(&mut self, region: &str) {
        self.as_usage_mut().set_region(region);
    }

    fn commitment(&self) -> CommitmentTerm {
        self.as_usage().commitment()
    }

    fn validate_inputs(&self) -> PricingResult<()> {
        self.as_usage().validate_inputs()
    }
}

impl From<ComputeUsage> for UsageSpec {
    fn from(spec: ComputeUsage) -> Self {
        UsageSpec::ComputeEngine(spec)
    }
}

impl From<DiskUsage> for UsageSpec {
    fn from(spec: DiskUsage) -> Self {
        UsageSpec::PersistentDisk(spec)
    }
}

impl From<StorageUsage> for UsageSpec {
    fn from(spec: StorageUsage) -> Self {
        UsageSpec::CloudStorage(spec)
    }
}

impl From<EgressUsage> for UsageSpec {
    fn from(spec: EgressUsage) -> Self {
        UsageSpec::NetworkEgress(spec)
    }
}

impl From<FunctionsUsage> for UsageSpec {
    fn from(spec: FunctionsUsage) -> Self {
        UsageSpec::CloudFunctions(spec)
    }
}
