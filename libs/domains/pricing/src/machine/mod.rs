//! Machine configuration
//!
//! Static per-series descriptors (`data/machine_families.json`), the
//! serializable shape selection held by a compute usage spec, and resolution
//! of a selection into the SKU used for pricing.
//!
//! ```text
//! family (gp, compute, memory, accelerator)
//!   └── series (n1, e2, n2, ...)
//!         ├── predefined types  -> CP-COMPUTEENGINE-VMIMAGE-N1-STANDARD-2
//!         └── custom core + RAM -> CP-COMPUTEENGINE-VMIMAGE-N1-CUSTOM-4-16384[-EXTENDED]
//! ```

mod configurator;
mod gpu;

pub use configurator::MachineConfigurator;
pub use gpu::{GpuTable, GpuType};

use serde::{Deserialize, Serialize};

use crate::error::{PricingError, PricingResult};

const BUILTIN_FAMILIES: &str = include_str!("../../data/machine_families.json");

/// SKU namespace of whole-machine prices
pub const MACHINE_SKU_PREFIX: &str = "CP-COMPUTEENGINE-VMIMAGE";

/// Capacity of one local SSD partition
pub const LOCAL_SSD_GIB_PER_DISK: f64 = 375.0;

/// Offered when a series has no vCPU-banded local SSD table
pub const GENERIC_LOCAL_SSD_COUNTS: [u32; 11] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 16, 24];

/// Tolerance for RAM bound comparisons (GiB)
const RAM_EPSILON: f64 = 1e-9;

fn default_core_ratio() -> u32 {
    1
}

fn default_core_step() -> u32 {
    1
}

/// A predefined machine type within a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineTypeConfig {
    pub name: String,
    /// GiB of RAM per vCPU
    pub ram_ratio: f64,
    /// vCPUs per accelerator for GPU-ratio naming
    #[serde(default = "default_core_ratio")]
    pub core_ratio: u32,
    /// Ascending; no interpolation between entries
    pub supported_cores: Vec<u32>,
    #[serde(default)]
    pub shared_core: bool,
    #[serde(default)]
    pub alternate_ram_ratio: Option<f64>,
    #[serde(default)]
    pub alternate_ram_ratio_cores: Vec<u32>,
}

impl MachineTypeConfig {
    pub fn supports(&self, cores: u32) -> bool {
        self.supported_cores.contains(&cores)
    }

    pub fn min_cores(&self) -> Option<u32> {
        self.supported_cores.iter().copied().min()
    }

    pub fn ram_gb(&self, cores: u32) -> f64 {
        let ratio = match self.alternate_ram_ratio {
            Some(alternate) if self.alternate_ram_ratio_cores.contains(&cores) => alternate,
            _ => self.ram_ratio,
        };
        cores as f64 * ratio
    }

    /// `n1-standard-2`, `e2-micro`, `a2-highgpu-1g`
    pub fn machine_name(&self, series: &SeriesConfig, cores: u32) -> String {
        if self.shared_core {
            format!("{}-{}", series.name, self.name)
        } else if series.gpu_ratio_naming {
            format!(
                "{}-{}-{}g",
                series.name,
                self.name,
                cores / self.core_ratio.max(1)
            )
        } else {
            format!("{}-{}-{}", series.name, self.name, cores)
        }
    }
}

/// Local SSD counts offered for an inclusive vCPU range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSsdBand {
    pub vcpu_range: [u32; 2],
    pub allowed_ssd_counts: Vec<u32>,
}

impl LocalSsdBand {
    pub fn contains(&self, vcpus: u32) -> bool {
        self.vcpu_range[0] <= vcpus && vcpus <= self.vcpu_range[1]
    }
}

/// Static descriptor of one compute series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesConfig {
    pub name: String,
    #[serde(default)]
    pub is_custom_core_available: bool,
    #[serde(default)]
    pub is_preemptible_available: bool,
    #[serde(default)]
    pub is_gpu_available: bool,
    #[serde(default)]
    pub is_local_ssd_available: bool,
    #[serde(default)]
    pub is_extended_memory_available: bool,
    #[serde(default)]
    pub min_custom_core: u32,
    #[serde(default)]
    pub max_custom_core: u32,
    /// Valid custom core counts are the minimum or multiples of this step
    #[serde(default = "default_core_step")]
    pub custom_core_step: u32,
    #[serde(default)]
    pub min_custom_ram_ratio: f64,
    #[serde(default)]
    pub max_custom_ram_ratio: f64,
    /// Total GiB ceiling with extended memory enabled
    #[serde(default)]
    pub max_extended_memory: Option<f64>,
    /// GiB-per-vCPU ceiling that applies even with extended memory
    #[serde(default)]
    pub hard_max_custom_ram_ratio: Option<f64>,
    #[serde(default)]
    pub max_sustained_use_discount: f64,
    /// Core token is rendered as accelerator count plus `G`
    #[serde(default)]
    pub gpu_ratio_naming: bool,
    pub supported_types: Vec<MachineTypeConfig>,
    #[serde(default)]
    pub local_ssd: Vec<LocalSsdBand>,
}

impl SeriesConfig {
    pub fn machine_type(&self, name: &str) -> PricingResult<&MachineTypeConfig> {
        self.supported_types
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| {
                PricingError::InvalidShape(format!(
                    "Series {} has no machine type {}",
                    self.name, name
                ))
            })
    }

    /// First declared type at its smallest core count
    pub fn minimal_shape(&self) -> PricingResult<MachineShape> {
        let first = self.supported_types.first().ok_or_else(|| {
            PricingError::Catalog(format!("Series {} declares no machine types", self.name))
        })?;
        let cores = first.min_cores().ok_or_else(|| {
            PricingError::Catalog(format!(
                "Machine type {}-{} declares no core counts",
                self.name, first.name
            ))
        })?;
        Ok(MachineShape::Predefined {
            machine_type: first.name.clone(),
            cores,
        })
    }

    pub fn is_valid_custom_core(&self, cores: u32) -> bool {
        let step = self.custom_core_step.max(1);
        (self.min_custom_core..=self.max_custom_core).contains(&cores)
            && (cores == self.min_custom_core || cores % step == 0)
    }

    pub fn check_custom_cores(&self, cores: u32) -> PricingResult<()> {
        if !self.is_custom_core_available {
            return Err(PricingError::InvalidShape(format!(
                "Series {} does not offer custom machine types",
                self.name
            )));
        }
        if !self.is_valid_custom_core(cores) {
            return Err(PricingError::InvalidShape(format!(
                "{} vCPUs is not a valid custom {} core count (range {}-{}, step {})",
                cores,
                self.name,
                self.min_custom_core,
                self.max_custom_core,
                self.custom_core_step.max(1)
            )));
        }
        Ok(())
    }

    /// Nearest valid custom core count at or below `cores`, within bounds
    pub fn clamp_custom_cores(&self, cores: u32) -> u32 {
        let step = self.custom_core_step.max(1);
        let clamped = cores.clamp(self.min_custom_core, self.max_custom_core.max(self.min_custom_core));
        if self.is_valid_custom_core(clamped) {
            return clamped;
        }
        let stepped = clamped - clamped % step;
        if stepped < self.min_custom_core {
            self.min_custom_core
        } else {
            stepped
        }
    }

    /// Allowed RAM in GiB for a custom shape with `cores` vCPUs
    pub fn custom_ram_range(&self, cores: u32, extended_memory: bool) -> (f64, f64) {
        let cores = cores as f64;
        let min = cores * self.min_custom_ram_ratio;
        let base_max = cores * self.max_custom_ram_ratio;

        let mut max = if extended_memory && self.is_extended_memory_available {
            self.max_extended_memory
                .map_or(base_max, |ceiling| ceiling.max(base_max))
        } else {
            base_max
        };
        if let Some(hard) = self.hard_max_custom_ram_ratio {
            max = max.min(cores * hard);
        }

        (min, max.max(min))
    }

    /// RAM above the regular per-core ceiling, billed as extended memory
    pub fn extended_ram_gb(&self, cores: u32, ram_gb: f64) -> f64 {
        (ram_gb - cores as f64 * self.max_custom_ram_ratio).max(0.0)
    }

    /// Union of matching bands plus `0`; the generic list when unbanded
    pub fn local_ssd_options(&self, vcpus: u32) -> Vec<u32> {
        if !self.is_local_ssd_available {
            return vec![0];
        }
        if self.local_ssd.is_empty() {
            return GENERIC_LOCAL_SSD_COUNTS.to_vec();
        }

        let mut options = vec![0];
        for band in self.local_ssd.iter().filter(|b| b.contains(vcpus)) {
            options.extend(band.allowed_ssd_counts.iter().copied());
        }
        options.sort_unstable();
        options.dedup();
        options
    }

    fn validate(&self) -> PricingResult<()> {
        self.minimal_shape()?;
        if self.is_custom_core_available {
            if self.min_custom_core == 0 || self.min_custom_core > self.max_custom_core {
                return Err(PricingError::Catalog(format!(
                    "Series {} has invalid custom core bounds",
                    self.name
                )));
            }
            if self.min_custom_ram_ratio > self.max_custom_ram_ratio {
                return Err(PricingError::Catalog(format!(
                    "Series {} has invalid custom RAM ratios",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyConfig {
    pub name: String,
    pub series: Vec<SeriesConfig>,
}

/// Predefined type or custom core + RAM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MachineShape {
    Predefined { machine_type: String, cores: u32 },
    Custom { cores: u32, ram_gb: f64 },
}

impl MachineShape {
    pub fn is_custom(&self) -> bool {
        matches!(self, MachineShape::Custom { .. })
    }

    pub fn cores(&self) -> u32 {
        match self {
            MachineShape::Predefined { cores, .. } | MachineShape::Custom { cores, .. } => *cores,
        }
    }
}

/// Serializable machine choice carried by the compute usage spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSelection {
    pub family: String,
    pub series: String,
    pub shape: MachineShape,
    #[serde(default)]
    pub extended_memory: bool,
}

impl MachineSelection {
    pub fn predefined(family: &str, series: &str, machine_type: &str, cores: u32) -> Self {
        Self {
            family: family.to_string(),
            series: series.to_string(),
            shape: MachineShape::Predefined {
                machine_type: machine_type.to_string(),
                cores,
            },
            extended_memory: false,
        }
    }

    pub fn custom(family: &str, series: &str, cores: u32, ram_gb: f64) -> Self {
        Self {
            family: family.to_string(),
            series: series.to_string(),
            shape: MachineShape::Custom { cores, ram_gb },
            extended_memory: false,
        }
    }

    pub fn with_extended_memory(mut self, enabled: bool) -> Self {
        self.extended_memory = enabled;
        self
    }
}

impl Default for MachineSelection {
    fn default() -> Self {
        Self::predefined("gp", "n1", "standard", 1)
    }
}

/// A validated selection with its synthesized SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMachine {
    /// Human-readable machine name (`n2-highmem-8`, `n1-custom-4-16384`)
    pub name: String,
    pub sku: String,
    pub family: String,
    pub series: String,
    pub machine_type: Option<String>,
    pub vcpus: u32,
    pub ram_gb: f64,
    pub shared_core: bool,
    pub custom: bool,
    pub extended_ram_gb: f64,
}

/// All known families
#[derive(Debug, Clone)]
pub struct MachineFamilyTable {
    families: Vec<FamilyConfig>,
}

impl MachineFamilyTable {
    pub fn new(families: Vec<FamilyConfig>) -> PricingResult<Self> {
        if families.iter().any(|f| f.series.is_empty()) {
            return Err(PricingError::Catalog(
                "Every machine family needs at least one series".to_string(),
            ));
        }
        for series in families.iter().flat_map(|f| f.series.iter()) {
            series.validate()?;
        }
        Ok(Self { families })
    }

    /// The family table shipped with the crate
    pub fn builtin() -> PricingResult<Self> {
        let families: Vec<FamilyConfig> = serde_json::from_str(BUILTIN_FAMILIES)
            .map_err(|e| PricingError::Catalog(format!("Malformed machine table: {}", e)))?;
        Self::new(families)
    }

    pub fn families(&self) -> &[FamilyConfig] {
        &self.families
    }

    pub fn family(&self, name: &str) -> PricingResult<&FamilyConfig> {
        self.families
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| PricingError::InvalidShape(format!("Unknown machine family {}", name)))
    }

    /// Series by name, across families
    pub fn series(&self, name: &str) -> PricingResult<&SeriesConfig> {
        self.all_series()
            .find(|s| s.name == name)
            .ok_or_else(|| PricingError::InvalidShape(format!("Unknown machine series {}", name)))
    }

    pub fn family_of(&self, series: &str) -> Option<&FamilyConfig> {
        self.families
            .iter()
            .find(|f| f.series.iter().any(|s| s.name == series))
    }

    pub fn all_series(&self) -> impl Iterator<Item = &SeriesConfig> {
        self.families.iter().flat_map(|f| f.series.iter())
    }

    fn series_in_family(&self, family: &str, series: &str) -> PricingResult<&SeriesConfig> {
        self.family(family)?
            .series
            .iter()
            .find(|s| s.name == series)
            .ok_or_else(|| {
                PricingError::InvalidShape(format!(
                    "Series {} does not belong to family {}",
                    series, family
                ))
            })
    }

    /// Parse a machine name (`n1-standard-2`, `e2-micro`, `a2-highgpu-1g`,
    /// `n2-custom-4-16384[-ext]`, bare `custom-2-7680` for n1) into a selection
    pub fn parse_machine_name(&self, name: &str) -> PricingResult<MachineSelection> {
        let invalid = || PricingError::InvalidShape(format!("Unrecognized machine name {}", name));
        let lowered = name.trim().to_lowercase();
        let qualified = match lowered.strip_prefix("custom-") {
            Some(rest) => format!("n1-custom-{}", rest),
            None => lowered,
        };
        let parts: Vec<&str> = qualified.split('-').collect();
        if parts.len() < 2 {
            return Err(invalid());
        }

        let series = self.series(parts[0])?;
        let family = self.family_of(&series.name).ok_or_else(invalid)?;

        if parts[1] == "custom" {
            let (cores, ram_mb) = match (parts.get(2), parts.get(3)) {
                (Some(cores), Some(ram_mb)) => (
                    cores.parse::<u32>().map_err(|_| invalid())?,
                    ram_mb.parse::<f64>().map_err(|_| invalid())?,
                ),
                _ => return Err(invalid()),
            };
            let extended = parts.get(4) == Some(&"ext");
            return Ok(
                MachineSelection::custom(&family.name, &series.name, cores, ram_mb / 1024.0)
                    .with_extended_memory(extended),
            );
        }

        let ty = series.machine_type(parts[1])?;
        let cores = match parts.get(2) {
            None if ty.shared_core => ty.min_cores().ok_or_else(invalid)?,
            None => return Err(invalid()),
            Some(token) if series.gpu_ratio_naming => {
                let gpus = token
                    .strip_suffix('g')
                    .and_then(|n| n.parse::<u32>().ok())
                    .ok_or_else(invalid)?;
                gpus * ty.core_ratio.max(1)
            }
            Some(token) => token.parse::<u32>().map_err(|_| invalid())?,
        };

        Ok(MachineSelection::predefined(
            &family.name,
            &series.name,
            &ty.name,
            cores,
        ))
    }

    /// Validate a selection against its series and synthesize the SKU
    pub fn resolve(&self, selection: &MachineSelection) -> PricingResult<ResolvedMachine> {
        let series = self.series_in_family(&selection.family, &selection.series)?;

        match &selection.shape {
            MachineShape::Predefined {
                machine_type,
                cores,
            } => {
                let ty = series.machine_type(machine_type)?;
                if !ty.supports(*cores) {
                    return Err(PricingError::InvalidShape(format!(
                        "{}-{} is not offered with {} vCPUs",
                        series.name, ty.name, cores
                    )));
                }
                let name = ty.machine_name(series, *cores);
                Ok(ResolvedMachine {
                    sku: format!("{}-{}", MACHINE_SKU_PREFIX, name.to_uppercase()),
                    name,
                    family: selection.family.clone(),
                    series: series.name.clone(),
                    machine_type: Some(ty.name.clone()),
                    vcpus: *cores,
                    ram_gb: ty.ram_gb(*cores),
                    shared_core: ty.shared_core,
                    custom: false,
                    extended_ram_gb: 0.0,
                })
            }
            MachineShape::Custom { cores, ram_gb } => {
                series.check_custom_cores(*cores)?;
                if selection.extended_memory && !series.is_extended_memory_available {
                    return Err(PricingError::InvalidShape(format!(
                        "Series {} does not offer extended memory",
                        series.name
                    )));
                }

                let (min, max) = series.custom_ram_range(*cores, selection.extended_memory);
                if !ram_gb.is_finite() || *ram_gb < min - RAM_EPSILON || *ram_gb > max + RAM_EPSILON {
                    return Err(PricingError::InvalidShape(format!(
                        "{} GiB is outside the {}-{} GiB range for {} custom vCPUs on {}",
                        ram_gb, min, max, cores, series.name
                    )));
                }

                let extended_ram_gb = if selection.extended_memory {
                    series.extended_ram_gb(*cores, *ram_gb)
                } else {
                    0.0
                };
                let ram_mb = (ram_gb * 1024.0).round() as u64;
                let mut name = format!("{}-custom-{}-{}", series.name, cores, ram_mb);
                if extended_ram_gb > RAM_EPSILON {
                    name.push_str("-ext");
                }
                let mut sku = format!(
                    "{}-{}-CUSTOM-{}-{}",
                    MACHINE_SKU_PREFIX,
                    series.name.to_uppercase(),
                    cores,
                    ram_mb
                );
                if extended_ram_gb > RAM_EPSILON {
                    sku.push_str("-EXTENDED");
                }

                Ok(ResolvedMachine {
                    name,
                    sku,
                    family: selection.family.clone(),
                    series: series.name.clone(),
                    machine_type: None,
                    vcpus: *cores,
                    ram_gb: *ram_gb,
                    shared_core: false,
                    custom: true,
                    extended_ram_gb,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MachineFamilyTable {
        MachineFamilyTable::builtin().unwrap()
    }

    #[test]
    fn test_builtin_table_loads() {
        let table = table();
        let names: Vec<&str> = table.families().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["gp", "compute", "memory", "accelerator"]);
        assert!(table.series("n2d").is_ok());
        assert!(table.series("z9").is_err());
        assert_eq!(table.family_of("c2").unwrap().name, "compute");
    }

    #[test]
    fn test_predefined_sku() {
        let machine = table()
            .resolve(&MachineSelection::predefined("gp", "n1", "standard", 2))
            .unwrap();
        assert_eq!(machine.sku, "CP-COMPUTEENGINE-VMIMAGE-N1-STANDARD-2");
        assert_eq!(machine.name, "n1-standard-2");
        assert_eq!(machine.ram_gb, 7.5);
        assert!(!machine.custom);
    }

    #[test]
    fn test_shared_core_sku_omits_cores() {
        let machine = table()
            .resolve(&MachineSelection::predefined("gp", "e2", "micro", 2))
            .unwrap();
        assert_eq!(machine.sku, "CP-COMPUTEENGINE-VMIMAGE-E2-MICRO");
        assert!(machine.shared_core);
    }

    #[test]
    fn test_gpu_ratio_naming() {
        let machine = table()
            .resolve(&MachineSelection::predefined("accelerator", "a2", "highgpu", 24))
            .unwrap();
        assert_eq!(machine.sku, "CP-COMPUTEENGINE-VMIMAGE-A2-HIGHGPU-2G");
        assert_eq!(machine.name, "a2-highgpu-2g");
    }

    #[test]
    fn test_alternate_ram_ratio() {
        let table = table();
        let regular = table
            .resolve(&MachineSelection::predefined("gp", "n2", "highmem", 80))
            .unwrap();
        assert_eq!(regular.ram_gb, 640.0);
        let alternate = table
            .resolve(&MachineSelection::predefined("gp", "n2", "highmem", 128))
            .unwrap();
        assert_eq!(alternate.ram_gb, 864.0);
    }

    #[test]
    fn test_unsupported_core_count_rejected() {
        let result = table().resolve(&MachineSelection::predefined("gp", "n1", "standard", 3));
        assert!(matches!(result, Err(PricingError::InvalidShape(_))));
    }

    #[test]
    fn test_series_must_belong_to_family() {
        let result = table().resolve(&MachineSelection::predefined("compute", "n1", "standard", 2));
        assert!(matches!(result, Err(PricingError::InvalidShape(_))));
    }

    #[test]
    fn test_custom_sku() {
        let machine = table()
            .resolve(&MachineSelection::custom("gp", "n1", 4, 16.0))
            .unwrap();
        assert_eq!(machine.sku, "CP-COMPUTEENGINE-VMIMAGE-N1-CUSTOM-4-16384");
        assert_eq!(machine.extended_ram_gb, 0.0);
    }

    #[test]
    fn test_custom_extended_sku() {
        let machine = table()
            .resolve(&MachineSelection::custom("gp", "n1", 2, 20.0).with_extended_memory(true))
            .unwrap();
        assert_eq!(machine.sku, "CP-COMPUTEENGINE-VMIMAGE-N1-CUSTOM-2-20480-EXTENDED");
        assert_eq!(machine.extended_ram_gb, 7.0);
    }

    #[test]
    fn test_extended_flag_without_excess_ram() {
        let machine = table()
            .resolve(&MachineSelection::custom("gp", "n1", 2, 8.0).with_extended_memory(true))
            .unwrap();
        assert!(!machine.sku.ends_with("-EXTENDED"));
    }

    #[test]
    fn test_custom_ram_out_of_range_rejected() {
        let result = table().resolve(&MachineSelection::custom("gp", "n1", 2, 20.0));
        assert!(matches!(result, Err(PricingError::InvalidShape(_))));
    }

    #[test]
    fn test_custom_cores_step() {
        let n1 = table().series("n1").unwrap().clone();
        assert!(n1.is_valid_custom_core(1));
        assert!(n1.is_valid_custom_core(2));
        assert!(!n1.is_valid_custom_core(3));
        assert!(!n1.is_valid_custom_core(98));
        assert_eq!(n1.clamp_custom_cores(3), 2);
        assert_eq!(n1.clamp_custom_cores(200), 96);
    }

    #[test]
    fn test_custom_unavailable_series() {
        let result = table().resolve(&MachineSelection::custom("compute", "c2", 4, 16.0));
        assert!(matches!(result, Err(PricingError::InvalidShape(_))));
    }

    #[test]
    fn test_ram_range_hard_ceiling() {
        let n2 = table().series("n2").unwrap().clone();
        assert_eq!(n2.custom_ram_range(8, false), (4.0, 64.0));
        // 864 GiB extended ceiling, capped at 24 GiB per vCPU
        assert_eq!(n2.custom_ram_range(8, true), (4.0, 192.0));
        assert_eq!(n2.custom_ram_range(80, true), (40.0, 864.0));
    }

    #[test]
    fn test_local_ssd_bands() {
        let n2 = table().series("n2").unwrap().clone();
        assert_eq!(n2.local_ssd_options(8), vec![0, 1, 2, 4, 8, 16, 24]);
        assert_eq!(n2.local_ssd_options(11), vec![0]);
        assert_eq!(n2.local_ssd_options(16), vec![0, 2, 4, 8, 16, 24]);
    }

    #[test]
    fn test_local_ssd_generic_and_unavailable() {
        let table = table();
        assert_eq!(
            table.series("n1").unwrap().local_ssd_options(4),
            GENERIC_LOCAL_SSD_COUNTS.to_vec()
        );
        assert_eq!(table.series("e2").unwrap().local_ssd_options(4), vec![0]);
    }

    #[test]
    fn test_minimal_shape() {
        let shape = table().series("c2").unwrap().minimal_shape().unwrap();
        assert_eq!(
            shape,
            MachineShape::Predefined {
                machine_type: "standard".to_string(),
                cores: 4
            }
        );
    }

    #[test]
    fn test_parse_machine_names() {
        let table = table();
        assert_eq!(
            table.parse_machine_name("n1-standard-2").unwrap(),
            MachineSelection::predefined("gp", "n1", "standard", 2)
        );
        assert_eq!(
            table.parse_machine_name("e2-micro").unwrap(),
            MachineSelection::predefined("gp", "e2", "micro", 2)
        );
        assert_eq!(
            table.parse_machine_name("a2-highgpu-4g").unwrap(),
            MachineSelection::predefined("accelerator", "a2", "highgpu", 48)
        );
        assert_eq!(
            table.parse_machine_name("custom-2-7680").unwrap(),
            MachineSelection::custom("gp", "n1", 2, 7.5)
        );
        assert_eq!(
            table.parse_machine_name("n2-custom-4-40960-ext").unwrap(),
            MachineSelection::custom("gp", "n2", 4, 40.0).with_extended_memory(true)
        );
        assert!(table.parse_machine_name("f1-micro").is_err());
        assert!(table.parse_machine_name("n1-standard").is_err());
        assert!(table.parse_machine_name("n1").is_err());
    }

    #[test]
    fn test_parsed_names_resolve_back() {
        let table = table();
        for name in ["n1-highmem-8", "n2d-highcpu-224", "c2-standard-60", "m2-ultramem-416"] {
            let selection = table.parse_machine_name(name).unwrap();
            assert_eq!(table.resolve(&selection).unwrap().name, name);
        }
    }

    #[test]
    fn test_selection_serde() {
        let selection = MachineSelection::custom("gp", "n2", 4, 12.5);
        let json = serde_json::to_value(&selection).unwrap();
        assert_eq!(json["shape"]["kind"], "custom");
        assert_eq!(json["shape"]["ram_gb"], 12.5);
        let back: MachineSelection = serde_json::from_value(json).unwrap();
        assert_eq!(back, selection);
    }
}
