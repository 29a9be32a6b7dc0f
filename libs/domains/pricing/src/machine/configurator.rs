//! Shape selection state machine
//!
//! Slider-driven inputs (`set_custom_ram`) are clipped into range; typed
//! inputs (`set_cores`, `set_custom_ram_exact`) are validated and rejected.

use tracing::debug;

use super::{
    GpuTable, GpuType, MachineFamilyTable, MachineSelection, MachineShape, ResolvedMachine,
    SeriesConfig, RAM_EPSILON,
};
use crate::error::{PricingError, PricingResult};
use crate::resolver::PriceResolver;

/// Floor to one decimal place
fn floor_tenth(gb: f64) -> f64 {
    (gb * 10.0).floor() / 10.0
}

#[derive(Debug, Clone)]
pub struct MachineConfigurator<'a> {
    table: &'a MachineFamilyTable,
    selection: MachineSelection,
}

impl<'a> MachineConfigurator<'a> {
    /// Start at the minimal shape of the first family
    pub fn new(table: &'a MachineFamilyTable) -> PricingResult<Self> {
        let family = table
            .families()
            .first()
            .ok_or_else(|| PricingError::Catalog("Machine table is empty".to_string()))?;
        let mut configurator = Self {
            table,
            selection: MachineSelection::default(),
        };
        configurator.select_family(&family.name)?;
        Ok(configurator)
    }

    /// Resume from a stored selection; it must resolve
    pub fn from_selection(
        table: &'a MachineFamilyTable,
        selection: MachineSelection,
    ) -> PricingResult<Self> {
        table.resolve(&selection)?;
        Ok(Self { table, selection })
    }

    pub fn selection(&self) -> &MachineSelection {
        &self.selection
    }

    pub fn into_selection(self) -> MachineSelection {
        self.selection
    }

    pub fn series_config(&self) -> PricingResult<&'a SeriesConfig> {
        self.table.series(&self.selection.series)
    }

    pub fn resolve(&self) -> PricingResult<ResolvedMachine> {
        self.table.resolve(&self.selection)
    }

    /// First series of the family at its minimal shape
    pub fn select_family(&mut self, family: &str) -> PricingResult<()> {
        let config = self.table.family(family)?;
        let series = config.series.first().ok_or_else(|| {
            PricingError::Catalog(format!("Family {} has no series", family))
        })?;

        self.selection = MachineSelection {
            family: config.name.clone(),
            series: series.name.clone(),
            shape: series.minimal_shape()?,
            extended_memory: false,
        };
        debug!(family = family, series = %series.name, "Machine family selected");
        Ok(())
    }

    /// Custom shapes are clamped into the new series' bounds; predefined
    /// shapes restart at the series' minimal SKU
    pub fn select_series(&mut self, series: &str) -> PricingResult<()> {
        let family = self.table.family(&self.selection.family)?;
        let config = family
            .series
            .iter()
            .find(|s| s.name == series)
            .ok_or_else(|| {
                PricingError::InvalidShape(format!(
                    "Series {} does not belong to family {}",
                    series, family.name
                ))
            })?;

        let extended = self.selection.extended_memory && config.is_extended_memory_available;
        let shape = match &self.selection.shape {
            MachineShape::Custom { cores, ram_gb } if config.is_custom_core_available => {
                let cores = config.clamp_custom_cores(*cores);
                let (min, max) = config.custom_ram_range(cores, extended);
                MachineShape::Custom {
                    cores,
                    ram_gb: ram_gb.clamp(min, max),
                }
            }
            _ => config.minimal_shape()?,
        };

        self.selection.series = config.name.clone();
        self.selection.extended_memory = extended && shape.is_custom();
        self.selection.shape = shape;
        Ok(())
    }

    /// Keeps the current core count when the new type offers it
    pub fn select_type(&mut self, machine_type: &str) -> PricingResult<()> {
        let series = self.series_config()?;
        let ty = series.machine_type(machine_type)?;
        let current = self.selection.shape.cores();
        let cores = if ty.supports(current) {
            current
        } else {
            ty.min_cores().ok_or_else(|| {
                PricingError::Catalog(format!(
                    "Machine type {}-{} declares no core counts",
                    series.name, ty.name
                ))
            })?
        };

        self.selection.shape = MachineShape::Predefined {
            machine_type: ty.name.clone(),
            cores,
        };
        self.selection.extended_memory = false;
        Ok(())
    }

    /// Carry the current vCPU and RAM amounts over into a custom shape
    pub fn switch_to_custom(&mut self) -> PricingResult<()> {
        let series = self.series_config()?;
        if !series.is_custom_core_available {
            return Err(PricingError::InvalidShape(format!(
                "Series {} does not offer custom machine types",
                series.name
            )));
        }
        if self.selection.shape.is_custom() {
            return Ok(());
        }

        let current = self.resolve()?;
        let cores = series.clamp_custom_cores(current.vcpus);
        let (min, max) = series.custom_ram_range(cores, false);
        self.selection.shape = MachineShape::Custom {
            cores,
            ram_gb: current.ram_gb.clamp(min, max),
        };
        self.selection.extended_memory = false;
        Ok(())
    }

    pub fn switch_to_predefined(&mut self) -> PricingResult<()> {
        let series = self.series_config()?;
        self.selection.shape = series.minimal_shape()?;
        self.selection.extended_memory = false;
        Ok(())
    }

    /// Custom: bounds and step are checked, RAM is clipped into the new
    /// range. Predefined: the count must be one the type offers.
    pub fn set_cores(&mut self, cores: u32) -> PricingResult<()> {
        let series = self.series_config()?;
        let extended = self.selection.extended_memory;

        match &self.selection.shape {
            MachineShape::Custom { ram_gb, .. } => {
                series.check_custom_cores(cores)?;
                let (min, max) = series.custom_ram_range(cores, extended);
                self.selection.shape = MachineShape::Custom {
                    cores,
                    ram_gb: ram_gb.clamp(min, max),
                };
            }
            MachineShape::Predefined { machine_type, .. } => {
                let ty = series.machine_type(machine_type)?;
                if !ty.supports(cores) {
                    return Err(PricingError::InvalidShape(format!(
                        "{}-{} is not offered with {} vCPUs",
                        series.name, ty.name, cores
                    )));
                }
                self.selection.shape = MachineShape::Predefined {
                    machine_type: ty.name.clone(),
                    cores,
                };
            }
        }
        Ok(())
    }

    /// Slider input: clipped to range and floored to 0.1 GiB
    pub fn set_custom_ram(&mut self, gb: f64) -> PricingResult<()> {
        let (min, max) = self.custom_ram_range()?;
        let clipped = if gb.is_nan() { min } else { gb.clamp(min, max) };
        let floored = floor_tenth(clipped);
        self.set_ram(if floored < min { min } else { floored })
    }

    /// Typed input: rejected when outside the allowed range
    pub fn set_custom_ram_exact(&mut self, gb: f64) -> PricingResult<()> {
        let (min, max) = self.custom_ram_range()?;
        if !gb.is_finite() || gb < min - RAM_EPSILON || gb > max + RAM_EPSILON {
            return Err(PricingError::InvalidShape(format!(
                "{} GiB is outside the allowed {}-{} GiB",
                gb, min, max
            )));
        }
        self.set_ram(gb)
    }

    /// Turning extended memory off clips RAM back under the regular ceiling
    pub fn set_extended_memory(&mut self, enabled: bool) -> PricingResult<()> {
        let series = self.series_config()?;
        if enabled && !series.is_extended_memory_available {
            return Err(PricingError::InvalidShape(format!(
                "Series {} does not offer extended memory",
                series.name
            )));
        }

        match &self.selection.shape {
            MachineShape::Custom { cores, ram_gb } => {
                let (min, max) = series.custom_ram_range(*cores, enabled);
                self.selection.shape = MachineShape::Custom {
                    cores: *cores,
                    ram_gb: ram_gb.clamp(min, max),
                };
                self.selection.extended_memory = enabled;
                Ok(())
            }
            MachineShape::Predefined { .. } if enabled => Err(PricingError::InvalidShape(
                "Extended memory applies to custom machine types only".to_string(),
            )),
            MachineShape::Predefined { .. } => {
                self.selection.extended_memory = false;
                Ok(())
            }
        }
    }

    /// Allowed RAM for the current custom core count
    pub fn custom_ram_range(&self) -> PricingResult<(f64, f64)> {
        let series = self.series_config()?;
        match &self.selection.shape {
            MachineShape::Custom { cores, .. } => {
                Ok(series.custom_ram_range(*cores, self.selection.extended_memory))
            }
            MachineShape::Predefined { .. } => Err(PricingError::InvalidShape(
                "RAM is only adjustable on custom machine types".to_string(),
            )),
        }
    }

    pub fn local_ssd_options(&self) -> PricingResult<Vec<u32>> {
        let series = self.series_config()?;
        Ok(series.local_ssd_options(self.selection.shape.cores()))
    }

    /// GPU types attachable in `region`; none for shared-core shapes or
    /// series without GPU support
    pub fn gpu_options<'g>(
        &self,
        resolver: &PriceResolver,
        region: &str,
        gpus: &'g GpuTable,
    ) -> PricingResult<Vec<&'g GpuType>> {
        let series = self.series_config()?;
        let machine = self.resolve()?;
        if !series.is_gpu_available || machine.shared_core {
            return Ok(Vec::new());
        }
        Ok(gpus.available_in(resolver, region))
    }

    fn set_ram(&mut self, gb: f64) -> PricingResult<()> {
        match &mut self.selection.shape {
            MachineShape::Custom { ram_gb, .. } => {
                *ram_gb = gb;
                Ok(())
            }
            MachineShape::Predefined { .. } => Err(PricingError::InvalidShape(
                "RAM is only adjustable on custom machine types".to_string(),
            )),
        }
    }
}
