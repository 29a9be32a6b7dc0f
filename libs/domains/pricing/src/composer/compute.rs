use serde_json::json;
use tracing::warn;

use super::{unexpected_spec, Composer, ComponentPricer, Composition, CompositionContext};
use crate::engine::{
    committed_use, cud_eligibility, pricing_variant, resource_price, sustained_use, CommitmentTerm,
    ResourceRates, SudBand,
};
use crate::error::{PricingError, PricingResult};
use crate::machine::{ResolvedMachine, SeriesConfig, LOCAL_SSD_GIB_PER_DISK};
use crate::units::Quantity;
use crate::usage::{ComputeUsage, LicenseBasis, Product, ProductUsage, UsageSpec};

const LOCAL_SSD_SKU: &str = "CP-COMPUTEENGINE-LOCAL-SSD";
const EXTERNAL_IP_SKU: &str = "CP-COMPUTEENGINE-EXTERNAL-IP";

/// OS licenses are priced the same everywhere
const LICENSE_REGION: &str = "global";

/// Virtual machine instances with their attached GPUs, local SSD, licenses and IPs
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeComposer;

/// Monthly machine charge for all instances
struct MachineCharge {
    sku: String,
    hourly_rate: f64,
    cost: f64,
    discount_fraction: f64,
    bands: Vec<SudBand>,
}

/// Hourly rates of a machine, split into the committable part and extended memory
struct MachineRates {
    committable: f64,
    extended: f64,
    resource_skus: Vec<String>,
}

impl ComputeComposer {
    fn machine_rates(
        ctx: &CompositionContext,
        usage: &ComputeUsage,
        machine: &ResolvedMachine,
        commitment: CommitmentTerm,
    ) -> PricingResult<MachineRates> {
        let region = usage.region.as_str();

        if !machine.custom {
            let sku = pricing_variant(&machine.sku, usage.preemptible, commitment);
            let rate = ctx.resolver.resolve_unit_price(&sku, region)?;
            return Ok(MachineRates {
                committable: rate.unit_price,
                extended: 0.0,
                resource_skus: vec![sku],
            });
        }

        let prefix = format!("CP-COMPUTEENGINE-{}-CUSTOM", machine.series.to_uppercase());
        let core_sku = pricing_variant(&format!("{}-CORE", prefix), usage.preemptible, commitment);
        let ram_sku = pricing_variant(&format!("{}-RAM", prefix), usage.preemptible, commitment);
        let mut resource_skus = vec![core_sku.clone(), ram_sku.clone()];

        let mut rates = ResourceRates {
            core: ctx.resolver.resolve_unit_price(&core_sku, region)?.unit_price,
            ram: ctx.resolver.resolve_unit_price(&ram_sku, region)?.unit_price,
            extended_ram: 0.0,
        };
        if machine.extended_ram_gb > 0.0 {
            // Extended memory has no committed rate
            let extended_sku = pricing_variant(
                &format!("{}-RAM-EXTENDED", prefix),
                usage.preemptible,
                CommitmentTerm::None,
            );
            rates.extended_ram = ctx.resolver.resolve_unit_price(&extended_sku, region)?.unit_price;
            resource_skus.push(extended_sku);
        }

        let base_ram_gb = machine.ram_gb - machine.extended_ram_gb;
        Ok(MachineRates {
            committable: resource_price(&rates, machine.vcpus as f64, base_ram_gb, 0.0),
            extended: resource_price(&rates, 0.0, 0.0, machine.extended_ram_gb),
            resource_skus,
        })
    }

    fn machine_charge(
        ctx: &CompositionContext,
        usage: &ComputeUsage,
        machine: &ResolvedMachine,
        series: &SeriesConfig,
        commitment: CommitmentTerm,
        hours: f64,
    ) -> PricingResult<(MachineCharge, Vec<String>)> {
        let rates = Self::machine_rates(ctx, usage, machine, commitment)?;
        let instances = usage.instances as f64;
        let max_discount = series.max_sustained_use_discount;

        let (cost, discount_fraction, bands) = if commitment.is_committed() {
            // Extended memory stays on demand but follows the commitment's full month
            let committed = committed_use(rates.committable, instances, &ctx.sud_policy);
            let extended = rates.extended * ctx.sud_policy.hours_per_month * instances;
            (committed + extended, 0.0, Vec::new())
        } else {
            let sud = sustained_use(
                rates.committable + rates.extended,
                hours,
                &ctx.sud_policy,
                max_discount,
                usage.preemptible,
            );
            (sud.total * instances, sud.discount_fraction, sud.bands)
        };

        let charge = MachineCharge {
            sku: pricing_variant(&machine.sku, usage.preemptible, commitment),
            hourly_rate: rates.committable + rates.extended,
            cost,
            discount_fraction,
            bands,
        };
        Ok((charge, rates.resource_skus))
    }

    /// Hourly-rated add-on billed for `quantity` units over the month
    #[allow(clippy::too_many_arguments)]
    fn add_hourly(
        pricer: &mut ComponentPricer<'_>,
        ctx: &CompositionContext,
        key: &str,
        sku: &str,
        region: &str,
        quantity: f64,
        label: &str,
        hours: f64,
    ) -> PricingResult<()> {
        if quantity <= 0.0 {
            return Ok(());
        }
        let result = ctx.resolver.resolve_unit_price(sku, region);
        if let Some(rate) = pricer.optional(key, result)? {
            let cost = rate.unit_price * quantity * hours;
            pricer.add_computed(key, sku, quantity, label, rate.unit_price, cost);
        }
        Ok(())
    }
}

impl Composer for ComputeComposer {
    fn product(&self) -> Product {
        Product::ComputeEngine
    }

    fn compose(&self, ctx: &CompositionContext, spec: &UsageSpec) -> PricingResult<Composition> {
        let UsageSpec::ComputeEngine(usage) = spec else {
            return Err(unexpected_spec(Product::ComputeEngine, spec));
        };
        usage.validate_inputs()?;
        ctx.regions().get(&usage.region)?;

        let machine = ctx.machines.resolve(&usage.machine)?;
        let series = ctx.machines.series(&machine.series)?;
        if usage.preemptible && !series.is_preemptible_available {
            return Err(PricingError::InvalidShape(format!(
                "Series {} does not offer preemptible instances",
                series.name
            )));
        }

        let mut commitment = usage.commitment;
        let mut cud_ineligible = false;
        if commitment.is_committed() {
            if let Err(e) = cud_eligibility(machine.shared_core, usage.preemptible) {
                warn!(machine = %machine.name, error = %e, "Commitment dropped");
                commitment = CommitmentTerm::None;
                cud_ineligible = true;
            }
        }

        let hours = usage.usage.monthly_hours();
        if usage.instances == 0 || (hours <= 0.0 && !commitment.is_committed()) {
            return Err(PricingError::EmptyInput(Product::ComputeEngine.to_string()));
        }
        let instances = usage.instances as f64;
        let region = usage.region.as_str();

        let mut pricer = ComponentPricer::new(&ctx.resolver, region);
        pricer.flags_mut().cud_ineligible = cud_ineligible;

        let (charge, resource_skus) =
            Self::machine_charge(ctx, usage, &machine, series, commitment, hours)?;
        pricer.add_computed(
            "machine",
            &charge.sku,
            instances,
            "instances",
            charge.hourly_rate,
            charge.cost,
        );

        if let Some(gpu) = usage.gpu.as_ref().filter(|g| g.count > 0) {
            if !series.is_gpu_available || machine.shared_core {
                return Err(PricingError::InvalidShape(format!(
                    "{} cannot attach GPUs",
                    machine.name
                )));
            }
            let gpu_type = ctx.gpus.get(&gpu.gpu_type)?;
            if !gpu_type.supported_counts.contains(&gpu.count) {
                return Err(PricingError::InvalidShape(format!(
                    "{} cannot be attached {} at a time",
                    gpu_type.display_name, gpu.count
                )));
            }

            let sku = gpu_type.sku_for(usage.preemptible, commitment);
            let count = gpu.count as f64 * instances;
            let result = ctx.resolver.resolve_unit_price(&sku, region);
            if let Some(rate) = pricer.optional("gpu", result)? {
                let cost = if commitment.is_committed() {
                    committed_use(rate.unit_price, count, &ctx.sud_policy)
                } else {
                    sustained_use(
                        rate.unit_price,
                        hours,
                        &ctx.sud_policy,
                        series.max_sustained_use_discount,
                        usage.preemptible,
                    )
                    .total
                        * count
                };
                pricer.add_computed("gpu", &sku, count, "GPUs", rate.unit_price, cost);
            }
        }

        if usage.local_ssd_count > 0 {
            let options = series.local_ssd_options(machine.vcpus);
            if !options.contains(&usage.local_ssd_count) {
                return Err(PricingError::InvalidShape(format!(
                    "{} local SSDs cannot be attached to {} (offered: {:?})",
                    usage.local_ssd_count, machine.name, options
                )));
            }
            let sku = pricing_variant(LOCAL_SSD_SKU, usage.preemptible, CommitmentTerm::None);
            let gib = usage.local_ssd_count as f64 * LOCAL_SSD_GIB_PER_DISK * instances;
            let result = ctx.resolver.resolve_unit_price(&sku, region);
            if let Some(rate) = pricer.optional("localSsd", result)? {
                let cost = rate.unit_price * gib * hours / ctx.sud_policy.hours_per_month;
                pricer.add_computed("localSsd", &sku, gib, "GiB", rate.unit_price, cost);
            }
        }

        if let Some((sku, basis)) = usage.os.license_sku(machine.vcpus) {
            let quantity = match basis {
                LicenseBasis::PerCore => machine.vcpus as f64 * instances,
                LicenseBasis::PerInstance => instances,
            };
            Self::add_hourly(
                &mut pricer,
                ctx,
                "license",
                &sku,
                LICENSE_REGION,
                quantity,
                "licenses",
                hours,
            )?;
        }

        Self::add_hourly(
            &mut pricer,
            ctx,
            "externalIp",
            EXTERNAL_IP_SKU,
            region,
            usage.external_ips as f64 * instances,
            "addresses",
            hours,
        )?;

        pricer.note("machineType", json!(machine.name));
        pricer.note("vcpus", json!(machine.vcpus));
        pricer.note("ramGb", json!(machine.ram_gb));
        pricer.note("hours", json!(hours));
        pricer.note("commitment", json!(commitment.years()));
        pricer.note("discountFraction", json!(charge.discount_fraction));
        pricer.note("sudBands", serde_json::to_value(&charge.bands)?);
        if machine.custom {
            pricer.note("resourceSkus", json!(resource_skus));
        }

        let mut description = format!(
            "{} x {} ({} vCPU, {} GiB)",
            usage.instances, machine.name, machine.vcpus, machine.ram_gb
        );
        if usage.preemptible {
            description.push_str(", preemptible");
        }
        if commitment.is_committed() {
            description.push_str(&format!(", {} commitment", commitment));
        }

        pricer.finish(spec, description)
    }

    /// The boot disk, once per instance, in the instance's region
    fn accompanying(&self, spec: &UsageSpec) -> Vec<UsageSpec> {
        let UsageSpec::ComputeEngine(usage) = spec else {
            return Vec::new();
        };
        let Some(disk) = &usage.boot_disk else {
            return Vec::new();
        };

        let instances = usage.instances as f64;
        let mut disk = disk.clone();
        disk.set_region(&usage.region);
        disk.size = Quantity::new(disk.size.value * instances, disk.size.unit);
        disk.snapshot_size = Quantity::new(disk.snapshot_size.value * instances, disk.snapshot_size.unit);
        vec![disk.into()]
    }
}
