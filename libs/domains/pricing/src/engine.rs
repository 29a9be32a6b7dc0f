//! Tiered & discount pricing engine
//!
//! Pure `f64` functions; no rounding is applied anywhere.
//!
//! - flat: `max(0, q - free) * unit`
//! - tiered: progressive volume bands
//! - sustained use: step discount keyed on monthly utilization
//! - committed use: flat catalog rate billed for the whole month
//! - resource based: additive core + RAM (+ extended RAM) rates

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::PriceTier;
use crate::error::{PricingError, PricingResult};

/// Billable hours in a month
pub const HOURS_PER_MONTH: f64 = 730.0;

// ============================================================================
// Flat
// ============================================================================

pub fn flat_price(quantity: f64, free_quota: f64, unit_price: f64) -> f64 {
    (quantity - free_quota).max(0.0) * unit_price
}

// ============================================================================
// Tiered
// ============================================================================

/// Portion of a quantity billed inside one band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierCharge {
    pub from: f64,
    pub to: Option<f64>,
    pub quantity: f64,
    pub unit_price: f64,
    pub cost: f64,
}

/// Split `quantity` across ascending bands
///
/// Quantity beyond the last bounded band is billed at that band's price.
pub fn tier_breakdown(quantity: f64, tiers: &[PriceTier]) -> Vec<TierCharge> {
    let mut charges = Vec::new();
    if !(quantity > 0.0) {
        return charges;
    }

    let mut lower = 0.0;
    for tier in tiers {
        if quantity <= lower {
            break;
        }
        let upper = tier.up_to.unwrap_or(f64::INFINITY);
        let in_band = quantity.min(upper) - lower;
        charges.push(TierCharge {
            from: lower,
            to: tier.up_to,
            quantity: in_band,
            unit_price: tier.unit_price,
            cost: in_band * tier.unit_price,
        });
        lower = upper;
    }

    if let Some(last) = tiers.last() {
        if last.up_to.is_some() && quantity > lower {
            let overflow = quantity - lower;
            charges.push(TierCharge {
                from: lower,
                to: None,
                quantity: overflow,
                unit_price: last.unit_price,
                cost: overflow * last.unit_price,
            });
        }
    }

    charges
}

pub fn tiered_price(quantity: f64, tiers: &[PriceTier]) -> f64 {
    tier_breakdown(quantity, tiers)
        .iter()
        .fold(0.0, |total, charge| total + charge.cost)
}

/// Free quota is consumed before the first band
pub fn tiered_price_after_quota(quantity: f64, free_quota: f64, tiers: &[PriceTier]) -> f64 {
    tiered_price((quantity - free_quota).max(0.0), tiers)
}

// ============================================================================
// Sustained use
// ============================================================================

/// Shape of the sustained-use discount curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SudPolicy {
    /// Utilization up to which no discount applies
    pub base_threshold: f64,
    /// Number of utilization bands, including the undiscounted first band
    pub band_count: u32,
    pub hours_per_month: f64,
}

impl Default for SudPolicy {
    fn default() -> Self {
        Self {
            base_threshold: 0.25,
            band_count: 4,
            hours_per_month: HOURS_PER_MONTH,
        }
    }
}

impl SudPolicy {
    /// Price multiplier of each band; decreases linearly so that a full month
    /// averages out to exactly `1 - max_discount`
    pub fn multipliers(&self, max_discount: f64) -> Vec<f64> {
        let n = self.band_count.max(1);
        let step = 2.0 * max_discount / ((1.0 - self.base_threshold) * n as f64);
        (0..n).map(|k| 1.0 - k as f64 * step).collect()
    }

    /// `(from, to)` utilization ratio of each band
    pub fn band_ranges(&self) -> Vec<(f64, f64)> {
        let n = self.band_count.max(1);
        if n == 1 {
            return vec![(0.0, 1.0)];
        }
        let width = (1.0 - self.base_threshold) / (n - 1) as f64;
        let mut ranges = vec![(0.0, self.base_threshold)];
        for k in 1..n {
            let from = self.base_threshold + (k - 1) as f64 * width;
            let to = if k == n - 1 { 1.0 } else { from + width };
            ranges.push((from, to));
        }
        ranges
    }
}

/// One utilization band of the sustained-use breakdown (display only)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SudBand {
    pub from_ratio: f64,
    pub to_ratio: f64,
    pub hours: f64,
    pub multiplier: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SustainedUseResult {
    /// Discounted total for the month
    pub total: f64,
    pub undiscounted: f64,
    /// Cumulative discount fraction, within `[0, max_discount]`
    pub discount_fraction: f64,
    pub bands: Vec<SudBand>,
}

/// Price `hours` of usage at `hourly_rate` under the sustained-use curve
pub fn sustained_use(
    hourly_rate: f64,
    hours: f64,
    policy: &SudPolicy,
    max_discount: f64,
    preemptible: bool,
) -> SustainedUseResult {
    let hours = hours.clamp(0.0, policy.hours_per_month);
    let utilization = hours / policy.hours_per_month;
    let undiscounted = hourly_rate * hours;

    let eligible = !preemptible && max_discount > 0.0 && utilization > policy.base_threshold;
    if !eligible || undiscounted <= 0.0 {
        return SustainedUseResult {
            total: undiscounted,
            undiscounted,
            discount_fraction: 0.0,
            bands: vec![SudBand {
                from_ratio: 0.0,
                to_ratio: utilization,
                hours,
                multiplier: 1.0,
                cost: undiscounted,
            }],
        };
    }

    let multipliers = policy.multipliers(max_discount);
    let mut bands = Vec::with_capacity(multipliers.len());
    let mut total = 0.0;

    for ((from, to), multiplier) in policy.band_ranges().into_iter().zip(multipliers) {
        if utilization <= from {
            break;
        }
        let band_hours = (utilization.min(to) - from) * policy.hours_per_month;
        let cost = band_hours * hourly_rate * multiplier;
        total += cost;
        bands.push(SudBand {
            from_ratio: from,
            to_ratio: to,
            hours: band_hours,
            multiplier,
            cost,
        });
    }

    let discount_fraction = (1.0 - total / undiscounted).clamp(0.0, max_discount);

    SustainedUseResult {
        total,
        undiscounted,
        discount_fraction,
        bands,
    }
}

// ============================================================================
// Committed use
// ============================================================================

/// Commitment term; serialized as the number of years (0 = none)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CommitmentTerm {
    #[default]
    None,
    OneYear,
    ThreeYears,
}

impl CommitmentTerm {
    pub fn years(self) -> u8 {
        match self {
            CommitmentTerm::None => 0,
            CommitmentTerm::OneYear => 1,
            CommitmentTerm::ThreeYears => 3,
        }
    }

    pub fn is_committed(self) -> bool {
        self != CommitmentTerm::None
    }

    /// `-CUD-<term>-YEAR`, or nothing for on-demand
    pub fn sku_suffix(self) -> Option<String> {
        self.is_committed()
            .then(|| format!("-CUD-{}-YEAR", self.years()))
    }

    /// The committed-rate SKU for an on-demand SKU
    pub fn apply_to(self, sku: &str) -> String {
        match self.sku_suffix() {
            Some(suffix) => format!("{}{}", sku, suffix),
            None => sku.to_string(),
        }
    }
}

impl TryFrom<u8> for CommitmentTerm {
    type Error = String;

    fn try_from(years: u8) -> Result<Self, Self::Error> {
        match years {
            0 => Ok(CommitmentTerm::None),
            1 => Ok(CommitmentTerm::OneYear),
            3 => Ok(CommitmentTerm::ThreeYears),
            other => Err(format!("Unsupported commitment term: {} years", other)),
        }
    }
}

impl From<CommitmentTerm> for u8 {
    fn from(term: CommitmentTerm) -> Self {
        term.years()
    }
}

impl fmt::Display for CommitmentTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitmentTerm::None => write!(f, "none"),
            term => write!(f, "{} year", term.years()),
        }
    }
}

/// Preemptible capacity has its own SKU and is never committed
pub fn pricing_variant(sku: &str, preemptible: bool, commitment: CommitmentTerm) -> String {
    if preemptible {
        format!("{}-PREEMPTIBLE", sku)
    } else {
        commitment.apply_to(sku)
    }
}

/// Shared-core and preemptible shapes cannot hold a commitment
pub fn cud_eligibility(shared_core: bool, preemptible: bool) -> PricingResult<()> {
    if shared_core {
        return Err(PricingError::IneligibleDiscount(
            "shared-core machine types cannot be committed".to_string(),
        ));
    }
    if preemptible {
        return Err(PricingError::IneligibleDiscount(
            "preemptible instances cannot be committed".to_string(),
        ));
    }
    Ok(())
}

/// Committed capacity is paid for every hour of the month regardless of usage
pub fn committed_use(cud_hourly_rate: f64, quantity: f64, policy: &SudPolicy) -> f64 {
    cud_hourly_rate * policy.hours_per_month * quantity
}

// ============================================================================
// Resource based
// ============================================================================

/// Hourly rates of the independently priced parts of a custom shape
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceRates {
    pub core: f64,
    pub ram: f64,
    pub extended_ram: f64,
}

/// Hourly price of `cores` + `ram_gb` (+ `extended_gb` above the series threshold)
pub fn resource_price(rates: &ResourceRates, cores: f64, ram_gb: f64, extended_gb: f64) -> f64 {
    cores * rates.core + ram_gb * rates.ram + extended_gb * rates.extended_ram
}
