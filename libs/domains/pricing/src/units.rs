//! Unit conversion for usage quantities
//!
//! Usage fields arrive as `{ value, unit }` pairs where `unit` is an exponent
//! index over a radix: 1024 for byte multiples, 10 for decimal counts. Every
//! quantity is normalized to the catalog's base unit before pricing.

use serde::{Deserialize, Serialize};

/// Byte exponent indices (radix 1024)
pub mod bytes {
    pub const B: i32 = 0;
    pub const KIB: i32 = 1;
    pub const MIB: i32 = 2;
    pub const GIB: i32 = 3;
    pub const TIB: i32 = 4;
    pub const PIB: i32 = 5;
}

/// Decimal count exponent indices (radix 10)
pub mod counts {
    pub const UNITS: i32 = 0;
    pub const THOUSAND: i32 = 3;
    pub const MILLION: i32 = 6;
    pub const BILLION: i32 = 9;
}

/// Multiplier family of a unit exponent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitScale {
    /// Powers of 1024 (KiB, MiB, GiB, ...)
    Binary,
    /// Powers of 10 (thousand = 3, million = 6, ...)
    Decimal,
}

impl UnitScale {
    pub fn radix(self) -> f64 {
        match self {
            UnitScale::Binary => 1024.0,
            UnitScale::Decimal => 10.0,
        }
    }
}

/// Convert `value` expressed in `unit` into `base_unit`
pub fn to_base_unit(value: f64, unit: i32, base_unit: i32, scale: UnitScale) -> f64 {
    value * scale.radix().powi(unit - base_unit)
}

/// A user-entered amount with its unit exponent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: i32,
}

impl Quantity {
    pub fn new(value: f64, unit: i32) -> Self {
        Self { value, unit }
    }

    pub fn gib(value: f64) -> Self {
        Self::new(value, bytes::GIB)
    }

    pub fn units(value: f64) -> Self {
        Self::new(value, counts::UNITS)
    }

    pub fn millions(value: f64) -> Self {
        Self::new(value, counts::MILLION)
    }

    pub fn zero(unit: i32) -> Self {
        Self::new(0.0, unit)
    }

    /// Value normalized to `base_unit`
    pub fn to_base(&self, base_unit: i32, scale: UnitScale) -> f64 {
        to_base_unit(self.value, self.unit, base_unit, scale)
    }

    /// Only positive, finite values are billed; everything else is skipped
    pub fn is_billable(&self) -> bool {
        self.value.is_finite() && self.value > 0.0
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::zero(counts::UNITS)
    }
}
