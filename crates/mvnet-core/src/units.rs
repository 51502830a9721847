//! Compile-time unit safety for network quantities.
//!
//! Medium-voltage studies mix kV, per-unit, MW, Mvar, MVA, amperes, and
//! angles in two conventions. Raw `f64` fields make it easy to feed degrees
//! where radians are expected or to add MW to Mvar; these transparent
//! newtypes catch that at compile time with zero runtime overhead.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Implements the arithmetic and accessor surface shared by all unit types.
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl $type {
            /// Create a new value
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Get the raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            /// Absolute value
            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            /// Check if value is finite
            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }
    };
}

/// Active power in megawatts (MW)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Megawatts(pub f64);

impl_unit_ops!(Megawatts, "MW");

/// Reactive power in megavolt-amperes reactive (Mvar)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Megavars(pub f64);

impl_unit_ops!(Megavars, "Mvar");

/// Apparent power in megavolt-amperes (MVA)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MegavoltAmperes(pub f64);

impl_unit_ops!(MegavoltAmperes, "MVA");

/// Voltage magnitude in per-unit (pu)
///
/// Normalized to the bus base voltage; normal operating range in MV
/// distribution is roughly 0.95 – 1.05 pu.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PerUnit(pub f64);

impl_unit_ops!(PerUnit, "pu");

/// Voltage in kilovolts (kV)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

impl_unit_ops!(Kilovolts, "kV");

/// Current in amperes (A)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Amperes(pub f64);

impl_unit_ops!(Amperes, "A");

/// Angle in radians - the unit used by all solver mathematics.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Radians(pub f64);

impl_unit_ops!(Radians, "rad");

/// Angle in degrees - the unit used by every reported result.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Degrees(pub f64);

impl_unit_ops!(Degrees, "°");

impl PerUnit {
    /// Convert to kilovolts given base voltage
    #[inline]
    pub fn to_kilovolts(self, base_kv: Kilovolts) -> Kilovolts {
        Kilovolts(self.0 * base_kv.0)
    }

    /// One per-unit (nominal voltage)
    pub const ONE: Self = Self(1.0);
}

impl Kilovolts {
    /// Absolute voltage in volts.
    #[inline]
    pub fn volts(self) -> f64 {
        self.0 * 1_000.0
    }
}

impl Radians {
    /// Convert to degrees
    #[inline]
    pub fn to_degrees(self) -> Degrees {
        Degrees(self.0 * 180.0 / std::f64::consts::PI)
    }

    /// Zero radians
    pub const ZERO: Self = Self(0.0);
}

impl Degrees {
    /// Convert to radians
    #[inline]
    pub fn to_radians(self) -> Radians {
        Radians(self.0 * std::f64::consts::PI / 180.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_stays_in_unit() {
        let total = Megawatts(30.0) + Megawatts(12.5);
        assert!((total.value() - 42.5).abs() < 1e-12);
        assert!((-(Megavars(5.0))).value() < 0.0);
    }

    #[test]
    fn angle_round_trip() {
        let deg = Radians(std::f64::consts::PI).to_degrees();
        assert!((deg.value() - 180.0).abs() < 1e-9);
        assert!((deg.to_radians().value() - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn per_unit_to_kilovolts() {
        let kv = PerUnit(1.02).to_kilovolts(Kilovolts(15.0));
        assert!((kv.value() - 15.3).abs() < 1e-9);
        assert!((kv.volts() - 15_300.0).abs() < 1e-6);
    }

    #[test]
    fn sum_over_iterator() {
        let losses: Megawatts = [Megawatts(0.1), Megawatts(0.2)].into_iter().sum();
        assert!((losses.value() - 0.3).abs() < 1e-12);
    }
}
