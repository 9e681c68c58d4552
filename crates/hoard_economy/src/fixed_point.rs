//! # Fixed-Point Weights and Values
//!
//! **NO FLOATING POINT IN TREASURE CALCULATIONS**
//!
//! Coin amounts are integer copper throughout the engine. `FixedPoint` covers
//! the places where fractions are real: item weights (a gem weighs 0.01 lb),
//! coin weight (50 coins to the pound) and gp-denominated presentation of
//! copper totals. Reference data may write weights as JSON floats; they are
//! converted once at load time and never touched as floats again.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TreasureError;

/// Digits after the decimal point.
const DECIMAL_PLACES: u32 = 6;

/// Raw units per whole unit.
const MULTIPLIER: u64 = 10u64.pow(DECIMAL_PLACES);

/// Non-negative decimal with 6 places, stored as `value * 1_000_000`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct FixedPoint(u64);

impl FixedPoint {
    /// 0.000000
    pub const ZERO: Self = Self(0);

    /// 1.000000
    pub const ONE: Self = Self(MULTIPLIER);

    /// Largest value; used as the saturation point for gp presentation.
    pub const MAX: Self = Self(u64::MAX);

    /// A whole number of units, e.g. a catalog value of 50 gp.
    #[must_use]
    pub const fn from_whole(whole: u64) -> Self {
        Self(whole * MULTIPLIER)
    }

    /// `whole` plus `decimal` millionths; `from_parts(0, 10_000)` is 0.01.
    #[must_use]
    pub const fn from_parts(whole: u64, decimal: u32) -> Self {
        Self(whole * MULTIPLIER + (decimal as u64 % MULTIPLIER))
    }

    /// Exact ratio `numerator / denominator`, truncated to 6 decimals.
    ///
    /// Returns `None` when the denominator is zero or the result overflows.
    ///
    /// ```rust,ignore
    /// // 250 copper at 100 copper per gp
    /// assert_eq!(FixedPoint::from_ratio(250, 100).unwrap().to_string(), "2.500000");
    /// ```
    #[must_use]
    pub fn from_ratio(numerator: u64, denominator: u64) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let scaled = u128::from(numerator) * u128::from(MULTIPLIER) / u128::from(denominator);
        u64::try_from(scaled).ok().map(Self)
    }

    /// Millionths.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Integer part.
    #[must_use]
    pub const fn whole(self) -> u64 {
        self.0 / MULTIPLIER
    }

    /// Fractional part in millionths (0-999999).
    #[must_use]
    pub const fn decimal(self) -> u32 {
        (self.0 % MULTIPLIER) as u32
    }

    /// Sum clamped at [`FixedPoint::MAX`]. Carried weight has no failure mode.
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Debug for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedPoint({}.{:06})", self.whole(), self.decimal())
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.whole(), self.decimal())
    }
}

impl FromStr for FixedPoint {
    type Err = TreasureError;

    /// Parses `"12"`, `"0.01"` or `"3.141592"`. At most 6 decimals.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TreasureError::InvalidConfig(format!("not a fixed-point number: '{s}'"));
        let s = s.trim();
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() || frac.len() > DECIMAL_PLACES as usize {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let whole: u64 = whole.parse().map_err(|_| invalid())?;
        let mut decimal: u64 = if frac.is_empty() {
            0
        } else {
            frac.parse().map_err(|_| invalid())?
        };
        for _ in frac.len()..DECIMAL_PLACES as usize {
            decimal *= 10;
        }
        whole
            .checked_mul(MULTIPLIER)
            .and_then(|w| w.checked_add(decimal))
            .map(Self)
            .ok_or(TreasureError::ArithmeticOverflow)
    }
}

impl Serialize for FixedPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FixedPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FixedPointVisitor;

        impl Visitor<'_> for FixedPointVisitor {
            type Value = FixedPoint;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FixedPoint, E> {
                v.checked_mul(MULTIPLIER)
                    .map(FixedPoint)
                    .ok_or_else(|| E::custom("fixed-point overflow"))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<FixedPoint, E> {
                let v = u64::try_from(v).map_err(|_| E::custom("negative fixed-point value"))?;
                self.visit_u64(v)
            }

            // Reference data writes weights as JSON floats ("weight": 0.5).
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<FixedPoint, E> {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("fixed-point value must be finite and non-negative"));
                }
                format!("{v:.6}").parse().map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FixedPoint, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(FixedPointVisitor)
    }
}
