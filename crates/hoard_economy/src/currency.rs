//! # Coins and Purses
//!
//! Five coin denominations, a rate table expressed in copper, and the
//! `CoinPurse` that holds non-negative counts of each coin.
//!
//! Every value comparison in the engine happens in copper, so converting a
//! purse to a single number and back never loses a coin.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TreasureError, TreasureResult};
use crate::fixed_point::FixedPoint;

/// A coin denomination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    /// Copper pieces.
    Cp,
    /// Silver pieces.
    Sp,
    /// Electrum pieces.
    Ep,
    /// Gold pieces.
    Gp,
    /// Platinum pieces.
    Pp,
}

impl Currency {
    /// All denominations, smallest first.
    pub const ALL: [Self; 5] = [Self::Cp, Self::Sp, Self::Ep, Self::Gp, Self::Pp];

    /// Lowercase coin code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Cp => "cp",
            Self::Sp => "sp",
            Self::Ep => "ep",
            Self::Gp => "gp",
            Self::Pp => "pp",
        }
    }

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = TreasureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cp" => Ok(Self::Cp),
            "sp" => Ok(Self::Sp),
            "ep" => Ok(Self::Ep),
            "gp" => Ok(Self::Gp),
            "pp" => Ok(Self::Pp),
            other => Err(TreasureError::InvalidConfig(format!("unknown coin '{other}'"))),
        }
    }
}

/// Copper value of each coin.
///
/// Defaults to the standard exchange: 10 cp = 1 sp, 5 sp = 1 ep,
/// 2 ep = 1 gp, 10 gp = 1 pp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyRates {
    /// Copper per copper piece. Must be 1.
    pub cp: u64,
    /// Copper per silver piece.
    pub sp: u64,
    /// Copper per electrum piece.
    pub ep: u64,
    /// Copper per gold piece.
    pub gp: u64,
    /// Copper per platinum piece.
    pub pp: u64,
}

impl Default for CurrencyRates {
    fn default() -> Self {
        Self {
            cp: 1,
            sp: 10,
            ep: 50,
            gp: 100,
            pp: 1000,
        }
    }
}

impl CurrencyRates {
    /// Copper value of one coin.
    #[inline]
    #[must_use]
    pub const fn copper_value(&self, currency: Currency) -> u64 {
        match currency {
            Currency::Cp => self.cp,
            Currency::Sp => self.sp,
            Currency::Ep => self.ep,
            Currency::Gp => self.gp,
            Currency::Pp => self.pp,
        }
    }

    /// Converts `amount` coins of `from` into `to`, exactly to 6 decimals.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if the copper total does not fit.
    pub fn convert(&self, amount: u64, from: Currency, to: Currency) -> TreasureResult<FixedPoint> {
        let copper = amount
            .checked_mul(self.copper_value(from))
            .ok_or(TreasureError::ArithmeticOverflow)?;
        FixedPoint::from_ratio(copper, self.copper_value(to)).ok_or(TreasureError::ArithmeticOverflow)
    }

    /// Presents a copper amount in gold pieces.
    #[must_use]
    pub fn copper_to_gp(&self, copper: u64) -> FixedPoint {
        FixedPoint::from_ratio(copper, self.gp).unwrap_or(FixedPoint::MAX)
    }

    /// Converts a gp amount (up to 6 decimals) to whole copper, truncating.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if the copper total does not fit.
    pub fn gp_to_copper(&self, gp: FixedPoint) -> TreasureResult<u64> {
        let copper = u128::from(gp.raw()) * u128::from(self.gp) / u128::from(FixedPoint::ONE.raw());
        u64::try_from(copper).map_err(|_| TreasureError::ArithmeticOverflow)
    }

    /// Checks the rate table is usable for exact copper arithmetic.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if copper is not the unit or the rates are not
    /// strictly increasing from cp to pp.
    pub fn validate(&self) -> TreasureResult<()> {
        if self.cp != 1 {
            return Err(TreasureError::InvalidConfig(format!(
                "copper must be worth exactly 1 copper, got {}",
                self.cp
            )));
        }
        for pair in Currency::ALL.windows(2) {
            let (low, high) = (pair[0], pair[1]);
            if self.copper_value(high) <= self.copper_value(low) {
                return Err(TreasureError::InvalidConfig(format!(
                    "{high} ({}) must be worth more than {low} ({})",
                    self.copper_value(high),
                    self.copper_value(low)
                )));
            }
        }
        Ok(())
    }
}

/// Non-negative coin counts for each denomination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CoinPurse {
    amounts: [u64; 5],
}

impl CoinPurse {
    /// An empty purse.
    #[must_use]
    pub const fn new() -> Self {
        Self { amounts: [0; 5] }
    }

    /// Builds a purse from `(currency, amount)` pairs, summing repeats.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if a denomination overflows.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Currency, u64)>) -> TreasureResult<Self> {
        let mut purse = Self::new();
        for (currency, amount) in pairs {
            purse.add(currency, amount)?;
        }
        Ok(purse)
    }

    /// Coins held of one denomination.
    #[inline]
    #[must_use]
    pub const fn get(&self, currency: Currency) -> u64 {
        self.amounts[currency.index()]
    }

    /// Adds coins of one denomination.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if the count overflows.
    pub fn add(&mut self, currency: Currency, amount: u64) -> TreasureResult<()> {
        let slot = &mut self.amounts[currency.index()];
        *slot = slot.checked_add(amount).ok_or(TreasureError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Adds every coin of `other` into this purse.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if any denomination overflows.
    pub fn merge(&mut self, other: &Self) -> TreasureResult<()> {
        for (currency, amount) in other.iter() {
            self.add(currency, amount)?;
        }
        Ok(())
    }

    /// True when the purse holds no coins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.amounts.iter().all(|&a| a == 0)
    }

    /// Iterates `(currency, amount)` from cp to pp, zero amounts included.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Currency, u64)> + '_ {
        Currency::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    /// Total number of coins regardless of denomination.
    #[must_use]
    pub fn coin_count(&self) -> u64 {
        self.amounts.iter().fold(0u64, |acc, &a| acc.saturating_add(a))
    }

    /// Total value in copper.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if the total does not fit in a u64.
    pub fn total_copper(&self, rates: &CurrencyRates) -> TreasureResult<u64> {
        self.iter().try_fold(0u64, |acc, (currency, amount)| {
            amount
                .checked_mul(rates.copper_value(currency))
                .and_then(|v| acc.checked_add(v))
                .ok_or(TreasureError::ArithmeticOverflow)
        })
    }

    /// Weight of the coins in pounds.
    #[must_use]
    pub fn weight(&self, coins_per_pound: u64) -> FixedPoint {
        FixedPoint::from_ratio(self.coin_count(), coins_per_pound).unwrap_or(FixedPoint::ZERO)
    }
}

impl Serialize for CoinPurse {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let held: Vec<_> = self.iter().filter(|&(_, amount)| amount > 0).collect();
        let mut map = serializer.serialize_map(Some(held.len()))?;
        for (currency, amount) in held {
            map.serialize_entry(&currency, &amount)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CoinPurse {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = std::collections::BTreeMap::<Currency, u64>::deserialize(deserializer)?;
        Self::from_pairs(map).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for CoinPurse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no coins");
        }
        let mut first = true;
        for (currency, amount) in self.iter().rev().filter(|&(_, a)| a > 0) {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{amount} {currency}")?;
            first = false;
        }
        Ok(())
    }
}
