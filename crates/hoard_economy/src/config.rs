//! # Engine Configuration
//!
//! Balance numbers that a table may want to tune: the magic item rarity
//! distribution, the estimated value of each rarity, coin exchange rates and
//! item weights. Loaded from TOML; every field has a default.
//!
//! ```toml
//! coins_per_pound = 50
//! gem_weight = "0.01"
//! art_weight = "1"
//!
//! [rarity_weights]
//! common = 50
//! uncommon = 30
//! rare = 15
//! very_rare = 4
//! legendary = 1
//!
//! [rates]
//! cp = 1
//! sp = 10
//! ep = 50
//! gp = 100
//! pp = 1000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::currency::CurrencyRates;
use crate::error::{TreasureError, TreasureResult};
use crate::fixed_point::FixedPoint;
use crate::reference::Rarity;

/// One number per sampled rarity tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerRarity {
    /// Common.
    pub common: u64,
    /// Uncommon.
    pub uncommon: u64,
    /// Rare.
    pub rare: u64,
    /// Very rare.
    pub very_rare: u64,
    /// Legendary.
    pub legendary: u64,
}

impl PerRarity {
    /// Value for a tier; `None` for tiers outside the five sampled ones.
    #[must_use]
    pub const fn get(&self, rarity: Rarity) -> Option<u64> {
        match rarity {
            Rarity::Common => Some(self.common),
            Rarity::Uncommon => Some(self.uncommon),
            Rarity::Rare => Some(self.rare),
            Rarity::VeryRare => Some(self.very_rare),
            Rarity::Legendary => Some(self.legendary),
            Rarity::Artifact | Rarity::Unknown => None,
        }
    }

    /// Values in [`Rarity::SAMPLED`] order.
    #[must_use]
    pub const fn as_array(&self) -> [u64; 5] {
        [self.common, self.uncommon, self.rare, self.very_rare, self.legendary]
    }
}

/// Tunable parameters of the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Weights of the rarity roll made before each magic item draw.
    pub rarity_weights: PerRarity,
    /// Estimated gp value of an item of each rarity without a listed value.
    pub rarity_values: PerRarity,
    /// Copper value of each coin.
    pub rates: CurrencyRates,
    /// Pounds per gem.
    pub gem_weight: FixedPoint,
    /// Pounds per art object.
    pub art_weight: FixedPoint,
    /// Coins that weigh one pound.
    pub coins_per_pound: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rarity_weights: PerRarity {
                common: 50,
                uncommon: 30,
                rare: 15,
                very_rare: 4,
                legendary: 1,
            },
            rarity_values: PerRarity {
                common: 100,
                uncommon: 500,
                rare: 5_000,
                very_rare: 50_000,
                legendary: 100_000,
            },
            rates: CurrencyRates::default(),
            gem_weight: FixedPoint::from_parts(0, 10_000),
            art_weight: FixedPoint::ONE,
            coins_per_pound: 50,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for malformed TOML or values that fail
    /// [`EngineConfig::validate`].
    pub fn from_toml_str(text: &str) -> TreasureResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| TreasureError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> TreasureResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TreasureError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks the configuration for values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when the rates are not a strictly increasing
    /// ladder starting at 1 copper, the rarity weights sum to zero, or
    /// `coins_per_pound` is zero.
    pub fn validate(&self) -> TreasureResult<()> {
        self.rates.validate()?;
        if self.rarity_weights.as_array().iter().all(|&w| w == 0) {
            return Err(TreasureError::InvalidConfig("rarity weights sum to zero".into()));
        }
        if self.coins_per_pound == 0 {
            return Err(TreasureError::InvalidConfig("coins_per_pound must be positive".into()));
        }
        Ok(())
    }

    /// Estimated gp value for a rarity; 0 for unsampled tiers.
    #[must_use]
    pub fn estimated_value(&self, rarity: Rarity) -> u64 {
        self.rarity_values.get(rarity).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rarity_weights.as_array().iter().sum::<u64>(), 100);
        assert_eq!(config.estimated_value(Rarity::VeryRare), 50_000);
        assert_eq!(config.estimated_value(Rarity::Artifact), 0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            coins_per_pound = 100
            gem_weight = "0.02"
            "#,
        )
        .unwrap();
        assert_eq!(config.coins_per_pound, 100);
        assert_eq!(config.gem_weight, FixedPoint::from_parts(0, 20_000));
        assert_eq!(config.rates, CurrencyRates::default());
        assert_eq!(config.rarity_weights.legendary, 1);
    }

    #[test]
    fn test_rarity_table_override() {
        let config = EngineConfig::from_toml_str(
            r"
            [rarity_weights]
            common = 0
            uncommon = 0
            rare = 1
            very_rare = 0
            legendary = 0
            ",
        )
        .unwrap();
        assert_eq!(config.rarity_weights.get(Rarity::Rare), Some(1));
    }

    #[test]
    fn test_rejects_bad_values() {
        let zero_weights = r"
            [rarity_weights]
            common = 0
            uncommon = 0
            rare = 0
            very_rare = 0
            legendary = 0
        ";
        assert!(matches!(
            EngineConfig::from_toml_str(zero_weights),
            Err(TreasureError::InvalidConfig(_))
        ));

        let bad_rates = r"
            [rates]
            gp = 5
        ";
        assert!(EngineConfig::from_toml_str(bad_rates).is_err());

        assert!(EngineConfig::from_toml_str("coins_per_pound = 0").is_err());
        assert!(EngineConfig::from_toml_str("coins_per_pound = [").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_toml_file("/nonexistent/hoard.toml").unwrap_err();
        assert!(matches!(err, TreasureError::InvalidConfig(_)));
    }
}
