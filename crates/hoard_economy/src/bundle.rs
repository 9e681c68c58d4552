//! # Treasure Bundles
//!
//! The product of one generation call, and the party pool that accumulates
//! bundles until they are distributed.
//!
//! ```text
//! TreasureBundle
//! ├── coins         CoinPurse
//! ├── gems          [LootItem]
//! ├── art_objects   [LootItem]
//! └── magic_items   [LootItem]
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::currency::{CoinPurse, CurrencyRates};
use crate::error::{TreasureError, TreasureResult};
use crate::fixed_point::FixedPoint;
use crate::reference::Rarity;

/// What a loot item is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LootKind {
    /// Gemstone.
    Gem,
    /// Art object.
    ArtObject,
    /// Magic item.
    MagicItem,
}

/// Catalog details carried by magic items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagicDetails {
    /// Base item id the draw landed on.
    pub base_id: String,
    /// Item type from the catalog.
    pub item_type: String,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Whether the item requires attunement.
    pub requires_attunement: bool,
    /// Rules text.
    pub description: String,
}

/// One concrete item of treasure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootItem {
    /// Display name, variant text included.
    pub name: String,
    /// Gem, art object or magic item.
    pub kind: LootKind,
    /// Value in copper.
    pub value_copper: u64,
    /// Weight in pounds.
    pub weight: FixedPoint,
    /// Present for magic items only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magic: Option<MagicDetails>,
}

impl LootItem {
    /// Value in gold pieces.
    #[must_use]
    pub fn value_gp(&self, rates: &CurrencyRates) -> FixedPoint {
        rates.copper_to_gp(self.value_copper)
    }
}

/// Coins and items produced together.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasureBundle {
    /// Coins.
    pub coins: CoinPurse,
    /// Gemstones.
    pub gems: Vec<LootItem>,
    /// Art objects.
    pub art_objects: Vec<LootItem>,
    /// Magic items.
    pub magic_items: Vec<LootItem>,
}

impl TreasureBundle {
    /// An empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item to the list for its kind.
    pub fn push(&mut self, item: LootItem) {
        match item.kind {
            LootKind::Gem => self.gems.push(item),
            LootKind::ArtObject => self.art_objects.push(item),
            LootKind::MagicItem => self.magic_items.push(item),
        }
    }

    /// Every item: gems, then art objects, then magic items.
    pub fn items(&self) -> impl Iterator<Item = &LootItem> {
        self.gems.iter().chain(&self.art_objects).chain(&self.magic_items)
    }

    /// Number of items of any kind.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.gems.len() + self.art_objects.len() + self.magic_items.len()
    }

    /// True when there are neither coins nor items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coins.is_empty() && self.item_count() == 0
    }

    /// Coin value plus item value, in copper.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if the total does not fit in a u64.
    pub fn total_value_copper(&self, rates: &CurrencyRates) -> TreasureResult<u64> {
        self.items().try_fold(self.coins.total_copper(rates)?, |acc, item| {
            acc.checked_add(item.value_copper).ok_or(TreasureError::ArithmeticOverflow)
        })
    }

    /// Weight of coins and items in pounds.
    #[must_use]
    pub fn total_weight(&self, config: &EngineConfig) -> FixedPoint {
        self.items()
            .fold(self.coins.weight(config.coins_per_pound), |acc, item| acc.saturating_add(item.weight))
    }

    /// Moves everything from `other` into this bundle.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if a coin count overflows; the bundle is
    /// unchanged in that case.
    pub fn merge(&mut self, mut other: Self) -> TreasureResult<()> {
        let mut coins = self.coins;
        coins.merge(&other.coins)?;
        self.coins = coins;
        self.gems.append(&mut other.gems);
        self.art_objects.append(&mut other.art_objects);
        self.magic_items.append(&mut other.magic_items);
        Ok(())
    }
}

/// Loot accumulated by a party across encounters, awaiting distribution.
///
/// The caller owns the pool; [`crate::distribution::distribute`] empties it
/// only when a distribution succeeds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyLoot {
    pool: TreasureBundle,
    bundles: usize,
}

impl PartyLoot {
    /// An empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a generated bundle to the pool.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if a coin count overflows.
    pub fn add_bundle(&mut self, bundle: TreasureBundle) -> TreasureResult<()> {
        self.pool.merge(bundle)?;
        self.bundles += 1;
        debug!(bundles = self.bundles, items = self.pool.item_count(), coins = %self.pool.coins, "bundle pooled");
        Ok(())
    }

    /// Current contents.
    #[must_use]
    pub fn contents(&self) -> &TreasureBundle {
        &self.pool
    }

    /// Number of bundles added since the pool was last emptied.
    #[must_use]
    pub fn bundle_count(&self) -> usize {
        self.bundles
    }

    /// True when the pool holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Empties the pool.
    pub fn clear(&mut self) {
        self.pool = TreasureBundle::new();
        self.bundles = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;

    fn gem(name: &str, gp: u64) -> LootItem {
        LootItem {
            name: name.to_string(),
            kind: LootKind::Gem,
            value_copper: gp * 100,
            weight: FixedPoint::from_parts(0, 10_000),
            magic: None,
        }
    }

    #[test]
    fn test_push_routes_by_kind() {
        let mut bundle = TreasureBundle::new();
        bundle.push(gem("Azurite (10 GP)", 10));
        bundle.push(LootItem {
            kind: LootKind::ArtObject,
            ..gem("Silver ewer (25 GP)", 25)
        });
        assert_eq!(bundle.gems.len(), 1);
        assert_eq!(bundle.art_objects.len(), 1);
        assert_eq!(bundle.item_count(), 2);
    }

    #[test]
    fn test_totals() {
        let mut bundle = TreasureBundle::new();
        bundle.coins.add(Currency::Gp, 3).unwrap();
        bundle.coins.add(Currency::Sp, 47).unwrap();
        bundle.push(gem("Azurite (10 GP)", 10));

        let rates = CurrencyRates::default();
        assert_eq!(bundle.total_value_copper(&rates).unwrap(), 300 + 470 + 1000);

        // 50 coins weigh a pound
        let config = EngineConfig::default();
        assert_eq!(bundle.total_weight(&config), FixedPoint::from_parts(1, 10_000));
    }

    #[test]
    fn test_party_pool() {
        let mut party = PartyLoot::new();
        assert!(party.is_empty());

        let mut first = TreasureBundle::new();
        first.coins.add(Currency::Cp, 10).unwrap();
        party.add_bundle(first).unwrap();

        let mut second = TreasureBundle::new();
        second.coins.add(Currency::Cp, 5).unwrap();
        second.push(gem("Jade (100 GP)", 100));
        party.add_bundle(second).unwrap();

        assert_eq!(party.bundle_count(), 2);
        assert_eq!(party.contents().coins.get(Currency::Cp), 15);
        assert_eq!(party.contents().item_count(), 1);

        party.clear();
        assert!(party.is_empty());
        assert_eq!(party.bundle_count(), 0);
    }

    #[test]
    fn test_merge_overflow_leaves_bundle() {
        let mut bundle = TreasureBundle::new();
        bundle.coins.add(Currency::Pp, u64::MAX).unwrap();
        let mut other = TreasureBundle::new();
        other.coins.add(Currency::Pp, 1).unwrap();
        other.push(gem("Onyx (50 GP)", 50));

        assert_eq!(bundle.merge(other), Err(TreasureError::ArithmeticOverflow));
        assert_eq!(bundle.coins.get(Currency::Pp), u64::MAX);
        assert_eq!(bundle.item_count(), 0);
    }
}
