//! # Gems and Art Objects
//!
//! Turns a tiered pick ("2d6 l50 gp gems") into named items.
//!
//! ## Tier ladders
//!
//! ```text
//! gems         10   50   100   500   1000   5000
//! art objects  25  250   750  2500   7500
//! ```
//!
//! The requested value maps to the highest rung at or below it. Names are
//! drawn uniformly from that rung's pool, with replacement.

use tracing::error;

use crate::bundle::{LootItem, LootKind};
use crate::config::EngineConfig;
use crate::error::{TreasureError, TreasureResult};
use crate::expression::ValuableKind;
use crate::ledger::RollLedger;
use crate::reference::ReferenceData;

/// Gem tier values in gp, ascending.
pub const GEM_TIERS: [u64; 6] = [10, 50, 100, 500, 1000, 5000];

/// Art object tier values in gp, ascending.
pub const ART_TIERS: [u64; 5] = [25, 250, 750, 2500, 7500];

/// The tier ladder of a pool.
#[must_use]
pub const fn tier_ladder(kind: ValuableKind) -> &'static [u64] {
    match kind {
        ValuableKind::Gems => &GEM_TIERS,
        ValuableKind::ArtObjects => &ART_TIERS,
    }
}

/// Reference data key of a tier: "10 GP Gemstones", "25 GP Art Objects".
#[must_use]
pub fn pool_key(kind: ValuableKind, tier: u64) -> String {
    match kind {
        ValuableKind::Gems => format!("{tier} GP Gemstones"),
        ValuableKind::ArtObjects => format!("{tier} GP Art Objects"),
    }
}

/// Highest tier at or below `value`.
///
/// # Errors
///
/// Returns `TierNotFound` when `value` is below the lowest tier.
pub fn tier_for(kind: ValuableKind, value: u64) -> TreasureResult<u64> {
    tier_ladder(kind)
        .iter()
        .rev()
        .find(|&&tier| tier <= value)
        .copied()
        .ok_or_else(|| TreasureError::TierNotFound {
            kind: kind.label().to_string(),
            value,
        })
}

/// Draws gems and art objects from the reference pools.
#[derive(Clone, Copy, Debug)]
pub struct ValuableGenerator<'a> {
    reference: &'a ReferenceData,
    config: &'a EngineConfig,
}

impl<'a> ValuableGenerator<'a> {
    /// Creates a generator over validated reference data.
    #[must_use]
    pub const fn new(reference: &'a ReferenceData, config: &'a EngineConfig) -> Self {
        Self { reference, config }
    }

    /// Generates `count` items worth `value_per_item` gp each.
    ///
    /// A value below the lowest tier is logged and yields no items.
    ///
    /// # Errors
    ///
    /// Propagates ledger failures and value overflow.
    pub fn generate(
        &self,
        ledger: &mut RollLedger,
        count: u64,
        value_per_item: u64,
        kind: ValuableKind,
    ) -> TreasureResult<Vec<LootItem>> {
        let tier = match tier_for(kind, value_per_item) {
            Ok(tier) => tier,
            Err(err) => {
                error!(error = %err, "no items generated");
                return Ok(Vec::new());
            }
        };

        let pool = self.reference.pool(kind, tier);
        let label = pool_key(kind, tier);
        let value_copper = value_per_item
            .checked_mul(self.config.rates.gp)
            .ok_or(TreasureError::ArithmeticOverflow)?;
        let (loot_kind, weight) = match kind {
            ValuableKind::Gems => (LootKind::Gem, self.config.gem_weight),
            ValuableKind::ArtObjects => (LootKind::ArtObject, self.config.art_weight),
        };

        (0..count)
            .map(|_| {
                let name = ledger.pick(pool, &label)?;
                Ok::<_, TreasureError>(LootItem {
                    name: format!("{name} ({value_per_item} GP)"),
                    kind: loot_kind,
                    value_copper,
                    weight,
                    magic: None,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::FixedPoint;
    use crate::reference::fixtures;

    #[test]
    fn test_tier_for() {
        assert_eq!(tier_for(ValuableKind::Gems, 10).unwrap(), 10);
        assert_eq!(tier_for(ValuableKind::Gems, 75).unwrap(), 50);
        assert_eq!(tier_for(ValuableKind::Gems, 9_999).unwrap(), 5000);
        assert_eq!(tier_for(ValuableKind::ArtObjects, 250).unwrap(), 250);
        assert_eq!(
            tier_for(ValuableKind::ArtObjects, 24),
            Err(TreasureError::TierNotFound {
                kind: "art objects".into(),
                value: 24
            })
        );
    }

    #[test]
    fn test_pool_keys() {
        assert_eq!(pool_key(ValuableKind::Gems, 1000), "1000 GP Gemstones");
        assert_eq!(pool_key(ValuableKind::ArtObjects, 7500), "7500 GP Art Objects");
    }

    #[test]
    fn test_generate_gems() {
        let reference = fixtures::reference();
        let config = EngineConfig::default();
        let generator = ValuableGenerator::new(&reference, &config);
        // First pick lands on "a", second on "b"
        let mut ledger = RollLedger::scripted([1, 2]);

        let gems = generator.generate(&mut ledger, 2, 50, ValuableKind::Gems).unwrap();
        assert_eq!(gems.len(), 2);
        assert_eq!(gems[0].name, "gems 50 a (50 GP)");
        assert_eq!(gems[1].name, "gems 50 b (50 GP)");
        assert_eq!(gems[0].value_copper, 5000);
        assert_eq!(gems[0].weight, FixedPoint::from_parts(0, 10_000));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_generate_art_between_tiers() {
        let reference = fixtures::reference();
        let config = EngineConfig::default();
        let generator = ValuableGenerator::new(&reference, &config);
        let mut ledger = RollLedger::seeded(3);

        let art = generator.generate(&mut ledger, 3, 300, ValuableKind::ArtObjects).unwrap();
        assert_eq!(art.len(), 3);
        for item in &art {
            assert!(item.name.starts_with("art objects 250 "));
            assert!(item.name.ends_with("(300 GP)"));
            assert_eq!(item.kind, LootKind::ArtObject);
            assert_eq!(item.weight, FixedPoint::ONE);
        }
    }

    #[test]
    fn test_below_lowest_tier_is_empty() {
        let reference = fixtures::reference();
        let config = EngineConfig::default();
        let generator = ValuableGenerator::new(&reference, &config);
        let mut ledger = RollLedger::seeded(0);

        let gems = generator.generate(&mut ledger, 4, 5, ValuableKind::Gems).unwrap();
        assert!(gems.is_empty());
        assert!(ledger.is_empty());
    }
}
