//! # Magic Item Generator
//!
//! One draw on a magic item table:
//!
//! ```text
//! 1. roll a rarity tier          (configured rarity weights)
//! 2. keep the table's entries of that rarity
//!    └── none left? use the whole table
//! 3. weighted pick of one entry
//! 4. look up the base item record
//! 5. specialize unique items     (VariantTable)
//! ```
//!
//! Every step draws from the roll ledger, so a draw is fully described by the
//! records it leaves behind.

use tracing::debug;

use crate::bundle::{LootItem, LootKind, MagicDetails};
use crate::config::EngineConfig;
use crate::error::{TreasureError, TreasureResult};
use crate::expression::MagicTable;
use crate::ledger::RollLedger;
use crate::reference::{Rarity, ReferenceData, WeightedTableEntry};
use crate::variants::VariantTable;

/// Label of the rarity roll in the ledger.
pub const RARITY_LABEL: &str = "Magic Item Rarity";

/// Draws magic items from validated reference data.
#[derive(Clone, Copy, Debug)]
pub struct MagicItemGenerator<'a> {
    reference: &'a ReferenceData,
    config: &'a EngineConfig,
    variants: &'a VariantTable,
}

impl<'a> MagicItemGenerator<'a> {
    /// Creates a generator.
    #[must_use]
    pub const fn new(reference: &'a ReferenceData, config: &'a EngineConfig, variants: &'a VariantTable) -> Self {
        Self {
            reference,
            config,
            variants,
        }
    }

    /// Rolls a rarity tier from the configured distribution.
    ///
    /// # Errors
    ///
    /// Returns `EmptyDistribution` if every rarity weight is zero.
    pub fn sample_rarity(&self, ledger: &mut RollLedger) -> TreasureResult<Rarity> {
        let index = ledger.weighted_index(&self.config.rarity_weights.as_array(), RARITY_LABEL)?;
        Ok(Rarity::SAMPLED[index])
    }

    /// Draws one item from `table`.
    ///
    /// # Errors
    ///
    /// Returns `EmptyDistribution` if neither the rarity-filtered entries nor
    /// the full table carry weight, and propagates ledger failures.
    pub fn generate(&self, ledger: &mut RollLedger, table: MagicTable) -> TreasureResult<LootItem> {
        let rarity = self.sample_rarity(ledger)?;
        self.generate_with_rarity(ledger, table, rarity)
    }

    /// Draws one item from `table`, preferring entries of `rarity`.
    ///
    /// When the table has no weighted entry of that rarity the whole table is
    /// used instead.
    ///
    /// # Errors
    ///
    /// As [`MagicItemGenerator::generate`].
    pub fn generate_with_rarity(
        &self,
        ledger: &mut RollLedger,
        table: MagicTable,
        rarity: Rarity,
    ) -> TreasureResult<LootItem> {
        let entries = self.reference.table(table);
        let filtered: Vec<&WeightedTableEntry> = entries
            .iter()
            .filter(|e| self.reference.base_item(&e.id).is_some_and(|item| item.rarity == rarity))
            .collect();

        let label = table.data_key();
        let entry = if filtered.iter().any(|e| e.weight > 0) {
            *ledger.weighted_choice(&filtered, &label)?
        } else {
            debug!(%table, %rarity, "no entries of rarity, drawing from the full table");
            ledger.weighted_choice(entries, &label)?
        };

        let record = self
            .reference
            .base_item(&entry.id)
            .ok_or_else(|| TreasureError::DataIntegrity(format!("{table} references unknown base item '{}'", entry.id)))?;
        let name = self.variants.resolve(&record.name, ledger)?;

        let value_copper = match record.value {
            Some(gp) => self.config.rates.gp_to_copper(gp)?,
            None => self
                .config
                .estimated_value(record.rarity)
                .checked_mul(self.config.rates.gp)
                .ok_or(TreasureError::ArithmeticOverflow)?,
        };

        debug!(%table, item = %name, rarity = %record.rarity, "magic item drawn");
        Ok(LootItem {
            name,
            kind: LootKind::MagicItem,
            value_copper,
            weight: record.weight,
            magic: Some(MagicDetails {
                base_id: entry.id.clone(),
                item_type: record.item_type.clone(),
                rarity: record.rarity,
                requires_attunement: record.requires_attunement,
                description: record.description.clone(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::expression::ValuableKind;
    use crate::fixed_point::FixedPoint;
    use crate::reference::fixtures::{entry, item, pools};

    fn table(letter: char) -> MagicTable {
        MagicTable::new(letter).unwrap()
    }

    fn mixed_reference() -> ReferenceData {
        let mut items = HashMap::new();
        items.insert("potion".to_string(), item("Potion of Healing", Rarity::Common));
        let mut ring = item("Ring of Protection", Rarity::Rare);
        ring.requires_attunement = true;
        ring.value = Some(FixedPoint::from_whole(3_500));
        items.insert("ring".to_string(), ring);
        items.insert("deck".to_string(), item("Deck of Many Things", Rarity::Legendary));

        let tables = MagicTable::ALL
            .into_iter()
            .map(|t| {
                let entries = if t == table('A') {
                    vec![entry("ring", 1)]
                } else {
                    vec![entry("potion", 5), entry("ring", 2), entry("deck", 1)]
                };
                (t, entries)
            })
            .collect();
        ReferenceData::new(tables, items, pools(ValuableKind::Gems), pools(ValuableKind::ArtObjects)).unwrap()
    }

    #[test]
    fn test_rarity_distribution() {
        let reference = mixed_reference();
        let config = EngineConfig::default();
        let variants = VariantTable::standard();
        let generator = MagicItemGenerator::new(&reference, &config, &variants);

        // 50 | 30 | 15 | 4 | 1
        let cases = [(1, Rarity::Common), (51, Rarity::Uncommon), (95, Rarity::Rare), (99, Rarity::VeryRare), (100, Rarity::Legendary)];
        for (draw, expected) in cases {
            let mut ledger = RollLedger::scripted([draw]);
            assert_eq!(generator.sample_rarity(&mut ledger).unwrap(), expected, "draw {draw}");
            assert_eq!(ledger.last().unwrap().label, format!("Rolling on {RARITY_LABEL}"));
        }
    }

    #[test]
    fn test_filters_by_rarity() {
        let reference = mixed_reference();
        let config = EngineConfig::default();
        let variants = VariantTable::standard();
        let generator = MagicItemGenerator::new(&reference, &config, &variants);

        let mut ledger = RollLedger::seeded(11);
        for _ in 0..20 {
            let drawn = generator.generate_with_rarity(&mut ledger, table('B'), Rarity::Rare).unwrap();
            assert_eq!(drawn.name, "Ring of Protection");
            let details = drawn.magic.unwrap();
            assert!(details.requires_attunement);
            assert_eq!(details.rarity, Rarity::Rare);
            assert_eq!(drawn.value_copper, 350_000);
        }
    }

    #[test]
    fn test_falls_back_to_full_table() {
        let reference = mixed_reference();
        let config = EngineConfig::default();
        let variants = VariantTable::standard();
        let generator = MagicItemGenerator::new(&reference, &config, &variants);

        // table A holds only a rare ring; a common draw uses the whole table
        let mut ledger = RollLedger::scripted([1, 1]);
        let drawn = generator.generate(&mut ledger, table('A')).unwrap();
        assert_eq!(drawn.name, "Ring of Protection");
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_estimated_value_and_variant() {
        let reference = mixed_reference();
        let config = EngineConfig::default();
        let variants = VariantTable::standard();
        let generator = MagicItemGenerator::new(&reference, &config, &variants);

        // legendary tier, only entry, then card 12
        let mut ledger = RollLedger::scripted([100, 1, 12]);
        let drawn = generator.generate(&mut ledger, table('C')).unwrap();
        assert_eq!(drawn.name, "Deck of Many Things (Outcome: Star)");
        assert_eq!(drawn.value_copper, 100_000 * 100);
        assert_eq!(drawn.magic.unwrap().base_id, "deck");
    }
}
