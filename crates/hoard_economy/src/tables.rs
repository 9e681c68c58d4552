//! # Treasure Tables
//!
//! **From (treasure type, difficulty band) to a finished bundle.**
//!
//! ## Table shape
//!
//! ```text
//! ProbabilityTable
//! └── (Individual | Hoard, band)
//!     ├── coins   RewardRow          Hoard only, always awarded
//!     └── d100    [start, end] -> RewardRow, partitioning 1..=100
//! ```
//!
//! ## Resolution
//!
//! ```text
//! lookup table ──► Hoard? award coins row ──► roll d100 ──► matching row
//!                                                              │
//!         each non-empty cell ─► parse_reward ─► RewardSpec ───┘
//!             coins        -> purse
//!             tiered pick  -> gems / art objects
//!             table rolls  -> magic items
//! ```
//!
//! Generation runs inside [`RollLedger::atomic`]: a fatal error discards the
//! rolls and returns no bundle.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bundle::TreasureBundle;
use crate::config::EngineConfig;
use crate::currency::Currency;
use crate::error::{TreasureError, TreasureResult};
use crate::expression::{parse_reward, parse_reward_report, Category, RewardSpec, ValuableKind};
use crate::ledger::RollLedger;
use crate::magic::MagicItemGenerator;
use crate::reference::ReferenceData;
use crate::valuables::ValuableGenerator;
use crate::variants::VariantTable;

/// Bundled treasure tables.
pub const STANDARD_TABLES: &str = include_str!("../data/treasure_tables.toml");

/// Label of the d100 roll in the ledger.
pub const TABLE_ROLL_LABEL: &str = "Treasure Table Roll";

/// Treasure table family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreasureType {
    /// Coins carried by individual creatures.
    Individual,
    /// A lair or dungeon hoard.
    Hoard,
}

impl TreasureType {
    /// Both families.
    pub const ALL: [Self; 2] = [Self::Individual, Self::Hoard];

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Individual => "Individual",
            Self::Hoard => "Hoard",
        }
    }
}

impl fmt::Display for TreasureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TreasureType {
    type Err = TreasureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "individual" => Ok(Self::Individual),
            "hoard" => Ok(Self::Hoard),
            other => Err(TreasureError::TableNotFound {
                kind: other.to_string(),
                band: String::new(),
            }),
        }
    }
}

/// Challenge rating bucket selecting a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DifficultyBand {
    /// Challenge 0-4.
    Cr0To4,
    /// Challenge 5-10.
    Cr5To10,
    /// Challenge 11-16.
    Cr11To16,
    /// Challenge 17 and up.
    Cr17Plus,
}

impl DifficultyBand {
    /// Every band, lowest first.
    pub const ALL: [Self; 4] = [Self::Cr0To4, Self::Cr5To10, Self::Cr11To16, Self::Cr17Plus];

    /// Table label: "0-4", "5-10", "11-16", "17+".
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cr0To4 => "0-4",
            Self::Cr5To10 => "5-10",
            Self::Cr11To16 => "11-16",
            Self::Cr17Plus => "17+",
        }
    }

    /// Band containing a challenge rating. Fractional ratings below 1 belong
    /// to the lowest band.
    #[must_use]
    pub const fn from_challenge_rating(cr: u32) -> Self {
        match cr {
            0..=4 => Self::Cr0To4,
            5..=10 => Self::Cr5To10,
            11..=16 => Self::Cr11To16,
            _ => Self::Cr17Plus,
        }
    }
}

impl fmt::Display for DifficultyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DifficultyBand {
    type Err = TreasureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().replace(['–', '—'], "-");
        Self::ALL
            .into_iter()
            .find(|band| band.label() == label)
            .ok_or_else(|| TreasureError::TableNotFound {
                kind: String::new(),
                band: s.trim().to_string(),
            })
    }
}

impl TryFrom<String> for DifficultyBand {
    type Error = TreasureError;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        label.parse()
    }
}

impl From<DifficultyBand> for String {
    fn from(band: DifficultyBand) -> Self {
        band.label().to_string()
    }
}

/// Reward cells of one table row. `None` means no reward from that column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewardRow {
    /// Copper column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cp: Option<String>,
    /// Silver column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp: Option<String>,
    /// Electrum column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ep: Option<String>,
    /// Gold column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gp: Option<String>,
    /// Platinum column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp: Option<String>,
    /// Gems or art objects column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gems_art: Option<String>,
    /// Magic item instructions column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magic_items: Option<String>,
}

impl RewardRow {
    /// Present cells with the category each cell defaults to, in column order.
    ///
    /// The gems/art column defaults to gems; magic item cells have no default.
    pub fn cells(&self) -> impl Iterator<Item = (Option<Category>, &str)> {
        let coin = |c| Some(Category::Coin(c));
        [
            (coin(Currency::Cp), &self.cp),
            (coin(Currency::Sp), &self.sp),
            (coin(Currency::Ep), &self.ep),
            (coin(Currency::Gp), &self.gp),
            (coin(Currency::Pp), &self.pp),
            (Some(Category::Valuable(ValuableKind::Gems)), &self.gems_art),
            (None, &self.magic_items),
        ]
        .into_iter()
        .filter_map(|(category, cell)| cell.as_deref().map(|text| (category, text)))
    }
}

/// One d100 range and its rewards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RangeRow {
    /// First roll covered.
    pub start: u8,
    /// Last roll covered, inclusive.
    pub end: u8,
    /// Rewards.
    pub row: RewardRow,
}

impl RangeRow {
    /// Whether `roll` falls in `[start, end]`.
    #[must_use]
    pub fn covers(&self, roll: u64) -> bool {
        (u64::from(self.start)..=u64::from(self.end)).contains(&roll)
    }
}

/// The tables of one (type, band).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BandTable {
    coins: Option<RewardRow>,
    d100: Vec<RangeRow>,
}

impl BandTable {
    /// The guaranteed coins row of a hoard.
    #[must_use]
    pub const fn coins(&self) -> Option<&RewardRow> {
        self.coins.as_ref()
    }

    /// The d100 rows, ordered by range.
    #[must_use]
    pub fn rows(&self) -> &[RangeRow] {
        &self.d100
    }

    /// Row covering a d100 roll.
    #[must_use]
    pub fn row_for(&self, roll: u64) -> Option<&RangeRow> {
        self.d100.iter().find(|row| row.covers(roll))
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBand {
    coins: Option<RewardRow>,
    d100: BTreeMap<String, RewardRow>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTables {
    individual: BTreeMap<String, RawBand>,
    hoard: BTreeMap<String, RawBand>,
}

/// Parses "01-30", "96-100", "100", "00" or "96-00" into a closed range.
///
/// # Errors
///
/// Returns `DataIntegrity` for malformed or out-of-order bounds.
pub fn parse_range(label: &str) -> TreasureResult<(u8, u8)> {
    let invalid = || TreasureError::DataIntegrity(format!("invalid d100 range '{label}'"));
    let bound = |text: &str| -> TreasureResult<u8> {
        let text = text.trim();
        if text == "00" {
            return Ok(100);
        }
        match text.parse::<u8>() {
            Ok(value @ 1..=100) => Ok(value),
            _ => Err(invalid()),
        }
    };
    let (start, end) = match label.split_once('-') {
        Some((start, end)) => (bound(start)?, bound(end)?),
        None => {
            let single = bound(label)?;
            (single, single)
        }
    };
    if start > end {
        return Err(invalid());
    }
    Ok((start, end))
}

/// Every (type, band) table, validated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbabilityTable {
    tables: BTreeMap<(TreasureType, DifficultyBand), BandTable>,
}

impl ProbabilityTable {
    /// The bundled tables.
    ///
    /// # Errors
    ///
    /// Returns `DataIntegrity` if the bundled data fails validation.
    pub fn standard() -> TreasureResult<Self> {
        Self::from_toml_str(STANDARD_TABLES)
    }

    /// Parses and validates tables from TOML.
    ///
    /// # Errors
    ///
    /// Returns `DataIntegrity` for malformed TOML, unknown bands, bad ranges
    /// or any check of [`ProbabilityTable::validate`].
    pub fn from_toml_str(text: &str) -> TreasureResult<Self> {
        let raw: RawTables = toml::from_str(text).map_err(|e| TreasureError::DataIntegrity(e.to_string()))?;
        let mut tables = BTreeMap::new();
        for (kind, bands) in [(TreasureType::Individual, raw.individual), (TreasureType::Hoard, raw.hoard)] {
            for (band_label, band) in bands {
                let band_key: DifficultyBand = band_label
                    .parse()
                    .map_err(|_| TreasureError::DataIntegrity(format!("unknown difficulty band '{band_label}'")))?;
                let mut d100 = band
                    .d100
                    .into_iter()
                    .map(|(label, row)| parse_range(&label).map(|(start, end)| RangeRow { start, end, row }))
                    .collect::<TreasureResult<Vec<_>>>()?;
                d100.sort_by_key(|row| row.start);
                tables.insert(
                    (kind, band_key),
                    BandTable {
                        coins: band.coins,
                        d100,
                    },
                );
            }
        }

        let table = Self { tables };
        table.validate()?;
        debug!(tables = table.tables.len(), "treasure tables loaded");
        Ok(table)
    }

    /// Checks the table invariants.
    ///
    /// - Every (type, band) pair is present.
    /// - Hoard bands have a coins row and Individual bands do not.
    /// - Each d100 axis partitions `1..=100` with no gap or overlap.
    /// - Every cell parses with no dropped clause.
    ///
    /// # Errors
    ///
    /// Returns `DataIntegrity` describing the first failed check.
    pub fn validate(&self) -> TreasureResult<()> {
        for kind in TreasureType::ALL {
            for band in DifficultyBand::ALL {
                let table = self
                    .tables
                    .get(&(kind, band))
                    .ok_or_else(|| TreasureError::DataIntegrity(format!("no {kind} table for band {band}")))?;
                let context = format!("{kind} {band}");

                match (kind, &table.coins) {
                    (TreasureType::Hoard, None) => {
                        return Err(TreasureError::DataIntegrity(format!("{context} has no coins row")));
                    }
                    (TreasureType::Individual, Some(_)) => {
                        return Err(TreasureError::DataIntegrity(format!("{context} has a coins row")));
                    }
                    _ => {}
                }

                check_partition(&table.d100, &context)?;
                for row in table.coins.iter().chain(table.d100.iter().map(|r| &r.row)) {
                    check_cells(row, &context)?;
                }
            }
        }
        Ok(())
    }

    /// Table for a (type, band).
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` if the pair has no table.
    pub fn get(&self, kind: TreasureType, band: DifficultyBand) -> TreasureResult<&BandTable> {
        self.tables.get(&(kind, band)).ok_or_else(|| TreasureError::TableNotFound {
            kind: kind.to_string(),
            band: band.to_string(),
        })
    }

    /// Every (type, band) with its table.
    pub fn iter(&self) -> impl Iterator<Item = (TreasureType, DifficultyBand, &BandTable)> {
        self.tables.iter().map(|(&(kind, band), table)| (kind, band, table))
    }
}

fn check_partition(rows: &[RangeRow], context: &str) -> TreasureResult<()> {
    let mut next = 1u8;
    for row in rows {
        if row.start != next {
            return Err(TreasureError::DataIntegrity(format!(
                "{context} d100 ranges do not partition 1-100: expected a range starting at {next}, found {}-{}",
                row.start, row.end
            )));
        }
        next = row.end.saturating_add(1);
    }
    if next != 101 {
        return Err(TreasureError::DataIntegrity(format!(
            "{context} d100 ranges stop at {}",
            next - 1
        )));
    }
    Ok(())
}

fn check_cells(row: &RewardRow, context: &str) -> TreasureResult<()> {
    for (category, cell) in row.cells() {
        if let Some((_, dropped)) = parse_reward_report(cell, category) {
            if let Some(err) = dropped.first() {
                return Err(TreasureError::DataIntegrity(format!("{context}: '{cell}': {err}")));
            }
        }
    }
    Ok(())
}

/// Resolves treasure tables into bundles.
#[derive(Clone, Copy, Debug)]
pub struct TreasureGenerator<'a> {
    tables: &'a ProbabilityTable,
    valuables: ValuableGenerator<'a>,
    magic: MagicItemGenerator<'a>,
}

impl<'a> TreasureGenerator<'a> {
    /// Creates a generator over validated tables and reference data.
    #[must_use]
    pub const fn new(
        tables: &'a ProbabilityTable,
        reference: &'a ReferenceData,
        config: &'a EngineConfig,
        variants: &'a VariantTable,
    ) -> Self {
        Self {
            tables,
            valuables: ValuableGenerator::new(reference, config),
            magic: MagicItemGenerator::new(reference, config, variants),
        }
    }

    /// Generates one bundle of `kind` treasure for `band`.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` for a missing table and propagates fatal
    /// generation errors. On error the ledger keeps none of the call's rolls.
    pub fn generate(
        &self,
        ledger: &mut RollLedger,
        kind: TreasureType,
        band: DifficultyBand,
    ) -> TreasureResult<TreasureBundle> {
        ledger.atomic(|ledger| {
            let table = self.tables.get(kind, band)?;
            let mut bundle = TreasureBundle::new();

            if kind == TreasureType::Hoard {
                if let Some(coins) = table.coins() {
                    self.apply_row(ledger, coins, &mut bundle)?;
                }
            }

            let roll = ledger.roll(1, 100, TABLE_ROLL_LABEL)?;
            let row = table.row_for(roll).ok_or_else(|| {
                TreasureError::DataIntegrity(format!("{kind} {band} has no row for d100 roll {roll}"))
            })?;
            debug!(%kind, %band, roll, start = row.start, end = row.end, "table row selected");
            self.apply_row(ledger, &row.row, &mut bundle)?;

            info!(
                %kind,
                %band,
                coins = %bundle.coins,
                gems = bundle.gems.len(),
                art_objects = bundle.art_objects.len(),
                magic_items = bundle.magic_items.len(),
                "treasure generated"
            );
            Ok(bundle)
        })
    }

    fn apply_row(&self, ledger: &mut RollLedger, row: &RewardRow, bundle: &mut TreasureBundle) -> TreasureResult<()> {
        for (category, cell) in row.cells() {
            for spec in parse_reward(cell, category).unwrap_or_default() {
                self.apply_spec(ledger, &spec, bundle)?;
            }
        }
        Ok(())
    }

    fn apply_spec(&self, ledger: &mut RollLedger, spec: &RewardSpec, bundle: &mut TreasureBundle) -> TreasureResult<()> {
        match *spec {
            RewardSpec::FixedAmount { .. } | RewardSpec::DiceTotal { .. } | RewardSpec::DiceMultiplied { .. } => {
                if let Some((currency, amount)) = spec.roll_coins(ledger)? {
                    bundle.coins.add(currency, amount)?;
                }
            }
            RewardSpec::TieredPick {
                dice,
                value_per_item,
                category,
            } => {
                let count = dice.roll(ledger, format!("{dice} {value_per_item} gp {category}"))?;
                for item in self.valuables.generate(ledger, count, value_per_item, category)? {
                    bundle.push(item);
                }
            }
            RewardSpec::TableRoll { dice, table } => {
                let times = dice.roll(ledger, format!("{dice} times on {table}"))?;
                for _ in 0..times {
                    bundle.push(self.magic.generate(ledger, table)?);
                }
            }
            RewardSpec::SingleTableRoll { table } => {
                bundle.push(self.magic.generate(ledger, table)?);
            }
        }
        Ok(())
    }
}
