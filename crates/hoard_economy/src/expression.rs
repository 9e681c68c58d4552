//! # Reward Expressions
//!
//! Compiles the reward cells of the treasure tables into [`RewardSpec`]s.
//!
//! ## Grammar
//!
//! A cell is one or more clauses joined by `+` (or `and` between magic item
//! instructions). Each clause is classified by the first pattern that
//! matches, in this order:
//!
//! ```text
//! 1. NdM * K [coin]                      -> DiceMultiplied   ("4d6 x 100")
//! 2. NdM lV [coin] [gems|art objects]    -> TieredPick       ("2d6 l50 gp gems")
//! 3. NdM [coin]                          -> DiceTotal        ("5d6")
//! 4. K [coin]                            -> FixedAmount      ("50 gp")
//! 5. [Roll] NdM times on Magic Item Table X -> TableRoll
//! 6. [Roll] once on Magic Item Table X      -> SingleTableRoll
//! ```
//!
//! Matching is case-insensitive. `*`, `x` and `×` all multiply. A cell that is
//! empty or a lone dash means "no reward".
//!
//! Parsing is pure: no dice are rolled here. Specs are rolled later by the
//! table resolver against the roll ledger.

use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::currency::Currency;
use crate::error::{TreasureError, TreasureResult};
use crate::ledger::RollLedger;

/// Gem or art object, the two tiered valuable pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValuableKind {
    /// Gemstones.
    #[serde(rename = "gems")]
    Gems,
    /// Art objects.
    #[serde(rename = "art objects")]
    ArtObjects,
}

impl ValuableKind {
    /// Plural label as written in the tables.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Gems => "gems",
            Self::ArtObjects => "art objects",
        }
    }
}

impl fmt::Display for ValuableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Category a cell falls back to when a clause names none.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// A coin column (CP, SP, ...).
    Coin(Currency),
    /// The gems/art column.
    Valuable(ValuableKind),
}

/// `count` dice with `sides` sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dice {
    /// Number of dice.
    pub count: u64,
    /// Sides per die.
    pub sides: u64,
}

impl Dice {
    /// `count`d`sides`.
    #[must_use]
    pub const fn new(count: u64, sides: u64) -> Self {
        Self { count, sides }
    }

    /// Rolls the dice on the ledger.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDice` for unrollable dice.
    pub fn roll(self, ledger: &mut RollLedger, label: impl Into<String>) -> TreasureResult<u64> {
        ledger.roll(self.count, self.sides, label)
    }
}

impl fmt::Display for Dice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)
    }
}

/// One of the magic item tables A through I.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct MagicTable(char);

impl MagicTable {
    /// Every table letter, A through I.
    pub const ALL: [Self; 9] = [
        Self('A'),
        Self('B'),
        Self('C'),
        Self('D'),
        Self('E'),
        Self('F'),
        Self('G'),
        Self('H'),
        Self('I'),
    ];

    /// Table for `letter` (either case), if it is A through I.
    #[must_use]
    pub fn new(letter: char) -> Option<Self> {
        let letter = letter.to_ascii_uppercase();
        ('A'..='I').contains(&letter).then_some(Self(letter))
    }

    /// Uppercase table letter.
    #[must_use]
    pub const fn letter(self) -> char {
        self.0
    }

    /// The name the table carries in reference data, e.g. "Magic Item Table A".
    #[must_use]
    pub fn data_key(self) -> String {
        format!("Magic Item Table {}", self.0)
    }
}

impl TryFrom<char> for MagicTable {
    type Error = TreasureError;

    fn try_from(letter: char) -> Result<Self, Self::Error> {
        Self::new(letter).ok_or_else(|| TreasureError::DataIntegrity(format!("no magic item table '{letter}'")))
    }
}

impl From<MagicTable> for char {
    fn from(table: MagicTable) -> Self {
        table.0
    }
}

impl fmt::Display for MagicTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Magic Item Table {}", self.0)
    }
}

/// A structured reward parsed from one clause.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardSpec {
    /// A fixed number of coins.
    FixedAmount {
        /// Coins awarded.
        amount: u64,
        /// Coin type.
        currency: Currency,
    },
    /// The dice total, in coins.
    DiceTotal {
        /// Dice to roll.
        dice: Dice,
        /// Coin type.
        currency: Currency,
    },
    /// The dice total times a multiplier, in coins.
    DiceMultiplied {
        /// Dice to roll.
        dice: Dice,
        /// Multiplier applied to the total.
        multiplier: u64,
        /// Coin type.
        currency: Currency,
    },
    /// Roll the dice for a count of gems or art objects worth `value_per_item` gp.
    TieredPick {
        /// Dice giving the item count.
        dice: Dice,
        /// Nominal gp value per item.
        value_per_item: u64,
        /// Gem or art pool.
        category: ValuableKind,
    },
    /// Roll the dice for a number of draws on a magic item table.
    TableRoll {
        /// Dice giving the draw count.
        dice: Dice,
        /// Table drawn from.
        table: MagicTable,
    },
    /// One draw on a magic item table.
    SingleTableRoll {
        /// Table drawn from.
        table: MagicTable,
    },
}

impl RewardSpec {
    /// Rolls a coin reward, returning the currency and coin count.
    ///
    /// Returns `Ok(None)` for specs that do not produce coins.
    ///
    /// # Errors
    ///
    /// Propagates roll failures and multiplier overflow.
    pub fn roll_coins(&self, ledger: &mut RollLedger) -> TreasureResult<Option<(Currency, u64)>> {
        match *self {
            Self::FixedAmount { amount, currency } => Ok(Some((currency, amount))),
            Self::DiceTotal { dice, currency } => {
                let total = dice.roll(ledger, format!("{dice} {currency}"))?;
                Ok(Some((currency, total)))
            }
            Self::DiceMultiplied {
                dice,
                multiplier,
                currency,
            } => {
                let total = dice.roll(ledger, format!("{dice} x {multiplier} {currency}"))?;
                let coins = total.checked_mul(multiplier).ok_or(TreasureError::ArithmeticOverflow)?;
                Ok(Some((currency, coins)))
            }
            Self::TieredPick { .. } | Self::TableRoll { .. } | Self::SingleTableRoll { .. } => Ok(None),
        }
    }
}

struct Patterns {
    multiplied: Regex,
    tiered: Regex,
    dice: Regex,
    fixed: Regex,
    table_roll: Regex,
    single_roll: Regex,
    conjunction: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |p: &str| Regex::new(p).expect("reward grammar patterns are valid");
        Patterns {
            multiplied: compile(r"^(\d+)d(\d+)\s*[*x×]\s*(\d+)\s*(cp|sp|ep|gp|pp)?$"),
            tiered: compile(r"^(\d+)d(\d+)\s*l\s*(\d+)\s*(cp|sp|ep|gp|pp)?\s*(gems?|art objects?)?$"),
            dice: compile(r"^(\d+)d(\d+)\s*(cp|sp|ep|gp|pp)?$"),
            fixed: compile(r"^(\d+)\s*(cp|sp|ep|gp|pp)?$"),
            table_roll: compile(r"^(?:roll\s+)?(\d+)d(\d+)\s+times?\s+on\s+magic\s+item\s+table\s+([a-i])$"),
            single_roll: compile(r"^(?:roll\s+)?once\s+on\s+magic\s+item\s+table\s+([a-i])$"),
            conjunction: compile(r"\s+and\s+"),
        }
    })
}

/// True for text that means "no reward": empty or a lone dash.
#[must_use]
pub fn is_no_reward(cell: &str) -> bool {
    matches!(cell.trim(), "" | "-" | "–" | "—")
}

/// Splits a cell into trimmed, lowercased, non-empty clauses in input order.
fn split_clauses(cell: &str) -> Vec<String> {
    let lowered = cell.trim().to_lowercase();
    lowered
        .split('+')
        .flat_map(|part| patterns().conjunction.split(part))
        .map(str::trim)
        .filter(|clause| !is_no_reward(clause))
        .map(str::to_string)
        .collect()
}

fn number(caps: &Captures<'_>, index: usize, clause: &str) -> TreasureResult<u64> {
    caps.get(index)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| TreasureError::UnrecognizedExpression(clause.to_string()))
}

fn dice(caps: &Captures<'_>, clause: &str) -> TreasureResult<Dice> {
    Ok(Dice::new(number(caps, 1, clause)?, number(caps, 2, clause)?))
}

fn currency(caps: &Captures<'_>, index: usize) -> Option<Currency> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

fn coin_or_default(explicit: Option<Currency>, default: Option<Category>, clause: &str) -> TreasureResult<Currency> {
    match (explicit, default) {
        (Some(currency), _) | (None, Some(Category::Coin(currency))) => Ok(currency),
        _ => Err(TreasureError::MissingCategory(clause.to_string())),
    }
}

fn magic_table(caps: &Captures<'_>, index: usize, clause: &str) -> TreasureResult<MagicTable> {
    caps.get(index)
        .and_then(|m| m.as_str().chars().next())
        .and_then(MagicTable::new)
        .ok_or_else(|| TreasureError::UnrecognizedExpression(clause.to_string()))
}

/// Classifies a single clause.
///
/// # Errors
///
/// - `UnrecognizedExpression` if no pattern matches.
/// - `MissingCategory` if the clause needs a currency or category and
///   neither the clause nor `default` supplies one.
pub fn parse_clause(clause: &str, default: Option<Category>) -> TreasureResult<RewardSpec> {
    let clause = clause.trim().to_lowercase();
    let p = patterns();

    if let Some(caps) = p.multiplied.captures(&clause) {
        return Ok(RewardSpec::DiceMultiplied {
            dice: dice(&caps, &clause)?,
            multiplier: number(&caps, 3, &clause)?,
            currency: coin_or_default(currency(&caps, 4), default, &clause)?,
        });
    }

    if let Some(caps) = p.tiered.captures(&clause) {
        let explicit = caps.get(5).map(|m| {
            if m.as_str().starts_with("gem") {
                ValuableKind::Gems
            } else {
                ValuableKind::ArtObjects
            }
        });
        // An explicit pool wins; a bare "gp" denotes gems; then the column default.
        let fallback = match default {
            Some(Category::Valuable(kind)) => Some(kind),
            _ => None,
        };
        let category = explicit
            .or_else(|| (currency(&caps, 4) == Some(Currency::Gp)).then_some(ValuableKind::Gems))
            .or(fallback)
            .ok_or_else(|| TreasureError::MissingCategory(clause.clone()))?;
        return Ok(RewardSpec::TieredPick {
            dice: dice(&caps, &clause)?,
            value_per_item: number(&caps, 3, &clause)?,
            category,
        });
    }

    if let Some(caps) = p.dice.captures(&clause) {
        return Ok(RewardSpec::DiceTotal {
            dice: dice(&caps, &clause)?,
            currency: coin_or_default(currency(&caps, 3), default, &clause)?,
        });
    }

    if let Some(caps) = p.fixed.captures(&clause) {
        return Ok(RewardSpec::FixedAmount {
            amount: number(&caps, 1, &clause)?,
            currency: coin_or_default(currency(&caps, 2), default, &clause)?,
        });
    }

    if let Some(caps) = p.table_roll.captures(&clause) {
        return Ok(RewardSpec::TableRoll {
            dice: dice(&caps, &clause)?,
            table: magic_table(&caps, 3, &clause)?,
        });
    }

    if let Some(caps) = p.single_roll.captures(&clause) {
        return Ok(RewardSpec::SingleTableRoll {
            table: magic_table(&caps, 1, &clause)?,
        });
    }

    Err(TreasureError::UnrecognizedExpression(clause))
}

/// Parses every clause of a cell, keeping the failures alongside the specs.
///
/// Returns `None` for a "no reward" cell.
#[must_use]
pub fn parse_reward_report(
    cell: &str,
    default: Option<Category>,
) -> Option<(Vec<RewardSpec>, Vec<TreasureError>)> {
    if is_no_reward(cell) {
        return None;
    }
    let mut specs = Vec::new();
    let mut dropped = Vec::new();
    for clause in split_clauses(cell) {
        match parse_clause(&clause, default) {
            Ok(spec) => specs.push(spec),
            Err(err) => dropped.push(err),
        }
    }
    Some((specs, dropped))
}

/// Parses a reward cell into specs, in clause order.
///
/// Clauses that fail to parse are logged and skipped; parsing continues with
/// the remaining clauses. Returns `None` only for a "no reward" cell; a cell
/// in which no clause survived yields an empty list.
#[must_use]
pub fn parse_reward(cell: &str, default: Option<Category>) -> Option<Vec<RewardSpec>> {
    let (specs, dropped) = parse_reward_report(cell, default)?;
    for err in &dropped {
        warn!(cell = %cell, error = %err, "reward clause skipped");
    }
    Some(specs)
}
