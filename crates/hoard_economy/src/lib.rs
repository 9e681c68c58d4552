//! # Hoard Economy
//!
//! Treasure generation and loot distribution for tabletop games.
//!
//! ## Design Principles
//!
//! 1. **Every roll is recorded** - all randomness flows through one [`RollLedger`]
//! 2. **Integer money** - coins are counted in copper, weights are fixed-point
//! 3. **Atomic calls** - a failed generation or distribution leaves no trace
//! 4. **Validated data** - tables and catalogs are checked before first use
//!
//! ## Pipeline
//!
//! ```text
//! ProbabilityTable ──► TreasureGenerator ──► TreasureBundle ──► PartyLoot
//!                        │    │    │                               │
//!        parse_reward ◄──┘    │    └──► MagicItemGenerator         ▼
//!                             └──► ValuableGenerator           distribute
//!                                                                  │
//!                                                                  ▼
//!                                                            Distribution
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use hoard_economy::*;
//!
//! let tables = ProbabilityTable::standard()?;
//! let reference = ReferenceData::load_dir("data")?;
//! let config = EngineConfig::default();
//! let variants = VariantTable::standard();
//! let generator = TreasureGenerator::new(&tables, &reference, &config, &variants);
//!
//! let mut ledger = RollLedger::seeded(42);
//! let bundle = generator.generate(&mut ledger, TreasureType::Hoard, DifficultyBand::Cr5To10)?;
//!
//! let mut party = PartyLoot::new();
//! party.add_bundle(bundle)?;
//! let shares = distribute(&mut party, &["Ana", "Bo"], CoinPolicy::RandomExtra, &mut ledger, &config.rates)?;
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bundle;
pub mod config;
pub mod currency;
pub mod distribution;
pub mod error;
pub mod expression;
pub mod fixed_point;
pub mod ledger;
pub mod magic;
pub mod reference;
pub mod tables;
pub mod valuables;
pub mod variants;

pub use bundle::{LootItem, LootKind, MagicDetails, PartyLoot, TreasureBundle};
pub use config::{EngineConfig, PerRarity};
pub use currency::{CoinPurse, Currency, CurrencyRates};
pub use distribution::{distribute, CoinPolicy, Distribution, MemberShare};
pub use error::{TreasureError, TreasureResult};
pub use expression::{parse_clause, parse_reward, Category, Dice, MagicTable, RewardSpec, ValuableKind};
pub use fixed_point::FixedPoint;
pub use ledger::{DieSource, RollLedger, RollRecord, ScriptedDice, SeededDice, Weighted};
pub use magic::MagicItemGenerator;
pub use reference::{BaseItemRecord, Rarity, ReferenceData, WeightedTableEntry};
pub use tables::{DifficultyBand, ProbabilityTable, RewardRow, TreasureGenerator, TreasureType};
pub use valuables::ValuableGenerator;
pub use variants::{ItemVariant, VariantTable};
