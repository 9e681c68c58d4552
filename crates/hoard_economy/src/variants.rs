//! # Unique Item Variants
//!
//! Some magic items are really a family: a *Figurine of Wondrous Power* is a
//! specific figurine, a *Deck of Many Things* shows a card, and a "Magic
//! Armor (roll d12)" placeholder becomes a concrete suit. After a draw the
//! item's name is run through a [`VariantTable`], an ordered list of rules.
//! The first rule whose pattern matches rewrites the name, possibly rolling
//! on the ledger to do so. Names no rule matches pass through unchanged.
//!
//! Rules implement [`ItemVariant`], so callers can extend or replace the
//! standard table without touching the magic item generator.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::TreasureResult;
use crate::ledger::RollLedger;

/// A rule that specializes the name of a drawn magic item.
pub trait ItemVariant: Send + Sync {
    /// Short rule name for logs.
    fn name(&self) -> &str;

    /// Whether the rule applies. `lowered` is the item name in lowercase.
    fn matches(&self, lowered: &str) -> bool;

    /// Produces the specialized name.
    ///
    /// # Errors
    ///
    /// Propagates ledger failures.
    fn resolve(&self, name: &str, ledger: &mut RollLedger) -> TreasureResult<String>;
}

/// Appends a fixed note: "Portable Hole (Generates extra space for storage)".
#[derive(Clone, Debug)]
pub struct NoteVariant {
    pattern: &'static str,
    note: &'static str,
}

impl NoteVariant {
    /// Rule for names containing `pattern` (lowercase).
    #[must_use]
    pub const fn new(pattern: &'static str, note: &'static str) -> Self {
        Self { pattern, note }
    }
}

impl ItemVariant for NoteVariant {
    fn name(&self) -> &str {
        self.pattern
    }

    fn matches(&self, lowered: &str) -> bool {
        lowered.contains(self.pattern)
    }

    fn resolve(&self, name: &str, _ledger: &mut RollLedger) -> TreasureResult<String> {
        Ok(format!("{name} ({})", self.note))
    }
}

/// Picks one option uniformly and formats it into the name.
#[derive(Clone)]
pub struct PickVariant {
    pattern: &'static str,
    options: &'static [&'static str],
    format: fn(&str, &str) -> String,
}

impl PickVariant {
    /// Rule for names containing `pattern`; `format(name, option)` builds the result.
    #[must_use]
    pub const fn new(pattern: &'static str, options: &'static [&'static str], format: fn(&str, &str) -> String) -> Self {
        Self {
            pattern,
            options,
            format,
        }
    }
}

impl fmt::Debug for PickVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PickVariant")
            .field("pattern", &self.pattern)
            .field("options", &self.options.len())
            .finish_non_exhaustive()
    }
}

impl ItemVariant for PickVariant {
    fn name(&self) -> &str {
        self.pattern
    }

    fn matches(&self, lowered: &str) -> bool {
        lowered.contains(self.pattern)
    }

    fn resolve(&self, name: &str, ledger: &mut RollLedger) -> TreasureResult<String> {
        let option = ledger.pick(self.options, name)?;
        Ok((self.format)(name, option))
    }
}

/// Armor suits of the "Magic Armor (roll d12)" placeholder, by face.
pub const MAGIC_ARMOR: [&str; 12] = [
    "Armor, +2 Half Plate",
    "Armor, +2 Plate",
    "Armor, +3 Studded Leather",
    "Armor, +3 Breastplate",
    "Armor, +3 Splint",
    "Armor, +3 Half Plate",
    "Armor, +3 Plate",
    "Armor, +2 Chain Mail",
    "Armor, +2 Chain Shirt",
    "Armor, +3 Chain Mail",
    "Armor, +3 Chain Shirt",
    "Armor, +3 Scale Mail",
];

/// "Magic Armor (roll dN)": rolls the named die and replaces the name with
/// the suit on that face.
#[derive(Clone, Copy, Debug, Default)]
pub struct MagicArmorVariant;

impl MagicArmorVariant {
    fn pattern() -> &'static Regex {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        PATTERN.get_or_init(|| Regex::new(r"^magic armor\s*\(roll\s*d(\d+)\)").expect("magic armor pattern is valid"))
    }

    fn die(lowered: &str) -> Option<u64> {
        Self::pattern()
            .captures(lowered)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

impl ItemVariant for MagicArmorVariant {
    fn name(&self) -> &str {
        "magic armor"
    }

    fn matches(&self, lowered: &str) -> bool {
        Self::die(lowered).is_some()
    }

    fn resolve(&self, name: &str, ledger: &mut RollLedger) -> TreasureResult<String> {
        let sides = Self::die(&name.to_lowercase()).unwrap_or(1);
        let face = ledger.roll(1, sides, name)?;
        let armor = usize::try_from(face)
            .ok()
            .and_then(|face| MAGIC_ARMOR.get(face.wrapping_sub(1)))
            .copied()
            .unwrap_or("Unknown Magic Armor");
        Ok(format!("{armor} (Magic Armor)"))
    }
}

const FIGURINES: &[&str] = &[
    "Bronze Griffon",
    "Ebony Fly",
    "Golden Lions",
    "Ivory Goats",
    "Marble Elephant",
    "Onyx Dog",
    "Serpentine Owl",
];

const DECK_CARDS: &[&str] = &[
    "The Void", "Donjon", "Flames", "Fates", "Fool", "Gem", "Idiot", "Jester", "Moon", "Rogue", "Ruination", "Star",
    "Throne", "Sun", "Talons",
];

const BAG_TYPES: &[&str] = &["Gray", "Rust", "Tan"];

const ROD_POWERS: &[&str] = &[
    "Extra attack",
    "Summon Elemental",
    "Control Weather",
    "Fly",
    "Invisibility",
    "Teleport",
];

/// Ordered list of variant rules; the first match wins.
#[derive(Default)]
pub struct VariantTable {
    rules: Vec<Box<dyn ItemVariant>>,
}

impl VariantTable {
    /// A table with no rules.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard rules for the unique items of the magic item tables.
    #[must_use]
    pub fn standard() -> Self {
        let mut table = Self::empty();
        table
            .push(PickVariant::new("figurine of wondrous power", FIGURINES, |name, figurine| {
                format!("{name} ({figurine})")
            }))
            .push(PickVariant::new("deck of many things", DECK_CARDS, |name, card| {
                format!("{name} (Outcome: {card})")
            }))
            .push(NoteVariant::new("portable hole", "Generates extra space for storage"))
            .push(PickVariant::new("bag of tricks", BAG_TYPES, |name, bag| format!("{name} ({bag} type)")))
            .push(NoteVariant::new(
                "robe of the archmagi",
                "Provides magical protection and enhances spellcasting",
            ))
            .push(NoteVariant::new("wand of polymorph", "Transmutes creatures and objects"))
            .push(PickVariant::new("rod of lordly might", ROD_POWERS, |name, power| {
                format!("{name} (Ability: {power})")
            }))
            .push(NoteVariant::new("tome of clear thought", "Increases Intelligence by 2 permanently"))
            .push(NoteVariant::new(
                "tome of leadership and influence",
                "Increases Charisma by 2 permanently",
            ))
            .push(NoteVariant::new("tome of understanding", "Increases Wisdom by 2 permanently"))
            .push(NoteVariant::new("sphere of annihilation", "Annihilates matter on contact"))
            .push(NoteVariant::new("well of many worlds", "Creates portals to other planes"))
            .push(MagicArmorVariant);
        table
    }

    /// Appends a rule after the existing ones.
    pub fn push(&mut self, rule: impl ItemVariant + 'static) -> &mut Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies the first matching rule, or returns the name unchanged.
    ///
    /// # Errors
    ///
    /// Propagates ledger failures from the rule.
    pub fn resolve(&self, name: &str, ledger: &mut RollLedger) -> TreasureResult<String> {
        let lowered = name.to_lowercase();
        match self.rules.iter().find(|rule| rule.matches(&lowered)) {
            Some(rule) => {
                let resolved = rule.resolve(name, ledger)?;
                tracing::debug!(rule = rule.name(), item = %resolved, "variant resolved");
                Ok(resolved)
            }
            None => Ok(name.to_string()),
        }
    }
}

impl fmt::Debug for VariantTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rules.iter().map(|rule| rule.name())).finish()
    }
}
