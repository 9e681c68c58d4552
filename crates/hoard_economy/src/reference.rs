//! # Reference Data
//!
//! **Read-only catalogs the engine draws from, validated before first use.**
//!
//! ```text
//! base-item-tables.json   "Magic Item Table A".."I" -> [{id, weight}]
//! base-items.json         id -> {id (display name), type, rarity,
//!                                requires_attunement, value, weight, description}
//! gems.json               "10 GP Gemstones".."5000 GP Gemstones" -> [name]
//! art_objects.json        "25 GP Art Objects".."7500 GP Art Objects" -> [name]
//! ```
//!
//! A [`ReferenceData`] can only be obtained through [`ReferenceData::validate`],
//! so the generators never run against partially valid catalogs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{TreasureError, TreasureResult};
use crate::expression::{MagicTable, ValuableKind};
use crate::fixed_point::FixedPoint;
use crate::ledger::Weighted;
use crate::valuables;

/// File names read by [`ReferenceData::load_dir`].
pub const MAGIC_TABLES_FILE: &str = "base-item-tables.json";
/// Base item registry file.
pub const BASE_ITEMS_FILE: &str = "base-items.json";
/// Gem pool file.
pub const GEMS_FILE: &str = "gems.json";
/// Art object pool file.
pub const ART_FILE: &str = "art_objects.json";

/// Magic item power class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Rarity {
    /// Common.
    Common,
    /// Uncommon.
    Uncommon,
    /// Rare.
    Rare,
    /// Very rare.
    VeryRare,
    /// Legendary.
    Legendary,
    /// Artifact; never sampled.
    Artifact,
    /// Anything the catalog spells differently ("Varies", ...).
    Unknown,
}

impl Rarity {
    /// The five tiers the rarity roll chooses between, in weight order.
    pub const SAMPLED: [Self; 5] = [
        Self::Common,
        Self::Uncommon,
        Self::Rare,
        Self::VeryRare,
        Self::Legendary,
    ];

    /// Display label as written in catalogs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Uncommon => "Uncommon",
            Self::Rare => "Rare",
            Self::VeryRare => "Very Rare",
            Self::Legendary => "Legendary",
            Self::Artifact => "Artifact",
            Self::Unknown => "Unknown",
        }
    }
}

impl From<String> for Rarity {
    fn from(label: String) -> Self {
        match label.trim().to_lowercase().as_str() {
            "common" => Self::Common,
            "uncommon" => Self::Uncommon,
            "rare" => Self::Rare,
            "very rare" => Self::VeryRare,
            "legendary" => Self::Legendary,
            "artifact" => Self::Artifact,
            _ => Self::Unknown,
        }
    }
}

impl From<Rarity> for String {
    fn from(rarity: Rarity) -> Self {
        rarity.label().to_string()
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One `{id, weight}` row of a magic item table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedTableEntry {
    /// Base item id.
    pub id: String,
    /// Relative weight.
    pub weight: u64,
}

impl Weighted for WeightedTableEntry {
    #[inline]
    fn weight(&self) -> u64 {
        self.weight
    }
}

/// A validated base item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseItemRecord {
    /// Canonical display name.
    pub name: String,
    /// Item type ("Wondrous Item", "Potion", ...).
    pub item_type: String,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Whether the item requires attunement.
    pub requires_attunement: bool,
    /// Listed price in gp, if the catalog has one.
    pub value: Option<FixedPoint>,
    /// Weight in pounds.
    pub weight: FixedPoint,
    /// Rules text.
    pub description: String,
}

/// Base item as it appears in `base-items.json`; required fields are optional
/// here so a missing one is reported as a data integrity error.
#[derive(Debug, Deserialize)]
struct RawBaseItem {
    id: Option<String>,
    #[serde(rename = "type")]
    item_type: Option<String>,
    rarity: Option<Rarity>,
    #[serde(default)]
    requires_attunement: bool,
    value: Option<FixedPoint>,
    weight: Option<FixedPoint>,
    description: Option<String>,
}

impl RawBaseItem {
    fn into_record(self, key: &str) -> TreasureResult<BaseItemRecord> {
        let missing = |field: &str| TreasureError::DataIntegrity(format!("field '{field}' missing for base item '{key}'"));
        Ok(BaseItemRecord {
            name: self.id.ok_or_else(|| missing("id"))?,
            item_type: self.item_type.ok_or_else(|| missing("type"))?,
            rarity: self.rarity.ok_or_else(|| missing("rarity"))?,
            requires_attunement: self.requires_attunement,
            value: self.value,
            weight: self.weight.unwrap_or(FixedPoint::ZERO),
            description: self.description.unwrap_or_default(),
        })
    }
}

/// Validated magic item tables, base items and gem/art pools.
#[derive(Clone, Debug)]
pub struct ReferenceData {
    magic_tables: BTreeMap<MagicTable, Vec<WeightedTableEntry>>,
    base_items: HashMap<String, BaseItemRecord>,
    gems: BTreeMap<u64, Vec<String>>,
    art_objects: BTreeMap<u64, Vec<String>>,
}

impl ReferenceData {
    /// Builds and validates reference data from in-memory catalogs.
    ///
    /// Pools are keyed by their tier value in gp.
    ///
    /// # Errors
    ///
    /// Returns `DataIntegrity` if any check of [`ReferenceData::validate`] fails.
    pub fn new(
        magic_tables: BTreeMap<MagicTable, Vec<WeightedTableEntry>>,
        base_items: HashMap<String, BaseItemRecord>,
        gems: BTreeMap<u64, Vec<String>>,
        art_objects: BTreeMap<u64, Vec<String>>,
    ) -> TreasureResult<Self> {
        let data = Self {
            magic_tables,
            base_items,
            gems,
            art_objects,
        };
        data.validate()?;
        info!(
            tables = data.magic_tables.len(),
            base_items = data.base_items.len(),
            "reference data validated"
        );
        Ok(data)
    }

    /// Parses the four JSON catalogs and validates them.
    ///
    /// # Errors
    ///
    /// Returns `DataIntegrity` for malformed JSON, missing required fields or
    /// any failed validation check.
    pub fn from_json(magic_tables: &str, base_items: &str, gems: &str, art_objects: &str) -> TreasureResult<Self> {
        let raw_tables: BTreeMap<String, Vec<WeightedTableEntry>> = parse_json(MAGIC_TABLES_FILE, magic_tables)?;
        let raw_items: HashMap<String, RawBaseItem> = parse_json(BASE_ITEMS_FILE, base_items)?;
        let raw_gems: BTreeMap<String, Vec<String>> = parse_json(GEMS_FILE, gems)?;
        let raw_art: BTreeMap<String, Vec<String>> = parse_json(ART_FILE, art_objects)?;

        let mut tables = BTreeMap::new();
        for (key, entries) in raw_tables {
            let table = MagicTable::ALL.into_iter().find(|t| t.data_key() == key);
            match table {
                Some(table) => {
                    tables.insert(table, entries);
                }
                None => warn!(key = %key, "ignoring unknown magic item table"),
            }
        }

        let items = raw_items
            .into_iter()
            .map(|(key, raw)| raw.into_record(&key).map(|record| (key, record)))
            .collect::<TreasureResult<HashMap<_, _>>>()?;

        Self::new(
            tables,
            items,
            tiered_pool(ValuableKind::Gems, raw_gems),
            tiered_pool(ValuableKind::ArtObjects, raw_art),
        )
    }

    /// Reads the four JSON catalogs from a directory.
    ///
    /// # Errors
    ///
    /// Returns `DataIntegrity` if a file cannot be read, plus every error of
    /// [`ReferenceData::from_json`].
    pub fn load_dir(dir: impl AsRef<Path>) -> TreasureResult<Self> {
        let dir = dir.as_ref();
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path)
                .map_err(|e| TreasureError::DataIntegrity(format!("{}: {e}", path.display())))
        };
        Self::from_json(&read(MAGIC_TABLES_FILE)?, &read(BASE_ITEMS_FILE)?, &read(GEMS_FILE)?, &read(ART_FILE)?)
    }

    /// Checks every load-time invariant.
    ///
    /// - Magic item tables A through I exist and each has positive total weight.
    /// - Every table entry id names a base item.
    /// - Every base item has a non-empty name and type.
    /// - Every gem and art tier exists and is non-empty.
    /// - No name appears in two tiers of the same pool.
    ///
    /// # Errors
    ///
    /// Returns `DataIntegrity` describing the first failed check.
    pub fn validate(&self) -> TreasureResult<()> {
        for table in MagicTable::ALL {
            let entries = self
                .magic_tables
                .get(&table)
                .ok_or_else(|| TreasureError::DataIntegrity(format!("{table} is missing")))?;
            let total = entries
                .iter()
                .try_fold(0u64, |acc, e| acc.checked_add(e.weight))
                .ok_or_else(|| TreasureError::DataIntegrity(format!("{table} weights overflow")))?;
            if total == 0 {
                return Err(TreasureError::DataIntegrity(format!("{table} has no weighted entries")));
            }
            if let Some(entry) = entries.iter().find(|e| !self.base_items.contains_key(&e.id)) {
                return Err(TreasureError::DataIntegrity(format!(
                    "{table} references unknown base item '{}'",
                    entry.id
                )));
            }
        }

        for (key, record) in &self.base_items {
            if record.name.trim().is_empty() || record.item_type.trim().is_empty() {
                return Err(TreasureError::DataIntegrity(format!("base item '{key}' has an empty id or type")));
            }
        }

        validate_pool(ValuableKind::Gems, &self.gems)?;
        validate_pool(ValuableKind::ArtObjects, &self.art_objects)
    }

    /// Entries of one magic item table.
    #[must_use]
    pub fn table(&self, table: MagicTable) -> &[WeightedTableEntry] {
        self.magic_tables.get(&table).map_or(&[][..], Vec::as_slice)
    }

    /// Base item by id.
    #[must_use]
    pub fn base_item(&self, id: &str) -> Option<&BaseItemRecord> {
        self.base_items.get(id)
    }

    /// Number of base items.
    #[must_use]
    pub fn base_item_count(&self) -> usize {
        self.base_items.len()
    }

    /// Names in one tier of a valuable pool.
    #[must_use]
    pub fn pool(&self, kind: ValuableKind, tier: u64) -> &[String] {
        let pools = match kind {
            ValuableKind::Gems => &self.gems,
            ValuableKind::ArtObjects => &self.art_objects,
        };
        pools.get(&tier).map_or(&[][..], Vec::as_slice)
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(file: &str, text: &str) -> TreasureResult<T> {
    serde_json::from_str(text).map_err(|e| TreasureError::DataIntegrity(format!("{file}: {e}")))
}

/// Re-keys "10 GP Gemstones"-style pools by tier value.
fn tiered_pool(kind: ValuableKind, raw: BTreeMap<String, Vec<String>>) -> BTreeMap<u64, Vec<String>> {
    let mut pools = BTreeMap::new();
    for (key, names) in raw {
        match valuables::tier_ladder(kind)
            .iter()
            .find(|&&tier| valuables::pool_key(kind, tier) == key)
        {
            Some(&tier) => {
                pools.insert(tier, names);
            }
            None => warn!(key = %key, pool = %kind, "ignoring unknown tier"),
        }
    }
    pools
}

fn validate_pool(kind: ValuableKind, pools: &BTreeMap<u64, Vec<String>>) -> TreasureResult<()> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for &tier in valuables::tier_ladder(kind) {
        let names = pools
            .get(&tier)
            .filter(|names| !names.is_empty())
            .ok_or_else(|| TreasureError::DataIntegrity(format!("{} is missing or empty", valuables::pool_key(kind, tier))))?;
        let mut tier_names = BTreeSet::new();
        for name in names {
            if seen.contains(name.as_str()) {
                return Err(TreasureError::DataIntegrity(format!(
                    "{kind} name '{name}' appears in more than one tier"
                )));
            }
            tier_names.insert(name.as_str());
        }
        seen.extend(tier_names);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Minimal valid catalogs shared by unit tests.

    use super::*;

    pub(crate) fn item(name: &str, rarity: Rarity) -> BaseItemRecord {
        BaseItemRecord {
            name: name.to_string(),
            item_type: "Wondrous Item".to_string(),
            rarity,
            requires_attunement: false,
            value: None,
            weight: FixedPoint::ZERO,
            description: String::new(),
        }
    }

    pub(crate) fn entry(id: &str, weight: u64) -> WeightedTableEntry {
        WeightedTableEntry {
            id: id.to_string(),
            weight,
        }
    }

    pub(crate) fn pools(kind: ValuableKind) -> BTreeMap<u64, Vec<String>> {
        valuables::tier_ladder(kind)
            .iter()
            .map(|&tier| (tier, vec![format!("{kind} {tier} a"), format!("{kind} {tier} b")]))
            .collect()
    }

    /// Every table holds the same two uncommon items.
    pub(crate) fn reference() -> ReferenceData {
        let mut items = HashMap::new();
        items.insert("cloak".to_string(), item("Cloak of Elvenkind", Rarity::Uncommon));
        items.insert("bag".to_string(), item("Bag of Tricks", Rarity::Uncommon));
        let tables = MagicTable::ALL
            .into_iter()
            .map(|t| (t, vec![entry("cloak", 3), entry("bag", 1)]))
            .collect();
        ReferenceData::new(tables, items, pools(ValuableKind::Gems), pools(ValuableKind::ArtObjects))
            .expect("fixture reference data is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn tables_json(entries: &str) -> String {
        let body: Vec<String> = MagicTable::ALL
            .iter()
            .map(|t| format!("\"{}\": {entries}", t.data_key()))
            .collect();
        format!("{{{}}}", body.join(","))
    }

    fn pool_json(kind: ValuableKind) -> String {
        let body: Vec<String> = valuables::tier_ladder(kind)
            .iter()
            .map(|&tier| format!("\"{}\": [\"{kind} {tier}\"]", valuables::pool_key(kind, tier)))
            .collect();
        format!("{{{}}}", body.join(","))
    }

    const ITEMS: &str = r#"{
        "potion-of-healing": {"id": "Potion of Healing", "type": "Potion", "rarity": "Common",
                              "value": 50, "weight": 0.5, "description": "Heals 2d4 + 2."},
        "cloak-of-protection": {"id": "Cloak of Protection", "type": "Wondrous Item",
                                "rarity": "uncommon", "requires_attunement": true}
    }"#;

    #[test]
    fn test_from_json() {
        let tables = tables_json(r#"[{"id": "potion-of-healing", "weight": 3}, {"id": "cloak-of-protection", "weight": 1}]"#);
        let data = ReferenceData::from_json(
            &tables,
            ITEMS,
            &pool_json(ValuableKind::Gems),
            &pool_json(ValuableKind::ArtObjects),
        )
        .unwrap();

        assert_eq!(data.table(MagicTable::new('C').unwrap()).len(), 2);
        let potion = data.base_item("potion-of-healing").unwrap();
        assert_eq!(potion.name, "Potion of Healing");
        assert_eq!(potion.weight, FixedPoint::from_parts(0, 500_000));
        assert_eq!(potion.value, Some(FixedPoint::from_whole(50)));
        let cloak = data.base_item("cloak-of-protection").unwrap();
        assert_eq!(cloak.rarity, Rarity::Uncommon);
        assert!(cloak.requires_attunement);
        assert_eq!(data.pool(ValuableKind::ArtObjects, 750), ["art objects 750".to_string()]);
    }

    #[test]
    fn test_missing_required_field() {
        let items = r#"{"x": {"id": "X", "rarity": "Rare"}}"#;
        let tables = tables_json(r#"[{"id": "x", "weight": 1}]"#);
        let err = ReferenceData::from_json(&tables, items, &pool_json(ValuableKind::Gems), &pool_json(ValuableKind::ArtObjects))
            .unwrap_err();
        assert_eq!(err, TreasureError::DataIntegrity("field 'type' missing for base item 'x'".into()));
    }

    #[test]
    fn test_dangling_id() {
        let tables = tables_json(r#"[{"id": "ghost", "weight": 1}]"#);
        let err = ReferenceData::from_json(&tables, ITEMS, &pool_json(ValuableKind::Gems), &pool_json(ValuableKind::ArtObjects))
            .unwrap_err();
        assert!(matches!(err, TreasureError::DataIntegrity(msg) if msg.contains("ghost")));
    }

    #[test]
    fn test_missing_table() {
        let mut tables: BTreeMap<_, _> = MagicTable::ALL
            .into_iter()
            .map(|t| (t, vec![entry("bag", 1)]))
            .collect();
        tables.remove(&MagicTable::new('I').unwrap());
        let mut items = HashMap::new();
        items.insert("bag".to_string(), item("Bag of Holding", Rarity::Uncommon));
        let err = ReferenceData::new(tables, items, pools(ValuableKind::Gems), pools(ValuableKind::ArtObjects)).unwrap_err();
        assert_eq!(err, TreasureError::DataIntegrity("Magic Item Table I is missing".into()));
    }

    #[test]
    fn test_zero_weight_table() {
        let tables = MagicTable::ALL
            .into_iter()
            .map(|t| (t, vec![entry("bag", 0)]))
            .collect();
        let mut items = HashMap::new();
        items.insert("bag".to_string(), item("Bag of Holding", Rarity::Uncommon));
        assert!(ReferenceData::new(tables, items, pools(ValuableKind::Gems), pools(ValuableKind::ArtObjects)).is_err());
    }

    #[test]
    fn test_overflowing_weights_rejected() {
        let tables = MagicTable::ALL
            .into_iter()
            .map(|t| (t, vec![entry("bag", u64::MAX), entry("bag", 1)]))
            .collect();
        let mut items = HashMap::new();
        items.insert("bag".to_string(), item("Bag of Holding", Rarity::Uncommon));
        let err = ReferenceData::new(tables, items, pools(ValuableKind::Gems), pools(ValuableKind::ArtObjects))
            .unwrap_err();
        assert!(matches!(err, TreasureError::DataIntegrity(msg) if msg.contains("weights overflow")));
    }

    #[test]
    fn test_cross_tier_duplicate() {
        let reference = reference();
        let mut gems = pools(ValuableKind::Gems);
        gems.get_mut(&500).unwrap().push("gems 10 a".to_string());
        let err = ReferenceData::new(
            reference.magic_tables.clone(),
            reference.base_items.clone(),
            gems,
            pools(ValuableKind::ArtObjects),
        )
        .unwrap_err();
        assert!(matches!(err, TreasureError::DataIntegrity(msg) if msg.contains("more than one tier")));
    }

    #[test]
    fn test_missing_tier() {
        let reference = reference();
        let mut art = pools(ValuableKind::ArtObjects);
        art.remove(&2500);
        let err = ReferenceData::new(
            reference.magic_tables.clone(),
            reference.base_items.clone(),
            pools(ValuableKind::Gems),
            art,
        )
        .unwrap_err();
        assert_eq!(err, TreasureError::DataIntegrity("2500 GP Art Objects is missing or empty".into()));
    }

    #[test]
    fn test_rarity_labels() {
        assert_eq!(Rarity::from("Very Rare".to_string()), Rarity::VeryRare);
        assert_eq!(Rarity::from("varies".to_string()), Rarity::Unknown);
        assert_eq!(serde_json::to_string(&Rarity::VeryRare).unwrap(), "\"Very Rare\"");
    }
}
