//! # Roll Ledger
//!
//! **Every random draw in the engine is a recorded die roll.**
//!
//! The ledger owns the randomness stream and an append-only list of
//! [`RollRecord`]s. Dice totals, weighted table picks, uniform name picks and
//! shuffles all go through [`RollLedger::roll`], so the record list is the
//! complete audit trail of a generation and the unit that tests replay.
//!
//! ## Determinism
//!
//! ```text
//! same seed + same sequence of roll() calls  =>  same records, same picks
//! ```
//!
//! The default source is ChaCha8 seeded from a `u64`. Tests inject a
//! [`ScriptedDice`] source to force specific faces.

use std::collections::VecDeque;
use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{TreasureError, TreasureResult};

/// Upper bound on dice rolled in one call.
pub const MAX_DICE_PER_ROLL: u64 = 10_000;

/// A source of individual die faces.
pub trait DieSource {
    /// Returns one face drawn uniformly from `1..=sides`. `sides` is never 0.
    fn roll_face(&mut self, sides: u64) -> u64;
}

/// ChaCha8-backed die source, reproducible from its seed.
#[derive(Clone, Debug)]
pub struct SeededDice {
    rng: ChaCha8Rng,
}

impl SeededDice {
    /// Creates a die source from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl DieSource for SeededDice {
    #[inline]
    fn roll_face(&mut self, sides: u64) -> u64 {
        self.rng.gen_range(1..=sides)
    }
}

/// Die source that replays a fixed list of faces, then falls back to a
/// seeded stream.
///
/// Scripted faces larger than the die are clamped to its highest face.
#[derive(Clone, Debug)]
pub struct ScriptedDice {
    faces: VecDeque<u64>,
    fallback: SeededDice,
}

impl ScriptedDice {
    /// Replays `faces` in order.
    #[must_use]
    pub fn new(faces: impl IntoIterator<Item = u64>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
            fallback: SeededDice::new(0),
        }
    }

    /// Number of scripted faces not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl DieSource for ScriptedDice {
    fn roll_face(&mut self, sides: u64) -> u64 {
        match self.faces.pop_front() {
            Some(face) => face.clamp(1, sides),
            None => self.fallback.roll_face(sides),
        }
    }
}

/// One recorded roll of `count` dice with `sides` sides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRecord {
    /// Number of dice.
    pub count: u64,
    /// Sides per die.
    pub sides: u64,
    /// Individual faces, in roll order.
    pub results: Vec<u64>,
    /// Sum of the faces.
    pub total: u64,
    /// What the roll was for.
    pub label: String,
}

impl fmt::Display for RollRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rolled {}d{}: {:?} = {}", self.count, self.sides, self.results, self.total)?;
        if !self.label.is_empty() {
            write!(f, " ({})", self.label)?;
        }
        Ok(())
    }
}

/// Anything with a sampling weight.
pub trait Weighted {
    /// Relative weight; zero means never picked.
    fn weight(&self) -> u64;
}

impl<T: Weighted + ?Sized> Weighted for &T {
    #[inline]
    fn weight(&self) -> u64 {
        (**self).weight()
    }
}

/// The randomness stream plus its append-only history.
pub struct RollLedger {
    source: Box<dyn DieSource>,
    records: Vec<RollRecord>,
}

impl RollLedger {
    /// Ledger over a ChaCha8 stream.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::with_source(SeededDice::new(seed))
    }

    /// Ledger that replays `faces` before falling back to a seeded stream.
    #[must_use]
    pub fn scripted(faces: impl IntoIterator<Item = u64>) -> Self {
        Self::with_source(ScriptedDice::new(faces))
    }

    /// Ledger over any die source.
    #[must_use]
    pub fn with_source(source: impl DieSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            records: Vec::new(),
        }
    }

    /// Rolls `count` dice of `sides` sides and records the result.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDice` for zero-sided dice or more than
    /// [`MAX_DICE_PER_ROLL`] dice.
    pub fn roll(&mut self, count: u64, sides: u64, label: impl Into<String>) -> TreasureResult<u64> {
        if sides == 0 || count > MAX_DICE_PER_ROLL {
            return Err(TreasureError::InvalidDice { count, sides });
        }

        let results: Vec<u64> = (0..count).map(|_| self.source.roll_face(sides)).collect();
        let total = results
            .iter()
            .try_fold(0u64, |acc, &face| acc.checked_add(face))
            .ok_or(TreasureError::ArithmeticOverflow)?;

        let record = RollRecord {
            count,
            sides,
            results,
            total,
            label: label.into(),
        };
        trace!(roll = %record, "dice rolled");
        self.records.push(record);
        Ok(total)
    }

    /// Picks an index by cumulative weight.
    ///
    /// Draws one value in `[1, total]` and returns the first index whose
    /// running weight reaches it, so equal weights resolve in declaration
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `EmptyDistribution` if the weights sum to zero.
    pub fn weighted_index(&mut self, weights: &[u64], label: &str) -> TreasureResult<usize> {
        let total = weights
            .iter()
            .try_fold(0u64, |acc, &w| acc.checked_add(w))
            .ok_or(TreasureError::ArithmeticOverflow)?;
        if total == 0 {
            return Err(TreasureError::EmptyDistribution(label.to_string()));
        }

        let draw = self.roll(1, total, format!("Rolling on {label}"))?;
        let mut cumulative = 0u64;
        for (index, &weight) in weights.iter().enumerate() {
            cumulative += weight;
            if draw <= cumulative {
                return Ok(index);
            }
        }
        // draw <= total == final cumulative weight
        Ok(weights.len() - 1)
    }

    /// Picks one entry by weight. See [`RollLedger::weighted_index`].
    ///
    /// # Errors
    ///
    /// Returns `EmptyDistribution` if the entries' weights sum to zero.
    pub fn weighted_choice<'a, T: Weighted>(&mut self, entries: &'a [T], label: &str) -> TreasureResult<&'a T> {
        let weights: Vec<u64> = entries.iter().map(|e| e.weight()).collect();
        let index = self.weighted_index(&weights, label)?;
        Ok(&entries[index])
    }

    /// Picks one option uniformly.
    ///
    /// # Errors
    ///
    /// Returns `EmptyDistribution` if `options` is empty.
    pub fn pick<'a, T>(&mut self, options: &'a [T], label: &str) -> TreasureResult<&'a T> {
        if options.is_empty() {
            return Err(TreasureError::EmptyDistribution(label.to_string()));
        }
        let face = self.roll(1, options.len() as u64, label)?;
        Ok(&options[usize::try_from(face - 1).map_err(|_| TreasureError::ArithmeticOverflow)?])
    }

    /// Fisher-Yates shuffle driven by recorded rolls.
    ///
    /// # Errors
    ///
    /// Propagates roll errors (none for non-empty slices in practice).
    pub fn shuffle<T>(&mut self, items: &mut [T], label: &str) -> TreasureResult<()> {
        for i in (1..items.len()).rev() {
            let face = self.roll(1, i as u64 + 1, label)?;
            let j = usize::try_from(face - 1).map_err(|_| TreasureError::ArithmeticOverflow)?;
            items.swap(i, j);
        }
        Ok(())
    }

    /// Runs `f` as one unit: if it fails, the records it appended are
    /// discarded and the ledger looks as if the call never happened.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns.
    pub fn atomic<T>(&mut self, f: impl FnOnce(&mut Self) -> TreasureResult<T>) -> TreasureResult<T> {
        let mark = self.records.len();
        let result = f(self);
        if result.is_err() {
            self.records.truncate(mark);
        }
        result
    }

    /// All committed records, oldest first.
    #[must_use]
    pub fn records(&self) -> &[RollRecord] {
        &self.records
    }

    /// Iterates the records, oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, RollRecord> {
        self.records.iter()
    }

    /// The most recent record.
    #[must_use]
    pub fn last(&self) -> Option<&RollRecord> {
        self.records.last()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing has been rolled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hands the history to the caller.
    #[must_use]
    pub fn into_records(self) -> Vec<RollRecord> {
        self.records
    }
}

impl fmt::Debug for RollLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollLedger")
            .field("source", &"<dyn DieSource>")
            .field("records", &self.records.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Entry(&'static str, u64);

    impl Weighted for Entry {
        fn weight(&self) -> u64 {
            self.1
        }
    }

    #[test]
    fn test_roll_records_faces() {
        let mut ledger = RollLedger::scripted([3, 5, 2, 4]);
        let total = ledger.roll(4, 6, "4d6 x 100").unwrap();
        assert_eq!(total, 14);

        let record = ledger.last().unwrap();
        assert_eq!(record.results, vec![3, 5, 2, 4]);
        assert_eq!(record.to_string(), "Rolled 4d6: [3, 5, 2, 4] = 14 (4d6 x 100)");
    }

    #[test]
    fn test_faces_within_die() {
        let mut ledger = RollLedger::seeded(7);
        for _ in 0..500 {
            let face = ledger.roll(1, 6, "").unwrap();
            assert!((1..=6).contains(&face));
        }
        assert_eq!(ledger.len(), 500);
    }

    #[test]
    fn test_deterministic_stream() {
        let mut a = RollLedger::seeded(42);
        let mut b = RollLedger::seeded(42);
        for sides in [4, 6, 8, 10, 12, 20, 100] {
            a.roll(3, sides, "same").unwrap();
            b.roll(3, sides, "same").unwrap();
        }
        assert_eq!(a.records(), b.records());

        let mut c = RollLedger::seeded(43);
        for sides in [4, 6, 8, 10, 12, 20, 100] {
            c.roll(3, sides, "same").unwrap();
        }
        assert_ne!(a.records(), c.records());
    }

    #[test]
    fn test_invalid_dice() {
        let mut ledger = RollLedger::seeded(1);
        assert_eq!(
            ledger.roll(2, 0, "bad"),
            Err(TreasureError::InvalidDice { count: 2, sides: 0 })
        );
        assert!(ledger.roll(MAX_DICE_PER_ROLL + 1, 6, "bad").is_err());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_weighted_choice_forced_draw() {
        // Cumulative weights 1, 3, 6: a draw of 4 lands in (3, 6], index 2
        let entries = [Entry("first", 1), Entry("second", 2), Entry("third", 3)];
        let mut ledger = RollLedger::scripted([4]);
        let picked = ledger.weighted_choice(&entries, "test table").unwrap();
        assert_eq!(picked.0, "third");

        // A draw of 3 is the last value covered by the second entry
        let mut ledger = RollLedger::scripted([3]);
        assert_eq!(ledger.weighted_choice(&entries, "test table").unwrap().0, "second");

        let record = ledger.last().unwrap();
        assert_eq!((record.count, record.sides), (1, 6));
    }

    #[test]
    fn test_weighted_choice_ties_in_declaration_order() {
        let entries = [Entry("a", 0), Entry("b", 2), Entry("c", 0), Entry("d", 2)];
        let mut ledger = RollLedger::scripted([1, 2, 3, 4]);
        let picks: Vec<_> = (0..4)
            .map(|_| ledger.weighted_choice(&entries, "ties").unwrap().0)
            .collect();
        assert_eq!(picks, vec!["b", "b", "d", "d"]);
    }

    #[test]
    fn test_weighted_choice_empty_distribution() {
        let entries = [Entry("a", 0), Entry("b", 0)];
        let mut ledger = RollLedger::seeded(1);
        assert_eq!(
            ledger.weighted_choice(&entries, "zero").map(|e| e.0),
            Err(TreasureError::EmptyDistribution("zero".into()))
        );
        let none: [Entry; 0] = [];
        assert!(ledger.weighted_choice(&none, "none").is_err());
    }

    #[test]
    fn test_weighted_choice_by_reference() {
        let entries = [Entry("a", 1), Entry("b", 1)];
        let filtered: Vec<&Entry> = entries.iter().filter(|e| e.0 == "b").collect();
        let mut ledger = RollLedger::seeded(3);
        assert_eq!(ledger.weighted_choice(&filtered, "filtered").unwrap().0, "b");
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut ledger = RollLedger::seeded(9);
        let mut items: Vec<u32> = (0..50).collect();
        ledger.shuffle(&mut items, "shuffle").unwrap();
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_eq!(ledger.len(), 49);
    }

    #[test]
    fn test_atomic_discards_failed_call() {
        let mut ledger = RollLedger::seeded(5);
        ledger.roll(1, 20, "kept").unwrap();

        let result: TreasureResult<()> = ledger.atomic(|l| {
            l.roll(2, 6, "discarded")?;
            Err(TreasureError::EmptyDistribution("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.last().unwrap().label, "kept");

        let ok = ledger.atomic(|l| l.roll(1, 4, "committed"));
        assert!(ok.is_ok());
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_scripted_clamps_and_falls_back() {
        let mut dice = ScriptedDice::new([9]);
        assert_eq!(dice.roll_face(6), 6);
        assert_eq!(dice.remaining(), 0);
        let face = dice.roll_face(6);
        assert!((1..=6).contains(&face));
    }
}
