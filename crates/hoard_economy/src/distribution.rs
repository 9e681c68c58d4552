//! # Loot Distribution
//!
//! **Splits a party's pooled loot so no coin is lost or invented.**
//!
//! ## Coin policies
//!
//! ```text
//! RandomExtra          per currency: floor(amount / n) each,
//!                      remainder r < n to r distinct random members
//!
//! SplitDenominations   total value in copper, floor to 1/10 gp per member,
//!                      each share re-expanded pp -> cp greedily,
//!                      leftover copper one coin at a time to random members
//! ```
//!
//! ## Items
//!
//! Every item is shuffled into one sequence, then handed one at a time to the
//! member with the lowest running total value (coins included). Ties go to
//! the member listed first.
//!
//! All randomness comes from the roll ledger, and the call is atomic: on
//! error the pool is left untouched and the ledger keeps none of its rolls.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bundle::{LootItem, PartyLoot};
use crate::currency::{CoinPurse, Currency, CurrencyRates};
use crate::error::{TreasureError, TreasureResult};
use crate::fixed_point::FixedPoint;
use crate::ledger::RollLedger;

/// How coins are divided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinPolicy {
    /// Keep denominations; random members receive the indivisible remainder.
    #[default]
    RandomExtra,
    /// Pool the value and pay equal shares in mixed denominations.
    SplitDenominations,
}

/// What one member receives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberShare {
    /// Member name.
    pub name: String,
    /// Coins.
    pub coins: CoinPurse,
    /// Items, in the order they were assigned.
    pub items: Vec<LootItem>,
    /// Coin value plus item value, in copper.
    pub total_value_copper: u64,
}

impl MemberShare {
    fn new(name: String) -> Self {
        Self {
            name,
            coins: CoinPurse::new(),
            items: Vec::new(),
            total_value_copper: 0,
        }
    }

    /// Total value in gold pieces.
    #[must_use]
    pub fn total_value_gp(&self, rates: &CurrencyRates) -> FixedPoint {
        rates.copper_to_gp(self.total_value_copper)
    }
}

/// Result of one distribution, members in party order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    /// Policy used for coins.
    pub policy: CoinPolicy,
    members: Vec<MemberShare>,
}

impl Distribution {
    /// Share of a member by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MemberShare> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Shares in party order.
    pub fn iter(&self) -> std::slice::Iter<'_, MemberShare> {
        self.members.iter()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false for a successful distribution.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Sum of every member's coins.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if a denomination overflows.
    pub fn total_coins(&self) -> TreasureResult<CoinPurse> {
        let mut total = CoinPurse::new();
        for member in &self.members {
            total.merge(&member.coins)?;
        }
        Ok(total)
    }

    /// Sum of every member's total value, in copper.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if the sum overflows.
    pub fn total_value_copper(&self) -> TreasureResult<u64> {
        self.members.iter().try_fold(0u64, |acc, m| {
            acc.checked_add(m.total_value_copper).ok_or(TreasureError::ArithmeticOverflow)
        })
    }
}

impl<'a> IntoIterator for &'a Distribution {
    type Item = &'a MemberShare;
    type IntoIter = std::slice::Iter<'a, MemberShare>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

/// Cleans up member names: blanks become "Member N" (1-based).
///
/// # Errors
///
/// Returns `InvalidParty` for an empty party or duplicate names.
pub fn normalize_members<S: AsRef<str>>(members: &[S]) -> TreasureResult<Vec<String>> {
    if members.is_empty() {
        return Err(TreasureError::InvalidParty("no party members".into()));
    }
    let names: Vec<String> = members
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let name = name.as_ref().trim();
            if name.is_empty() {
                format!("Member {}", i + 1)
            } else {
                name.to_string()
            }
        })
        .collect();
    for (i, name) in names.iter().enumerate() {
        if names[..i].contains(name) {
            return Err(TreasureError::InvalidParty(format!("duplicate member name '{name}'")));
        }
    }
    Ok(names)
}

/// Distributes the pooled loot among `members` and empties the pool.
///
/// # Errors
///
/// Returns `InvalidConfig` for an unusable rate table, `InvalidParty` for an
/// unusable party and `ArithmeticOverflow` for totals that do not fit. On
/// error the pool and the ledger are unchanged.
pub fn distribute<S: AsRef<str>>(
    pool: &mut PartyLoot,
    members: &[S],
    policy: CoinPolicy,
    ledger: &mut RollLedger,
    rates: &CurrencyRates,
) -> TreasureResult<Distribution> {
    rates.validate()?;
    let names = normalize_members(members)?;
    let contents = pool.contents();

    let distribution = ledger.atomic(|ledger| {
        let mut shares: Vec<MemberShare> = names.into_iter().map(MemberShare::new).collect();

        match policy {
            CoinPolicy::RandomExtra => split_random_extra(&contents.coins, &mut shares, ledger)?,
            CoinPolicy::SplitDenominations => split_denominations(&contents.coins, &mut shares, ledger, rates)?,
        }
        for share in &mut shares {
            share.total_value_copper = share.coins.total_copper(rates)?;
        }

        let mut items: Vec<LootItem> = contents.items().cloned().collect();
        ledger.shuffle(&mut items, "Shuffling loot")?;
        assign_items(items, &mut shares)?;

        Ok(Distribution {
            policy,
            members: shares,
        })
    })?;

    info!(
        members = distribution.len(),
        ?policy,
        coins = %pool.contents().coins,
        items = pool.contents().item_count(),
        "party loot distributed"
    );
    pool.clear();
    Ok(distribution)
}

fn member_count(shares: &[MemberShare]) -> u64 {
    shares.len() as u64
}

/// `r` distinct member indices in random order.
fn pick_distinct(ledger: &mut RollLedger, members: usize, r: usize, label: &str) -> TreasureResult<Vec<usize>> {
    let mut order: Vec<usize> = (0..members).collect();
    ledger.shuffle(&mut order, label)?;
    order.truncate(r);
    Ok(order)
}

fn split_random_extra(coins: &CoinPurse, shares: &mut [MemberShare], ledger: &mut RollLedger) -> TreasureResult<()> {
    let n = member_count(shares);
    for (currency, amount) in coins.iter().filter(|&(_, amount)| amount > 0) {
        let base = amount / n;
        let remainder = amount % n;
        if base > 0 {
            for share in shares.iter_mut() {
                share.coins.add(currency, base)?;
            }
        }
        if remainder > 0 {
            let r = usize::try_from(remainder).map_err(|_| TreasureError::ArithmeticOverflow)?;
            let winners = pick_distinct(ledger, shares.len(), r, &format!("Remainder of {currency}"))?;
            for index in winners {
                shares[index].coins.add(currency, 1)?;
            }
            debug!(%currency, base, remainder, "coin remainder awarded");
        }
    }
    Ok(())
}

fn split_denominations(
    coins: &CoinPurse,
    shares: &mut [MemberShare],
    ledger: &mut RollLedger,
    rates: &CurrencyRates,
) -> TreasureResult<()> {
    let n = member_count(shares);
    let total = coins.total_copper(rates)?;

    // Shares are whole tenths of a gold piece.
    let step = (rates.gp / 10).max(1);
    let share = total / n / step * step;
    let leftover = total - share * n;

    for member in shares.iter_mut() {
        member.coins = expand(share, rates)?;
    }

    let everyone: Vec<usize> = (0..shares.len()).collect();
    for _ in 0..leftover {
        let &index = ledger.pick(&everyone, "Leftover copper")?;
        shares[index].coins.add(Currency::Cp, 1)?;
    }
    debug!(share, leftover, "coins split by value");
    Ok(())
}

/// Greedy expansion of a copper amount into the fewest coins, largest first.
fn expand(mut copper: u64, rates: &CurrencyRates) -> TreasureResult<CoinPurse> {
    let mut purse = CoinPurse::new();
    for currency in Currency::ALL.into_iter().rev() {
        let unit = rates.copper_value(currency);
        let count = copper / unit;
        if count > 0 {
            purse.add(currency, count)?;
            copper -= count * unit;
        }
    }
    Ok(purse)
}

fn assign_items(items: Vec<LootItem>, shares: &mut [MemberShare]) -> TreasureResult<()> {
    for item in items {
        // min_by_key keeps the first of equal minima
        let Some(poorest) = shares.iter_mut().min_by_key(|s| s.total_value_copper) else {
            return Err(TreasureError::InvalidParty("no party members".into()));
        };
        poorest.total_value_copper = poorest
            .total_value_copper
            .checked_add(item.value_copper)
            .ok_or(TreasureError::ArithmeticOverflow)?;
        poorest.items.push(item);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{LootKind, TreasureBundle};

    fn pool_of(pairs: &[(Currency, u64)]) -> PartyLoot {
        let mut pool = PartyLoot::new();
        let mut bundle = TreasureBundle::new();
        bundle.coins = CoinPurse::from_pairs(pairs.iter().copied()).unwrap();
        pool.add_bundle(bundle).unwrap();
        pool
    }

    fn art(name: &str, gp: u64) -> LootItem {
        LootItem {
            name: name.to_string(),
            kind: LootKind::ArtObject,
            value_copper: gp * 100,
            weight: FixedPoint::ONE,
            magic: None,
        }
    }

    #[test]
    fn test_random_extra_seven_gold_three_members() {
        let mut pool = pool_of(&[(Currency::Gp, 7)]);
        let mut ledger = RollLedger::seeded(5);
        let rates = CurrencyRates::default();

        let result = distribute(&mut pool, &["Ana", "Bo", "Cy"], CoinPolicy::RandomExtra, &mut ledger, &rates).unwrap();

        let golds: Vec<u64> = result.iter().map(|m| m.coins.get(Currency::Gp)).collect();
        assert_eq!(golds.iter().sum::<u64>(), 7);
        assert!(golds.iter().all(|&g| g == 2 || g == 3));
        assert_eq!(golds.iter().filter(|&&g| g == 3).count(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_split_denominations() {
        // 1 pp + 3 gp + 7 cp = 1307 cp over two members
        let mut pool = pool_of(&[(Currency::Pp, 1), (Currency::Gp, 3), (Currency::Cp, 7)]);
        let mut ledger = RollLedger::scripted([1; 7]);
        let rates = CurrencyRates::default();

        let result = distribute(
            &mut pool,
            &["Ana", "Bo"],
            CoinPolicy::SplitDenominations,
            &mut ledger,
            &rates,
        )
        .unwrap();

        // 650 cp each = 6 gp 1 ep; 7 leftover copper all to the first member
        let ana = result.get("Ana").unwrap();
        let bo = result.get("Bo").unwrap();
        assert_eq!(bo.coins, CoinPurse::from_pairs([(Currency::Gp, 6), (Currency::Ep, 1)]).unwrap());
        assert_eq!(ana.coins.get(Currency::Cp), 7);
        assert_eq!(result.total_value_copper().unwrap(), 1307);
    }

    #[test]
    fn test_items_go_to_poorest() {
        let mut pool = PartyLoot::new();
        let mut bundle = TreasureBundle::new();
        bundle.push(art("Gold locket (250 GP)", 250));
        bundle.push(art("Silver ewer (25 GP)", 25));
        bundle.push(art("Carved bone statuette (25 GP)", 25));
        pool.add_bundle(bundle).unwrap();

        let mut ledger = RollLedger::seeded(9);
        let rates = CurrencyRates::default();
        let result = distribute(&mut pool, &["Ana", "Bo"], CoinPolicy::RandomExtra, &mut ledger, &rates).unwrap();

        let values: Vec<u64> = result.iter().map(|m| m.total_value_copper).collect();
        assert_eq!(values.iter().sum::<u64>(), 30_000);
        assert_eq!(result.iter().map(|m| m.items.len()).sum::<usize>(), 3);
        // greedy balancing keeps the spread within the largest item
        let spread = values.iter().max().unwrap() - values.iter().min().unwrap();
        assert!(spread <= 25_000);
    }

    #[test]
    fn test_tie_goes_to_first_member() {
        let mut shares = vec![MemberShare::new("A".into()), MemberShare::new("B".into())];
        assign_items(vec![art("Idol (25 GP)", 25)], &mut shares).unwrap();
        assert_eq!(shares[0].items.len(), 1);
        assert!(shares[1].items.is_empty());
    }

    #[test]
    fn test_member_names() {
        assert_eq!(normalize_members(&["Ana", " ", ""]).unwrap(), vec!["Ana", "Member 2", "Member 3"]);
        assert!(matches!(normalize_members(&["Ana", "Ana "]), Err(TreasureError::InvalidParty(_))));
        assert!(matches!(normalize_members::<&str>(&[]), Err(TreasureError::InvalidParty(_))));
    }

    #[test]
    fn test_failed_distribution_keeps_pool() {
        let mut pool = pool_of(&[(Currency::Sp, 10)]);
        let mut ledger = RollLedger::seeded(1);
        let rates = CurrencyRates::default();

        let err = distribute(&mut pool, &["Ana", "Ana"], CoinPolicy::RandomExtra, &mut ledger, &rates).unwrap_err();
        assert!(matches!(err, TreasureError::InvalidParty(_)));
        assert_eq!(pool.contents().coins.get(Currency::Sp), 10);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_zero_rate_rejected() {
        let mut pool = pool_of(&[(Currency::Gp, 7)]);
        let mut ledger = RollLedger::seeded(1);
        let rates = CurrencyRates {
            sp: 0,
            ..CurrencyRates::default()
        };

        for policy in [CoinPolicy::SplitDenominations, CoinPolicy::RandomExtra] {
            let err = distribute(&mut pool, &["Ana", "Bo"], policy, &mut ledger, &rates).unwrap_err();
            assert!(matches!(err, TreasureError::InvalidConfig(_)));
        }
        assert_eq!(pool.contents().coins.get(Currency::Gp), 7);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_expand() {
        let rates = CurrencyRates::default();
        assert_eq!(
            expand(1_567, &rates).unwrap(),
            CoinPurse::from_pairs([
                (Currency::Pp, 1),
                (Currency::Gp, 5),
                (Currency::Ep, 1),
                (Currency::Sp, 1),
                (Currency::Cp, 7)
            ])
            .unwrap()
        );
    }
}
