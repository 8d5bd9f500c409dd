use std::collections::{BTreeMap, BTreeSet};

use citymine_core::error::CitymineError;
use citymine_core::types::{Balance, RewardCycle, StackerAtCycle, StackingStatsAtCycle, UserId};
use serde::{Deserialize, Serialize};

use crate::cycle_tree::CycleDeltaTree;

/// Per-user stacking positions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StackerBook {
    stacked: CycleDeltaTree,
    /// Point amounts, only at each action's last cycle.
    to_return: BTreeMap<RewardCycle, Balance>,
    /// Cycles whose payout has been collected; they read as (0, 0).
    redeemed: BTreeSet<RewardCycle>,
}

/// Cycle-indexed stacking accounting.
///
/// Range writes go through `CycleDeltaTree`, so recording a lock of any
/// length and reading any (user, cycle) pair are both logarithmic. Untouched
/// pairs read as the zero default without allocating.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StackingLedger {
    stackers: BTreeMap<UserId, StackerBook>,
    totals: CycleDeltaTree,
    pool_native: BTreeMap<RewardCycle, Balance>,
}

impl StackingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject zero amounts and lock periods outside `1..=max_lock_period`.
    pub fn check_lock(amount: Balance, lock_period: u32, max_lock_period: u32) -> Result<(), CitymineError> {
        if lock_period == 0 || lock_period > max_lock_period || amount == 0 {
            return Err(CitymineError::CannotStack { max_lock_period });
        }
        Ok(())
    }

    /// Record `amount` stacked for cycles `[first, last]`, returned at `last`.
    pub fn record(&mut self, user: UserId, first: RewardCycle, last: RewardCycle, amount: Balance) {
        let book = self.stackers.entry(user).or_default();
        book.stacked.add_range(first, last, amount);
        *book.to_return.entry(last).or_default() += amount;
        self.totals.add_range(first, last, amount);
    }

    pub fn stacker_at_cycle_or_default(&self, cycle: RewardCycle, user: UserId) -> StackerAtCycle {
        match self.stackers.get(&user) {
            Some(book) if !book.redeemed.contains(&cycle) => StackerAtCycle {
                amount_stacked: book.stacked.value_at(cycle),
                to_return: book.to_return.get(&cycle).copied().unwrap_or(0),
            },
            _ => StackerAtCycle::default(),
        }
    }

    pub fn total_stacked(&self, cycle: RewardCycle) -> Balance {
        self.totals.value_at(cycle)
    }

    pub fn is_active_at(&self, cycle: RewardCycle) -> bool {
        self.total_stacked(cycle) > 0
    }

    pub fn stats_at_cycle(&self, cycle: RewardCycle) -> StackingStatsAtCycle {
        StackingStatsAtCycle {
            amount_native: self.pool_native.get(&cycle).copied().unwrap_or(0),
            amount_token: self.total_stacked(cycle),
        }
    }

    /// Credit the stackers' pool for `cycle` with a commitment's pool share.
    pub fn credit_pool(&mut self, cycle: RewardCycle, amount: Balance) {
        if amount > 0 {
            *self.pool_native.entry(cycle).or_default() += amount;
        }
    }

    /// floor(pool × user stacked / total stacked) for `cycle`; 0 once redeemed.
    pub fn entitled_native(&self, user: UserId, cycle: RewardCycle) -> Balance {
        let total = self.total_stacked(cycle);
        if total == 0 {
            return 0;
        }
        let mine = self.stacker_at_cycle_or_default(cycle, user).amount_stacked;
        let pool = self.pool_native.get(&cycle).copied().unwrap_or(0);
        pool * mine / total
    }

    /// Zero the (user, cycle) entry after payout. Cycle totals are unchanged so
    /// other stackers' shares stay the same.
    pub fn mark_redeemed(&mut self, user: UserId, cycle: RewardCycle) {
        self.stackers.entry(user).or_default().redeemed.insert(cycle);
    }
}
