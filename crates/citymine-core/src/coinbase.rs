//! Coinbase schedule.
//!
//! The block reward depends only on the mined height relative to activation:
//!
//!   activation ..= activation + bonus_period          → bonus_amount
//!   .. ..= activation + halving_interval              → base_amount
//!   .. ..= activation + k × halving_interval          → base_amount / 2^(k-1)
//!   beyond max_halvings intervals                     → base_amount / 2^max_halvings
//!
//! Boundaries are inclusive, so the block exactly at a boundary still pays
//! the earlier (larger) amount.

use serde::{Deserialize, Serialize};

use crate::constants::{
    TOKEN_BASE_AMOUNT, TOKEN_BONUS_AMOUNT, TOKEN_BONUS_PERIOD, TOKEN_HALVING_BLOCKS,
    TOKEN_MAX_HALVINGS,
};
use crate::types::{Balance, BlockHeight};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinbaseSchedule {
    pub bonus_period: u64,
    pub bonus_amount: Balance,
    pub base_amount: Balance,
    pub halving_interval: u64,
    pub max_halvings: u32,
}

impl Default for CoinbaseSchedule {
    fn default() -> Self {
        Self {
            bonus_period: TOKEN_BONUS_PERIOD,
            bonus_amount: TOKEN_BONUS_AMOUNT,
            base_amount: TOKEN_BASE_AMOUNT,
            halving_interval: TOKEN_HALVING_BLOCKS,
            max_halvings: TOKEN_MAX_HALVINGS,
        }
    }
}

/// Coinbase owed for a block mined at `height`. Heights before activation
/// earn nothing.
pub fn coinbase_amount(
    schedule: &CoinbaseSchedule,
    activation_height: BlockHeight,
    height: BlockHeight,
) -> Balance {
    if height < activation_height {
        return 0;
    }
    let offset = height - activation_height;
    if offset <= schedule.bonus_period {
        return schedule.bonus_amount;
    }
    if schedule.halving_interval == 0 {
        return schedule.base_amount;
    }
    // Interval index k such that offset ∈ ((k-1)·I, k·I], capped at the floor.
    let interval = (offset - 1) / schedule.halving_interval;
    let halvings = interval.min(schedule.max_halvings as u64) as u32;
    schedule.base_amount >> halvings
}
