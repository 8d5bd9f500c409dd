use std::collections::BTreeMap;

use citymine_core::types::{Balance, BlockHeight, BlockTotals, MiningCommitment, UserId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct BlockRecord {
    totals: BlockTotals,
    /// Commitments in the order they were applied.
    commitments: Vec<MiningCommitment>,
    winner: Option<UserId>,
}

/// Per-block commitments and claim status.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MiningLedger {
    blocks: BTreeMap<BlockHeight, BlockRecord>,
}

impl MiningLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commitment(&self, height: BlockHeight, miner: UserId) -> Option<&MiningCommitment> {
        self.blocks
            .get(&height)?
            .commitments
            .iter()
            .find(|c| c.miner_id == miner)
    }

    pub fn has_mined(&self, height: BlockHeight, miner: UserId) -> bool {
        self.commitment(height, miner).is_some()
    }

    /// Totals at `height`; a zeroed record for blocks nobody mined.
    pub fn totals(&self, height: BlockHeight) -> BlockTotals {
        self.blocks
            .get(&height)
            .map(|b| b.totals.clone())
            .unwrap_or(BlockTotals { block_height: height, ..Default::default() })
    }

    pub fn commitments(&self, height: BlockHeight) -> &[MiningCommitment] {
        self.blocks.get(&height).map(|b| b.commitments.as_slice()).unwrap_or(&[])
    }

    /// Winner recorded by a successful claim.
    pub fn winner(&self, height: BlockHeight) -> Option<UserId> {
        self.blocks.get(&height).and_then(|b| b.winner)
    }

    /// Append a commitment. The caller has already rejected duplicates.
    pub fn record(&mut self, height: BlockHeight, miner: UserId, amount: Balance) {
        let block = self.blocks.entry(height).or_insert_with(|| BlockRecord {
            totals: BlockTotals { block_height: height, ..Default::default() },
            ..Default::default()
        });
        block.commitments.push(MiningCommitment {
            block_height: height,
            miner_id: miner,
            amount,
            claimed: false,
        });
        block.totals.total_committed += amount;
        block.totals.miner_count += 1;
    }

    /// Flag the winner's commitment and the block as paid.
    pub fn mark_claimed(&mut self, height: BlockHeight, miner: UserId) {
        if let Some(block) = self.blocks.get_mut(&height) {
            if let Some(c) = block.commitments.iter_mut().find(|c| c.miner_id == miner) {
                c.claimed = true;
            }
            block.totals.reward_claimed = true;
            block.winner = Some(miner);
        }
    }
}

/// Pick the miner whose cumulative range `[low, high)` contains
/// `draw mod total_committed`. Ranges are laid out in commitment order, each
/// as wide as the miner's commitment, so the chance of winning is the
/// commitment's share of the block total.
pub fn select_winner(commitments: &[MiningCommitment], draw: u128) -> Option<UserId> {
    let total: Balance = commitments.iter().map(|c| c.amount).sum();
    if total == 0 {
        return None;
    }
    let target = draw % total;
    let mut low: Balance = 0;
    for c in commitments {
        let high = low + c.amount;
        if target < high {
            return Some(c.miner_id);
        }
        low = high;
    }
    None
}
