use serde::{Deserialize, Serialize};

use crate::error::CitymineError;
use crate::types::{Address, Asset, Balance, BlockHash, BlockHeight, BlockSeed, RewardCycle, UserId};

// ── Action ────────────────────────────────────────────────────────────────────

/// Every state-changing call a principal can submit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    /// Register during the activation window. Counts toward the threshold.
    RegisterUser { memo: Option<String> },

    /// Commit `amount` native currency to the lottery for the current block.
    MineTokens { amount: Balance, memo: Option<Vec<u8>> },

    /// Lock `amount` tokens for the next `lock_period` reward cycles.
    StackTokens { amount: Balance, lock_period: u32 },

    /// Claim the coinbase of a mature block the sender won.
    ClaimMiningReward { block_height: BlockHeight },

    /// Collect the stacking payout and returned tokens for a completed cycle.
    ClaimStackingReward { target_cycle: RewardCycle },

    /// Hand the city treasury over to a new principal. City wallet only.
    SetCityWallet { new_wallet: Address },
}

/// An action together with the principal that submitted it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Submission {
    pub sender: Address,
    pub action: Action,
}

impl Submission {
    pub fn new(sender: Address, action: Action) -> Self {
        Self { sender, action }
    }
}

// ── Outcome / events ─────────────────────────────────────────────────────────

/// Success marker returned by a mutating call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Outcome {
    Registered { user_id: UserId },
    Mined,
    Stacked,
    MiningRewardClaimed { amount: Balance },
    StackingRewardClaimed { native: Balance, tokens: Balance },
    CityWalletChanged,
}

/// Observable side effect of a successful call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Event {
    /// Memo attached to a registration or commitment.
    Print { memo: Vec<u8> },
    Transfer { asset: Asset, amount: Balance, sender: Address, recipient: Address },
    Mint { asset: Asset, amount: Balance, recipient: Address },
}

/// Result of one submission inside a block. Failed submissions carry no events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub sender: Address,
    pub result: Result<Outcome, CitymineError>,
    pub events: Vec<Event>,
}

impl TxReceipt {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Numeric error code, if the submission failed.
    pub fn error_code(&self) -> Option<u32> {
        self.result.as_ref().err().map(CitymineError::code)
    }

    pub fn transfers(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| matches!(e, Event::Transfer { .. }))
    }
}

/// Result of applying one block.
#[derive(Clone, Debug)]
pub struct BlockReceipt {
    pub height: BlockHeight,
    pub hash: BlockHash,
    pub receipts: Vec<TxReceipt>,
}

/// Header persisted for every applied block.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    pub height: BlockHeight,
    pub parent_hash: BlockHash,
    pub hash: BlockHash,
    pub seed: BlockSeed,
    pub submission_count: u32,
}
