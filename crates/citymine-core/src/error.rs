use thiserror::Error;

use crate::types::{Asset, Balance, BlockHeight, RewardCycle};

/// Failure reported by the asset-transfer collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("insufficient {asset} balance: need {need}, have {have}")]
    InsufficientFunds { asset: Asset, need: Balance, have: Balance },

    #[error("transfer amount must be greater than zero")]
    ZeroAmount,

    #[error("sender and recipient are the same principal")]
    SelfTransfer,
}

/// Failure reported by the mint collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MintError {
    #[error("{0} cannot be minted")]
    NotMintable(Asset),

    #[error("mint amount must be greater than zero")]
    ZeroAmount,

    #[error("mint would overflow {0} supply")]
    SupplyOverflow(Asset),
}

/// Failure parsing a textual address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("invalid base58: {0}")]
    Base58(String),

    #[error("address must be 32 bytes, got {0}")]
    Length(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CitymineError {
    // ── Authorization ────────────────────────────────────────────────────────
    #[error("caller is not authorized for this operation")]
    Unauthorized,

    // ── Registration / activation ────────────────────────────────────────────
    #[error("principal is already registered")]
    AlreadyRegistered,

    #[error("user not found")]
    UserNotFound,

    #[error("activation threshold already reached; registration is closed")]
    ActivationThresholdReached,

    #[error("protocol is not activated")]
    NotActivated,

    // ── Mining ───────────────────────────────────────────────────────────────
    #[error("miner already committed at block {0}")]
    AlreadyMinedThisBlock(BlockHeight),

    #[error("commitment must be greater than zero")]
    InsufficientCommitment,

    #[error("insufficient {asset} balance: need {need}, have {have}")]
    InsufficientBalance { asset: Asset, need: Balance, have: Balance },

    #[error("user did not mine at block {0}")]
    UserDidNotMineInBlock(BlockHeight),

    #[error("reward for block {height} matures at block {matures_at}")]
    ClaimedBeforeMaturity { height: BlockHeight, matures_at: BlockHeight },

    #[error("no miners at block {0}")]
    NoMinersAtBlock(BlockHeight),

    #[error("reward for block {0} already claimed")]
    RewardAlreadyClaimed(BlockHeight),

    #[error("miner did not win block {0}")]
    MinerDidNotWin(BlockHeight),

    #[error("no randomness seed available for block {0}")]
    RandomnessUnavailable(BlockHeight),

    // ── Stacking ─────────────────────────────────────────────────────────────
    #[error("stacking is not available yet")]
    StackingNotAvailable,

    #[error("cannot stack: amount must be positive and lock period within 1..={max_lock_period}")]
    CannotStack { max_lock_period: u32 },

    #[error("reward cycle {0} has not completed")]
    RewardCycleNotCompleted(RewardCycle),

    #[error("nothing to redeem at cycle {0}")]
    NothingToRedeem(RewardCycle),

    // ── Memo ─────────────────────────────────────────────────────────────────
    #[error("memo exceeds maximum length of {max} bytes")]
    MemoTooLong { max: usize },

    // ── Collaborators ────────────────────────────────────────────────────────
    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("mint failed: {0}")]
    Mint(#[from] MintError),

    // ── Chain ────────────────────────────────────────────────────────────────
    #[error("unexpected block height: expected {expected}, got {got}")]
    UnexpectedBlockHeight { expected: BlockHeight, got: BlockHeight },

    #[error("cannot advance from block {tip} to {target}: more than {max} empty blocks")]
    HeightOutOfReach { tip: BlockHeight, target: BlockHeight, max: u64 },

    // ── Configuration ────────────────────────────────────────────────────────
    #[error("invalid protocol params: {0}")]
    InvalidParams(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CitymineError {
    /// Stable numeric code reported in receipts. Protocol outcomes use the
    /// 1000 range; infrastructure failures use the 2000 range.
    pub fn code(&self) -> u32 {
        match self {
            CitymineError::Unauthorized => 1000,
            CitymineError::AlreadyRegistered => 1001,
            CitymineError::UserNotFound => 1003,
            CitymineError::ActivationThresholdReached => 1004,
            CitymineError::NotActivated => 1005,
            CitymineError::AlreadyMinedThisBlock(_) => 1006,
            CitymineError::InsufficientCommitment => 1007,
            CitymineError::InsufficientBalance { .. } => 1008,
            CitymineError::UserDidNotMineInBlock(_) => 1009,
            CitymineError::ClaimedBeforeMaturity { .. } => 1010,
            CitymineError::NoMinersAtBlock(_) => 1011,
            CitymineError::RewardAlreadyClaimed(_) => 1012,
            CitymineError::MinerDidNotWin(_) => 1013,
            CitymineError::RandomnessUnavailable(_) => 1014,
            CitymineError::StackingNotAvailable => 1015,
            CitymineError::CannotStack { .. } => 1016,
            CitymineError::RewardCycleNotCompleted(_) => 1017,
            CitymineError::NothingToRedeem(_) => 1018,
            CitymineError::MemoTooLong { .. } => 1019,
            CitymineError::Transfer(_) => 2000,
            CitymineError::Mint(_) => 2001,
            CitymineError::UnexpectedBlockHeight { .. } => 2002,
            CitymineError::HeightOutOfReach { .. } => 2003,
            CitymineError::InvalidParams(_) => 2004,
            CitymineError::Serialization(_) => 2005,
            CitymineError::Storage(_) => 2006,
        }
    }
}
