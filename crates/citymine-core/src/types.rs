use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressParseError;

/// Amount of either asset in base units. u128 covers any commitment or
/// stacked balance with room for cycle-wide sums.
pub type Balance = u128;

/// Height of a block on the host chain.
pub type BlockHeight = u64;

/// Index of a reward cycle, counted from the activation block.
pub type RewardCycle = u64;

/// Sequence id assigned to a principal on first contact. Starts at 1.
pub type UserId = u64;

// ── Address ──────────────────────────────────────────────────────────────────

/// 32-byte principal identifier.
///
/// Human-readable formats (JSON) carry it as a base58 string; binary formats
/// carry the raw bytes. Text input may also name a well-known principal as
/// `label:<name>`, resolved through `from_label`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Deterministic address for a human-readable label: BLAKE3(label).
    /// Used for well-known principals and test wallets.
    pub fn from_label(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    /// The protocol escrow: holds stacked tokens and the stackers' pool.
    pub fn protocol() -> Self {
        Self::from_label("citymine-core")
    }

    /// Base-58 encoded string representation.
    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn from_b58(s: &str) -> Result<Self, AddressParseError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| AddressParseError::Base58(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::Length(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("label:") {
            Some(label) => Ok(Self::from_label(label)),
            None => Self::from_b58(s),
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_b58())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Self)
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.to_b58();
        write!(f, "Address({})", &s[..s.len().min(8)])
    }
}

// ── Asset ────────────────────────────────────────────────────────────────────

/// The two assets the protocol moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Asset {
    /// Host-chain currency committed by miners and paid out to stackers.
    Native,
    /// The city token minted as block reward and locked by stackers.
    Token,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Token => write!(f, "citycoins"),
        }
    }
}

// ── BlockHash ────────────────────────────────────────────────────────────────

/// 32-byte block identifier: SHA3-256 over the block header fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({}…)", &self.to_hex()[..16])
    }
}

/// Per-block randomness seed derived from the block hash.
pub type BlockSeed = [u8; 32];

// ── Ledger records ───────────────────────────────────────────────────────────

/// A registered or implicitly created participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub principal: Address,
}

/// One miner's commitment at one block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningCommitment {
    pub block_height: BlockHeight,
    pub miner_id: UserId,
    pub amount: Balance,
    pub claimed: bool,
}

/// Aggregate of all commitments at one block. Never decremented.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTotals {
    pub block_height: BlockHeight,
    pub total_committed: Balance,
    pub miner_count: u32,
    /// Set once the block's coinbase has been paid to the winner.
    pub reward_claimed: bool,
}

/// A user's stacking position at one cycle, as returned by
/// `get_stacker_at_cycle_or_default`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackerAtCycle {
    pub amount_stacked: Balance,
    pub to_return: Balance,
}

/// Cycle-wide stacking aggregates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackingStatsAtCycle {
    /// Native currency routed to the stackers' pool during the cycle.
    pub amount_native: Balance,
    /// Tokens stacked for the cycle across all users.
    pub amount_token: Balance,
}
