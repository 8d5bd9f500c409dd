use std::collections::BTreeMap;

use citymine_core::clock::ProtocolClock;
use citymine_core::ledger::ChainView;
use citymine_core::params::ProtocolParams;
use citymine_core::types::{Address, BlockHash, BlockHeight, BlockSeed, RewardCycle};
use serde::{Deserialize, Serialize};

use crate::activation::ActivationGate;
use crate::assets::AssetBook;
use crate::mining::MiningLedger;
use crate::stacking::StackingLedger;
use crate::users::UserRegistry;

/// Every registry and ledger the protocol owns. Components receive it (or
/// one of its fields) by reference; there is no global state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtocolState {
    pub params: ProtocolParams,
    pub city_wallet: Address,
    pub users: UserRegistry,
    pub activation: ActivationGate,
    pub mining: MiningLedger,
    pub stacking: StackingLedger,
}

impl ProtocolState {
    pub fn new(params: ProtocolParams, city_wallet: Address) -> Self {
        let activation = ActivationGate::new(params.activation_threshold, params.activation_delay);
        Self {
            params,
            city_wallet,
            users: UserRegistry::new(),
            activation,
            mining: MiningLedger::new(),
            stacking: StackingLedger::new(),
        }
    }

    pub fn clock(&self) -> Option<ProtocolClock> {
        self.activation.clock(self.params.reward_cycle_length)
    }

    /// Reward cycle containing `height`, or `None` before activation.
    pub fn cycle_of(&self, height: BlockHeight) -> Option<RewardCycle> {
        self.clock()?.cycle_of(height)
    }
}

/// Heights, hashes and seeds of the blocks applied so far.
///
/// Seeds are not part of the serialized snapshot; they live in the block
/// headers and are restored with `restore_seed` when a snapshot is loaded.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChainRecord {
    tip: BlockHeight,
    tip_hash: BlockHash,
    #[serde(skip)]
    seeds: BTreeMap<BlockHeight, BlockSeed>,
}

impl ChainRecord {
    pub fn tip(&self) -> BlockHeight {
        self.tip
    }

    pub fn tip_hash(&self) -> BlockHash {
        self.tip_hash
    }

    /// Append the block at `tip + 1`.
    pub fn push(&mut self, hash: BlockHash, seed: BlockSeed) -> BlockHeight {
        self.tip += 1;
        self.tip_hash = hash;
        self.seeds.insert(self.tip, seed);
        self.tip
    }

    /// Reinstate the seed of an already-applied block.
    pub fn restore_seed(&mut self, height: BlockHeight, seed: BlockSeed) {
        if height <= self.tip {
            self.seeds.insert(height, seed);
        }
    }
}

impl ChainView for ChainRecord {
    fn current_height(&self) -> BlockHeight {
        self.tip
    }

    fn block_seed(&self, height: BlockHeight) -> Option<BlockSeed> {
        self.seeds.get(&height).copied()
    }
}

/// Complete snapshot: protocol state, balances and chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct World {
    pub state: ProtocolState,
    pub assets: AssetBook,
    pub chain: ChainRecord,
}

impl World {
    pub fn new(params: ProtocolParams, city_wallet: Address) -> Self {
        Self {
            state: ProtocolState::new(params, city_wallet),
            assets: AssetBook::new(),
            chain: ChainRecord::default(),
        }
    }
}
