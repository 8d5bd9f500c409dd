//! Block scripts replayed by the node, and the JSON summary it prints.
//!
//! A script is a list of blocks. A block may pin its `height`; the node fills
//! the gap with empty blocks first. Unpinned blocks are applied at the next
//! height.
//!
//! ```json
//! { "blocks": [
//!     { "submissions": [
//!         { "sender": "label:wallet_1", "action": { "RegisterUser": { "memo": "hi" } } } ] },
//!     { "height": 11, "submissions": [
//!         { "sender": "label:wallet_1", "action": { "MineTokens": { "amount": 200, "memo": null } } } ] }
//! ] }
//! ```

use std::path::Path;

use anyhow::Context;
use citymine_core::action::{BlockReceipt, Submission};
use citymine_core::types::{Address, Asset, Balance, BlockHeight, UserId};
use citymine_state::ProtocolQuery;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Script {
    pub blocks: Vec<ScriptBlock>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScriptBlock {
    #[serde(default)]
    pub height: Option<BlockHeight>,
    #[serde(default)]
    pub submissions: Vec<Submission>,
}

impl Script {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading block script from {}", path.display()))?;
        serde_json::from_str(&json).context("parsing block script JSON")
    }
}

/// A rejected submission as reported in the summary.
#[derive(Clone, Debug, Serialize)]
pub struct Rejection {
    pub height: BlockHeight,
    pub sender: Address,
    pub code: u32,
    pub error: String,
}

/// Running counts over applied blocks.
#[derive(Clone, Debug, Default)]
pub struct Tally {
    pub blocks: usize,
    pub accepted: usize,
    pub rejections: Vec<Rejection>,
}

impl Tally {
    pub fn record(&mut self, receipt: &BlockReceipt) {
        self.blocks += 1;
        for r in &receipt.receipts {
            match &r.result {
                Ok(_) => self.accepted += 1,
                Err(e) => self.rejections.push(Rejection {
                    height: receipt.height,
                    sender: r.sender.clone(),
                    code: e.code(),
                    error: e.to_string(),
                }),
            }
        }
    }
}

/// Final state printed to stdout after a run.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub height: BlockHeight,
    pub activation_block: Option<BlockHeight>,
    pub registered_users: u32,
    pub users_nonce: UserId,
    pub city_wallet: Address,
    pub city_native: Balance,
    pub escrow_native: Balance,
    pub escrow_token: Balance,
    pub token_supply: Balance,
    pub blocks_applied: usize,
    pub accepted: usize,
    pub rejected: Vec<Rejection>,
}

impl RunSummary {
    pub fn collect(q: &ProtocolQuery<'_>, tally: Tally) -> Self {
        let city_wallet = q.get_city_wallet().clone();
        let escrow = Address::protocol();
        Self {
            height: q.current_height(),
            activation_block: q.get_activation_block().ok(),
            registered_users: q.get_registered_count(),
            users_nonce: q.get_registered_users_nonce(),
            city_native: q.balance(Asset::Native, &city_wallet),
            city_wallet,
            escrow_native: q.balance(Asset::Native, &escrow),
            escrow_token: q.balance(Asset::Token, &escrow),
            token_supply: q.token_supply(),
            blocks_applied: tally.blocks,
            accepted: tally.accepted,
            rejected: tally.rejections,
        }
    }
}
