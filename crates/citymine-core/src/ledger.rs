//! Collaborator contracts the protocol core consumes.

use crate::error::{MintError, TransferError};
use crate::types::{Address, Asset, Balance, BlockHeight, BlockSeed};

/// Asset-transfer and mint primitives for both assets.
pub trait AssetLedger {
    fn balance(&self, asset: Asset, owner: &Address) -> Balance;

    fn transfer(
        &mut self,
        asset: Asset,
        from: &Address,
        to: &Address,
        amount: Balance,
    ) -> Result<(), TransferError>;

    fn mint(&mut self, asset: Asset, to: &Address, amount: Balance) -> Result<(), MintError>;
}

/// Read access to the host chain.
pub trait ChainView {
    fn current_height(&self) -> BlockHeight;

    /// Randomness seed of an already-produced block.
    fn block_seed(&self, height: BlockHeight) -> Option<BlockSeed>;
}
