use std::collections::BTreeMap;

use citymine_core::error::{MintError, TransferError};
use citymine_core::ledger::AssetLedger;
use citymine_core::types::{Address, Asset, Balance};
use serde::{Deserialize, Serialize};

/// Balances of one principal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holdings {
    pub native: Balance,
    pub token: Balance,
}

impl Holdings {
    fn get(&self, asset: Asset) -> Balance {
        match asset {
            Asset::Native => self.native,
            Asset::Token => self.token,
        }
    }

    fn slot(&mut self, asset: Asset) -> &mut Balance {
        match asset {
            Asset::Native => &mut self.native,
            Asset::Token => &mut self.token,
        }
    }
}

/// In-memory asset ledger for both assets.
///
/// Native currency is only ever moved; tokens may also be minted (block
/// rewards, genesis allocations).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AssetBook {
    holdings: BTreeMap<Address, Holdings>,
    token_supply: Balance,
}

impl AssetBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit native currency outside the protocol (genesis funding).
    pub fn fund_native(&mut self, owner: &Address, amount: Balance) {
        let h = self.holdings.entry(owner.clone()).or_default();
        h.native = h.native.saturating_add(amount);
    }

    pub fn holdings(&self, owner: &Address) -> Holdings {
        self.holdings.get(owner).copied().unwrap_or_default()
    }

    pub fn token_supply(&self) -> Balance {
        self.token_supply
    }
}

impl AssetLedger for AssetBook {
    fn balance(&self, asset: Asset, owner: &Address) -> Balance {
        self.holdings(owner).get(asset)
    }

    fn transfer(
        &mut self,
        asset: Asset,
        from: &Address,
        to: &Address,
        amount: Balance,
    ) -> Result<(), TransferError> {
        if amount == 0 {
            return Err(TransferError::ZeroAmount);
        }
        if from == to {
            return Err(TransferError::SelfTransfer);
        }
        let have = self.balance(asset, from);
        if have < amount {
            return Err(TransferError::InsufficientFunds { asset, need: amount, have });
        }
        *self.holdings.entry(from.clone()).or_default().slot(asset) -= amount;
        let recipient = self.holdings.entry(to.clone()).or_default().slot(asset);
        *recipient = recipient.saturating_add(amount);
        Ok(())
    }

    fn mint(&mut self, asset: Asset, to: &Address, amount: Balance) -> Result<(), MintError> {
        if asset != Asset::Token {
            return Err(MintError::NotMintable(asset));
        }
        if amount == 0 {
            return Err(MintError::ZeroAmount);
        }
        self.token_supply = self
            .token_supply
            .checked_add(amount)
            .ok_or(MintError::SupplyOverflow(asset))?;
        let h = self.holdings.entry(to.clone()).or_default();
        h.token += amount;
        Ok(())
    }
}
