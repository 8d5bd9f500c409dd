use citymine_core::action::Event;
use citymine_core::coinbase::coinbase_amount;
use citymine_core::constants::MAX_MEMO_BYTES;
use citymine_core::error::{CitymineError, TransferError};
use citymine_core::ledger::{AssetLedger, ChainView};
use citymine_core::types::{Address, Asset, Balance, BlockHeight, RewardCycle, UserId};
use citymine_crypto::RandomnessSource;
use tracing::{debug, info};

use crate::mining::select_winner;
use crate::stacking::StackingLedger;
use crate::state::ProtocolState;

/// Applies mining, stacking and claim calls against the protocol state.
///
/// Every entry point validates all preconditions first and only then moves
/// assets and writes ledgers, so a returned error leaves no trace. Events
/// emitted by successful calls accumulate until `into_events`.
pub struct RewardEngine<'a> {
    state: &'a mut ProtocolState,
    assets: &'a mut dyn AssetLedger,
    chain: &'a dyn ChainView,
    randomness: &'a dyn RandomnessSource,
    events: Vec<Event>,
}

impl<'a> RewardEngine<'a> {
    pub fn new(
        state: &'a mut ProtocolState,
        assets: &'a mut dyn AssetLedger,
        chain: &'a dyn ChainView,
        randomness: &'a dyn RandomnessSource,
    ) -> Self {
        Self { state, assets, chain, randomness, events: Vec::new() }
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    // ── Registration ─────────────────────────────────────────────────────────

    pub fn register(
        &mut self,
        principal: &Address,
        memo: Option<&str>,
        height: BlockHeight,
    ) -> Result<UserId, CitymineError> {
        if let Some(m) = memo {
            check_memo(m.as_bytes())?;
        }
        let id = self.state.activation.register(&mut self.state.users, principal, height)?;
        if let Some(m) = memo {
            self.events.push(Event::Print { memo: m.as_bytes().to_vec() });
        }
        debug!(user = %principal, id, height, "registered user");
        Ok(id)
    }

    // ── Mining ───────────────────────────────────────────────────────────────

    /// Commit `amount` native currency at `height`.
    pub fn mine(
        &mut self,
        miner: &Address,
        amount: Balance,
        memo: Option<&[u8]>,
        height: BlockHeight,
    ) -> Result<(), CitymineError> {
        reject_escrow(miner)?;
        if !self.state.activation.is_scheduled() {
            return Err(CitymineError::NotActivated);
        }
        if amount == 0 {
            return Err(CitymineError::InsufficientCommitment);
        }
        if let Some(m) = memo {
            check_memo(m)?;
        }
        let have = self.assets.balance(Asset::Native, miner);
        if have < amount {
            return Err(CitymineError::InsufficientBalance { asset: Asset::Native, need: amount, have });
        }
        if !self.state.activation.is_activated(height) {
            return Err(CitymineError::NotActivated);
        }
        let cycle = self.state.cycle_of(height).ok_or(CitymineError::NotActivated)?;
        if let Some(id) = self.state.users.id_of(miner) {
            if self.state.mining.has_mined(height, id) {
                return Err(CitymineError::AlreadyMinedThisBlock(height));
            }
        }
        let city = self.state.city_wallet.clone();
        if *miner == city {
            return Err(TransferError::SelfTransfer.into());
        }

        // ── Effects ──────────────────────────────────────────────────────────
        if let Some(m) = memo {
            self.events.push(Event::Print { memo: m.to_vec() });
        }

        if self.state.stacking.is_active_at(cycle) {
            let city_share = self.state.params.city_share(amount);
            let pool_share = amount - city_share;
            self.transfer(Asset::Native, miner, &city, city_share)?;
            self.transfer(Asset::Native, miner, &Address::protocol(), pool_share)?;
            self.state.stacking.credit_pool(cycle, pool_share);
            debug!(height, cycle, city_share, pool_share, "commitment split with stackers");
        } else {
            self.transfer(Asset::Native, miner, &city, amount)?;
        }

        let id = self.state.users.get_or_create(miner);
        self.state.mining.record(height, id, amount);
        info!(miner = %miner, id, height, amount, "commitment recorded");
        Ok(())
    }

    /// Pay the coinbase of `height` to `claimant` if they won it.
    pub fn claim_mining_reward(
        &mut self,
        claimant: &Address,
        height: BlockHeight,
        current_height: BlockHeight,
    ) -> Result<Balance, CitymineError> {
        let id = validate_mining_claim(
            self.state,
            self.chain,
            self.randomness,
            claimant,
            height,
            current_height,
        )?;
        let activation_height = self.state.activation.activation_height()?;
        let amount = coinbase_amount(&self.state.params.coinbase, activation_height, height);

        // ── Effects ──────────────────────────────────────────────────────────
        if amount > 0 {
            self.assets.mint(Asset::Token, claimant, amount)?;
            self.events.push(Event::Mint { asset: Asset::Token, amount, recipient: claimant.clone() });
        }
        self.state.mining.mark_claimed(height, id);
        info!(winner = %claimant, id, height, amount, "mining reward claimed");
        Ok(amount)
    }

    // ── Stacking ─────────────────────────────────────────────────────────────

    /// Lock `amount` tokens for the `lock_period` cycles after the current one.
    pub fn stack(
        &mut self,
        stacker: &Address,
        amount: Balance,
        lock_period: u32,
        height: BlockHeight,
    ) -> Result<(), CitymineError> {
        reject_escrow(stacker)?;
        if !self.state.activation.is_activated(height) {
            return Err(CitymineError::StackingNotAvailable);
        }
        StackingLedger::check_lock(amount, lock_period, self.state.params.max_lock_period)?;
        let have = self.assets.balance(Asset::Token, stacker);
        if have < amount {
            return Err(CitymineError::InsufficientBalance { asset: Asset::Token, need: amount, have });
        }
        let (first, last) = self
            .state
            .clock()
            .and_then(|c| c.stacking_window(height, lock_period))
            .ok_or(CitymineError::StackingNotAvailable)?;

        // ── Effects ──────────────────────────────────────────────────────────
        self.transfer(Asset::Token, stacker, &Address::protocol(), amount)?;
        let id = self.state.users.get_or_create(stacker);
        self.state.stacking.record(id, first, last, amount);
        info!(stacker = %stacker, id, amount, first, last, "tokens stacked");
        Ok(())
    }

    /// Pay out the stacker's share of `target_cycle`'s pool and return the
    /// tokens unlocking at that cycle. Returns `(native, tokens)`.
    pub fn claim_stacking_reward(
        &mut self,
        claimant: &Address,
        target_cycle: RewardCycle,
        current_height: BlockHeight,
    ) -> Result<(Balance, Balance), CitymineError> {
        reject_escrow(claimant)?;
        let current_cycle = self
            .state
            .cycle_of(current_height)
            .ok_or(CitymineError::StackingNotAvailable)?;
        let id = self.state.users.id_of(claimant).ok_or(CitymineError::UserNotFound)?;
        if current_cycle <= target_cycle {
            return Err(CitymineError::RewardCycleNotCompleted(target_cycle));
        }
        let to_return = self.state.stacking.stacker_at_cycle_or_default(target_cycle, id).to_return;
        let entitled = self.state.stacking.entitled_native(id, target_cycle);
        if to_return == 0 && entitled == 0 {
            return Err(CitymineError::NothingToRedeem(target_cycle));
        }
        let escrow = Address::protocol();
        for (asset, need) in [(Asset::Token, to_return), (Asset::Native, entitled)] {
            let have = self.assets.balance(asset, &escrow);
            if have < need {
                return Err(CitymineError::InsufficientBalance { asset, need, have });
            }
        }

        // ── Effects ──────────────────────────────────────────────────────────
        self.transfer(Asset::Token, &escrow, claimant, to_return)?;
        self.transfer(Asset::Native, &escrow, claimant, entitled)?;
        self.state.stacking.mark_redeemed(id, target_cycle);
        info!(stacker = %claimant, id, target_cycle, entitled, to_return, "stacking reward claimed");
        Ok((entitled, to_return))
    }

    // ── City wallet ──────────────────────────────────────────────────────────

    pub fn set_city_wallet(&mut self, caller: &Address, new_wallet: &Address) -> Result<(), CitymineError> {
        if *caller != self.state.city_wallet || *new_wallet == Address::protocol() {
            return Err(CitymineError::Unauthorized);
        }
        self.state.city_wallet = new_wallet.clone();
        info!(city_wallet = %new_wallet, "city wallet changed");
        Ok(())
    }

    /// Move `amount` of `asset` and emit the transfer event. Zero amounts are
    /// skipped without an event.
    fn transfer(
        &mut self,
        asset: Asset,
        from: &Address,
        to: &Address,
        amount: Balance,
    ) -> Result<(), CitymineError> {
        if amount == 0 {
            return Ok(());
        }
        self.assets.transfer(asset, from, to, amount)?;
        self.events.push(Event::Transfer {
            asset,
            amount,
            sender: from.clone(),
            recipient: to.clone(),
        });
        Ok(())
    }
}

/// Run every precondition of a mining claim without touching state. Returns
/// the claimant's id when the claim would succeed.
pub fn validate_mining_claim(
    state: &ProtocolState,
    chain: &dyn ChainView,
    randomness: &dyn RandomnessSource,
    claimant: &Address,
    height: BlockHeight,
    current_height: BlockHeight,
) -> Result<UserId, CitymineError> {
    reject_escrow(claimant)?;
    let id = state.users.id_of(claimant).ok_or(CitymineError::UserNotFound)?;
    let totals = state.mining.totals(height);
    if totals.miner_count == 0 {
        return Err(CitymineError::NoMinersAtBlock(height));
    }
    if !state.mining.has_mined(height, id) {
        return Err(CitymineError::UserDidNotMineInBlock(height));
    }
    let matures_at = height + state.params.token_reward_maturity;
    if current_height < matures_at {
        return Err(CitymineError::ClaimedBeforeMaturity { height, matures_at });
    }
    if totals.reward_claimed {
        return Err(CitymineError::RewardAlreadyClaimed(height));
    }
    if winner_at(state, chain, randomness, height)? != Some(id) {
        return Err(CitymineError::MinerDidNotWin(height));
    }
    Ok(id)
}

/// Weighted winner of `height`, drawn from the seed of the block at
/// `height + token_reward_maturity`. `Ok(None)` when nobody mined.
pub fn winner_at(
    state: &ProtocolState,
    chain: &dyn ChainView,
    randomness: &dyn RandomnessSource,
    height: BlockHeight,
) -> Result<Option<UserId>, CitymineError> {
    let commitments = state.mining.commitments(height);
    if commitments.is_empty() {
        return Ok(None);
    }
    let seed_height = height + state.params.token_reward_maturity;
    let seed = chain
        .block_seed(seed_height)
        .ok_or(CitymineError::RandomnessUnavailable(height))?;
    Ok(select_winner(commitments, randomness.draw(height, &seed)))
}

/// The escrow principal holds stacked tokens and pooled native for everyone;
/// it never acts as a sender.
fn reject_escrow(sender: &Address) -> Result<(), CitymineError> {
    if *sender == Address::protocol() {
        return Err(CitymineError::Unauthorized);
    }
    Ok(())
}

fn check_memo(memo: &[u8]) -> Result<(), CitymineError> {
    if memo.len() > MAX_MEMO_BYTES {
        return Err(CitymineError::MemoTooLong { max: MAX_MEMO_BYTES });
    }
    Ok(())
}
