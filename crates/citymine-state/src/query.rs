use citymine_core::coinbase::coinbase_amount;
use citymine_core::error::CitymineError;
use citymine_core::ledger::{AssetLedger, ChainView};
use citymine_core::types::{
    Address, Asset, Balance, BlockHeight, BlockTotals, MiningCommitment, RewardCycle,
    StackerAtCycle, StackingStatsAtCycle, UserId,
};
use citymine_crypto::RandomnessSource;

use crate::rewards::{validate_mining_claim, winner_at};
use crate::state::World;

/// Read-only queries over a world snapshot.
pub struct ProtocolQuery<'a> {
    world: &'a World,
    randomness: &'a dyn RandomnessSource,
}

impl<'a> ProtocolQuery<'a> {
    pub fn new(world: &'a World, randomness: &'a dyn RandomnessSource) -> Self {
        Self { world, randomness }
    }

    pub fn current_height(&self) -> BlockHeight {
        self.world.chain.current_height()
    }

    // ── Users and activation ─────────────────────────────────────────────────

    pub fn get_city_wallet(&self) -> &Address {
        &self.world.state.city_wallet
    }

    pub fn get_activation_block(&self) -> Result<BlockHeight, CitymineError> {
        self.world.state.activation.activation_height()
    }

    pub fn get_user_id(&self, principal: &Address) -> Option<UserId> {
        self.world.state.users.id_of(principal)
    }

    pub fn get_user(&self, id: UserId) -> Option<&Address> {
        self.world.state.users.principal_of(id)
    }

    /// Last user id handed out, registered or implicit.
    pub fn get_registered_users_nonce(&self) -> UserId {
        self.world.state.users.last_id()
    }

    pub fn get_registered_count(&self) -> u32 {
        self.world.state.activation.registered_count()
    }

    // ── Cycles ───────────────────────────────────────────────────────────────

    pub fn get_reward_cycle(&self, height: BlockHeight) -> Option<RewardCycle> {
        self.world.state.cycle_of(height)
    }

    pub fn get_first_block_in_reward_cycle(&self, cycle: RewardCycle) -> Option<BlockHeight> {
        self.world.state.clock().map(|c| c.first_block_of(cycle))
    }

    // ── Stacking ─────────────────────────────────────────────────────────────

    pub fn stacking_active_at_cycle(&self, cycle: RewardCycle) -> bool {
        self.world.state.stacking.is_active_at(cycle)
    }

    pub fn get_stacking_stats_at_cycle(&self, cycle: RewardCycle) -> StackingStatsAtCycle {
        self.world.state.stacking.stats_at_cycle(cycle)
    }

    pub fn get_stacker_at_cycle_or_default(&self, cycle: RewardCycle, user: UserId) -> StackerAtCycle {
        self.world.state.stacking.stacker_at_cycle_or_default(cycle, user)
    }

    pub fn get_entitled_stacking_reward(&self, user: UserId, cycle: RewardCycle) -> Balance {
        self.world.state.stacking.entitled_native(user, cycle)
    }

    // ── Mining ───────────────────────────────────────────────────────────────

    pub fn get_mining_stats_at_block(&self, height: BlockHeight) -> BlockTotals {
        self.world.state.mining.totals(height)
    }

    pub fn get_miner_at_block(&self, height: BlockHeight, user: UserId) -> Option<&MiningCommitment> {
        self.world.state.mining.commitment(height, user)
    }

    pub fn has_mined_at_block(&self, height: BlockHeight, user: UserId) -> bool {
        self.world.state.mining.has_mined(height, user)
    }

    /// Winner of `height`: the recorded winner once paid, otherwise the draw
    /// from the maturity block's seed.
    pub fn get_block_winner_id(&self, height: BlockHeight) -> Result<Option<UserId>, CitymineError> {
        if let Some(id) = self.world.state.mining.winner(height) {
            return Ok(Some(id));
        }
        winner_at(&self.world.state, &self.world.chain, self.randomness, height)
    }

    pub fn is_block_winner(&self, principal: &Address, height: BlockHeight) -> Result<bool, CitymineError> {
        let Some(id) = self.get_user_id(principal) else {
            return Ok(false);
        };
        Ok(self.get_block_winner_id(height)? == Some(id))
    }

    /// Whether `principal` could claim `height` at the current tip.
    pub fn can_claim_mining_reward(&self, principal: &Address, height: BlockHeight) -> bool {
        validate_mining_claim(
            &self.world.state,
            &self.world.chain,
            self.randomness,
            principal,
            height,
            self.current_height(),
        )
        .is_ok()
    }

    /// Coinbase paid for `height`; 0 before activation is scheduled.
    pub fn get_coinbase_amount(&self, height: BlockHeight) -> Balance {
        match self.world.state.activation.activation_height() {
            Ok(at) => coinbase_amount(&self.world.state.params.coinbase, at, height),
            Err(_) => 0,
        }
    }

    // ── Balances ─────────────────────────────────────────────────────────────

    pub fn balance(&self, asset: Asset, owner: &Address) -> Balance {
        self.world.assets.balance(asset, owner)
    }

    pub fn token_supply(&self) -> Balance {
        self.world.assets.token_supply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citymine_core::params::ProtocolParams;
    use citymine_core::types::BlockHash;
    use citymine_crypto::FixedDraw;

    use crate::rewards::RewardEngine;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    /// One registrant, activation at 1 + delay, 10-block cycles, maturity 5.
    fn small_world() -> (World, BlockHeight) {
        let params = ProtocolParams {
            activation_threshold: 1,
            activation_delay: 10,
            reward_cycle_length: 10,
            token_reward_maturity: 5,
            ..Default::default()
        };
        let mut world = World::new(params, addr("city_wallet"));
        world.state.activation.register(&mut world.state.users, &addr("wallet_1"), 1).unwrap();
        let act = world.state.activation.activation_height().unwrap();
        (world, act)
    }

    fn push_until(world: &mut World, height: BlockHeight) {
        while world.chain.tip() < height {
            world.chain.push(BlockHash::default(), [world.chain.tip() as u8; 32]);
        }
    }

    #[test]
    fn cycle_queries_anchor_at_activation() {
        let (world, act) = small_world();
        let draw = FixedDraw(0);
        let q = ProtocolQuery::new(&world, &draw);
        assert_eq!(act, 11);
        assert_eq!(q.get_activation_block(), Ok(11));
        assert_eq!(q.get_reward_cycle(10), None);
        assert_eq!(q.get_reward_cycle(11), Some(0));
        assert_eq!(q.get_reward_cycle(21), Some(1));
        assert_eq!(q.get_first_block_in_reward_cycle(3), Some(41));
        assert_eq!(q.get_registered_users_nonce(), 1);
        assert_eq!(q.get_user_id(&addr("wallet_1")), Some(1));
        assert_eq!(q.get_user(1), Some(&addr("wallet_1")));
    }

    #[test]
    fn mining_queries_follow_commitments() {
        let (mut world, act) = small_world();
        let draw = FixedDraw(0);
        let miner = addr("wallet_1");
        world.assets.fund_native(&miner, 1_000);
        {
            let mut e = RewardEngine::new(&mut world.state, &mut world.assets, &world.chain, &draw);
            e.mine(&miner, 300, None, act).unwrap();
        }

        let q = ProtocolQuery::new(&world, &draw);
        assert!(q.has_mined_at_block(act, 1));
        assert_eq!(q.get_miner_at_block(act, 1).map(|c| c.amount), Some(300));
        assert_eq!(q.get_mining_stats_at_block(act).total_committed, 300);
        assert_eq!(
            q.get_block_winner_id(act),
            Err(CitymineError::RandomnessUnavailable(act))
        );
        assert!(!q.can_claim_mining_reward(&miner, act));
        assert_eq!(q.get_block_winner_id(act + 1), Ok(None));

        push_until(&mut world, act + 5);
        let q = ProtocolQuery::new(&world, &draw);
        assert_eq!(q.get_block_winner_id(act), Ok(Some(1)));
        assert_eq!(q.is_block_winner(&miner, act), Ok(true));
        assert_eq!(q.is_block_winner(&addr("stranger"), act), Ok(false));
        assert!(q.can_claim_mining_reward(&miner, act));
        assert_eq!(q.get_coinbase_amount(act), 250_000);
    }

    #[test]
    fn coinbase_zero_before_activation_scheduled() {
        let world = World::new(ProtocolParams::default(), addr("city_wallet"));
        let draw = FixedDraw(0);
        let q = ProtocolQuery::new(&world, &draw);
        assert_eq!(q.get_coinbase_amount(500), 0);
        assert_eq!(q.get_activation_block(), Err(CitymineError::NotActivated));
        assert_eq!(q.get_first_block_in_reward_cycle(0), None);
    }

    #[test]
    fn stacking_queries_read_defaults() {
        let (world, _) = small_world();
        let draw = FixedDraw(0);
        let q = ProtocolQuery::new(&world, &draw);
        assert!(!q.stacking_active_at_cycle(1));
        assert_eq!(q.get_stacker_at_cycle_or_default(1, 1), StackerAtCycle::default());
        assert_eq!(q.get_stacking_stats_at_cycle(1), StackingStatsAtCycle::default());
        assert_eq!(q.get_entitled_stacking_reward(1, 1), 0);
    }
}
