use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use citymine_core::action::{Action, BlockHeader, BlockReceipt, Outcome, Submission, TxReceipt};
use citymine_core::constants::MAX_EMPTY_BLOCKS_PER_CALL;
use citymine_core::error::CitymineError;
use citymine_core::types::{Balance, BlockHeight};
use citymine_crypto::{block_hash, block_seed, Blake3Draw, RandomnessSource};
use tracing::{debug, info, warn};

use crate::db::StateDb;
use crate::query::ProtocolQuery;
use crate::rewards::RewardEngine;
use crate::state::World;

const META_TIP: &str = "tip";

// ── StateEngine ───────────────────────────────────────────────────────────────

/// The block-processing engine.
///
/// Holds the world behind a read/write lock. `apply_block` takes the write
/// lock for the whole block, so readers only ever see the state as of the
/// last fully applied block. Submissions inside a block run in order; each
/// one validates before it mutates, so a failed submission leaves no trace
/// and does not affect the others.
pub struct StateEngine {
    world: RwLock<World>,
    randomness: Box<dyn RandomnessSource>,
    db: Option<Arc<StateDb>>,
}

impl StateEngine {
    /// In-memory engine using the default BLAKE3 winner draw.
    pub fn new(world: World) -> Self {
        Self::with_randomness(world, Box::new(Blake3Draw))
    }

    pub fn with_randomness(world: World, randomness: Box<dyn RandomnessSource>) -> Self {
        Self { world: RwLock::new(world), randomness, db: None }
    }

    /// Resume from the snapshot stored in `db`, or start from `genesis` and
    /// persist it when the database is empty. Block seeds are restored from
    /// the stored headers.
    pub fn open(
        db: Arc<StateDb>,
        genesis: World,
        randomness: Box<dyn RandomnessSource>,
    ) -> Result<Self, CitymineError> {
        let world = match db.get_world()? {
            Some(mut stored) => {
                for header in db.headers() {
                    let header = header?;
                    stored.chain.restore_seed(header.height, header.seed);
                }
                info!(height = stored.chain.tip(), "resuming from stored snapshot");
                stored
            }
            None => {
                db.put_world(&genesis)?;
                db.put_meta(META_TIP, &genesis.chain.tip().to_be_bytes())?;
                db.flush()?;
                info!("database initialised from genesis");
                genesis
            }
        };
        Ok(Self { world: RwLock::new(world), randomness, db: Some(db) })
    }

    pub fn db(&self) -> Option<&Arc<StateDb>> {
        self.db.as_ref()
    }

    pub fn current_height(&self) -> BlockHeight {
        self.read_world().chain.tip()
    }

    /// Run `f` against a consistent read-only view.
    pub fn query<R>(&self, f: impl FnOnce(&ProtocolQuery<'_>) -> R) -> R {
        let world = self.read_world();
        let q = ProtocolQuery::new(&world, &*self.randomness);
        f(&q)
    }

    /// Clone of the current world.
    pub fn snapshot(&self) -> World {
        self.read_world().clone()
    }

    /// Apply `submissions` as the next block.
    pub fn apply_block(&self, submissions: Vec<Submission>) -> Result<BlockReceipt, CitymineError> {
        let mut world = self.write_world();
        let (receipt, header) = self.advance(&mut world, &submissions);
        self.store_header(&header)?;
        self.persist(&world)?;
        Ok(receipt)
    }

    /// Apply `submissions` only if they are meant for `height`.
    pub fn apply_block_at(
        &self,
        height: BlockHeight,
        submissions: Vec<Submission>,
    ) -> Result<BlockReceipt, CitymineError> {
        let expected = self.current_height() + 1;
        if height != expected {
            return Err(CitymineError::UnexpectedBlockHeight { expected, got: height });
        }
        self.apply_block(submissions)
    }

    /// Append empty blocks until the tip reaches `height`. Headers are written
    /// as each block is applied; the snapshot is persisted once at the end.
    /// At most `MAX_EMPTY_BLOCKS_PER_CALL` blocks are appended per call.
    pub fn mine_empty_blocks_until(&self, height: BlockHeight) -> Result<(), CitymineError> {
        let mut world = self.write_world();
        let start = world.chain.tip();
        if height <= start {
            return Ok(());
        }
        if height - start > MAX_EMPTY_BLOCKS_PER_CALL {
            return Err(CitymineError::HeightOutOfReach {
                tip: start,
                target: height,
                max: MAX_EMPTY_BLOCKS_PER_CALL,
            });
        }
        while world.chain.tip() < height {
            let (_, header) = self.advance(&mut world, &[]);
            self.store_header(&header)?;
        }
        debug!(from = start, to = height, "advanced over empty blocks");
        self.persist(&world)
    }

    fn advance(&self, world: &mut World, submissions: &[Submission]) -> (BlockReceipt, BlockHeader) {
        let height = world.chain.tip() + 1;
        let parent_hash = world.chain.tip_hash();
        let hash = block_hash(&parent_hash, height, submissions);
        // Seeded from the parent only, so nothing submitted in this block can
        // steer it. Published before any submission runs so claims maturing
        // exactly at this block can draw from it.
        let seed = block_seed(&parent_hash, height);
        world.chain.push(hash, seed);

        let World { state, assets, chain } = world;
        let mut receipts = Vec::with_capacity(submissions.len());
        for sub in submissions {
            let mut engine = RewardEngine::new(&mut *state, &mut *assets, &*chain, &*self.randomness);
            let result = dispatch(&mut engine, sub, height);
            let events = match &result {
                Ok(_) => engine.into_events(),
                Err(e) => {
                    debug!(height, sender = %sub.sender, code = e.code(), error = %e, "submission rejected");
                    Vec::new()
                }
            };
            receipts.push(TxReceipt { sender: sub.sender.clone(), result, events });
        }

        let failed = receipts.iter().filter(|r| !r.is_ok()).count();
        if !submissions.is_empty() {
            info!(
                height,
                hash = %hash.to_hex(),
                applied = receipts.len() - failed,
                failed,
                "block applied"
            );
        }

        let header = BlockHeader {
            height,
            parent_hash,
            hash,
            seed,
            submission_count: submissions.len() as u32,
        };
        (BlockReceipt { height, hash, receipts }, header)
    }

    fn store_header(&self, header: &BlockHeader) -> Result<(), CitymineError> {
        match &self.db {
            Some(db) => db.put_header(header),
            None => Ok(()),
        }
    }

    fn persist(&self, world: &World) -> Result<(), CitymineError> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        db.put_world(world)?;
        db.put_meta(META_TIP, &world.chain.tip().to_be_bytes())?;
        db.flush()
    }

    fn read_world(&self) -> RwLockReadGuard<'_, World> {
        self.world.read().unwrap_or_else(|poisoned| {
            warn!("world lock poisoned; continuing with last written state");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write_world(&self) -> RwLockWriteGuard<'_, World> {
        self.world.write().unwrap_or_else(|poisoned| {
            warn!("world lock poisoned; continuing with last written state");
            PoisonError::into_inner(poisoned)
        })
    }
}

/// Route one submission to the reward engine at block `height`.
fn dispatch(
    engine: &mut RewardEngine<'_>,
    sub: &Submission,
    height: BlockHeight,
) -> Result<Outcome, CitymineError> {
    let sender = &sub.sender;
    match &sub.action {
        Action::RegisterUser { memo } => engine
            .register(sender, memo.as_deref(), height)
            .map(|user_id| Outcome::Registered { user_id }),

        Action::MineTokens { amount, memo } => engine
            .mine(sender, *amount, memo.as_deref(), height)
            .map(|()| Outcome::Mined),

        Action::StackTokens { amount, lock_period } => engine
            .stack(sender, *amount, *lock_period, height)
            .map(|()| Outcome::Stacked),

        Action::ClaimMiningReward { block_height } => engine
            .claim_mining_reward(sender, *block_height, height)
            .map(|amount: Balance| Outcome::MiningRewardClaimed { amount }),

        Action::ClaimStackingReward { target_cycle } => engine
            .claim_stacking_reward(sender, *target_cycle, height)
            .map(|(native, tokens)| Outcome::StackingRewardClaimed { native, tokens }),

        Action::SetCityWallet { new_wallet } => engine
            .set_city_wallet(sender, new_wallet)
            .map(|()| Outcome::CityWalletChanged),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use citymine_core::action::Event;
    use citymine_core::ledger::{AssetLedger, ChainView};
    use citymine_core::params::ProtocolParams;
    use citymine_core::types::{Address, Asset, StackerAtCycle};
    use citymine_crypto::FixedDraw;

    const DELAY: u64 = 10;
    const CYCLE: u64 = 10;
    const MATURITY: u64 = 5;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn temp_db(name: &str) -> StateDb {
        let dir = std::env::temp_dir().join(format!("citymine_engine_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        StateDb::open(&dir).expect("open temp db")
    }

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    fn params(threshold: u32) -> ProtocolParams {
        ProtocolParams {
            activation_threshold: threshold,
            activation_delay: DELAY,
            reward_cycle_length: CYCLE,
            token_reward_maturity: MATURITY,
            ..Default::default()
        }
    }

    /// World with native funds and tokens for wallet_1..=wallet_4.
    fn funded_world(threshold: u32) -> World {
        let mut world = World::new(params(threshold), addr("city_wallet"));
        for i in 1..=4 {
            let w = addr(&format!("wallet_{i}"));
            world.assets.fund_native(&w, 1_000_000);
            world.assets.mint(Asset::Token, &w, 1_000).unwrap();
        }
        world
    }

    fn engine(threshold: u32) -> StateEngine {
        StateEngine::with_randomness(funded_world(threshold), Box::new(FixedDraw(0)))
    }

    fn register(who: &str) -> Submission {
        Submission::new(addr(who), Action::RegisterUser { memo: None })
    }

    fn mine(who: &str, amount: Balance) -> Submission {
        Submission::new(addr(who), Action::MineTokens { amount, memo: None })
    }

    fn stack(who: &str, amount: Balance, lock_period: u32) -> Submission {
        Submission::new(addr(who), Action::StackTokens { amount, lock_period })
    }

    fn claim(who: &str, block_height: BlockHeight) -> Submission {
        Submission::new(addr(who), Action::ClaimMiningReward { block_height })
    }

    /// Register wallet_1 (threshold 1) and advance to the activation block.
    fn activated(threshold: u32) -> (StateEngine, BlockHeight) {
        let e = engine(threshold);
        let r = e.apply_block(vec![register("wallet_1")]).unwrap();
        assert!(r.receipts[0].is_ok());
        let act = e.query(|q| q.get_activation_block()).unwrap();
        e.mine_empty_blocks_until(act - 1).unwrap();
        (e, act)
    }

    fn single(e: &StateEngine, sub: Submission) -> TxReceipt {
        let mut r = e.apply_block(vec![sub]).unwrap();
        r.receipts.remove(0)
    }

    // ── Blocks ────────────────────────────────────────────────────────────────

    #[test]
    fn heights_advance_and_hashes_chain() {
        let e = engine(20);
        let b1 = e.apply_block(vec![]).unwrap();
        let b2 = e.apply_block(vec![register("wallet_1")]).unwrap();
        assert_eq!((b1.height, b2.height), (1, 2));
        assert_ne!(b1.hash, b2.hash);
        e.mine_empty_blocks_until(10).unwrap();
        assert_eq!(e.current_height(), 10);
        e.mine_empty_blocks_until(5).unwrap();
        assert_eq!(e.current_height(), 10);
    }

    #[test]
    fn unreachable_height_is_an_error() {
        let e = engine(20);
        e.mine_empty_blocks_until(3).unwrap();
        assert_eq!(
            e.mine_empty_blocks_until(u64::MAX),
            Err(CitymineError::HeightOutOfReach {
                tip: 3,
                target: u64::MAX,
                max: MAX_EMPTY_BLOCKS_PER_CALL,
            })
        );
        assert_eq!(e.current_height(), 3);
    }

    #[test]
    fn seed_does_not_depend_on_block_contents() {
        let quiet = engine(20);
        let busy = engine(20);
        quiet.apply_block(vec![]).unwrap();
        busy.apply_block(vec![]).unwrap();
        let a = quiet.apply_block(vec![register("wallet_1")]).unwrap();
        let b = busy
            .apply_block(vec![Submission::new(
                addr("wallet_1"),
                Action::RegisterUser { memo: Some("grind".into()) },
            )])
            .unwrap();
        assert_ne!(a.hash, b.hash);
        assert_eq!(quiet.snapshot().chain.block_seed(2), busy.snapshot().chain.block_seed(2));
    }

    #[test]
    fn apply_block_at_rejects_gaps() {
        let e = engine(20);
        assert!(matches!(
            e.apply_block_at(3, vec![]).unwrap_err(),
            CitymineError::UnexpectedBlockHeight { expected: 1, got: 3 }
        ));
        assert_eq!(e.apply_block_at(1, vec![]).unwrap().height, 1);
    }

    // ── City wallet ───────────────────────────────────────────────────────────

    #[test]
    fn set_city_wallet_only_by_city() {
        let e = engine(20);
        let denied = single(&e, Submission::new(addr("wallet_1"), Action::SetCityWallet { new_wallet: addr("wallet_1") }));
        assert_eq!(denied.error_code(), Some(1000));
        let ok = single(&e, Submission::new(addr("city_wallet"), Action::SetCityWallet { new_wallet: addr("wallet_2") }));
        assert_eq!(ok.result, Ok(Outcome::CityWalletChanged));
        assert_eq!(e.query(|q| q.get_city_wallet().clone()), addr("wallet_2"));
    }

    // ── Registration ──────────────────────────────────────────────────────────

    #[test]
    fn register_with_memo_prints() {
        let e = engine(20);
        let r = single(
            &e,
            Submission::new(addr("wallet_4"), Action::RegisterUser { memo: Some("hello world".into()) }),
        );
        assert_eq!(r.result, Ok(Outcome::Registered { user_id: 1 }));
        assert_eq!(r.events, vec![Event::Print { memo: b"hello world".to_vec() }]);

        let r = single(&e, register("wallet_3"));
        assert!(r.events.is_empty());
        assert_eq!(e.query(|q| q.get_user_id(&addr("wallet_3"))), Some(2));
    }

    #[test]
    fn register_twice_rejected() {
        let e = engine(20);
        single(&e, register("wallet_1"));
        assert_eq!(single(&e, register("wallet_1")).error_code(), Some(1001));
    }

    #[test]
    fn threshold_closes_registration() {
        let e = engine(2);
        let r = e.apply_block(vec![register("wallet_1"), register("wallet_2")]).unwrap();
        assert!(r.receipts.iter().all(TxReceipt::is_ok));
        assert_eq!(e.query(|q| q.get_activation_block()), Ok(r.height + DELAY));
        assert_eq!(single(&e, register("wallet_3")).error_code(), Some(1004));
    }

    #[test]
    fn activation_block_unset_before_threshold() {
        let e = engine(3);
        single(&e, register("wallet_1"));
        single(&e, register("wallet_2"));
        assert_eq!(e.query(|q| q.get_activation_block()), Err(CitymineError::NotActivated));
    }

    // ── Mining ────────────────────────────────────────────────────────────────

    #[test]
    fn mining_error_codes() {
        let e = engine(1);
        assert_eq!(single(&e, mine("wallet_1", 200)).error_code(), Some(1005));
        single(&e, register("wallet_1"));
        assert_eq!(single(&e, mine("wallet_1", 0)).error_code(), Some(1007));
        assert_eq!(single(&e, mine("wallet_1", 2_000_000)).error_code(), Some(1008));
        // Scheduled but not yet reached.
        assert_eq!(single(&e, mine("wallet_1", 200)).error_code(), Some(1005));
    }

    #[test]
    fn mining_without_stackers_one_transfer() {
        let (e, act) = activated(1);
        let r = single(&e, mine("wallet_1", 200));
        assert_eq!(e.current_height(), act);
        assert_eq!(r.result, Ok(Outcome::Mined));
        assert_eq!(r.transfers().count(), 1);
        assert_eq!(e.query(|q| q.balance(Asset::Native, &addr("city_wallet"))), 200);
    }

    #[test]
    fn mining_with_stackers_two_transfers() {
        let (e, act) = activated(1);
        assert!(single(&e, stack("wallet_2", 100, 4)).is_ok());
        e.mine_empty_blocks_until(act + CYCLE - 1).unwrap();

        let r = single(&e, mine("wallet_1", 1_000));
        assert_eq!(r.transfers().count(), 2);
        assert_eq!(
            r.events,
            vec![
                Event::Transfer { asset: Asset::Native, amount: 700, sender: addr("wallet_1"), recipient: addr("city_wallet") },
                Event::Transfer { asset: Asset::Native, amount: 300, sender: addr("wallet_1"), recipient: Address::protocol() },
            ]
        );
        assert_eq!(e.query(|q| q.get_stacking_stats_at_cycle(1).amount_native), 300);
    }

    #[test]
    fn mining_same_block_twice_rejected() {
        let (e, act) = activated(1);
        let r = e.apply_block(vec![mine("wallet_1", 200), mine("wallet_1", 200)]).unwrap();
        assert!(r.receipts[0].is_ok());
        assert_eq!(r.receipts[1].error_code(), Some(1006));
        assert!(r.receipts[1].events.is_empty());
        assert_eq!(e.query(|q| q.get_mining_stats_at_block(act).total_committed), 200);
    }

    // ── Stacking ──────────────────────────────────────────────────────────────

    #[test]
    fn stacking_error_codes() {
        let e = engine(1);
        assert_eq!(single(&e, stack("wallet_1", 200, 2)).error_code(), Some(1015));
        let (e, _) = activated(1);
        e.apply_block(vec![]).unwrap();
        assert_eq!(single(&e, stack("wallet_1", 200, 0)).error_code(), Some(1016));
        assert_eq!(single(&e, stack("wallet_1", 200, 33)).error_code(), Some(1016));
        assert_eq!(single(&e, stack("wallet_1", 0, 5)).error_code(), Some(1016));
        assert_eq!(single(&e, stack("wallet_1", 5_000, 5)).error_code(), Some(1008));
    }

    #[test]
    fn stacking_moves_tokens_and_remembers_windows() {
        let (e, _) = activated(1);
        let r = single(&e, stack("wallet_1", 20, 1));
        assert_eq!(r.transfers().count(), 1);
        let r = single(&e, stack("wallet_1", 20, 8));
        assert!(r.is_ok());

        let at = |c| e.query(|q| q.get_stacker_at_cycle_or_default(c, 1));
        assert_eq!(at(0), StackerAtCycle::default());
        assert_eq!(at(1), StackerAtCycle { amount_stacked: 40, to_return: 20 });
        assert_eq!(at(2), StackerAtCycle { amount_stacked: 20, to_return: 0 });
        assert_eq!(at(8), StackerAtCycle { amount_stacked: 20, to_return: 20 });
        assert_eq!(at(9), StackerAtCycle::default());
        assert_eq!(e.query(|q| q.balance(Asset::Token, &Address::protocol())), 40);
    }

    // ── Mining claims ─────────────────────────────────────────────────────────

    #[test]
    fn claim_error_codes() {
        let (e, act) = activated(1);
        assert_eq!(single(&e, claim("wallet_2", act)).error_code(), Some(1003));
        assert_eq!(single(&e, claim("wallet_1", 1)).error_code(), Some(1011));

        let h = e.current_height() + 1;
        e.apply_block(vec![mine("wallet_2", 500)]).unwrap();
        assert_eq!(single(&e, claim("wallet_1", h)).error_code(), Some(1009));
        assert_eq!(single(&e, claim("wallet_2", h)).error_code(), Some(1010));
    }

    #[test]
    fn winner_claims_once_at_maturity() {
        let (e, _) = activated(1);
        let h = e.current_height() + 1;
        // Draw 0 lands in the first commitment's range.
        e.apply_block(vec![mine("wallet_1", 10), mine("wallet_2", 500)]).unwrap();
        e.mine_empty_blocks_until(h + MATURITY - 1).unwrap();

        assert_eq!(
            e.query(|q| q.get_block_winner_id(h)),
            Err(CitymineError::RandomnessUnavailable(h))
        );
        let r = e.apply_block(vec![claim("wallet_2", h), claim("wallet_1", h), claim("wallet_1", h)]).unwrap();
        assert_eq!(r.height, h + MATURITY);
        assert_eq!(r.receipts[0].error_code(), Some(1013));
        assert_eq!(r.receipts[1].result, Ok(Outcome::MiningRewardClaimed { amount: 250_000 }));
        assert_eq!(
            r.receipts[1].events,
            vec![Event::Mint { asset: Asset::Token, amount: 250_000, recipient: addr("wallet_1") }]
        );
        assert_eq!(r.receipts[2].error_code(), Some(1012));
        assert_eq!(e.query(|q| q.balance(Asset::Token, &addr("wallet_1"))), 1_000 + 250_000);
        assert_eq!(e.query(|q| q.get_block_winner_id(h)), Ok(Some(1)));
    }

    #[test]
    fn blake3_draw_picks_a_miner() {
        let e = StateEngine::new(funded_world(1));
        e.apply_block(vec![register("wallet_1")]).unwrap();
        let act = e.query(|q| q.get_activation_block()).unwrap();
        e.mine_empty_blocks_until(act - 1).unwrap();
        e.apply_block(vec![mine("wallet_1", 10), mine("wallet_2", 10)]).unwrap();
        e.mine_empty_blocks_until(act + MATURITY).unwrap();

        let winner = e.query(|q| q.get_block_winner_id(act)).unwrap().unwrap();
        let who = if winner == 1 { "wallet_1" } else { "wallet_2" };
        let r = single(&e, claim(who, act));
        assert!(r.is_ok());
    }

    // ── Stacking claims ───────────────────────────────────────────────────────

    #[test]
    fn stacking_reward_flow() {
        let (e, act) = activated(1);
        single(&e, stack("wallet_2", 100, 1));
        single(&e, stack("wallet_3", 300, 1));
        e.mine_empty_blocks_until(act + CYCLE - 1).unwrap();
        single(&e, mine("wallet_1", 1_000));

        let claim_cycle_1 = |who: &str| {
            single(&e, Submission::new(addr(who), Action::ClaimStackingReward { target_cycle: 1 }))
        };
        assert_eq!(claim_cycle_1("wallet_2").error_code(), Some(1017));

        e.mine_empty_blocks_until(act + 2 * CYCLE - 1).unwrap();
        assert_eq!(
            claim_cycle_1("wallet_2").result,
            Ok(Outcome::StackingRewardClaimed { native: 75, tokens: 100 })
        );
        assert_eq!(
            claim_cycle_1("wallet_3").result,
            Ok(Outcome::StackingRewardClaimed { native: 225, tokens: 300 })
        );
        assert_eq!(claim_cycle_1("wallet_2").error_code(), Some(1018));
        assert_eq!(e.query(|q| q.balance(Asset::Token, &addr("wallet_2"))), 1_000);
    }

    // ── Persistence ───────────────────────────────────────────────────────────

    #[test]
    fn reopen_resumes_from_snapshot() {
        let db = Arc::new(temp_db("reopen"));
        {
            let e = StateEngine::open(db.clone(), funded_world(1), Box::new(FixedDraw(0))).unwrap();
            e.apply_block(vec![register("wallet_1")]).unwrap();
            e.mine_empty_blocks_until(4).unwrap();
        }
        assert_eq!(db.header_count(), 4);
        assert_eq!(db.get_meta(META_TIP).unwrap(), Some(4u64.to_be_bytes().to_vec()));

        let seed_3 = db.get_header(3).unwrap().unwrap().seed;
        let e = StateEngine::open(db, funded_world(1), Box::new(FixedDraw(0))).unwrap();
        assert_eq!(e.current_height(), 4);
        assert_eq!(e.snapshot().chain.block_seed(3), Some(seed_3));
        assert_eq!(e.query(|q| q.get_user_id(&addr("wallet_1"))), Some(1));
        assert_eq!(e.query(|q| q.get_activation_block()), Ok(1 + DELAY));
    }
}
