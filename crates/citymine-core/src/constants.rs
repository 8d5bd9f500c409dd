/// ─── citymine Protocol Defaults ─────────────────────────────────────────────
///
/// Every value here is a default for `ProtocolParams`; deployments may
/// override any of them through the genesis file.

// ── Activation ───────────────────────────────────────────────────────────────

/// Registrations required before activation is scheduled.
pub const ACTIVATION_THRESHOLD: u32 = 20;

/// Blocks between the registration that meets the threshold and the
/// activation block.
pub const ACTIVATION_DELAY: u64 = 150;

// ── Cycles & stacking ────────────────────────────────────────────────────────

/// Length of one reward cycle in blocks.
pub const REWARD_CYCLE_LENGTH: u64 = 2_100;

/// Longest lock period a stacker may choose, in reward cycles.
pub const MAX_REWARD_CYCLES: u32 = 32;

// ── Mining ───────────────────────────────────────────────────────────────────

/// Blocks that must pass after a mined block before its reward is claimable.
pub const TOKEN_REWARD_MATURITY: u64 = 100;

/// City share of a commitment when stackers are present, in basis points.
pub const SPLIT_CITY_BPS: u32 = 7_000;

/// Basis-point denominator.
pub const BPS_DENOMINATOR: u32 = 10_000;

// ── Coinbase ─────────────────────────────────────────────────────────────────

/// Blocks after activation that pay the bonus coinbase.
pub const TOKEN_BONUS_PERIOD: u64 = 10_000;

/// Coinbase paid during the bonus period.
pub const TOKEN_BONUS_AMOUNT: u128 = 250_000;

/// Coinbase paid after the bonus period until the first halving.
pub const TOKEN_BASE_AMOUNT: u128 = 100_000;

/// Blocks between halvings, counted from activation.
pub const TOKEN_HALVING_BLOCKS: u64 = 210_000;

/// Halvings applied before the coinbase stays flat.
pub const TOKEN_MAX_HALVINGS: u32 = 5;

// ── Memo ─────────────────────────────────────────────────────────────────────

/// Maximum memo length carried by register/mine actions.
pub const MAX_MEMO_BYTES: usize = 34;

// ── Engine limits ────────────────────────────────────────────────────────────

/// Most empty blocks a single `mine_empty_blocks_until` call will append.
/// Not a protocol parameter.
pub const MAX_EMPTY_BLOCKS_PER_CALL: u64 = 1_000_000;
