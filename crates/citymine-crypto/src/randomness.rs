//! Randomness used to pick the winner of a mined block.
//!
//! The draw for block `h` is taken from the seed of block
//! `h + token_reward_maturity`, which does not exist yet when miners commit
//! at `h`. Sources are injectable so selection can be replayed in tests.

use citymine_core::types::{BlockHeight, BlockSeed};

pub trait RandomnessSource: Send + Sync {
    /// Draw a 128-bit value for the block at `height`, given the seed of the
    /// block that matured it.
    fn draw(&self, height: BlockHeight, seed: &BlockSeed) -> u128;
}

/// Default source: the low 16 bytes of
/// BLAKE3("citymine-winner" || height LE || seed), read little-endian.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3Draw;

impl RandomnessSource for Blake3Draw {
    fn draw(&self, height: BlockHeight, seed: &BlockSeed) -> u128 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"citymine-winner");
        hasher.update(&height.to_le_bytes());
        hasher.update(seed);
        let digest = hasher.finalize();
        let mut low = [0u8; 16];
        low.copy_from_slice(&digest.as_bytes()[..16]);
        u128::from_le_bytes(low)
    }
}

/// Returns the same value for every block. Lets tests place the draw inside a
/// chosen miner's range.
#[derive(Clone, Copy, Debug)]
pub struct FixedDraw(pub u128);

impl RandomnessSource for FixedDraw {
    fn draw(&self, _height: BlockHeight, _seed: &BlockSeed) -> u128 {
        self.0
    }
}
