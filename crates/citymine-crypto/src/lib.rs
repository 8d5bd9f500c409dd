pub mod hash;
pub mod randomness;

pub use hash::{blake3_hash, block_hash, block_seed};
pub use randomness::{Blake3Draw, FixedDraw, RandomnessSource};
