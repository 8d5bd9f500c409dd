use citymine_core::action::Submission;
use citymine_core::types::{BlockHash, BlockHeight, BlockSeed};
use sha3::{Digest, Sha3_256};

/// Compute BLAKE3 hash of arbitrary bytes → 32-byte array.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// SHA3-256 over parent hash, height (LE) and the bincode-encoded submissions.
pub fn block_hash(parent: &BlockHash, height: BlockHeight, submissions: &[Submission]) -> BlockHash {
    let mut hasher = Sha3_256::new();
    hasher.update(parent.as_bytes());
    hasher.update(height.to_le_bytes());
    for s in submissions {
        // Encoding a plain data enum into a Vec cannot fail.
        let bytes = bincode::serialize(s).unwrap_or_default();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    BlockHash(hasher.finalize().into())
}

/// Randomness seed published with the block at `height`:
/// BLAKE3("citymine-seed" || parent || height LE). Only data fixed before the
/// block's submissions goes in.
pub fn block_seed(parent: &BlockHash, height: BlockHeight) -> BlockSeed {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"citymine-seed");
    hasher.update(parent.as_bytes());
    hasher.update(&height.to_le_bytes());
    *hasher.finalize().as_bytes()
}
