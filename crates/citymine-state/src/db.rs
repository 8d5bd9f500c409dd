use citymine_core::action::BlockHeader;
use citymine_core::error::CitymineError;
use citymine_core::types::BlockHeight;
use std::path::Path;

use crate::state::World;

const WORLD_KEY: &[u8] = b"current";

/// Persistent state database backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   world      "current"         → bincode(World) without seeds, rewritten after each block
///   headers    height (BE bytes) → bincode(BlockHeader), carries the block seed
///   meta       utf8 key bytes    → raw bytes
pub struct StateDb {
    _db: sled::Db,
    world: sled::Tree,
    headers: sled::Tree,
    meta: sled::Tree,
}

impl StateDb {
    /// Open or create the state database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CitymineError> {
        let db = sled::open(path).map_err(|e| CitymineError::Storage(e.to_string()))?;
        let world   = db.open_tree("world").map_err(|e| CitymineError::Storage(e.to_string()))?;
        let headers = db.open_tree("headers").map_err(|e| CitymineError::Storage(e.to_string()))?;
        let meta    = db.open_tree("meta").map_err(|e| CitymineError::Storage(e.to_string()))?;
        Ok(Self { _db: db, world, headers, meta })
    }

    // ── World snapshot ───────────────────────────────────────────────────────

    pub fn get_world(&self) -> Result<Option<World>, CitymineError> {
        match self.world.get(WORLD_KEY).map_err(|e| CitymineError::Storage(e.to_string()))? {
            Some(bytes) => {
                let world = bincode::deserialize(&bytes)
                    .map_err(|e| CitymineError::Serialization(e.to_string()))?;
                Ok(Some(world))
            }
            None => Ok(None),
        }
    }

    pub fn put_world(&self, world: &World) -> Result<(), CitymineError> {
        let bytes = bincode::serialize(world)
            .map_err(|e| CitymineError::Serialization(e.to_string()))?;
        self.world
            .insert(WORLD_KEY, bytes)
            .map_err(|e| CitymineError::Storage(e.to_string()))?;
        Ok(())
    }

    // ── Block headers ────────────────────────────────────────────────────────

    pub fn get_header(&self, height: BlockHeight) -> Result<Option<BlockHeader>, CitymineError> {
        match self
            .headers
            .get(height.to_be_bytes())
            .map_err(|e| CitymineError::Storage(e.to_string()))?
        {
            Some(bytes) => {
                let h = bincode::deserialize(&bytes)
                    .map_err(|e| CitymineError::Serialization(e.to_string()))?;
                Ok(Some(h))
            }
            None => Ok(None),
        }
    }

    pub fn put_header(&self, header: &BlockHeader) -> Result<(), CitymineError> {
        let bytes = bincode::serialize(header)
            .map_err(|e| CitymineError::Serialization(e.to_string()))?;
        self.headers
            .insert(header.height.to_be_bytes(), bytes)
            .map_err(|e| CitymineError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Every stored header in height order.
    pub fn headers(&self) -> impl Iterator<Item = Result<BlockHeader, CitymineError>> + '_ {
        self.headers.iter().values().map(|v| {
            let bytes = v.map_err(|e| CitymineError::Storage(e.to_string()))?;
            bincode::deserialize(&bytes).map_err(|e| CitymineError::Serialization(e.to_string()))
        })
    }

    /// Number of headers stored.
    pub fn header_count(&self) -> usize {
        self.headers.len()
    }

    // ── Meta ──────────────────────────────────────────────────────────────────

    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), CitymineError> {
        self.meta
            .insert(key.as_bytes(), value)
            .map_err(|e| CitymineError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, CitymineError> {
        self.meta
            .get(key.as_bytes())
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(|e| CitymineError::Storage(e.to_string()))
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), CitymineError> {
        self._db.flush().map_err(|e| CitymineError::Storage(e.to_string()))?;
        Ok(())
    }
}
