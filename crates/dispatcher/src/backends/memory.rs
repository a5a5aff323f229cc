//! MemoryStore - in-memory local chunk store

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use contracts::{Address, Chunk, ContractError, LocalCommitter, PutMode};
use tracing::trace;

const STORE_NAME: &str = "memory";

/// Local store keeping chunks in a map
#[derive(Debug, Default)]
pub struct MemoryStore {
    chunks: RwLock<HashMap<Address, (Bytes, PutMode)>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store refusing new chunks once it holds `capacity` of them
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            chunks: RwLock::default(),
            capacity: Some(capacity),
        }
    }

    /// Payload stored under `address`
    pub fn get(&self, address: &Address) -> Option<Bytes> {
        self.read().get(address).map(|(payload, _)| payload.clone())
    }

    /// Mode the chunk was last stored with
    pub fn mode(&self, address: &Address) -> Option<PutMode> {
        self.read().get(address).map(|(_, mode)| *mode)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.read().contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Address, (Bytes, PutMode)>> {
        self.chunks.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, mode: PutMode, chunk: &Chunk) -> Result<bool, ContractError> {
        let mut chunks = self
            .chunks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(entry) = chunks.get_mut(chunk.address()) {
            entry.1 = mode;
            return Ok(true);
        }
        if self.capacity.is_some_and(|cap| chunks.len() >= cap) {
            return Err(ContractError::store(STORE_NAME, "capacity reached"));
        }
        chunks.insert(*chunk.address(), (chunk.payload().clone(), mode));
        Ok(false)
    }
}

impl LocalCommitter for MemoryStore {
    async fn put(&self, mode: PutMode, chunk: &Chunk) -> Result<bool, ContractError> {
        let existed = self.insert(mode, chunk)?;
        trace!(address = %chunk.address().short(), ?mode, existed, "chunk stored");
        Ok(existed)
    }
}
