use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use spl_types::{ChunkHandle, ChunkRecord};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{ChunkSource, ChunkStore};

/// In-memory, HashMap-based chunk store.
///
/// Intended for tests and embedding. Chunks live behind a `RwLock`; fetches
/// hand out a copy, so a chunk may be fetched any number of times.
pub struct InMemoryChunkStore {
    chunks: RwLock<HashMap<ChunkHandle, Vec<u8>>>,
    next_id: AtomicU64,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of chunks currently stored.
    pub fn len(&self) -> usize {
        self.chunks.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored chunks.
    pub fn total_bytes(&self) -> u64 {
        self.chunks
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }

    /// Copy of a stored chunk's bytes.
    pub fn get(&self, handle: &ChunkHandle) -> Option<Vec<u8>> {
        self.chunks.read().expect("lock poisoned").get(handle).cloned()
    }

    /// Replace a stored chunk's bytes. Returns `false` if the handle is unknown.
    pub fn overwrite(&self, handle: &ChunkHandle, data: Vec<u8>) -> bool {
        match self.chunks.write().expect("lock poisoned").get_mut(handle) {
            Some(slot) => {
                *slot = data;
                true
            }
            None => false,
        }
    }

    /// Drop a chunk. Returns `true` if it existed.
    pub fn remove(&self, handle: &ChunkHandle) -> bool {
        self.chunks.write().expect("lock poisoned").remove(handle).is_some()
    }

    fn issue_handle(&self) -> StoreResult<ChunkHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        ChunkHandle::new(format!("mem-{id:06}")).map_err(|e| StoreError::Backend(e.to_string()))
    }
}

impl Default for InMemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn store(&self, source: &mut (dyn Read + Send), max_bytes: u64) -> StoreResult<ChunkRecord> {
        let mut data = Vec::new();
        source.take(max_bytes).read_to_end(&mut data)?;
        let handle = self.issue_handle()?;
        let size = data.len() as u64;
        debug!(%handle, size, "chunk stored in memory");
        self.chunks
            .write()
            .expect("lock poisoned")
            .insert(handle.clone(), data);
        Ok(ChunkRecord::new(handle, size))
    }

    async fn fetch(&self, handle: &ChunkHandle) -> StoreResult<ChunkSource> {
        let data = self
            .get(handle)
            .ok_or_else(|| StoreError::NotFound(handle.clone()))?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn exists(&self, handle: &ChunkHandle) -> StoreResult<bool> {
        Ok(self.chunks.read().expect("lock poisoned").contains_key(handle))
    }
}

impl std::fmt::Debug for InMemoryChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryChunkStore")
            .field("chunk_count", &self.len())
            .finish()
    }
}
