use std::io::Read;

use async_trait::async_trait;
use spl_types::{ChunkHandle, ChunkRecord};

use crate::error::{StoreError, StoreResult};

/// Byte source for one fetched chunk. Returns `Ok(0)` only at the chunk's
/// true end.
pub type ChunkSource = Box<dyn Read + Send>;

/// Storage collaborator holding bounded-size chunks.
///
/// Implementations must satisfy these invariants:
/// - `store` reads at most `max_bytes` from the source and persists exactly
///   the bytes it read, in order.
/// - The returned record's `size` is the number of bytes stored.
/// - Handles are opaque, stable, and valid for `fetch` on the same store.
/// - A fetched source yields exactly the stored bytes.
///
/// Sources are plain `std::io::Read`; callers drive the store from a
/// blocking context, so implementations may read them synchronously.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Persist up to `max_bytes` read from `source` as one chunk.
    async fn store(&self, source: &mut (dyn Read + Send), max_bytes: u64) -> StoreResult<ChunkRecord>;

    /// Open a stored chunk for reading.
    async fn fetch(&self, handle: &ChunkHandle) -> StoreResult<ChunkSource>;

    /// Check whether a chunk exists.
    ///
    /// Default implementation opens the chunk. Backends may override with a
    /// cheaper lookup.
    async fn exists(&self, handle: &ChunkHandle) -> StoreResult<bool> {
        match self.fetch(handle).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
