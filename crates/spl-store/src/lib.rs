//! Chunk storage for splitload.
//!
//! The transfer pipeline never talks to a storage service directly; it goes
//! through the [`ChunkStore`] trait, which stores a bounded byte source as one
//! chunk and hands back an opaque [`ChunkHandle`](spl_types::ChunkHandle).
//!
//! # Backends
//!
//! - [`InMemoryChunkStore`] -- `HashMap`-based store for tests and embedding
//! - [`DirectoryChunkStore`] -- one file per chunk under a local directory

pub mod directory;
pub mod error;
pub mod memory;
pub mod traits;

pub use directory::DirectoryChunkStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryChunkStore;
pub use traits::{ChunkSource, ChunkStore};
