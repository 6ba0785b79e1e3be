//! Foundation types for splitload.
//!
//! splitload moves a file or directory tree through a blob store that only
//! accepts bounded-size opaque chunks. This crate holds the types shared by
//! every stage of that pipeline.
//!
//! # Key Types
//!
//! - [`ChunkHandle`] — Opaque token a chunk store returns for a stored chunk
//! - [`ChunkRecord`] — Handle plus size and digest of one stored chunk
//! - [`Manifest`] — Ordered chunk records; the only state kept between upload and download
//! - [`TransferConfig`] — Chunk size, buffer size and instrumentation knobs
//! - [`ProgressEvent`] — Per-file percent, throughput and per-chunk notifications
//! - [`ErrorClass`] — Coarse error taxonomy shared by all crates

pub mod config;
pub mod error;
pub mod handle;
pub mod manifest;
pub mod progress;
pub mod size;

pub use config::{
    TransferConfig, DEFAULT_BUFFER_SIZE, DEFAULT_MAX_CHUNK_SIZE, MIN_BUFFER_SIZE,
};
pub use error::{ErrorClass, TypeError};
pub use handle::{ChunkHandle, ChunkRecord};
pub use manifest::Manifest;
pub use progress::{PercentTracker, ProgressEvent, ProgressFn};
pub use size::format_bytes_count;
