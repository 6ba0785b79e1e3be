//! Transfer engine for splitload.
//!
//! Upload: tree → [`TreeEncoder`](spl_pack::TreeEncoder) →
//! [`BlockStream`](spl_pack::BlockStream) → [`ChunkSplitter`] → store.
//! Download: store → [`ChunkConcatenator`] →
//! [`TreeDecoder`](spl_pack::TreeDecoder) → tree.
//!
//! The [`Manifest`](spl_types::Manifest) produced by an upload is the only
//! state needed to download again.

pub mod concat;
pub mod error;
pub mod splitter;
pub mod transfer;

pub use concat::ChunkConcatenator;
pub use error::{TransferError, TransferResult};
pub use splitter::{ChunkSplitter, HashingReader};
pub use transfer::Transfer;
