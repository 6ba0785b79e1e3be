use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::Arc;

use spl_pack::PackError;
use spl_store::{ChunkSource, ChunkStore, StoreError};
use spl_types::{ChunkRecord, ProgressEvent, ProgressFn};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The chunk currently being read.
struct OpenChunk {
    index: usize,
    record: ChunkRecord,
    source: ChunkSource,
    hasher: blake3::Hasher,
    received: u64,
}

impl OpenChunk {
    /// A recorded size of zero means the size is unknown.
    fn expects_size(&self) -> bool {
        self.record.size > 0
    }

    fn absorb(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        self.hasher.update(bytes);
        self.received += bytes.len() as u64;
        if self.expects_size() && self.received > self.record.size {
            return Err(self.size_mismatch());
        }
        Ok(())
    }

    fn verify(&self) -> Result<(), StoreError> {
        if self.expects_size() && self.received != self.record.size {
            return Err(self.size_mismatch());
        }
        if let Some(expected) = &self.record.digest {
            let actual = hex::encode(self.hasher.finalize().as_bytes());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(StoreError::DigestMismatch {
                    handle: self.record.handle.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    fn size_mismatch(&self) -> StoreError {
        StoreError::SizeMismatch {
            handle: self.record.handle.clone(),
            expected: self.record.size,
            actual: self.received,
        }
    }
}

/// Presents an ordered list of stored chunks as one continuous `Read`.
///
/// Chunks are fetched lazily, one at a time, in manifest order. A read never
/// spans two chunks, so it may return fewer bytes than requested even
/// mid-stream; `Ok(0)` means every chunk was read to its end. Each chunk is
/// checked against its recorded size and digest before the next is opened.
///
/// Store failures surface as `io::Error`s wrapping the [`StoreError`].
pub struct ChunkConcatenator {
    store: Arc<dyn ChunkStore>,
    runtime: Handle,
    pending: VecDeque<ChunkRecord>,
    current: Option<OpenChunk>,
    next_index: usize,
    progress: Option<ProgressFn>,
    cancel: Option<CancellationToken>,
}

impl ChunkConcatenator {
    /// `runtime` drives the store's futures; reads must happen outside of
    /// it, on a blocking thread.
    pub fn new(store: Arc<dyn ChunkStore>, runtime: Handle, chunks: impl IntoIterator<Item = ChunkRecord>) -> Self {
        Self {
            store,
            runtime,
            pending: chunks.into_iter().collect(),
            current: None,
            next_index: 0,
            progress: None,
            cancel: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Chunks not yet opened.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Fetch the next chunk. Returns `false` when none are left.
    fn open_next(&mut self) -> io::Result<bool> {
        let Some(record) = self.pending.pop_front() else {
            return Ok(false);
        };
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(PackError::Cancelled.into());
        }
        let index = self.next_index;
        self.next_index += 1;
        debug!(index, handle = %record.handle, "fetching chunk");
        let source = self.runtime.block_on(self.store.fetch(&record.handle))?;
        self.current = Some(OpenChunk {
            index,
            record,
            source,
            hasher: blake3::Hasher::new(),
            received: 0,
        });
        Ok(true)
    }

    fn close_current(&mut self) -> io::Result<()> {
        let Some(chunk) = self.current.take() else {
            return Ok(());
        };
        chunk.verify()?;
        info!(index = chunk.index, handle = %chunk.record.handle, size = chunk.received, "chunk fetched");
        if let Some(progress) = &self.progress {
            progress(&ProgressEvent::Chunk {
                index: chunk.index,
                size: chunk.received,
            });
        }
        Ok(())
    }
}

impl Read for ChunkConcatenator {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.current.is_none() && !self.open_next()? {
                return Ok(0);
            }
            let Some(chunk) = self.current.as_mut() else {
                return Ok(0);
            };
            let n = chunk.source.read(buf)?;
            if n > 0 {
                chunk.absorb(&buf[..n])?;
                return Ok(n);
            }
            self.close_current()?;
        }
    }
}
