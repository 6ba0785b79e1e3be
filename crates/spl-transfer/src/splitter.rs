use std::io::{self, BufRead, Read};
use std::sync::Arc;

use spl_pack::PackError;
use spl_store::ChunkStore;
use spl_types::{ChunkRecord, ProgressEvent, ProgressFn};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{TransferError, TransferResult};

/// Hashes and counts bytes as they are read through it.
pub struct HashingReader<R> {
    inner: R,
    hasher: blake3::Hasher,
    count: u64,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: blake3::Hasher::new(),
            count: 0,
        }
    }

    /// Bytes read so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Byte count and hex BLAKE3 digest of everything read.
    pub fn finish(self) -> (u64, String) {
        (self.count, hex::encode(self.hasher.finalize().as_bytes()))
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }
}

/// Cuts a byte stream into chunks of at most `max_chunk_size` bytes and
/// hands each one to a [`ChunkStore`].
///
/// Every chunk but the last is exactly `max_chunk_size` bytes long and no
/// chunk is empty. The store reads each chunk straight from the stream;
/// nothing is buffered here beyond what the stream itself holds.
pub struct ChunkSplitter {
    store: Arc<dyn ChunkStore>,
    runtime: Handle,
    max_chunk_size: u64,
    progress: Option<ProgressFn>,
    cancel: Option<CancellationToken>,
}

impl ChunkSplitter {
    /// `runtime` drives the store's futures; `split` must run outside of it,
    /// on a blocking thread.
    pub fn new(store: Arc<dyn ChunkStore>, runtime: Handle, max_chunk_size: u64) -> Self {
        Self {
            store,
            runtime,
            max_chunk_size,
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

    /// Store the whole of `source` and return the chunk records in stream
    /// order.
    pub fn split<R>(&self, source: &mut R) -> TransferResult<Vec<ChunkRecord>>
    where
        R: BufRead + Send,
    {
        let max = self.max_chunk_size;
        let mut records = Vec::new();

        while !self.at_end(source)? {
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return Err(TransferError::Cancelled);
            }
            let index = records.len();
            let mut chunk = HashingReader::new(source.by_ref().take(max));
            let record = self
                .runtime
                .block_on(self.store.store(&mut chunk, max))
                .map_err(TransferError::from_store)?;

            let (consumed, digest) = chunk.finish();
            if consumed != record.size {
                return Err(TransferError::SizeMismatch {
                    index,
                    reported: record.size,
                    consumed,
                });
            }
            let record = record.with_digest(digest);
            info!(index, handle = %record.handle, size = record.size, "chunk stored");
            if let Some(progress) = &self.progress {
                progress(&ProgressEvent::Chunk { index, size: record.size });
            }
            records.push(record);

            if consumed < max {
                if !self.at_end(source)? {
                    return Err(TransferError::ShortChunk {
                        index,
                        size: consumed,
                        max,
                    });
                }
                break;
            }
        }

        debug!(chunks = records.len(), "stream split");
        Ok(records)
    }

    fn at_end<R: BufRead>(&self, source: &mut R) -> TransferResult<bool> {
        match source.fill_buf() {
            Ok(buf) => Ok(buf.is_empty()),
            Err(e) => Err(TransferError::from_pack(PackError::from_io(e))),
        }
    }
}
