use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use spl_pack::{entry::entry_name, BlockStream, DecodeSummary, TreeDecoder, TreeEncoder};
use spl_store::ChunkStore;
use spl_types::{Manifest, ProgressFn, TransferConfig, TypeError};
use tokio::runtime::Handle;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::concat::ChunkConcatenator;
use crate::error::{TransferError, TransferResult};
use crate::splitter::ChunkSplitter;

/// Moves file trees into and out of a [`ChunkStore`].
///
/// Each operation runs its codec pipeline on a blocking thread and awaits
/// the store one call at a time. Progress and cancellation apply to every
/// operation started through this value.
pub struct Transfer {
    store: Arc<dyn ChunkStore>,
    config: TransferConfig,
    progress: Option<ProgressFn>,
    cancel: CancellationToken,
}

impl Transfer {
    pub fn new(store: Arc<dyn ChunkStore>, config: TransferConfig) -> TransferResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            progress: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts running operations when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Encode the tree at `path` and store it as a sequence of chunks.
    pub async fn upload(&self, path: impl AsRef<Path>) -> TransferResult<Manifest> {
        let root = path.as_ref().to_path_buf();
        let name = entry_name(&root).map_err(TransferError::from_pack)?;
        info!(
            path = %root.display(),
            max_chunk_size = self.config.max_chunk_size,
            "upload started"
        );

        let runtime = Handle::current();
        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        let progress = self.progress.clone();
        let cancel = self.cancel.clone();

        let chunks = joined(
            tokio::task::spawn_blocking(move || {
                let mut encoder = TreeEncoder::new(root, config.buffer_size)
                    .map_err(TransferError::from_pack)?
                    .with_cancellation(cancel.clone());
                let mut splitter =
                    ChunkSplitter::new(store, runtime, config.max_chunk_size).with_cancellation(cancel);
                if let Some(progress) = progress {
                    encoder = encoder.with_progress(Arc::clone(&progress));
                    splitter = splitter.with_progress(progress);
                }
                splitter.split(&mut BlockStream::new(encoder))
            })
            .await,
        )?;

        let manifest = Manifest::new(name, chunks);
        info!(
            name = %manifest.name,
            chunks = manifest.chunk_count(),
            total_size = manifest.total_size,
            "upload finished"
        );
        Ok(manifest)
    }

    /// Fetch the chunks listed in `manifest` and rebuild the tree inside
    /// `destination`, which must be an existing directory.
    pub async fn download(
        &self,
        manifest: &Manifest,
        destination: impl AsRef<Path>,
    ) -> TransferResult<DecodeSummary> {
        if manifest.is_empty() {
            return Err(TypeError::EmptyManifest.into());
        }
        let destination = destination.as_ref().to_path_buf();
        info!(
            name = %manifest.name,
            chunks = manifest.chunk_count(),
            destination = %destination.display(),
            "download started"
        );

        let runtime = Handle::current();
        let store = Arc::clone(&self.store);
        let chunks = manifest.chunks.clone();
        let config = self.config.clone();
        let progress = self.progress.clone();
        let cancel = self.cancel.clone();

        let summary = joined(
            tokio::task::spawn_blocking(move || {
                let mut source =
                    ChunkConcatenator::new(store, runtime, chunks).with_cancellation(cancel.clone());
                if let Some(progress) = &progress {
                    source = source.with_progress(Arc::clone(progress));
                }
                let mut decoder = TreeDecoder::new(source, config.buffer_size)
                    .map_err(TransferError::from_pack)?
                    .with_cancellation(cancel)
                    .with_throughput_window(config.throughput_window())
                    .with_overwrite(config.overwrite);
                if let Some(progress) = progress {
                    decoder = decoder.with_progress(progress);
                }
                decoder.decode_into(&destination).map_err(TransferError::from_pack)
            })
            .await,
        )?;

        if !manifest.name.is_empty() && summary.path.file_name() != Some(OsStr::new(&manifest.name)) {
            warn!(
                expected = %manifest.name,
                path = %summary.path.display(),
                "decoded root name differs from manifest"
            );
        }
        info!(
            path = %summary.path.display(),
            files = summary.files,
            bytes = summary.bytes,
            "download finished"
        );
        Ok(summary)
    }
}

/// Unwrap a pipeline task, re-raising its panic if it had one.
fn joined<T>(result: Result<TransferResult<T>, JoinError>) -> TransferResult<T> {
    match result {
        Ok(inner) => inner,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(TransferError::Cancelled),
    }
}
