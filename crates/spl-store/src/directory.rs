use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use spl_types::{ChunkHandle, ChunkRecord};
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::{ChunkSource, ChunkStore};

const CHUNK_EXTENSION: &str = "chunk";

/// Chunk store backed by a local directory, one file per chunk.
///
/// Chunks are written to a temporary file in the same directory and
/// renamed into place once complete, so a failed store never leaves a
/// partial chunk behind a valid handle. Handles are time-ordered UUIDs.
#[derive(Debug, Clone)]
pub struct DirectoryChunkStore {
    root: PathBuf,
}

impl DirectoryChunkStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove a stored chunk. Returns `true` if it existed.
    pub fn remove(&self, handle: &ChunkHandle) -> StoreResult<bool> {
        match fs::remove_file(self.chunk_path(handle)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn chunk_path(&self, handle: &ChunkHandle) -> StoreResult<PathBuf> {
        let id = Uuid::parse_str(handle.as_str())
            .map_err(|_| StoreError::InvalidHandle(handle.to_string()))?;
        Ok(self.root.join(format!("{}.{CHUNK_EXTENSION}", id.hyphenated())))
    }
}

#[async_trait]
impl ChunkStore for DirectoryChunkStore {
    async fn store(&self, source: &mut (dyn Read + Send), max_bytes: u64) -> StoreResult<ChunkRecord> {
        let mut staged = NamedTempFile::new_in(&self.root)?;
        let size = io::copy(&mut source.take(max_bytes), staged.as_file_mut())?;
        staged.as_file().sync_data()?;

        let handle = ChunkHandle::new(Uuid::now_v7().hyphenated().to_string())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let path = self.chunk_path(&handle)?;
        staged.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        debug!(%handle, size, path = %path.display(), "chunk stored");
        Ok(ChunkRecord::new(handle, size))
    }

    async fn fetch(&self, handle: &ChunkHandle) -> StoreResult<ChunkSource> {
        let path = self.chunk_path(handle)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(handle.clone())),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, handle: &ChunkHandle) -> StoreResult<bool> {
        Ok(self.chunk_path(handle)?.is_file())
    }
}
