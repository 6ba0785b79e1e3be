use std::io;

use spl_types::{ChunkHandle, ErrorClass};

/// Errors from chunk store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No chunk is stored under this handle.
    #[error("chunk not found: {0}")]
    NotFound(ChunkHandle),

    /// The handle cannot have been issued by this store.
    #[error("invalid chunk handle: {0}")]
    InvalidHandle(String),

    /// The backend rejected or failed the operation.
    #[error("store backend failure: {0}")]
    Backend(String),

    /// Fetched bytes do not hash to the digest recorded at upload.
    #[error("digest mismatch for {handle}: expected {expected}, computed {actual}")]
    DigestMismatch {
        handle: ChunkHandle,
        expected: String,
        actual: String,
    },

    /// Fetched chunk length differs from the recorded size.
    #[error("size mismatch for {handle}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        handle: ChunkHandle,
        expected: u64,
        actual: u64,
    },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Every store failure is a transport failure from the caller's view.
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Transport
    }
}

impl From<StoreError> for io::Error {
    fn from(err: StoreError) -> Self {
        // InvalidData is left to stream decoders, which read it as corruption.
        let kind = match &err {
            StoreError::NotFound(_) => io::ErrorKind::NotFound,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_into_io_error() {
        let handle = ChunkHandle::new("h1").unwrap();
        let io_err: io::Error = StoreError::NotFound(handle).into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
        let inner = io_err.into_inner().unwrap();
        assert!(inner.downcast::<StoreError>().is_ok());
    }

    #[test]
    fn display_names_the_handle() {
        let err = StoreError::SizeMismatch {
            handle: ChunkHandle::new("abc").unwrap(),
            expected: 10,
            actual: 7,
        };
        assert_eq!(err.to_string(), "size mismatch for abc: expected 10 bytes, got 7");
        assert_eq!(err.class(), ErrorClass::Transport);
    }
}
