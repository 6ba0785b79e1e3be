use std::io;

use spl_pack::PackError;
use spl_store::StoreError;
use spl_types::{ErrorClass, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("pack error: {0}")]
    Pack(#[from] PackError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The store claims a different size than it actually read.
    #[error("chunk {index}: store reported {reported} bytes but consumed {consumed}")]
    SizeMismatch {
        index: usize,
        reported: u64,
        consumed: u64,
    },

    /// A chunk shorter than the maximum was stored while the stream still
    /// had bytes left.
    #[error("chunk {index} holds {size} of {max} bytes but the stream is not finished")]
    ShortChunk { index: usize, size: u64, max: u64 },

    #[error("transfer cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(#[from] TypeError),
}

pub type TransferResult<T> = Result<T, TransferError>;

impl TransferError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Pack(e) => e.class(),
            Self::Store(e) => e.class(),
            Self::SizeMismatch { .. } | Self::ShortChunk { .. } => ErrorClass::Transport,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::Config(_) => ErrorClass::Usage,
        }
    }

    /// Classify a codec failure, unwrapping store errors that reached the
    /// decoder through its reader.
    pub fn from_pack(err: PackError) -> Self {
        match err {
            PackError::Cancelled => Self::Cancelled,
            PackError::Io(io) => match take_inner::<StoreError>(io) {
                Ok(store) => Self::Store(store),
                Err(io) => Self::Pack(PackError::Io(io)),
            },
            other => Self::Pack(other),
        }
    }

    /// Classify a store failure, unwrapping encoder errors that reached the
    /// store through the chunk source.
    pub fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::Io(io) => {
                let wraps_pack = io.get_ref().is_some_and(|inner| inner.is::<PackError>());
                if wraps_pack {
                    Self::from_pack(PackError::from_io(io))
                } else {
                    Self::Store(StoreError::Io(io))
                }
            }
            other => Self::Store(other),
        }
    }
}

fn take_inner<E>(err: io::Error) -> Result<E, io::Error>
where
    E: std::error::Error + Send + Sync + 'static,
{
    if !err.get_ref().is_some_and(|inner| inner.is::<E>()) {
        return Err(err);
    }
    let kind = err.kind();
    match err.into_inner() {
        Some(inner) => inner.downcast::<E>().map(|e| *e).map_err(|other| io::Error::new(kind, other)),
        None => Err(io::Error::from(kind)),
    }
}
