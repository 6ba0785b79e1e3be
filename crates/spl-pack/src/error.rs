use std::io;
use std::path::PathBuf;

use spl_types::ErrorClass;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("entry not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported entry type (not a file or directory): {}", .0.display())]
    UnsupportedEntry(PathBuf),

    #[error("file changed while encoding: {}: expected {expected} bytes, read {actual}", .path.display())]
    FileChanged {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("invalid entry name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("buffer of {0} bytes is too small")]
    BufferTooSmall(usize),

    #[error("entry header of {size} bytes does not fit the {capacity}-byte buffer")]
    HeaderTooLarge { size: usize, capacity: usize },

    #[error("directory has too many children: {}", .0.display())]
    TooManyChildren(PathBuf),

    #[error("corrupt stream at offset {offset}: {reason}")]
    CorruptEntry { offset: u64, reason: String },

    #[error("stream ended early in {}: expected {expected} bytes, got {received}", .path.display())]
    UnexpectedEof {
        path: PathBuf,
        expected: u64,
        received: u64,
    },

    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type PackResult<T> = Result<T, PackError>;

impl PackError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_)
            | Self::UnsupportedEntry(_)
            | Self::FileChanged { .. }
            | Self::TooManyChildren(_)
            | Self::DestinationExists(_)
            | Self::Io(_) => ErrorClass::FileSystem,
            Self::InvalidName { .. } | Self::CorruptEntry { .. } | Self::UnexpectedEof { .. } => {
                ErrorClass::Format
            }
            Self::BufferTooSmall(_) | Self::HeaderTooLarge { .. } => ErrorClass::Usage,
            Self::Cancelled => ErrorClass::Cancelled,
        }
    }

    /// Recover a `PackError` that crossed an `io::Read` boundary. Plain I/O
    /// errors become [`PackError::Io`].
    pub fn from_io(err: io::Error) -> Self {
        let wraps_pack = err.get_ref().is_some_and(|inner| inner.is::<PackError>());
        if !wraps_pack {
            return Self::Io(err);
        }
        match err.into_inner() {
            Some(inner) => match inner.downcast::<PackError>() {
                Ok(pack) => *pack,
                Err(other) => Self::Io(io::Error::other(other)),
            },
            None => Self::Io(io::Error::other("empty I/O error")),
        }
    }
}

impl From<PackError> for io::Error {
    fn from(err: PackError) -> Self {
        let kind = match &err {
            PackError::NotFound(_) => io::ErrorKind::NotFound,
            PackError::UnexpectedEof { .. } => io::ErrorKind::UnexpectedEof,
            PackError::CorruptEntry { .. } | PackError::InvalidName { .. } => {
                io::ErrorKind::InvalidData
            }
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
