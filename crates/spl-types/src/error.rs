use std::fmt;

use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid chunk handle: {0:?}")]
    InvalidHandle(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("manifest contains no chunks")]
    EmptyManifest,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Coarse classification every splitload error maps into.
///
/// All classes are fatal for the operation that raised them; none of them is
/// retried inside the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// A local entry was missing, unreadable or could not be written.
    FileSystem,
    /// The chunk store failed to store or fetch, or returned bad data.
    Transport,
    /// The encoded stream is corrupt or truncated.
    Format,
    /// The operation was cancelled by the caller.
    Cancelled,
    /// The caller supplied an invalid configuration or manifest.
    Usage,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FileSystem => "file system",
            Self::Transport => "transport",
            Self::Format => "format",
            Self::Cancelled => "cancelled",
            Self::Usage => "usage",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        assert_eq!(
            TypeError::InvalidHandle("a/b".into()).to_string(),
            "invalid chunk handle: \"a/b\""
        );
        assert_eq!(
            TypeError::EmptyManifest.to_string(),
            "manifest contains no chunks"
        );
    }

    #[test]
    fn class_display() {
        assert_eq!(ErrorClass::Transport.to_string(), "transport");
        assert_eq!(ErrorClass::FileSystem.to_string(), "file system");
    }
}
