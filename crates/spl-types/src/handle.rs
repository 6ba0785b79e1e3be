use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque token identifying one stored chunk.
///
/// Handles are owned by the chunk store that issued them; splitload only
/// carries them around. A handle is a non-empty string without commas or
/// whitespace so it can travel inside a share string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkHandle(String);

impl ChunkHandle {
    /// Wrap a store-issued token, rejecting empty ones and ones that would
    /// break share-string parsing.
    pub fn new(token: impl Into<String>) -> Result<Self, TypeError> {
        let token = token.into();
        if token.is_empty() || token.contains(',') || token.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidHandle(token));
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ChunkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkHandle({})", self.0)
    }
}

impl fmt::Display for ChunkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChunkHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One stored chunk as reported by the chunk store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub handle: ChunkHandle,
    /// Bytes actually stored.
    pub size: u64,
    /// BLAKE3 hex digest of the chunk bytes, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ChunkRecord {
    pub fn new(handle: ChunkHandle, size: u64) -> Self {
        Self {
            handle,
            size,
            digest: None,
        }
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unshareable_tokens() {
        assert!(ChunkHandle::new("").is_err());
        assert!(ChunkHandle::new("a,b").is_err());
        assert!(ChunkHandle::new("a b").is_err());
        assert!(ChunkHandle::new("a\nb").is_err());
        assert_eq!(ChunkHandle::new("123_456").unwrap().as_str(), "123_456");
    }

    #[test]
    fn serializes_as_plain_string() {
        let handle = ChunkHandle::new("chunk-1").unwrap();
        assert_eq!(serde_json::to_string(&handle).unwrap(), "\"chunk-1\"");
    }

    #[test]
    fn record_digest_is_optional_in_json() {
        let record = ChunkRecord::new(ChunkHandle::new("h").unwrap(), 10);
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("digest"));

        let parsed: ChunkRecord = serde_json::from_str(r#"{"handle":"h","size":10}"#).unwrap();
        assert_eq!(parsed, record);

        let hashed = record.with_digest("abcd");
        let parsed: ChunkRecord =
            serde_json::from_str(&serde_json::to_string(&hashed).unwrap()).unwrap();
        assert_eq!(parsed.digest.as_deref(), Some("abcd"));
    }
}
