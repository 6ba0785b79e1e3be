use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::handle::{ChunkHandle, ChunkRecord};
use crate::size::format_bytes_count;

/// Marker framing the handle list inside a share string.
const SHARE_MARKER: char = '💿';

/// Ordered list of stored chunks that together hold one encoded tree.
///
/// The order of `chunks` is the order the chunks were cut from the encoded
/// stream and must be the order they are fetched in. `total_size` is
/// informational only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Name of the uploaded root entry.
    pub name: String,
    pub chunks: Vec<ChunkRecord>,
    pub total_size: u64,
    pub created_at: DateTime<Utc>,
}

impl Manifest {
    pub fn new(name: impl Into<String>, chunks: Vec<ChunkRecord>) -> Self {
        let total_size = chunks.iter().map(|c| c.size).sum();
        Self {
            name: name.into(),
            chunks,
            total_size,
            created_at: Utc::now(),
        }
    }

    /// Build a manifest from bare handles. Sizes and digests are unknown, so
    /// chunks fetched through it are not verified.
    pub fn from_handles(name: impl Into<String>, handles: Vec<ChunkHandle>) -> Self {
        let chunks = handles
            .into_iter()
            .map(|handle| ChunkRecord::new(handle, 0))
            .collect();
        Self::new(name, chunks)
    }

    pub fn handles(&self) -> impl Iterator<Item = &ChunkHandle> {
        self.chunks.iter().map(|c| &c.handle)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn to_json(&self) -> Result<String, TypeError> {
        serde_json::to_string_pretty(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, TypeError> {
        let manifest: Self =
            serde_json::from_str(json).map_err(|e| TypeError::Serialization(e.to_string()))?;
        if manifest.is_empty() {
            return Err(TypeError::EmptyManifest);
        }
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self, TypeError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| TypeError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> Result<(), TypeError> {
        std::fs::write(path, self.to_json()?)
            .map_err(|e| TypeError::Io(format!("{}: {e}", path.display())))
    }

    /// Compact human-shareable form:
    ///
    /// ```text
    /// <name>
    /// Size: <human size>
    /// 💿<handle>,<handle>,...💿
    /// ```
    pub fn to_share_string(&self) -> String {
        let handles: Vec<&str> = self.handles().map(ChunkHandle::as_str).collect();
        format!(
            "{}\nSize: {}\n{SHARE_MARKER}{}{SHARE_MARKER}",
            self.name,
            format_bytes_count(self.total_size as f64),
            handles.join(",")
        )
    }

    /// Parse a share string, or a bare comma-separated handle list.
    pub fn from_share_string(text: &str) -> Result<Self, TypeError> {
        let (name, list) = match (text.find(SHARE_MARKER), text.rfind(SHARE_MARKER)) {
            (Some(start), Some(end)) if start < end => {
                let name = text[..start].lines().next().unwrap_or("").trim();
                (name, &text[start + SHARE_MARKER.len_utf8()..end])
            }
            _ => ("", text),
        };

        let handles = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ChunkHandle::new)
            .collect::<Result<Vec<_>, _>>()?;
        if handles.is_empty() {
            return Err(TypeError::EmptyManifest);
        }
        Ok(Self::from_handles(name, handles))
    }
}
