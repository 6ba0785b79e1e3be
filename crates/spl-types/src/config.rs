use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Largest chunk handed to the chunk store by default (200 MB).
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 200 * 1000 * 1000;

/// Capacity of the encoder/decoder buffer by default (1 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Smallest accepted buffer; every entry header must fit in one buffer.
pub const MIN_BUFFER_SIZE: usize = 4 * 1024;

/// Tunables for one upload or download.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Upper bound on the bytes of one stored chunk.
    pub max_chunk_size: u64,
    /// Capacity of the single reusable encode/decode buffer.
    pub buffer_size: usize,
    /// Window over which download throughput is averaged.
    pub throughput_window_secs: u64,
    /// Replace an existing entry at the download destination.
    pub overwrite: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            throughput_window_secs: 3,
            overwrite: false,
        }
    }
}

impl TransferConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, TypeError> {
        let config: Self =
            toml::from_str(text).map_err(|e| TypeError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, TypeError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TypeError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), TypeError> {
        if self.max_chunk_size == 0 {
            return Err(TypeError::InvalidConfig("max_chunk_size must be positive".into()));
        }
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(TypeError::InvalidConfig(format!(
                "buffer_size must be at least {MIN_BUFFER_SIZE} bytes, got {}",
                self.buffer_size
            )));
        }
        if self.throughput_window_secs == 0 {
            return Err(TypeError::InvalidConfig(
                "throughput_window_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn throughput_window(&self) -> Duration {
        Duration::from_secs(self.throughput_window_secs)
    }
}
