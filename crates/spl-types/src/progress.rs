use std::path::Path;
use std::sync::Arc;

/// Notification emitted while a tree is encoded, decoded or transferred.
///
/// Progress is instrumentation only: observers never influence byte counts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProgressEvent<'a> {
    /// Percent of one file's content processed so far. `path` is relative to
    /// the directory holding the transferred root.
    File { path: &'a Path, percent: u8 },
    /// Average decode throughput over the last measurement window.
    Throughput { bytes_per_sec: f64 },
    /// A chunk was handed to or fetched from the chunk store.
    Chunk { index: usize, size: u64 },
}

/// Shared progress callback.
pub type ProgressFn = Arc<dyn Fn(&ProgressEvent<'_>) + Send + Sync>;

/// Turns a running byte count into whole-percent steps, reporting each
/// percent at most once.
#[derive(Clone, Debug)]
pub struct PercentTracker {
    total: u64,
    last: Option<u8>,
}

impl PercentTracker {
    pub fn new(total: u64) -> Self {
        Self { total, last: None }
    }

    /// Returns the new percent if it moved forward since the last report.
    /// The first call always reports.
    pub fn advance(&mut self, done: u64) -> Option<u8> {
        let percent = if self.total == 0 {
            100
        } else {
            (u128::from(done.min(self.total)) * 100 / u128::from(self.total)) as u8
        };
        match self.last {
            Some(last) if percent <= last => None,
            _ => {
                self.last = Some(percent);
                Some(percent)
            }
        }
    }
}
