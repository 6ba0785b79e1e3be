use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use spl_types::{PercentTracker, ProgressEvent, ProgressFn};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::entry::{entry_metadata, entry_name, list_children, map_missing, EntryHeader};
use crate::error::{PackError, PackResult};

/// One level of the depth-first walk.
enum Frame {
    Directory {
        children: std::vec::IntoIter<PathBuf>,
    },
    File {
        path: PathBuf,
        file: File,
        len: u64,
        done: u64,
        percent: PercentTracker,
    },
}

/// Lazily encodes a file tree into a sequence of blocks.
///
/// Every call to [`next_block`](Self::next_block) overwrites the start of
/// one reusable buffer with the next header or content slice and returns its
/// length. The caller must consume `buffer()[..len]` before pulling again.
/// The sequence is finite and cannot be restarted.
pub struct TreeEncoder {
    buffer: Vec<u8>,
    pending_root: Option<PathBuf>,
    stack: Vec<Frame>,
    /// Directory holding the root; progress paths are relative to it.
    base: PathBuf,
    progress: Option<ProgressFn>,
    cancel: Option<CancellationToken>,
    blocks: u64,
    bytes: u64,
}

impl TreeEncoder {
    /// Prepare to encode `root`. The file system is not touched until the
    /// first block is pulled.
    pub fn new(root: impl Into<PathBuf>, buffer_size: usize) -> PackResult<Self> {
        if buffer_size == 0 {
            return Err(PackError::BufferTooSmall(buffer_size));
        }
        let root = root.into();
        let base = root.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self {
            buffer: vec![0u8; buffer_size],
            pending_root: Some(root),
            stack: Vec::new(),
            base,
            progress: None,
            cancel: None,
            blocks: 0,
            bytes: 0,
        })
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The shared block buffer. Only the prefix reported by the last
    /// `next_block` call is meaningful.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes emitted so far.
    pub fn bytes_emitted(&self) -> u64 {
        self.bytes
    }

    /// Produce the next block, or `None` once the whole tree was emitted.
    pub fn next_block(&mut self) -> PackResult<Option<usize>> {
        let len = match self.advance()? {
            Some(len) => len,
            None => return Ok(None),
        };
        self.blocks += 1;
        self.bytes += len as u64;
        Ok(Some(len))
    }

    fn advance(&mut self) -> PackResult<Option<usize>> {
        loop {
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return Err(PackError::Cancelled);
            }
            if let Some(root) = self.pending_root.take() {
                return self.begin_entry(root, true).map(Some);
            }

            let child = match self.stack.last_mut() {
                None => {
                    debug!(blocks = self.blocks, bytes = self.bytes, "tree encoded");
                    return Ok(None);
                }
                Some(Frame::Directory { children }) => match children.next() {
                    Some(child) => child,
                    None => {
                        self.stack.pop();
                        continue;
                    }
                },
                Some(Frame::File {
                    path,
                    file,
                    len,
                    done,
                    percent,
                }) => {
                    if *done == *len {
                        self.stack.pop();
                        continue;
                    }
                    let want = (*len - *done).min(self.buffer.len() as u64) as usize;
                    let read = fill(file, &mut self.buffer[..want])?;
                    if read == 0 {
                        return Err(PackError::FileChanged {
                            path: path.clone(),
                            expected: *len,
                            actual: *done,
                        });
                    }
                    *done += read as u64;
                    if let Some(percent) = percent.advance(*done) {
                        report(self.progress.as_ref(), &self.base, path, percent);
                    }
                    return Ok(Some(read));
                }
            };
            return self.begin_entry(child, false).map(Some);
        }
    }

    /// Write the header for `path` into the buffer and push its frame.
    fn begin_entry(&mut self, path: PathBuf, is_root: bool) -> PackResult<usize> {
        let meta = entry_metadata(&path, is_root)?;
        let name = entry_name(&path)?;

        if meta.is_file() {
            let file = File::open(&path).map_err(|e| map_missing(e, &path))?;
            let len = file.metadata()?.len();
            let written = self.write_header(&EntryHeader::File { name, len })?;
            debug!(path = %path.display(), len, "encoding file");

            let mut percent = PercentTracker::new(len);
            if let Some(start) = percent.advance(0) {
                report(self.progress.as_ref(), &self.base, &path, start);
            }
            self.stack.push(Frame::File {
                path,
                file,
                len,
                done: 0,
                percent,
            });
            Ok(written)
        } else if meta.is_dir() {
            let children = list_children(&path)?;
            let child_count = u32::try_from(children.len())
                .map_err(|_| PackError::TooManyChildren(path.clone()))?;
            let written = self.write_header(&EntryHeader::Directory { name, child_count })?;
            debug!(path = %path.display(), child_count, "encoding directory");

            self.stack.push(Frame::Directory {
                children: children.into_iter(),
            });
            Ok(written)
        } else {
            Err(PackError::UnsupportedEntry(path))
        }
    }

    fn write_header(&mut self, header: &EntryHeader) -> PackResult<usize> {
        let size = header.encoded_len();
        if size > self.buffer.len() {
            return Err(PackError::HeaderTooLarge {
                size,
                capacity: self.buffer.len(),
            });
        }
        let mut slot = &mut self.buffer[..size];
        Ok(header.write_to(&mut slot)?)
    }
}

/// Read until `buf` is full or the reader is exhausted.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn report(progress: Option<&ProgressFn>, base: &Path, path: &Path, percent: u8) {
    if let Some(progress) = progress {
        let relative = path.strip_prefix(base).unwrap_or(path);
        progress(&ProgressEvent::File {
            path: relative,
            percent,
        });
    }
}
