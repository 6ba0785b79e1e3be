use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use spl_types::{PercentTracker, ProgressEvent, ProgressFn};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::entry::{validate_name, EntryHeader, EntryTag, MAX_NAME_LEN};
use crate::error::{PackError, PackResult};
use crate::varint::read_varint;

/// Prefix of the hidden staging directory created inside the destination.
const STAGING_PREFIX: &str = ".splitload-";

/// Name an overwritten entry is parked under while the new one is promoted.
const PARKED_NAME: &str = "previous";
const PARKED_NAME_ALT: &str = "previous.old";

/// What a successful decode produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Final location of the decoded root entry.
    pub path: PathBuf,
    pub files: u64,
    pub directories: u64,
    /// File content bytes written.
    pub bytes: u64,
    /// Encoded bytes consumed from the stream.
    pub stream_bytes: u64,
}

/// Counts bytes read so errors can name a stream offset.
struct CountingReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

/// Rolling average of bytes per second over a fixed window.
struct ThroughputMeter {
    window: Duration,
    started: Instant,
    bytes: u64,
}

impl ThroughputMeter {
    fn new(window: Duration) -> Self {
        Self {
            window,
            started: Instant::now(),
            bytes: 0,
        }
    }

    fn record(&mut self, bytes: usize) -> Option<f64> {
        self.bytes += bytes as u64;
        let elapsed = self.started.elapsed();
        if elapsed < self.window {
            return None;
        }
        let rate = self.bytes as f64 / elapsed.as_secs_f64();
        self.bytes = 0;
        self.started = Instant::now();
        Some(rate)
    }
}

/// Rebuilds a file tree from an encoded stream.
///
/// The decoder consumes exactly the bytes the encoder produced: one root
/// entry and nothing after it. Everything is written into a hidden staging
/// directory inside the destination and the root entry is moved into place
/// with a single rename once the whole tree was decoded, so a failed or
/// cancelled decode leaves the destination untouched.
pub struct TreeDecoder<R> {
    reader: CountingReader<R>,
    buffer: Vec<u8>,
    progress: Option<ProgressFn>,
    cancel: Option<CancellationToken>,
    meter: ThroughputMeter,
    overwrite: bool,
    staging: PathBuf,
}

impl<R: Read> TreeDecoder<R> {
    pub fn new(reader: R, buffer_size: usize) -> PackResult<Self> {
        if buffer_size == 0 {
            return Err(PackError::BufferTooSmall(buffer_size));
        }
        Ok(Self {
            reader: CountingReader { inner: reader, offset: 0 },
            buffer: vec![0u8; buffer_size],
            progress: None,
            cancel: None,
            meter: ThroughputMeter::new(Duration::from_secs(3)),
            overwrite: false,
            staging: PathBuf::new(),
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

    pub fn with_throughput_window(mut self, window: Duration) -> Self {
        self.meter = ThroughputMeter::new(window);
        self
    }

    /// Replace an existing entry of the same name in the destination.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Decode the stream into `destination`, which must be an existing
    /// directory.
    pub fn decode_into(mut self, destination: &Path) -> PackResult<DecodeSummary> {
        if !destination.is_dir() {
            return Err(PackError::NotFound(destination.to_path_buf()));
        }
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(destination)?;
        self.staging = staging.path().to_path_buf();

        let mut summary = DecodeSummary::default();
        let root_name = self.decode_tree(destination, &mut summary)?;
        self.expect_end()?;

        let target = destination.join(&root_name);
        self.promote(staging, &root_name, &target)?;

        summary.path = target;
        summary.stream_bytes = self.reader.offset;
        info!(
            path = %summary.path.display(),
            files = summary.files,
            directories = summary.directories,
            bytes = summary.bytes,
            "tree decoded"
        );
        Ok(summary)
    }

    fn decode_tree(&mut self, destination: &Path, summary: &mut DecodeSummary) -> PackResult<String> {
        let root = self.read_header()?;
        let root_name = root.name().to_string();
        self.check_target(&destination.join(&root_name))?;

        let mut stack: Vec<(PathBuf, u32)> = Vec::new();
        let staging = self.staging.clone();
        self.materialize(&staging, root, &mut stack, summary)?;

        while let Some((dir, remaining)) = stack.last_mut() {
            if *remaining == 0 {
                stack.pop();
                continue;
            }
            *remaining -= 1;
            let parent = dir.clone();
            let header = self.read_header()?;
            self.materialize(&parent, header, &mut stack, summary)?;
        }
        Ok(root_name)
    }

    fn materialize(
        &mut self,
        parent: &Path,
        header: EntryHeader,
        stack: &mut Vec<(PathBuf, u32)>,
        summary: &mut DecodeSummary,
    ) -> PackResult<()> {
        self.check_cancelled()?;
        let offset = self.reader.offset;
        match header {
            EntryHeader::File { name, len } => {
                let path = parent.join(&name);
                self.write_file(&path, len, offset)?;
                summary.files += 1;
                summary.bytes += len;
            }
            EntryHeader::Directory { name, child_count } => {
                let path = parent.join(&name);
                fs::create_dir(&path).map_err(|e| collision(e, offset, &name))?;
                debug!(path = %self.relative(&path).display(), child_count, "decoding directory");
                summary.directories += 1;
                stack.push((path, child_count));
            }
        }
        Ok(())
    }

    fn write_file(&mut self, path: &Path, len: u64, offset: u64) -> PackResult<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| {
                let name = path.file_name().unwrap_or_default().to_string_lossy();
                collision(e, offset, &name)
            })?;
        let relative = self.relative(path).to_path_buf();
        debug!(path = %relative.display(), len, "decoding file");

        let mut percent = PercentTracker::new(len);
        if let Some(start) = percent.advance(0) {
            self.report(&ProgressEvent::File { path: &relative, percent: start });
        }

        let mut done = 0u64;
        while done < len {
            self.check_cancelled()?;
            let want = (len - done).min(self.buffer.len() as u64) as usize;
            let read = match self.reader.read(&mut self.buffer[..want]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(PackError::from_io(e)),
            };
            if read == 0 {
                return Err(PackError::UnexpectedEof {
                    path: relative,
                    expected: len,
                    received: done,
                });
            }
            file.write_all(&self.buffer[..read])?;
            done += read as u64;

            if let Some(step) = percent.advance(done) {
                self.report(&ProgressEvent::File { path: &relative, percent: step });
            }
            if let Some(bytes_per_sec) = self.meter.record(read) {
                debug!(bytes_per_sec, "decode throughput");
                self.report(&ProgressEvent::Throughput { bytes_per_sec });
            }
        }
        file.flush()?;
        Ok(())
    }

    fn read_header(&mut self) -> PackResult<EntryHeader> {
        let offset = self.reader.offset;

        let mut tag = [0u8; 1];
        self.read_exact_at(&mut tag, offset, "entry tag")?;
        let tag = EntryTag::from_type_byte(tag[0]).ok_or_else(|| PackError::CorruptEntry {
            offset,
            reason: format!("unknown entry tag {}", tag[0]),
        })?;

        let name_len = read_varint(&mut self.reader).map_err(|e| header_error(e, offset, "name length"))?;
        if name_len > MAX_NAME_LEN as u64 {
            return Err(PackError::CorruptEntry {
                offset,
                reason: format!("name length {name_len} exceeds {MAX_NAME_LEN}"),
            });
        }
        let mut name = vec![0u8; name_len as usize];
        self.read_exact_at(&mut name, offset, "entry name")?;
        let name = String::from_utf8(name).map_err(|_| PackError::CorruptEntry {
            offset,
            reason: "entry name is not valid UTF-8".into(),
        })?;
        validate_name(&name)?;

        match tag {
            EntryTag::File => {
                let mut len = [0u8; 8];
                self.read_exact_at(&mut len, offset, "file length")?;
                Ok(EntryHeader::File {
                    name,
                    len: u64::from_le_bytes(len),
                })
            }
            EntryTag::Directory => {
                let mut count = [0u8; 4];
                self.read_exact_at(&mut count, offset, "child count")?;
                Ok(EntryHeader::Directory {
                    name,
                    child_count: u32::from_le_bytes(count),
                })
            }
        }
    }

    fn read_exact_at(&mut self, buf: &mut [u8], offset: u64, what: &str) -> PackResult<()> {
        self.reader
            .read_exact(buf)
            .map_err(|e| header_error(e, offset, what))
    }

    /// The root entry must be the last thing in the stream.
    fn expect_end(&mut self) -> PackResult<()> {
        let offset = self.reader.offset;
        let mut probe = [0u8; 1];
        loop {
            match self.reader.read(&mut probe) {
                Ok(0) => return Ok(()),
                Ok(_) => {
                    return Err(PackError::CorruptEntry {
                        offset,
                        reason: "trailing data after root entry".into(),
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(PackError::from_io(e)),
            }
        }
    }

    fn check_target(&self, target: &Path) -> PackResult<()> {
        if !self.overwrite && fs::symlink_metadata(target).is_ok() {
            return Err(PackError::DestinationExists(target.to_path_buf()));
        }
        Ok(())
    }

    /// Move the decoded root out of `staging` to `target`. An existing
    /// target is parked inside the staging directory until the new entry is
    /// in place and moved back if that fails.
    fn promote(&self, staging: TempDir, root_name: &str, target: &Path) -> PackResult<()> {
        let staged = staging.path().join(root_name);
        let parked = staging.path().join(if root_name == PARKED_NAME {
            PARKED_NAME_ALT
        } else {
            PARKED_NAME
        });

        match fs::symlink_metadata(target) {
            Err(_) => fs::rename(&staged, target)?,
            Ok(_) if !self.overwrite => {
                return Err(PackError::DestinationExists(target.to_path_buf()));
            }
            Ok(_) => {
                fs::rename(target, &parked)?;
                if let Err(e) = fs::rename(&staged, target) {
                    if let Err(restore) = fs::rename(&parked, target) {
                        // Keep the staging directory: it now holds the only copy.
                        let _ = staging.keep();
                        warn!(
                            error = %restore,
                            previous = %parked.display(),
                            "could not restore previous entry; it was left in the staging directory"
                        );
                    }
                    return Err(PackError::Io(e));
                }
            }
        }

        if let Err(e) = staging.close() {
            warn!(error = %e, "failed to remove staging directory");
        }
        Ok(())
    }

    fn check_cancelled(&self) -> PackResult<()> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(PackError::Cancelled);
        }
        Ok(())
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.staging).unwrap_or(path)
    }

    fn report(&self, event: &ProgressEvent<'_>) {
        if let Some(progress) = &self.progress {
            progress(event);
        }
    }
}

fn header_error(err: io::Error, offset: u64, what: &str) -> PackError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => PackError::CorruptEntry {
            offset,
            reason: format!("stream ended inside {what}"),
        },
        io::ErrorKind::InvalidData if err.get_ref().is_some_and(|e| !e.is::<PackError>()) => {
            PackError::CorruptEntry {
                offset,
                reason: format!("invalid {what}: {err}"),
            }
        }
        _ => PackError::from_io(err),
    }
}

fn collision(err: io::Error, offset: u64, name: &str) -> PackError {
    if err.kind() == io::ErrorKind::AlreadyExists {
        PackError::CorruptEntry {
            offset,
            reason: format!("duplicate entry name {name:?}"),
        }
    } else {
        PackError::Io(err)
    }
}
