use std::io::{self, BufRead, Read};

use crate::encoder::TreeEncoder;

/// Pull-based byte stream over a [`TreeEncoder`].
///
/// Reads copy out of the encoder's current block and may return fewer bytes
/// than requested. `Ok(0)` is returned only once the encoder is exhausted;
/// empty blocks are skipped. The stream is single-pass: it cannot seek and
/// cannot be written to.
///
/// Encoder failures surface as `io::Error`s wrapping the original
/// [`PackError`](crate::PackError); use [`PackError::from_io`](crate::PackError::from_io)
/// to get it back.
pub struct BlockStream {
    encoder: TreeEncoder,
    pos: usize,
    len: usize,
    produced: u64,
    finished: bool,
}

impl BlockStream {
    pub fn new(encoder: TreeEncoder) -> Self {
        Self {
            encoder,
            pos: 0,
            len: 0,
            produced: 0,
            finished: false,
        }
    }

    /// Bytes handed to readers so far.
    pub fn bytes_produced(&self) -> u64 {
        self.produced
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl BufRead for BlockStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while self.pos >= self.len && !self.finished {
            match self.encoder.next_block()? {
                Some(len) => {
                    self.pos = 0;
                    self.len = len;
                }
                None => self.finished = true,
            }
        }
        if self.finished && self.pos >= self.len {
            return Ok(&[]);
        }
        Ok(&self.encoder.buffer()[self.pos..self.len])
    }

    fn consume(&mut self, amt: usize) {
        let amt = amt.min(self.len - self.pos);
        self.pos += amt;
        self.produced += amt as u64;
    }
}

impl Read for BlockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::TreeEntry;
    use crate::error::PackError;
    use std::fs;
    use std::path::Path;

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), b"hello").unwrap();
        fs::write(root.join("sub").join("b.txt"), b"").unwrap();
        fs::write(root.join("sub").join("big.bin"), vec![0x5Au8; 5000]).unwrap();
    }

    fn read_with(stream: &mut BlockStream, chunk: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            assert!(n <= chunk);
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn total_matches_planned_size() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        sample_tree(&root);

        let mut stream = BlockStream::new(TreeEncoder::new(&root, 1024).unwrap());
        let bytes = read_with(&mut stream, 4096);
        let planned = TreeEntry::scan(&root).unwrap().encoded_len();
        assert_eq!(bytes.len() as u64, planned);
        assert_eq!(stream.bytes_produced(), planned);
        assert!(stream.is_finished());
    }

    #[test]
    fn small_and_large_destinations_agree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        sample_tree(&root);

        let reference = read_with(&mut BlockStream::new(TreeEncoder::new(&root, 1024).unwrap()), 1 << 16);
        for chunk in [1, 3, 7, 1023, 1024, 1025] {
            let got = read_with(&mut BlockStream::new(TreeEncoder::new(&root, 1024).unwrap()), chunk);
            assert_eq!(got, reference, "destination size {chunk}");
        }
    }

    #[test]
    fn large_destination_gets_at_most_one_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, vec![1u8; 300]).unwrap();

        let mut stream = BlockStream::new(TreeEncoder::new(&path, 128).unwrap());
        let mut buf = vec![0u8; 10_000];
        // header only
        assert_eq!(stream.read(&mut buf).unwrap(), 1 + 1 + 1 + 8);
        assert_eq!(stream.read(&mut buf).unwrap(), 128);
        assert_eq!(stream.read(&mut buf).unwrap(), 128);
        assert_eq!(stream.read(&mut buf).unwrap(), 44);
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn zero_length_request_does_not_pull() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();
        let mut stream = BlockStream::new(TreeEncoder::new(&path, 64).unwrap());
        assert_eq!(stream.read(&mut []).unwrap(), 0);
        assert!(!stream.is_finished());
        assert_eq!(stream.bytes_produced(), 0);
    }

    #[test]
    fn fill_buf_exposes_current_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"abc").unwrap();

        let mut stream = BlockStream::new(TreeEncoder::new(&path, 64).unwrap());
        let header_len = stream.fill_buf().unwrap().len();
        assert_eq!(header_len, 1 + 1 + 1 + 8);
        stream.consume(header_len);
        assert_eq!(stream.fill_buf().unwrap(), b"abc");
        stream.consume(2);
        assert_eq!(stream.fill_buf().unwrap(), b"c");
        stream.consume(1);
        assert!(stream.fill_buf().unwrap().is_empty());
        assert_eq!(stream.bytes_produced(), header_len as u64 + 3);
    }

    #[test]
    fn encoder_errors_are_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = BlockStream::new(TreeEncoder::new(dir.path().join("gone"), 64).unwrap());
        let err = stream.read(&mut [0u8; 8]).unwrap_err();
        assert!(matches!(PackError::from_io(err), PackError::NotFound(_)));
    }
}
