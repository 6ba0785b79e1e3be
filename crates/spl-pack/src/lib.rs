//! Streaming tree codec for splitload.
//!
//! Encodes a file or directory into one continuous, self-describing byte
//! stream and decodes such a stream back into a tree, moving content through
//! a single reusable buffer so trees far larger than memory can be handled.
//!
//! # Architecture
//!
//! - **TreeEncoder**: depth-first walk producing header and content blocks into one buffer
//! - **BlockStream**: `Read`/`BufRead` adapter over the encoder's blocks
//! - **TreeDecoder**: rebuilds the tree from any `Read`, staging it before promotion
//! - **TreeEntry**: in-memory snapshot used to plan sizes and in tests
//!
//! # Stream format
//!
//! ```text
//! entry     := file | directory
//! file      := 0x00 name len:u64le content[len]
//! directory := 0x01 name count:u32le entry[count]
//! name      := varint(byte length) utf8-bytes
//! ```
//!
//! There is no resynchronization marker: a decoder must consume exactly the
//! bytes the encoder produced.

pub mod block_stream;
pub mod decoder;
pub mod encoder;
pub mod entry;
pub mod error;
pub mod varint;

pub use block_stream::BlockStream;
pub use decoder::{DecodeSummary, TreeDecoder};
pub use encoder::TreeEncoder;
pub use entry::{EntryHeader, EntryTag, TreeEntry, MAX_NAME_LEN};
pub use error::{PackError, PackResult};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::fs;
    use std::io::{self, Read};
    use std::path::{Path, PathBuf};

    /// Hands out at most `max` bytes per read.
    struct Trickle<R> {
        inner: R,
        max: usize,
    }

    impl<R: Read> Read for Trickle<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let limit = buf.len().min(self.max);
            self.inner.read(&mut buf[..limit])
        }
    }

    /// Every file under `root` keyed by relative path, plus every directory
    /// (with `None` content).
    fn contents(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
        fn walk(base: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Option<Vec<u8>>>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                let rel = path.strip_prefix(base).unwrap().to_path_buf();
                if path.is_dir() {
                    out.insert(rel, None);
                    walk(base, &path, out);
                } else {
                    out.insert(rel, Some(fs::read(&path).unwrap()));
                }
            }
        }
        let mut out = BTreeMap::new();
        walk(root, root, &mut out);
        out
    }

    fn roundtrip(root: &Path, buffer: usize, read_size: usize) -> DecodeSummary {
        let out = tempfile::tempdir().unwrap();
        let stream = BlockStream::new(TreeEncoder::new(root, buffer).unwrap());
        let reader = Trickle {
            inner: stream,
            max: read_size,
        };
        let summary = TreeDecoder::new(reader, buffer)
            .unwrap()
            .decode_into(out.path())
            .unwrap();

        let name = root.file_name().unwrap();
        assert_eq!(summary.path, out.path().join(name));
        if root.is_dir() {
            assert_eq!(contents(root), contents(&summary.path));
        } else {
            assert_eq!(fs::read(root).unwrap(), fs::read(&summary.path).unwrap());
        }
        assert_eq!(
            summary.stream_bytes,
            TreeEntry::scan(root).unwrap().encoded_len()
        );
        summary
    }

    #[test]
    fn roundtrip_example_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), b"hello").unwrap();
        fs::write(root.join("sub").join("b.txt"), b"").unwrap();

        let summary = roundtrip(&root, 4096, 4096);
        assert_eq!(summary.files, 2);
        assert_eq!(summary.directories, 2);
        assert_eq!(summary.bytes, 5);
    }

    #[test]
    fn roundtrip_empty_directories_and_deep_nesting() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("deep");
        let mut leaf = root.clone();
        for level in 0..40 {
            leaf = leaf.join(format!("level-{level}"));
        }
        fs::create_dir_all(&leaf).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(leaf.join("bottom.txt"), b"at the bottom").unwrap();

        let summary = roundtrip(&root, 64, 5);
        assert_eq!(summary.directories, 42);
        assert_eq!(summary.files, 1);
    }

    #[test]
    fn roundtrip_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let content: Vec<u8> = (0..10_000u32).map(|i| (i * 7 % 256) as u8).collect();
        fs::write(&path, &content).unwrap();
        roundtrip(&path, 1000, 333);
    }

    #[test]
    fn roundtrip_unicode_names() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("данные");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("日本語.txt"), "こんにちは").unwrap();
        fs::write(root.join("ßüñ"), b"").unwrap();
        roundtrip(&root, 64, 1);
    }

    #[test]
    fn encoding_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(&root).unwrap();
        for name in ["zeta", "alpha", "mid", "Beta"] {
            fs::write(root.join(name), name).unwrap();
        }
        let encode = || {
            let mut bytes = Vec::new();
            BlockStream::new(TreeEncoder::new(&root, 64).unwrap())
                .read_to_end(&mut bytes)
                .unwrap();
            bytes
        };
        assert_eq!(encode(), encode());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn roundtrip_random_trees(
            files in proptest::collection::vec(
                (0usize..4, proptest::collection::vec(any::<u8>(), 0..400)),
                0..10,
            ),
            buffer in 24usize..256,
            read_size in 1usize..512,
        ) {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("root");
            fs::create_dir_all(&root).unwrap();
            for (i, (depth, content)) in files.iter().enumerate() {
                let mut parent = root.clone();
                for d in 0..*depth {
                    parent = parent.join(format!("d{d}"));
                }
                fs::create_dir_all(&parent).unwrap();
                fs::write(parent.join(format!("f{i}")), content).unwrap();
            }

            let summary = roundtrip(&root, buffer, read_size);
            prop_assert_eq!(summary.files, files.len() as u64);
            let expected_bytes: u64 = files.iter().map(|(_, c)| c.len() as u64).sum();
            prop_assert_eq!(summary.bytes, expected_bytes);
        }
    }
}
