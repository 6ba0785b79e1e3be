use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{PackError, PackResult};
use crate::varint::{varint_len, write_varint};

/// Longest accepted entry name, in UTF-8 bytes.
pub const MAX_NAME_LEN: usize = 1024;

/// Type tag leading every encoded entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryTag {
    File,
    Directory,
}

impl EntryTag {
    pub fn type_byte(self) -> u8 {
        match self {
            Self::File => 0,
            Self::Directory => 1,
        }
    }

    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::File),
            1 => Some(Self::Directory),
            _ => None,
        }
    }
}

/// Header preceding an entry in the encoded stream.
///
/// ```text
/// [1 byte: tag]
/// [varint: name length][name bytes, UTF-8]
/// File:      [8 bytes: content length, u64 LE][content]
/// Directory: [4 bytes: child count, u32 LE][children...]
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryHeader {
    File { name: String, len: u64 },
    Directory { name: String, child_count: u32 },
}

impl EntryHeader {
    pub fn tag(&self) -> EntryTag {
        match self {
            Self::File { .. } => EntryTag::File,
            Self::Directory { .. } => EntryTag::Directory,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Directory { name, .. } => name,
        }
    }

    /// Encoded size of this header.
    pub fn encoded_len(&self) -> usize {
        let name_len = self.name().len();
        let fixed = match self {
            Self::File { .. } => 8,
            Self::Directory { .. } => 4,
        };
        1 + varint_len(name_len as u64) + name_len + fixed
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<usize> {
        writer.write_all(&[self.tag().type_byte()])?;
        let name = self.name().as_bytes();
        write_varint(writer, name.len() as u64)?;
        writer.write_all(name)?;
        match self {
            Self::File { len, .. } => writer.write_all(&len.to_le_bytes())?,
            Self::Directory { child_count, .. } => writer.write_all(&child_count.to_le_bytes())?,
        }
        Ok(self.encoded_len())
    }
}

/// Check that a name is a single plain path component.
pub fn validate_name(name: &str) -> PackResult<()> {
    let reason = if name.is_empty() {
        "empty"
    } else if name == "." || name == ".." {
        "relative component"
    } else if name.contains(['/', '\\']) {
        "contains a path separator"
    } else if name.contains('\0') {
        "contains NUL"
    } else if name.len() > MAX_NAME_LEN {
        "too long"
    } else {
        return Ok(());
    };
    Err(PackError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Name under which `path` is encoded. Paths without a final component
/// (such as `.`) are canonicalized first.
pub fn entry_name(path: &Path) -> PackResult<String> {
    let owned;
    let file_name = match path.file_name() {
        Some(name) => name,
        None => {
            owned = fs::canonicalize(path).map_err(|e| map_missing(e, path))?;
            owned.file_name().ok_or_else(|| PackError::InvalidName {
                name: path.display().to_string(),
                reason: "path has no final component",
            })?
        }
    };
    let name = file_name.to_str().ok_or_else(|| PackError::InvalidName {
        name: file_name.to_string_lossy().into_owned(),
        reason: "not valid UTF-8",
    })?;
    validate_name(name)?;
    Ok(name.to_string())
}

/// Metadata for an entry about to be encoded. A symlink given as the root is
/// followed; links found inside the tree are not, so they surface as
/// unsupported entries instead of being walked.
pub(crate) fn entry_metadata(path: &Path, is_root: bool) -> PackResult<fs::Metadata> {
    let meta = if is_root {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    };
    meta.map_err(|e| map_missing(e, path))
}

/// Children of `dir`, ordered by name so encodings are reproducible.
pub(crate) fn list_children(dir: &Path) -> PackResult<Vec<PathBuf>> {
    let mut children = fs::read_dir(dir)
        .map_err(|e| map_missing(e, dir))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| map_missing(e, dir))?;
    children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(children)
}

pub(crate) fn map_missing(err: io::Error, path: &Path) -> PackError {
    if err.kind() == io::ErrorKind::NotFound {
        PackError::NotFound(path.to_path_buf())
    } else {
        PackError::Io(err)
    }
}

/// In-memory listing of a tree, used to plan transfers and in tests.
///
/// The encoder never builds one of these; it walks the file system lazily.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeEntry {
    File { name: String, len: u64 },
    Directory { name: String, children: Vec<TreeEntry> },
}

impl TreeEntry {
    /// Snapshot the tree rooted at `path`, children ordered by name.
    pub fn scan(path: &Path) -> PackResult<Self> {
        Self::scan_entry(path, true)
    }

    fn scan_entry(path: &Path, is_root: bool) -> PackResult<Self> {
        let name = entry_name(path)?;
        let meta = entry_metadata(path, is_root)?;
        if meta.is_file() {
            Ok(Self::File {
                name,
                len: meta.len(),
            })
        } else if meta.is_dir() {
            let children = list_children(path)?
                .iter()
                .map(|child| Self::scan_entry(child, false))
                .collect::<PackResult<Vec<_>>>()?;
            Ok(Self::Directory { name, children })
        } else {
            Err(PackError::UnsupportedEntry(path.to_path_buf()))
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Directory { name, .. } => name,
        }
    }

    /// Exact number of bytes the encoder produces for this tree.
    pub fn encoded_len(&self) -> u64 {
        match self {
            Self::File { name, len } => {
                let header = EntryHeader::File {
                    name: name.clone(),
                    len: *len,
                };
                header.encoded_len() as u64 + len
            }
            Self::Directory { name, children } => {
                let header = EntryHeader::Directory {
                    name: name.clone(),
                    child_count: children.len() as u32,
                };
                header.encoded_len() as u64
                    + children.iter().map(TreeEntry::encoded_len).sum::<u64>()
            }
        }
    }

    pub fn file_count(&self) -> u64 {
        match self {
            Self::File { .. } => 1,
            Self::Directory { children, .. } => children.iter().map(TreeEntry::file_count).sum(),
        }
    }
}
