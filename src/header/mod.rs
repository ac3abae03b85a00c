//! # Header Protocol
//!
//! Binary encode/decode for the three entry kinds stored in an archive:
//! files, symlinks, and directories. Every record is little-endian and
//! tag-prefixed; paths are `i16` length-prefixed raw bytes and must be
//! shorter than [`MAX_PATH_LEN`]. Decoding is the strict byte-for-byte
//! inverse of encoding: headers are read sequentially, so a bad length or
//! tag aborts the whole archive read.
//!
//! Compressed size and CRC32 are deliberately *not* part of a file header;
//! both are recoverable from the block stream itself (length prefixes and
//! the trailing checksum) and are filled in only by the stat scanner.

use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use crate::error::ArchiveError;

/// Archive paths must have an encoded length in `[1, MAX_PATH_LEN)`.
pub const MAX_PATH_LEN: usize = 1024;

const TAG_SYMLINK: u8 = 0;
const TAG_FILE: u8 = 1;
const TAG_DIR: u8 = 2;

/// Fields shared by every entry kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    /// Where the entry lives on disk. Only meaningful on the compress side;
    /// decoded entries mirror the archive path here.
    pub disk_path: PathBuf,
    /// Normalized, forward-slash, archive-relative path. The canonical
    /// identity key: unique within one archive.
    pub arc_path: String,
    /// Last modification time, Unix seconds.
    pub mtime: i64,
    /// Last access time, Unix seconds.
    pub atime: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub meta: EntryMeta,
    /// Uncompressed size in bytes, persisted in the header.
    pub size: u64,
    /// Sum of the block length prefixes. Filled by the stat scanner only.
    pub compressed: u64,
    /// Stored stream checksum. Filled by the stat scanner only.
    pub crc32: u32,
    /// Set exactly once, during a restore pass whose recomputed checksum
    /// did not match the stored one. Never set while writing.
    pub damaged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub meta: EntryMeta,
    /// The symlink target, stored verbatim (no byte stream follows a link).
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub meta: EntryMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File(FileEntry),
    Link(LinkEntry),
    Dir(DirEntry),
}

impl Entry {
    pub fn file(meta: EntryMeta, size: u64) -> Self {
        Entry::File(FileEntry {
            meta,
            size,
            compressed: 0,
            crc32: 0,
            damaged: false,
        })
    }

    #[inline]
    pub fn meta(&self) -> &EntryMeta {
        match self {
            Entry::File(f) => &f.meta,
            Entry::Link(l) => &l.meta,
            Entry::Dir(d) => &d.meta,
        }
    }

    #[inline]
    pub fn arc_path(&self) -> &str {
        &self.meta().arc_path
    }

    #[inline]
    pub fn as_file(&self) -> Option<&FileEntry> {
        match self {
            Entry::File(f) => Some(f),
            _ => None,
        }
    }

    /// Serializes the record: tag byte, then the kind-specific body.
    pub fn encode<W: Write>(&self, w: &mut W) -> Result<(), ArchiveError> {
        match self {
            Entry::Link(l) => {
                w.write_all(&[TAG_SYMLINK])?;
                // Target is stored before the link path.
                write_path(w, &l.target)?;
                write_path(w, &l.meta.arc_path)?;
                write_times(w, &l.meta)?;
            }
            Entry::File(f) => {
                w.write_all(&[TAG_FILE])?;
                write_path(w, &f.meta.arc_path)?;
                write_times(w, &f.meta)?;
                w.write_all(&(f.size as i64).to_le_bytes())?;
            }
            Entry::Dir(d) => {
                w.write_all(&[TAG_DIR])?;
                write_path(w, &d.meta.arc_path)?;
                write_times(w, &d.meta)?;
            }
        }
        Ok(())
    }

    /// Deserializes one record; the exact inverse of [`Entry::encode`].
    pub fn decode<R: Read>(r: &mut R) -> Result<Entry, ArchiveError> {
        let mut tag = [0u8; 1];
        r.read_exact(&mut tag).map_err(truncated)?;

        let entry = match tag[0] {
            TAG_SYMLINK => {
                let target = read_path(r)?;
                let arc_path = read_path(r)?;
                let (mtime, atime) = read_times(r)?;
                Entry::Link(LinkEntry {
                    meta: decoded_meta(arc_path, mtime, atime),
                    target,
                })
            }
            TAG_FILE => {
                let arc_path = read_path(r)?;
                let (mtime, atime) = read_times(r)?;
                let mut buf = [0u8; 8];
                r.read_exact(&mut buf).map_err(truncated)?;
                let size = i64::from_le_bytes(buf);
                if size < 0 {
                    return Err(ArchiveError::Format(format!(
                        "negative file size {} in header",
                        size
                    )));
                }
                Entry::file(decoded_meta(arc_path, mtime, atime), size as u64)
            }
            TAG_DIR => {
                let arc_path = read_path(r)?;
                let (mtime, atime) = read_times(r)?;
                Entry::Dir(DirEntry {
                    meta: decoded_meta(arc_path, mtime, atime),
                })
            }
            other => {
                return Err(ArchiveError::Format(format!(
                    "unknown entry tag {:#04x}",
                    other
                )));
            }
        };
        Ok(entry)
    }
}

fn decoded_meta(arc_path: String, mtime: i64, atime: i64) -> EntryMeta {
    EntryMeta {
        disk_path: PathBuf::from(&arc_path),
        arc_path,
        mtime,
        atime,
    }
}

fn write_path<W: Write>(w: &mut W, path: &str) -> Result<(), ArchiveError> {
    let bytes = path.as_bytes();
    if bytes.is_empty() || bytes.len() >= MAX_PATH_LEN {
        return Err(ArchiveError::Format(format!(
            "entry path length {} out of range [1, {})",
            bytes.len(),
            MAX_PATH_LEN
        )));
    }
    w.write_all(&(bytes.len() as i16).to_le_bytes())?;
    w.write_all(bytes)?;
    Ok(())
}

fn read_path<R: Read>(r: &mut R) -> Result<String, ArchiveError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf).map_err(truncated)?;
    let len = i16::from_le_bytes(buf);
    if len < 1 || len as usize >= MAX_PATH_LEN {
        return Err(ArchiveError::Format(format!(
            "entry path length {} out of range [1, {})",
            len, MAX_PATH_LEN
        )));
    }
    let mut bytes = vec![0u8; len as usize];
    r.read_exact(&mut bytes).map_err(truncated)?;
    String::from_utf8(bytes)
        .map_err(|_| ArchiveError::Format("entry path is not valid UTF-8".into()))
}

fn write_times<W: Write>(w: &mut W, meta: &EntryMeta) -> Result<(), ArchiveError> {
    w.write_all(&meta.mtime.to_le_bytes())?;
    w.write_all(&meta.atime.to_le_bytes())?;
    Ok(())
}

fn read_times<R: Read>(r: &mut R) -> Result<(i64, i64), ArchiveError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(truncated)?;
    let mtime = i64::from_le_bytes(buf);
    r.read_exact(&mut buf).map_err(truncated)?;
    let atime = i64::from_le_bytes(buf);
    Ok((mtime, atime))
}

fn truncated(err: io::Error) -> ArchiveError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        ArchiveError::Format("archive ends in the middle of a header".into())
    } else {
        ArchiveError::from(err)
    }
}

/// Keeps only the first entry for each archive path, preserving input order.
pub fn drop_duplicates(entries: Vec<Entry>) -> Vec<Entry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.arc_path().to_string()))
        .collect()
}

/// Case-insensitive lexicographic sort by archive path; stable, so ties keep
/// their insertion order.
pub fn sort_by_arc_path(entries: &mut [Entry]) {
    entries.sort_by(|a, b| {
        a.arc_path()
            .to_lowercase()
            .cmp(&b.arc_path().to_lowercase())
    });
}

/// Human-readable size with a decimal (1000) divisor and one decimal place
/// once the value reaches 1000 units. Display-only, never persisted.
pub fn human_size(bytes: u64) -> String {
    const UNIT: u64 = 1000;
    if bytes < UNIT {
        return format!("{}B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1}{}", bytes as f64 / div as f64, ['K', 'M', 'G', 'T', 'P', 'E'][exp])
}
