//! # Archive Session
//!
//! Lifecycle of one archive file: create-side validation, open-side magic
//! and codec checks, and sequential header reading. The prelude is
//! `[u16 magic][u8 codec][u32 entry_count]`, little-endian; the codec byte
//! fixes the compressor for every block in the archive.

use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::compressor::{Codec, DEFAULT_LEVEL};
use crate::error::ArchiveError;
use crate::header::Entry;

pub const MAGIC: u16 = 0x5717;

/// One archive session: the container path plus the codec (and, on the
/// create side, the compression level) every operation on it will use.
#[derive(Debug, Clone)]
pub struct Archive {
    pub path: PathBuf,
    pub codec: Codec,
    pub level: u32,
}

impl Archive {
    /// Session for writing a new archive. Validates the configuration
    /// before any I/O happens.
    pub fn create(path: impl Into<PathBuf>, codec: Codec, level: u32) -> Result<Self, ArchiveError> {
        let path = path.into();
        if level > 9 {
            return Err(ArchiveError::Config(format!(
                "compression level {} out of range 0-9",
                level
            )));
        }
        if path.is_dir() {
            return Err(ArchiveError::Config(format!(
                "archive target '{}' is a directory",
                path.display()
            )));
        }
        Ok(Archive { path, codec, level })
    }

    /// Session over an existing archive; reads and validates the prelude.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let path = path.into();
        let mut file = File::open(&path).map_err(|e| ArchiveError::io(e, &path))?;
        let codec = read_prelude_magic(&mut file, &path)?;
        Ok(Archive {
            path,
            codec,
            level: DEFAULT_LEVEL,
        })
    }

    /// Reads every entry header and returns them together with a buffered
    /// reader positioned at the first byte of the data section.
    pub fn read_entries(&self) -> Result<(Vec<Entry>, BufReader<File>), ArchiveError> {
        let file = File::open(&self.path).map_err(|e| ArchiveError::io(e, &self.path))?;
        let mut reader = BufReader::new(file);

        read_prelude_magic(&mut reader, &self.path)?;
        let mut buf = [0u8; 4];
        reader
            .read_exact(&mut buf)
            .map_err(|e| ArchiveError::io(e, &self.path))?;
        let count = u32::from_le_bytes(buf);

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(Entry::decode(&mut reader)?);
        }
        tracing::debug!(count, "read entry headers");

        Ok((entries, reader))
    }

    /// Deletes a partially written archive after a failed compress. Best
    /// effort; the original error is the one worth reporting.
    pub fn remove_partial(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "partial archive not removed");
        }
    }
}

/// Writes `[magic][codec][entry_count]`.
pub(crate) fn write_prelude<W: Write>(
    w: &mut W,
    codec: Codec,
    entry_count: u32,
) -> Result<(), ArchiveError> {
    w.write_all(&MAGIC.to_le_bytes())?;
    w.write_all(&[codec.id()])?;
    w.write_all(&entry_count.to_le_bytes())?;
    Ok(())
}

fn read_prelude_magic<R: Read>(r: &mut R, path: &Path) -> Result<Codec, ArchiveError> {
    let mut buf = [0u8; 3];
    r.read_exact(&mut buf)
        .map_err(|_| not_an_archive(path))?;
    if u16::from_le_bytes([buf[0], buf[1]]) != MAGIC {
        return Err(not_an_archive(path));
    }
    Codec::from_id(buf[2])
}

fn not_an_archive(path: &Path) -> ArchiveError {
    ArchiveError::Format(format!("'{}' is not a parz archive", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn prelude_roundtrip() {
        let mut buf = Vec::new();
        write_prelude(&mut buf, Codec::Lz4, 7).unwrap();
        assert_eq!(buf.len(), 7);

        let codec = read_prelude_magic(&mut Cursor::new(&buf), Path::new("a.parz")).unwrap();
        assert_eq!(codec, Codec::Lz4);
        assert_eq!(&buf[3..], &7u32.to_le_bytes());
    }

    #[test]
    fn bad_magic_is_rejected_by_name() {
        let err = read_prelude_magic(&mut Cursor::new(b"PK\x03\x04"), Path::new("x.zip")).unwrap_err();
        assert!(err.to_string().contains("'x.zip' is not a parz archive"));
    }

    #[test]
    fn bad_codec_byte_is_a_format_error() {
        let mut buf = MAGIC.to_le_bytes().to_vec();
        buf.push(0x09);
        let err = read_prelude_magic(&mut Cursor::new(&buf), Path::new("a")).unwrap_err();
        assert!(matches!(err, ArchiveError::Format(_)));
    }

    #[test]
    fn create_validates_level_and_target() {
        assert!(matches!(
            Archive::create("a.parz", Codec::Deflate, 10).unwrap_err(),
            ArchiveError::Config(_)
        ));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Archive::create(dir.path(), Codec::Deflate, 6).unwrap_err(),
            ArchiveError::Config(_)
        ));
    }
}
